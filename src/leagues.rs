//! Allow-listed competitions and their per-provider external ids. This is
//! the single gate every write and filter passes through.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::warn;

use crate::model::Provider;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedLeague {
    pub id: i64,
    pub name: String,
    pub football_data_id: Option<i64>,
    pub api_football_id: Option<i64>,
    pub is_active: bool,
}

impl AllowedLeague {
    /// The competition id this league carries in the given provider's
    /// namespace, if a mapping is configured.
    pub fn external_id(&self, provider: Provider) -> Option<i64> {
        match provider {
            Provider::FootballData => self.football_data_id,
            Provider::ApiFootball => self.api_football_id,
        }
    }
}

/// Where the persisted allow-list configuration is read from. Administered
/// externally; this crate only consumes it.
pub trait LeagueSource {
    fn load_active(&self) -> Result<Vec<AllowedLeague>>;
}

/// Reads `allowed_leagues` rows from SQLite.
pub struct SqliteLeagueSource {
    conn: Connection,
}

impl SqliteLeagueSource {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("open league config db {}", path.display()))?;
        // Administered externally; the table just has to exist so an empty
        // configuration reads as an empty allow-list.
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS allowed_leagues (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                football_data_id INTEGER NULL,
                api_football_id INTEGER NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );",
        )
        .context("create allowed_leagues table")?;
        Ok(Self { conn })
    }
}

impl LeagueSource for SqliteLeagueSource {
    fn load_active(&self) -> Result<Vec<AllowedLeague>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, football_data_id, api_football_id, is_active
                 FROM allowed_leagues
                 WHERE is_active = 1",
            )
            .context("prepare allowed leagues query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AllowedLeague {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    football_data_id: row.get(2)?,
                    api_football_id: row.get(3)?,
                    is_active: row.get::<_, i64>(4)? != 0,
                })
            })
            .context("query allowed leagues")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode allowed league row")?);
        }
        Ok(out)
    }
}

struct CacheSlot {
    fetched_at: Instant,
    leagues: Vec<AllowedLeague>,
}

/// TTL-cached view over a [`LeagueSource`]. Refresh happens lazily on read;
/// concurrent readers may observe a snapshot up to one TTL old. A failed
/// refresh serves the previous snapshot (or nothing) rather than failing the
/// caller.
pub struct LeagueRegistry {
    source: Box<dyn LeagueSource>,
    ttl: Duration,
    cache: Mutex<Option<CacheSlot>>,
}

impl LeagueRegistry {
    pub fn new(source: Box<dyn LeagueSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Currently active leagues, refreshed when the cached snapshot has
    /// expired.
    pub fn active_leagues(&self) -> Vec<AllowedLeague> {
        let mut guard = self.cache.lock().expect("league cache lock poisoned");
        let fresh = guard
            .as_ref()
            .is_some_and(|slot| slot.fetched_at.elapsed() < self.ttl);
        if !fresh {
            match self.source.load_active() {
                Ok(leagues) => {
                    *guard = Some(CacheSlot {
                        fetched_at: Instant::now(),
                        leagues,
                    });
                }
                Err(err) => {
                    warn!(error = %err, "allow-list refresh failed, serving stale snapshot");
                }
            }
        }
        guard
            .as_ref()
            .map(|slot| slot.leagues.clone())
            .unwrap_or_default()
    }

    /// Drops the cached snapshot so the next read hits the source.
    pub fn refresh(&self) {
        let mut guard = self.cache.lock().expect("league cache lock poisoned");
        *guard = None;
    }

    /// External competition ids of all active leagues in the given
    /// provider's namespace.
    pub fn provider_ids(&self, provider: Provider) -> Vec<i64> {
        self.active_leagues()
            .iter()
            .filter_map(|league| league.external_id(provider))
            .collect()
    }

    /// Membership test used by every write path.
    pub fn is_allowed(&self, competition_id: i64, provider: Provider) -> bool {
        self.active_leagues()
            .iter()
            .any(|league| league.external_id(provider) == Some(competition_id))
    }
}

//! Canonical match persistence. Every write is gatekept against the league
//! allow-list, even when the caller already filtered — a record that slips
//! past one layer must not survive the next.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::leagues::LeagueRegistry;
use crate::model::{
    Competition, FullTime, Match, MatchEvent, MatchStatistic, MatchStatus, Provider, Score, Team,
};

pub struct MatchStore {
    conn: Connection,
    registry: Arc<LeagueRegistry>,
}

impl MatchStore {
    pub fn open(path: &Path, registry: Arc<LeagueRegistry>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open match db {}", path.display()))?;
        init_schema(&conn)?;
        Ok(Self { conn, registry })
    }

    pub fn open_in_memory(registry: Arc<LeagueRegistry>) -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory match db")?;
        init_schema(&conn)?;
        Ok(Self { conn, registry })
    }

    /// All matches whose kickoff falls on the given UTC date, with events
    /// attached, ordered by kickoff.
    pub fn matches_by_date(&self, date: NaiveDate) -> Result<Vec<Match>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, utc_date, status, minute,
                        home_team_id, home_team, home_team_crest, home_score,
                        away_team_id, away_team, away_team_crest, away_score,
                        competition_id, competition, competition_emblem,
                        stage, group_name, provider, venue, statistics
                 FROM matches
                 WHERE utc_date LIKE ?1 || '%'
                 ORDER BY utc_date ASC, id ASC",
            )
            .context("prepare matches-by-date query")?;
        let rows = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], row_to_match)
            .context("query matches by date")?;

        let mut out = Vec::new();
        for row in rows {
            let mut m = row.context("decode match row")?;
            m.events = self.events_for(m.id)?;
            out.push(m);
        }
        Ok(out)
    }

    pub fn match_by_id(&self, id: i64) -> Result<Option<Match>> {
        let found = self
            .conn
            .query_row(
                "SELECT id, utc_date, status, minute,
                        home_team_id, home_team, home_team_crest, home_score,
                        away_team_id, away_team, away_team_crest, away_score,
                        competition_id, competition, competition_emblem,
                        stage, group_name, provider, venue, statistics
                 FROM matches WHERE id = ?1",
                params![id],
                row_to_match,
            )
            .optional()
            .context("query match by id")?;
        match found {
            Some(mut m) => {
                m.events = self.events_for(m.id)?;
                Ok(Some(m))
            }
            None => Ok(None),
        }
    }

    /// Matches for the date that may still change: anything live-like, plus
    /// SCHEDULED rows (imminent starts are classified by the caller).
    pub fn matches_needing_update(&self, date: NaiveDate) -> Result<Vec<Match>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, utc_date, status, minute,
                        home_team_id, home_team, home_team_crest, home_score,
                        away_team_id, away_team, away_team_crest, away_score,
                        competition_id, competition, competition_emblem,
                        stage, group_name, provider, venue, statistics
                 FROM matches
                 WHERE utc_date LIKE ?1 || '%'
                   AND status IN ('IN_PLAY', 'PAUSED', 'SCHEDULED')",
            )
            .context("prepare needing-update query")?;
        let rows = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], row_to_match)
            .context("query matches needing update")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode match row")?);
        }
        Ok(out)
    }

    /// Inserts or refreshes a canonical match. Silently a no-op when the
    /// match's competition is not allow-listed for its provider, and a
    /// FINISHED row is only ever overwritten by another FINISHED payload.
    /// Returns whether the row was accepted.
    pub fn upsert(&mut self, m: &Match) -> Result<bool> {
        if !self.registry.is_allowed(m.competition.id, m.provider) {
            debug!(
                match_id = m.id,
                competition_id = m.competition.id,
                provider = m.provider.as_str(),
                "blocked upsert of disallowed competition"
            );
            return Ok(false);
        }

        let statistics =
            serde_json::to_string(&m.statistics).context("serialize statistics")?;
        let tx = self.conn.transaction().context("begin upsert transaction")?;
        tx.execute(
            "INSERT INTO matches (
                id, utc_date, status, minute,
                home_team_id, home_team, home_team_crest, home_score,
                away_team_id, away_team, away_team_crest, away_score,
                competition_id, competition, competition_emblem,
                stage, group_name, provider, venue, statistics, updated_at
             ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
             )
             ON CONFLICT(id) DO UPDATE SET
                utc_date = excluded.utc_date,
                status = excluded.status,
                minute = excluded.minute,
                home_team = excluded.home_team,
                home_team_crest = excluded.home_team_crest,
                home_score = excluded.home_score,
                away_team = excluded.away_team,
                away_team_crest = excluded.away_team_crest,
                away_score = excluded.away_score,
                competition_id = excluded.competition_id,
                competition = excluded.competition,
                competition_emblem = excluded.competition_emblem,
                stage = excluded.stage,
                group_name = excluded.group_name,
                provider = excluded.provider,
                venue = excluded.venue,
                statistics = excluded.statistics,
                updated_at = excluded.updated_at
             WHERE matches.status != 'FINISHED' OR excluded.status = 'FINISHED'",
            params![
                m.id,
                m.utc_date.to_rfc3339(),
                m.status.as_str(),
                m.minute,
                m.home_team.id,
                m.home_team.name,
                m.home_team.crest,
                m.score.full_time.home,
                m.away_team.id,
                m.away_team.name,
                m.away_team.crest,
                m.score.full_time.away,
                m.competition.id,
                m.competition.name,
                m.competition.emblem,
                m.stage,
                m.group,
                m.provider.as_str(),
                m.venue,
                statistics,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("upsert match")?;
        if !m.events.is_empty() {
            replace_events(&tx, m.id, &m.events)?;
        }
        tx.commit().context("commit upsert transaction")?;
        Ok(true)
    }

    /// Partial update used by the live-sync path. Events, when provided, are
    /// fully replaced — never appended.
    #[allow(clippy::too_many_arguments)]
    pub fn update_status(
        &mut self,
        id: i64,
        status: MatchStatus,
        minute: Option<u32>,
        home_score: Option<i64>,
        away_score: Option<i64>,
        events: &[MatchEvent],
        venue: Option<&str>,
        statistics: Option<&[MatchStatistic]>,
    ) -> Result<()> {
        let statistics = match statistics {
            Some(stats) => {
                Some(serde_json::to_string(stats).context("serialize statistics")?)
            }
            None => None,
        };
        let tx = self.conn.transaction().context("begin update transaction")?;
        tx.execute(
            "UPDATE matches
             SET status = ?2,
                 minute = ?3,
                 home_score = ?4,
                 away_score = ?5,
                 venue = COALESCE(?6, venue),
                 statistics = COALESCE(?7, statistics),
                 updated_at = ?8
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                minute,
                home_score,
                away_score,
                venue,
                statistics,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("update match status")?;
        if !events.is_empty() {
            replace_events(&tx, id, events)?;
        }
        tx.commit().context("commit update transaction")?;
        Ok(())
    }

    /// Removes a match and its events. Used only by self-healing cleanup.
    pub fn delete(&mut self, id: i64) -> Result<()> {
        let tx = self.conn.transaction().context("begin delete transaction")?;
        tx.execute("DELETE FROM match_events WHERE match_id = ?1", params![id])
            .context("delete match events")?;
        tx.execute("DELETE FROM matches WHERE id = ?1", params![id])
            .context("delete match")?;
        tx.commit().context("commit delete transaction")?;
        Ok(())
    }

    /// Appends an audit event. Fire-and-forget from the caller's point of
    /// view; failures surface only in logs.
    pub fn audit(&self, action: &str, details: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO audit_log (action, details, created_at) VALUES (?1, ?2, ?3)",
                params![action, details, Utc::now().to_rfc3339()],
            )
            .context("insert audit row")?;
        Ok(())
    }

    pub fn last_audit_time(&self, action: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM audit_log
                 WHERE action = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
                params![action],
                |row| row.get(0),
            )
            .optional()
            .context("query last audit time")?;
        Ok(raw
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    pub fn registry(&self) -> &Arc<LeagueRegistry> {
        &self.registry
    }

    fn events_for(&self, match_id: i64) -> Result<Vec<MatchEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT type, minute, team, player FROM match_events
                 WHERE match_id = ?1
                 ORDER BY minute ASC, id ASC",
            )
            .context("prepare events query")?;
        let rows = stmt
            .query_map(params![match_id], |row| {
                Ok(MatchEvent {
                    kind: row.get(0)?,
                    minute: row.get(1)?,
                    team: row.get(2)?,
                    player: row.get(3)?,
                })
            })
            .context("query match events")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode event row")?);
        }
        Ok(out)
    }
}

fn replace_events(
    tx: &rusqlite::Transaction<'_>,
    match_id: i64,
    events: &[MatchEvent],
) -> Result<()> {
    tx.execute("DELETE FROM match_events WHERE match_id = ?1", params![match_id])
        .context("clear previous events")?;
    for event in events {
        tx.execute(
            "INSERT INTO match_events (match_id, type, minute, team, player)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![match_id, event.kind, event.minute, event.team, event.player],
        )
        .context("insert event")?;
    }
    Ok(())
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY,
            utc_date TEXT NOT NULL,
            status TEXT NOT NULL,
            minute INTEGER NULL,
            home_team_id INTEGER NOT NULL,
            home_team TEXT NOT NULL,
            home_team_crest TEXT NOT NULL,
            home_score INTEGER NULL,
            away_team_id INTEGER NOT NULL,
            away_team TEXT NOT NULL,
            away_team_crest TEXT NOT NULL,
            away_score INTEGER NULL,
            competition_id INTEGER NOT NULL,
            competition TEXT NOT NULL,
            competition_emblem TEXT NULL,
            stage TEXT NOT NULL,
            group_name TEXT NULL,
            provider TEXT NOT NULL,
            venue TEXT NULL,
            statistics TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_utc_date ON matches(utc_date);
        CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status);

        CREATE TABLE IF NOT EXISTS match_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            minute INTEGER NOT NULL,
            team TEXT NOT NULL,
            player TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_match_events_match ON match_events(match_id);

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            action TEXT NOT NULL,
            details TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log(action, created_at);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

fn row_to_match(row: &rusqlite::Row<'_>) -> rusqlite::Result<Match> {
    let utc_raw: String = row.get(1)?;
    let utc_date = DateTime::parse_from_rfc3339(&utc_raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default();
    let status_raw: String = row.get(2)?;
    let provider_raw: String = row.get(17)?;
    let statistics_raw: String = row.get(19)?;

    Ok(Match {
        id: row.get(0)?,
        utc_date,
        status: MatchStatus::from_str(&status_raw).unwrap_or(MatchStatus::Scheduled),
        minute: row.get(3)?,
        home_team: Team {
            id: row.get(4)?,
            name: row.get(5)?,
            crest: row.get(6)?,
        },
        away_team: Team {
            id: row.get(8)?,
            name: row.get(9)?,
            crest: row.get(10)?,
        },
        score: Score {
            full_time: FullTime {
                home: row.get(7)?,
                away: row.get(11)?,
            },
        },
        competition: Competition {
            id: row.get(12)?,
            name: row.get(13)?,
            emblem: row.get(14)?,
        },
        stage: row.get(15)?,
        group: row.get(16)?,
        provider: Provider::from_str(&provider_raw).unwrap_or(Provider::FootballData),
        venue: row.get(18)?,
        statistics: serde_json::from_str(&statistics_raw).unwrap_or_default(),
        events: Vec::new(),
    })
}

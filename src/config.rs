use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

const DATA_DIR: &str = "fixture_sync";
const DB_FILE: &str = "matches.sqlite";

/// Process configuration, resolved once at startup. Missing provider
/// credentials are fatal here, not per-call.
#[derive(Debug, Clone)]
pub struct Config {
    pub football_data_token: String,
    pub api_football_key: String,
    pub db_path: PathBuf,
    pub league_ttl: Duration,
    pub live_poll: Duration,
    pub schedule_poll: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let football_data_token = opt_env("FOOTBALL_DATA_TOKEN")
            .ok_or_else(|| anyhow!("FOOTBALL_DATA_TOKEN is not configured"))?;
        let api_football_key = opt_env("API_FOOTBALL_KEY")
            .ok_or_else(|| anyhow!("API_FOOTBALL_KEY is not configured"))?;

        let db_path = opt_env("DB_PATH")
            .map(PathBuf::from)
            .or_else(default_db_path)
            .ok_or_else(|| anyhow!("DB_PATH is not set and no cache directory is available"))?;

        let league_ttl = secs_env("LEAGUE_CACHE_TTL_SECS", 3600, 60, 86_400);
        let live_poll = secs_env("LIVE_POLL_SECS", 600, 30, 3600);
        let schedule_poll = secs_env("SCHEDULE_POLL_SECS", 21_600, 600, 86_400);

        Ok(Self {
            football_data_token,
            api_football_key,
            db_path,
            league_ttl,
            live_poll,
            schedule_poll,
        })
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|val| {
        let trimmed = val.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn secs_env(key: &str, default: u64, min: u64, max: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max);
    Duration::from_secs(secs)
}

fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(DATA_DIR).join(DB_FILE));
        }
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(DATA_DIR).join(DB_FILE))
}

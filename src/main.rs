use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use fixture_sync::api_football::ApiFootballAdapter;
use fixture_sync::config::Config;
use fixture_sync::engine::{ReconEngine, SystemClock};
use fixture_sync::football_data::FootballDataAdapter;
use fixture_sync::leagues::{LeagueRegistry, SqliteLeagueSource};
use fixture_sync::store::MatchStore;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("load configuration")?;
    info!(db = %config.db_path.display(), "starting fixture sync");

    let source = SqliteLeagueSource::open(&config.db_path)?;
    let registry = Arc::new(LeagueRegistry::new(Box::new(source), config.league_ttl));
    let store = MatchStore::open(&config.db_path, Arc::clone(&registry))?;

    let mut engine = ReconEngine::new(
        Box::new(FootballDataAdapter::new(config.football_data_token.clone())),
        Box::new(ApiFootballAdapter::new(config.api_football_key.clone())),
        registry,
        store,
        Box::new(SystemClock),
    );

    run_loop(&mut engine, &config)
}

/// Two cadences on one thread: an infrequent schedule refresh for today's
/// fixtures, and a tighter live-sync tick. Each tick's failures are logged
/// and retried on the next interval, never fatal.
fn run_loop(engine: &mut ReconEngine, config: &Config) -> Result<()> {
    let mut last_schedule: Option<Instant> = None;
    let mut last_live: Option<Instant> = None;

    loop {
        if due(last_schedule, config.schedule_poll) {
            let today = Utc::now().date_naive();
            match engine.matches_for_date(today) {
                Ok(matches) => info!(%today, count = matches.len(), "schedule refreshed"),
                Err(err) => error!(error = %err, "schedule refresh failed"),
            }
            last_schedule = Some(Instant::now());
        }

        if due(last_live, config.live_poll) {
            if let Err(err) = engine.sync_live_matches() {
                error!(error = %err, "live sync failed");
            }
            last_live = Some(Instant::now());
        }

        thread::sleep(Duration::from_secs(5));
    }
}

fn due(last: Option<Instant>, every: Duration) -> bool {
    last.map_or(true, |at| at.elapsed() >= every)
}

//! Reconciliation engine. Orchestrates the two provider adapters, the league
//! registry and the match store: schedule bootstrap from the primary source,
//! live polling against the secondary source, cross-provider record linking,
//! and self-healing cleanup of disallowed records.

use std::collections::HashSet;

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::leagues::LeagueRegistry;
use crate::matcher::same_team;
use crate::model::{Match, MatchDetail, MatchStatus, Provider};
use crate::provider::{FixtureProvider, ProviderError};
use crate::store::MatchStore;

/// Days of schedule seeded ahead when a date has no cached matches.
const BOOTSTRAP_WINDOW_DAYS: i64 = 10;
/// A SCHEDULED match kicking off within this many minutes counts as active.
const IMMINENT_START_MINS: i64 = 5;
/// Maximum kickoff drift tolerated when linking records across providers.
const LINK_WINDOW_HOURS: i64 = 4;

/// Wall-clock source, injected so trigger logic is testable.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct ReconEngine {
    primary: Box<dyn FixtureProvider>,
    secondary: Box<dyn FixtureProvider>,
    registry: Arc<LeagueRegistry>,
    store: MatchStore,
    clock: Box<dyn Clock>,
}

impl ReconEngine {
    pub fn new(
        primary: Box<dyn FixtureProvider>,
        secondary: Box<dyn FixtureProvider>,
        registry: Arc<LeagueRegistry>,
        store: MatchStore,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            primary,
            secondary,
            registry,
            store,
            clock,
        }
    }

    /// Pushes the current allow-list into both adapters. Cheap (registry is
    /// cached), so it runs at the top of every operation rather than relying
    /// on a configure-once assumption.
    fn configure_adapters(&mut self) {
        self.primary
            .set_allowed_leagues(self.registry.provider_ids(Provider::FootballData));
        self.secondary
            .set_allowed_leagues(self.registry.provider_ids(Provider::ApiFootball));
    }

    /// All allow-listed matches for the given date. Serves the store when it
    /// has anything valid for that day; otherwise bootstraps a ten-day window
    /// from the primary provider. Never touches the secondary provider, and
    /// never fails on upstream trouble — worst case is an empty result.
    pub fn matches_for_date(&mut self, date: NaiveDate) -> Result<Vec<Match>> {
        self.configure_adapters();

        let base = self.store.matches_by_date(date)?;
        let mut valid = Vec::with_capacity(base.len());
        for m in base {
            if self.registry.is_allowed(m.competition.id, m.provider) {
                valid.push(m);
                continue;
            }
            // Self-healing cleanup: the record no longer satisfies the
            // allow-list invariant, so it must not be served again.
            warn!(
                match_id = m.id,
                competition_id = m.competition.id,
                provider = m.provider.as_str(),
                "purging match from disallowed competition"
            );
            if let Err(err) = self.store.delete(m.id) {
                warn!(match_id = m.id, error = %err, "cleanup delete failed");
                continue;
            }
            self.log_audit(
                "cleanup",
                &format!(
                    "deleted match {} (competition {} no longer allowed for {})",
                    m.id,
                    m.competition.id,
                    m.provider.as_str()
                ),
            );
        }
        if !valid.is_empty() {
            return Ok(valid);
        }

        // Nothing cached for this date: bootstrap a wide window from the
        // primary provider so upcoming days are seeded in the same call.
        let to = date + Duration::days(BOOTSTRAP_WINDOW_DAYS);
        let fetched = match self.primary.matches_in_range(date, to) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(%date, error = %err, "schedule bootstrap failed, serving empty");
                return Ok(Vec::new());
            }
        };
        info!(%date, count = fetched.len(), "bootstrapped schedule window");
        for m in &fetched {
            if let Err(err) = self.store.upsert(m) {
                warn!(match_id = m.id, error = %err, "bootstrap upsert failed");
            }
        }
        self.log_audit(
            "bootstrap",
            &format!("seeded {} matches for {}..{}", fetched.len(), date, to),
        );

        Ok(fetched
            .into_iter()
            .filter(|m| m.utc_date.date_naive() == date)
            .filter(|m| self.registry.is_allowed(m.competition.id, m.provider))
            .collect())
    }

    /// Periodic live synchronization. Spends secondary-provider quota only
    /// when today has live or imminently-starting matches; otherwise falls
    /// back to a cheap primary refresh. Per-match failures are isolated so
    /// one bad record never aborts the batch.
    pub fn sync_live_matches(&mut self) -> Result<()> {
        self.configure_adapters();
        let now = self.clock.now();
        let today = now.date_naive();

        let candidates = self.store.matches_needing_update(today)?;
        let active: Vec<&Match> = candidates
            .iter()
            .filter(|m| is_active(m, now))
            .collect();

        if active.is_empty() {
            // No live activity expected: refresh today's schedule from the
            // primary provider instead (postponements, corrections).
            match self.primary.matches_for_date(today) {
                Ok(matches) => {
                    for m in &matches {
                        if let Err(err) = self.store.upsert(m) {
                            warn!(match_id = m.id, error = %err, "schedule refresh upsert failed");
                        }
                    }
                    self.log_audit(
                        "live_sync",
                        &format!("no active matches, refreshed {} from primary", matches.len()),
                    );
                }
                Err(err) => {
                    warn!(error = %err, "schedule refresh from primary failed");
                }
            }
            return Ok(());
        }

        info!(active = active.len(), "polling live data");
        // One full-day call covers every active match across all leagues.
        let live_pool = match self.secondary.matches_for_date(today) {
            Ok(matches) => matches,
            Err(err) => {
                warn!(error = %err, "live poll failed, retrying next cycle");
                self.log_audit("live_sync", &format!("live poll failed: {err}"));
                return Ok(());
            }
        };

        // Link against the whole day, not just the active subset, so a match
        // that went live between the two store reads still gets updated.
        let base_set = self.store.matches_by_date(today)?;
        let mut linked: HashSet<i64> = HashSet::new();
        let mut updated = 0usize;
        for base in &base_set {
            match self.link_and_update(base, &live_pool) {
                Ok(Some(())) => {
                    linked.insert(base.id);
                    updated += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(match_id = base.id, error = %err, "live update failed");
                }
            }
        }

        // Matches still flagged live in the store but absent from the linked
        // set may have quietly finished upstream.
        for base in &base_set {
            if !base.status.is_live() || linked.contains(&base.id) {
                continue;
            }
            if let Err(err) = self.resolve_quiet_finish(base, &live_pool) {
                warn!(match_id = base.id, error = %err, "quiet-finish resolution failed");
            }
        }

        self.log_audit(
            "live_sync",
            &format!("{} active, {} updated", active.len(), updated),
        );
        Ok(())
    }

    /// Full detail for one match: secondary first (events, statistics,
    /// minute), primary as fallback. Only fails when both upstreams do.
    pub fn match_details(&mut self, id: i64) -> Result<MatchDetail, ProviderError> {
        self.configure_adapters();
        match self.secondary.match_details(id) {
            Ok(detail) => Ok(detail),
            Err(err) => {
                warn!(match_id = id, error = %err, "secondary details failed, trying primary");
                self.primary.match_details(id)
            }
        }
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    /// Multi-stage linking pipeline: league mapping, kickoff window, fuzzy
    /// team identity. Returns `Ok(Some(()))` when a secondary record was
    /// linked (written or already final), `Ok(None)` when no candidate
    /// survived the filters.
    fn link_and_update(&mut self, base: &Match, pool: &[Match]) -> Result<Option<()>> {
        // Stage 1: the base match's league must have a configured id in the
        // secondary provider's namespace. Without a mapping, linking by name
        // alone is unsafe to guess.
        let secondary_league = self
            .registry
            .active_leagues()
            .into_iter()
            .find(|l| l.external_id(base.provider) == Some(base.competition.id))
            .and_then(|l| l.external_id(Provider::ApiFootball));
        let Some(league_id) = secondary_league else {
            debug!(match_id = base.id, "no secondary league mapping, skipping link");
            return Ok(None);
        };

        // Stages 2 and 3: same league, kickoff within the drift window,
        // matcher confirms both team identities.
        let window = Duration::hours(LINK_WINDOW_HOURS);
        let mut candidates: Vec<&Match> = pool
            .iter()
            .filter(|c| c.competition.id == league_id)
            .filter(|c| (c.utc_date - base.utc_date).abs() <= window)
            .filter(|c| {
                same_team(&base.home_team.name, &c.home_team.name)
                    && same_team(&base.away_team.name, &c.away_team.name)
            })
            .collect();
        if candidates.is_empty() {
            let league_pool = pool.iter().filter(|c| c.competition.id == league_id).count();
            debug!(
                match_id = base.id,
                league_candidates = league_pool,
                "no linkable candidate"
            );
            return Ok(None);
        }
        // Tie-break: closest kickoff wins.
        candidates.sort_by_key(|c| (c.utc_date - base.utc_date).abs());
        let found = candidates[0];

        // FINISHED is terminal; a late or stale live payload never reverts it.
        if base.status == MatchStatus::Finished {
            return Ok(Some(()));
        }

        let stats = if found.statistics.is_empty() {
            None
        } else {
            Some(found.statistics.as_slice())
        };
        self.store.update_status(
            base.id,
            found.status,
            found.minute,
            found.score.full_time.home,
            found.score.full_time.away,
            &found.events,
            found.venue.as_deref(),
            stats,
        )?;
        debug!(
            match_id = base.id,
            linked_id = found.id,
            status = found.status.as_str(),
            "linked live record"
        );
        Ok(Some(()))
    }

    /// A base record still flagged live but unlinked this cycle may have
    /// finished upstream. The full-day list can omit final score and events,
    /// so confirmation goes through the detail endpoint; any failure leaves
    /// the record untouched for the next cycle.
    fn resolve_quiet_finish(&mut self, base: &Match, pool: &[Match]) -> Result<()> {
        let finished = pool.iter().find(|c| {
            c.status == MatchStatus::Finished
                && same_team(&base.home_team.name, &c.home_team.name)
                && same_team(&base.away_team.name, &c.away_team.name)
        });
        let Some(found) = finished else {
            return Ok(());
        };

        let detail = match self.secondary.match_details(found.id) {
            Ok(detail) => detail,
            Err(err) => {
                warn!(
                    match_id = base.id,
                    linked_id = found.id,
                    error = %err,
                    "finish confirmation fetch failed, keeping live state"
                );
                return Ok(());
            }
        };
        if detail.status != MatchStatus::Finished {
            return Ok(());
        }

        let stats = if detail.statistics.is_empty() {
            None
        } else {
            Some(detail.statistics.as_slice())
        };
        self.store.update_status(
            base.id,
            detail.status,
            detail.minute,
            detail.score.full_time.home,
            detail.score.full_time.away,
            &detail.events,
            detail.venue.as_deref(),
            stats,
        )?;
        info!(match_id = base.id, linked_id = found.id, "marked quietly finished match");
        Ok(())
    }

    fn log_audit(&self, action: &str, details: &str) {
        if let Err(err) = self.store.audit(action, details) {
            warn!(action, error = %err, "audit write failed");
        }
    }
}

/// Whether a match warrants spending secondary-provider quota right now:
/// already live, or scheduled and kicking off within the imminent window.
fn is_active(m: &Match, now: DateTime<Utc>) -> bool {
    if m.status.is_live() {
        return true;
    }
    m.status == MatchStatus::Scheduled
        && m.utc_date <= now + Duration::minutes(IMMINENT_START_MINS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Competition, FullTime, Score, Team};

    fn fixture(status: MatchStatus, kickoff: DateTime<Utc>) -> Match {
        Match {
            id: 1,
            utc_date: kickoff,
            status,
            minute: None,
            home_team: Team {
                id: 1,
                name: "Arsenal".into(),
                crest: String::new(),
            },
            away_team: Team {
                id: 2,
                name: "Chelsea".into(),
                crest: String::new(),
            },
            score: Score {
                full_time: FullTime::default(),
            },
            competition: Competition {
                id: 2021,
                name: "Premier League".into(),
                emblem: None,
            },
            stage: "REGULAR_SEASON".into(),
            group: None,
            provider: Provider::FootballData,
            venue: None,
            statistics: Vec::new(),
            events: Vec::new(),
        }
    }

    #[test]
    fn live_matches_are_active() {
        let now = Utc::now();
        assert!(is_active(&fixture(MatchStatus::InPlay, now), now));
        assert!(is_active(&fixture(MatchStatus::Paused, now), now));
    }

    #[test]
    fn imminent_kickoff_is_active() {
        let now = Utc::now();
        let soon = now + Duration::minutes(2);
        assert!(is_active(&fixture(MatchStatus::Scheduled, soon), now));
        // Kickoff already in the past but still SCHEDULED: stuck record,
        // poll it.
        let stuck = now - Duration::minutes(30);
        assert!(is_active(&fixture(MatchStatus::Scheduled, stuck), now));
    }

    #[test]
    fn distant_kickoff_is_not_active() {
        let now = Utc::now();
        let later = now + Duration::hours(3);
        assert!(!is_active(&fixture(MatchStatus::Scheduled, later), now));
        assert!(!is_active(&fixture(MatchStatus::Finished, now), now));
    }
}

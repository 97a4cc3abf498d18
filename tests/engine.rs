use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};

use fixture_sync::engine::{Clock, ReconEngine};
use fixture_sync::leagues::{AllowedLeague, LeagueRegistry, LeagueSource};
use fixture_sync::model::{
    Competition, FullTime, Match, MatchDetail, MatchEvent, MatchStatus, Provider, Score, Team,
};
use fixture_sync::provider::{FixtureProvider, ProviderError};
use fixture_sync::store::MatchStore;

// -- test doubles ----------------------------------------------------------

struct SharedLeagues(Arc<Mutex<Vec<AllowedLeague>>>);

impl LeagueSource for SharedLeagues {
    fn load_active(&self) -> Result<Vec<AllowedLeague>> {
        Ok(self.0.lock().unwrap().clone())
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Default)]
struct MockProvider {
    matches: Vec<Match>,
    details: HashMap<i64, MatchDetail>,
    fail: bool,
    day_calls: Rc<Cell<usize>>,
    range_calls: Rc<Cell<usize>>,
    detail_calls: Rc<Cell<usize>>,
}

impl MockProvider {
    fn outage(&self) -> ProviderError {
        ProviderError::Upstream(anyhow!("mock outage"))
    }
}

impl FixtureProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn set_allowed_leagues(&mut self, _ids: Vec<i64>) {}

    fn matches_for_date(&self, date: chrono::NaiveDate) -> Result<Vec<Match>, ProviderError> {
        self.day_calls.set(self.day_calls.get() + 1);
        if self.fail {
            return Err(self.outage());
        }
        Ok(self
            .matches
            .iter()
            .filter(|m| m.utc_date.date_naive() == date)
            .cloned()
            .collect())
    }

    fn matches_in_range(
        &self,
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
    ) -> Result<Vec<Match>, ProviderError> {
        self.range_calls.set(self.range_calls.get() + 1);
        if self.fail {
            return Err(self.outage());
        }
        Ok(self
            .matches
            .iter()
            .filter(|m| {
                let day = m.utc_date.date_naive();
                day >= from && day <= to
            })
            .cloned()
            .collect())
    }

    fn match_details(&self, id: i64) -> Result<MatchDetail, ProviderError> {
        self.detail_calls.set(self.detail_calls.get() + 1);
        if self.fail {
            return Err(self.outage());
        }
        self.details.get(&id).cloned().ok_or(ProviderError::NotFound(id))
    }

    fn live_matches(&self) -> Result<Vec<Match>, ProviderError> {
        if self.fail {
            return Err(self.outage());
        }
        Ok(self
            .matches
            .iter()
            .filter(|m| m.status.is_live())
            .cloned()
            .collect())
    }
}

// -- fixtures --------------------------------------------------------------

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 14, 58, 0).unwrap()
}

fn premier_league() -> AllowedLeague {
    AllowedLeague {
        id: 1,
        name: "Premier League".into(),
        football_data_id: Some(2021),
        api_football_id: Some(39),
        is_active: true,
    }
}

fn base_match(id: i64, kickoff: DateTime<Utc>, status: MatchStatus) -> Match {
    Match {
        id,
        utc_date: kickoff,
        status,
        minute: None,
        home_team: Team {
            id: 86,
            name: "Real Madrid".into(),
            crest: String::new(),
        },
        away_team: Team {
            id: 81,
            name: "Barcelona".into(),
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

fn secondary_match(id: i64, kickoff: DateTime<Utc>, status: MatchStatus) -> Match {
    let mut m = base_match(id, kickoff, status);
    m.provider = Provider::ApiFootball;
    m.competition.id = 39;
    m.home_team.name = "Real Madrid CF".into();
    m.away_team.name = "FC Barcelona".into();
    m
}

struct Harness {
    engine: ReconEngine,
    registry: Arc<LeagueRegistry>,
    leagues: Arc<Mutex<Vec<AllowedLeague>>>,
}

fn harness(
    leagues: Vec<AllowedLeague>,
    seed: Vec<Match>,
    primary: MockProvider,
    secondary: MockProvider,
) -> Harness {
    let shared = Arc::new(Mutex::new(leagues));
    let registry = Arc::new(LeagueRegistry::new(
        Box::new(SharedLeagues(Arc::clone(&shared))),
        StdDuration::from_secs(3600),
    ));
    let mut store = MatchStore::open_in_memory(Arc::clone(&registry)).expect("in-memory store");
    for m in &seed {
        assert!(store.upsert(m).expect("seed upsert"), "seed match must be allowed");
    }
    let engine = ReconEngine::new(
        Box::new(primary),
        Box::new(secondary),
        Arc::clone(&registry),
        store,
        Box::new(FixedClock(now())),
    );
    Harness {
        engine,
        registry,
        leagues: shared,
    }
}

// -- matchesForDate --------------------------------------------------------

#[test]
fn empty_store_bootstraps_a_ten_day_window_from_primary() {
    let range_calls = Rc::new(Cell::new(0));
    let primary = MockProvider {
        matches: vec![
            base_match(1, now() + Duration::hours(2), MatchStatus::Scheduled),
            base_match(2, now() + Duration::days(4), MatchStatus::Scheduled),
        ],
        range_calls: Rc::clone(&range_calls),
        ..Default::default()
    };
    let mut h = harness(
        vec![premier_league()],
        Vec::new(),
        primary,
        MockProvider::default(),
    );

    let today = now().date_naive();
    let day = h.engine.matches_for_date(today).expect("bootstrap");
    assert_eq!(range_calls.get(), 1);
    // Only today's matches are returned...
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].id, 1);
    // ...but the whole fetched window is persisted for future days.
    assert!(h.engine.store().match_by_id(2).expect("lookup").is_some());
}

#[test]
fn second_read_is_served_from_the_store() {
    let range_calls = Rc::new(Cell::new(0));
    let primary = MockProvider {
        matches: vec![base_match(1, now() + Duration::hours(2), MatchStatus::Scheduled)],
        range_calls: Rc::clone(&range_calls),
        ..Default::default()
    };
    let mut h = harness(
        vec![premier_league()],
        Vec::new(),
        primary,
        MockProvider::default(),
    );

    let today = now().date_naive();
    let first = h.engine.matches_for_date(today).expect("first read");
    let second = h.engine.matches_for_date(today).expect("second read");
    assert_eq!(first, second);
    assert_eq!(range_calls.get(), 1);
}

#[test]
fn primary_outage_yields_empty_not_error() {
    let primary = MockProvider {
        fail: true,
        ..Default::default()
    };
    let mut h = harness(
        vec![premier_league()],
        Vec::new(),
        primary,
        MockProvider::default(),
    );

    let day = h.engine.matches_for_date(now().date_naive()).expect("degraded read");
    assert!(day.is_empty());
}

#[test]
fn disallowed_matches_are_purged_on_read() {
    let seed = vec![base_match(1, now() + Duration::hours(2), MatchStatus::Scheduled)];
    let mut h = harness(
        vec![premier_league()],
        seed,
        MockProvider::default(),
        MockProvider::default(),
    );

    // The league is deactivated after the match was stored.
    h.leagues.lock().unwrap().clear();
    h.registry.refresh();

    let day = h.engine.matches_for_date(now().date_naive()).expect("read");
    assert!(day.is_empty());
    assert!(h.engine.store().match_by_id(1).expect("lookup").is_none());
}

// -- syncLiveMatches -------------------------------------------------------

#[test]
fn quiet_day_never_touches_the_secondary_provider() {
    let secondary_calls = Rc::new(Cell::new(0));
    let primary_calls = Rc::new(Cell::new(0));
    let seed = vec![base_match(1, now() + Duration::hours(3), MatchStatus::Scheduled)];
    let primary = MockProvider {
        day_calls: Rc::clone(&primary_calls),
        ..Default::default()
    };
    let secondary = MockProvider {
        day_calls: Rc::clone(&secondary_calls),
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], seed, primary, secondary);

    h.engine.sync_live_matches().expect("sync");
    assert_eq!(secondary_calls.get(), 0);
    // Falls back to a cheap primary refresh instead.
    assert_eq!(primary_calls.get(), 1);
}

#[test]
fn imminent_kickoff_triggers_live_polling_and_linking() {
    let kickoff = now() + Duration::minutes(2);
    let seed = vec![base_match(10, kickoff, MatchStatus::Scheduled)];
    let mut live = secondary_match(900, kickoff, MatchStatus::InPlay);
    live.minute = Some(1);
    live.score.full_time = FullTime {
        home: Some(0),
        away: Some(0),
    };
    let secondary = MockProvider {
        matches: vec![live],
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], seed, MockProvider::default(), secondary);

    h.engine.sync_live_matches().expect("sync");
    let stored = h.engine.store().match_by_id(10).expect("lookup").expect("present");
    assert_eq!(stored.status, MatchStatus::InPlay);
    assert_eq!(stored.minute, Some(1));
}

#[test]
fn quietly_finished_match_is_resolved_through_details() {
    let kickoff = now() - Duration::hours(2);
    let seed = vec![base_match(20, kickoff, MatchStatus::InPlay)];

    // The full-day listing carries the fixture with a drifted kickoff (outside
    // the linking window) and no events; the detail endpoint has the truth.
    let listed = secondary_match(500, kickoff + Duration::hours(5), MatchStatus::Finished);
    let mut detail = secondary_match(500, kickoff, MatchStatus::Finished);
    detail.score.full_time = FullTime {
        home: Some(2),
        away: Some(1),
    };
    detail.events = vec![MatchEvent {
        kind: "GOAL".into(),
        minute: 55,
        team: "Real Madrid".into(),
        player: "Vinícius Júnior".into(),
    }];
    let detail_calls = Rc::new(Cell::new(0));
    let secondary = MockProvider {
        matches: vec![listed],
        details: HashMap::from([(500, detail)]),
        detail_calls: Rc::clone(&detail_calls),
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], seed, MockProvider::default(), secondary);

    h.engine.sync_live_matches().expect("sync");
    assert_eq!(detail_calls.get(), 1);
    let stored = h.engine.store().match_by_id(20).expect("lookup").expect("present");
    assert_eq!(stored.status, MatchStatus::Finished);
    assert_eq!(stored.score.full_time.home, Some(2));
    assert_eq!(stored.score.full_time.away, Some(1));
    assert_eq!(stored.events.len(), 1);
}

#[test]
fn league_without_secondary_mapping_is_never_linked() {
    let mut unmapped = premier_league();
    unmapped.api_football_id = None;
    let kickoff = now() - Duration::minutes(30);
    let seed = vec![base_match(30, kickoff, MatchStatus::InPlay)];

    // A perfect name-and-time candidate that must still be ignored.
    let mut live = secondary_match(901, kickoff, MatchStatus::InPlay);
    live.minute = Some(33);
    live.score.full_time = FullTime {
        home: Some(1),
        away: Some(0),
    };
    let secondary = MockProvider {
        matches: vec![live],
        ..Default::default()
    };
    let mut h = harness(vec![unmapped], seed, MockProvider::default(), secondary);

    h.engine.sync_live_matches().expect("sync");
    let stored = h.engine.store().match_by_id(30).expect("lookup").expect("present");
    assert_eq!(stored.status, MatchStatus::InPlay);
    assert_eq!(stored.minute, None);
    assert_eq!(stored.score.full_time.home, None);
}

#[test]
fn finished_records_are_never_reverted() {
    let kickoff = now() - Duration::hours(3);
    let mut done = base_match(40, kickoff, MatchStatus::Finished);
    done.score.full_time = FullTime {
        home: Some(3),
        away: Some(0),
    };
    // A live record keeps the cycle polling.
    let seed = vec![done, base_match(41, now(), MatchStatus::InPlay)];

    // Stale live payload still reporting the finished fixture as in play.
    let mut stale = secondary_match(902, kickoff, MatchStatus::InPlay);
    stale.minute = Some(88);
    stale.score.full_time = FullTime {
        home: Some(2),
        away: Some(0),
    };
    let secondary = MockProvider {
        matches: vec![stale],
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], seed, MockProvider::default(), secondary);

    h.engine.sync_live_matches().expect("sync");
    let stored = h.engine.store().match_by_id(40).expect("lookup").expect("present");
    assert_eq!(stored.status, MatchStatus::Finished);
    assert_eq!(stored.score.full_time.home, Some(3));
}

// -- matchDetails ----------------------------------------------------------

#[test]
fn details_prefer_secondary() {
    let kickoff = now();
    let secondary = MockProvider {
        details: HashMap::from([(7, secondary_match(7, kickoff, MatchStatus::InPlay))]),
        ..Default::default()
    };
    let primary = MockProvider {
        details: HashMap::from([(7, base_match(7, kickoff, MatchStatus::Scheduled))]),
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], Vec::new(), primary, secondary);

    let detail = h.engine.match_details(7).expect("details");
    assert_eq!(detail.provider, Provider::ApiFootball);
}

#[test]
fn details_fall_back_to_primary_on_secondary_outage() {
    let kickoff = now();
    let secondary = MockProvider {
        fail: true,
        ..Default::default()
    };
    let primary = MockProvider {
        details: HashMap::from([(7, base_match(7, kickoff, MatchStatus::Scheduled))]),
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], Vec::new(), primary, secondary);

    let detail = h.engine.match_details(7).expect("details");
    assert_eq!(detail.provider, Provider::FootballData);
}

#[test]
fn details_fail_only_when_both_providers_fail() {
    let secondary = MockProvider {
        fail: true,
        ..Default::default()
    };
    let primary = MockProvider {
        fail: true,
        ..Default::default()
    };
    let mut h = harness(vec![premier_league()], Vec::new(), primary, secondary);

    assert!(h.engine.match_details(7).is_err());
}

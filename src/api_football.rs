//! Secondary provider adapter (api-football style). Richer data — events,
//! statistics, live minute — but metered, so callers only reach for it when
//! live activity is suspected.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::http_client::{get_with_retry, http_client, FetchError};
use crate::model::{
    Competition, FullTime, Match, MatchDetail, MatchEvent, MatchStatistic, MatchStatus, Provider,
    Score, Team,
};
use crate::provider::{FixtureProvider, ProviderError};

const BASE_URL: &str = "https://v3.football.api-sports.io";

pub struct ApiFootballAdapter {
    key: String,
    allowed: Vec<i64>,
}

impl ApiFootballAdapter {
    pub fn new(key: String) -> Self {
        Self {
            key,
            allowed: Vec::new(),
        }
    }

    fn fetch(&self, path_and_query: &str) -> Result<String, FetchError> {
        let client = http_client().map_err(FetchError::Build)?;
        let url = format!("{BASE_URL}{path_and_query}");
        get_with_retry(|| client.get(&url).header("x-apisports-key", &self.key))
    }

    fn filtered_list(&self, path_and_query: &str) -> Result<Vec<Match>, ProviderError> {
        if self.allowed.is_empty() {
            warn!("no allowed leagues configured, blocking api-football request");
            return Ok(Vec::new());
        }
        let body = self.fetch(path_and_query).map_err(upstream)?;
        let mut matches = parse_fixtures_json(&body)?;
        matches.retain(|m| self.allowed.contains(&m.competition.id));
        Ok(matches)
    }
}

fn upstream(err: FetchError) -> ProviderError {
    ProviderError::Upstream(anyhow::Error::new(err))
}

impl FixtureProvider for ApiFootballAdapter {
    fn name(&self) -> &'static str {
        Provider::ApiFootball.as_str()
    }

    fn set_allowed_leagues(&mut self, ids: Vec<i64>) {
        self.allowed = ids;
    }

    fn matches_for_date(&self, date: NaiveDate) -> Result<Vec<Match>, ProviderError> {
        self.filtered_list(&format!("/fixtures?date={}", date.format("%Y-%m-%d")))
    }

    fn matches_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Match>, ProviderError> {
        self.filtered_list(&format!(
            "/fixtures?from={}&to={}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        ))
    }

    fn match_details(&self, id: i64) -> Result<MatchDetail, ProviderError> {
        let body = self
            .fetch(&format!("/fixtures?id={id}"))
            .map_err(|err| match err {
                FetchError::Status {
                    status: StatusCode::NOT_FOUND,
                    ..
                } => ProviderError::NotFound(id),
                other => upstream(other),
            })?;
        let mut matches = parse_fixtures_json(&body)?;
        if matches.is_empty() {
            return Err(ProviderError::NotFound(id));
        }
        let m = matches.remove(0);
        if !self.allowed.is_empty() && !self.allowed.contains(&m.competition.id) {
            return Err(ProviderError::NotAllowed(id));
        }
        Ok(m)
    }

    fn live_matches(&self) -> Result<Vec<Match>, ProviderError> {
        self.filtered_list("/fixtures?live=all")
    }
}

#[derive(Debug, Deserialize)]
struct AfResponse {
    #[serde(default)]
    response: Vec<AfFixtureRow>,
}

#[derive(Debug, Deserialize)]
struct AfFixtureRow {
    fixture: AfFixture,
    league: AfLeague,
    teams: AfTeams,
    goals: AfGoals,
    #[serde(default)]
    events: Vec<AfEvent>,
    #[serde(default)]
    statistics: Vec<AfTeamStats>,
}

#[derive(Debug, Deserialize)]
struct AfFixture {
    id: i64,
    date: DateTime<Utc>,
    status: AfStatus,
    #[serde(default)]
    venue: AfVenue,
}

#[derive(Debug, Deserialize)]
struct AfStatus {
    short: String,
    elapsed: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AfVenue {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfLeague {
    id: i64,
    name: String,
    logo: Option<String>,
    #[serde(default)]
    round: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfTeams {
    home: AfTeam,
    away: AfTeam,
}

#[derive(Debug, Deserialize)]
struct AfTeam {
    id: i64,
    name: String,
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfGoals {
    home: Option<i64>,
    away: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AfEvent {
    time: AfEventTime,
    team: AfEventSide,
    player: AfEventSide,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfEventTime {
    elapsed: Option<u32>,
    #[serde(default)]
    extra: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AfEventSide {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfTeamStats {
    team: AfStatsTeam,
    #[serde(default)]
    statistics: Vec<AfStatValue>,
}

#[derive(Debug, Deserialize)]
struct AfStatsTeam {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct AfStatValue {
    #[serde(rename = "type")]
    kind: String,
    value: Option<serde_json::Value>,
}

/// api-football short status codes folded into the canonical vocabulary.
pub fn map_status(short: &str) -> MatchStatus {
    match short {
        "1H" | "2H" | "ET" | "P" | "LIVE" => MatchStatus::InPlay,
        "HT" | "BT" => MatchStatus::Paused,
        "FT" | "AET" | "PEN" | "AWD" => MatchStatus::Finished,
        "NS" | "TBD" => MatchStatus::Scheduled,
        "PST" => MatchStatus::Postponed,
        "SUSP" | "INT" => MatchStatus::Suspended,
        "CANC" | "CAN" | "ABD" | "WO" => MatchStatus::Canceled,
        _ => MatchStatus::Scheduled,
    }
}

fn normalize_event_kind(kind: &str, detail: Option<&str>) -> String {
    match kind {
        "Goal" => "GOAL".to_string(),
        "Card" => match detail {
            Some(d) if d.contains("Yellow") => "YELLOW_CARD".to_string(),
            Some(d) if d.contains("Red") => "RED_CARD".to_string(),
            _ => "CARD".to_string(),
        },
        "subst" => "SUBSTITUTION".to_string(),
        other => other.to_uppercase(),
    }
}

fn stat_value_to_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Null) | None => "0".to_string(),
        Some(other) => other.to_string(),
    }
}

fn map_events(events: Vec<AfEvent>) -> Vec<MatchEvent> {
    events
        .into_iter()
        .map(|event| MatchEvent {
            kind: normalize_event_kind(&event.kind, event.detail.as_deref()),
            minute: event.time.elapsed.unwrap_or(0) + event.time.extra.unwrap_or(0),
            team: event.team.name.unwrap_or_default(),
            player: event.player.name.unwrap_or_default(),
        })
        .collect()
}

/// Zips the per-team stat arrays into one row per stat type, keyed off the
/// home side's list.
fn map_statistics(stats: &[AfTeamStats], home_id: i64, away_id: i64) -> Vec<MatchStatistic> {
    let home = stats.iter().find(|s| s.team.id == home_id);
    let away = stats.iter().find(|s| s.team.id == away_id);
    let Some(home) = home else {
        return Vec::new();
    };

    home.statistics
        .iter()
        .map(|h| {
            let away_value = away.and_then(|a| {
                a.statistics
                    .iter()
                    .find(|entry| entry.kind == h.kind)
                    .and_then(|entry| entry.value.as_ref())
            });
            MatchStatistic {
                kind: h.kind.clone(),
                home: stat_value_to_string(h.value.as_ref()),
                away: stat_value_to_string(away_value),
            }
        })
        .collect()
}

fn map_fixture(row: AfFixtureRow) -> Match {
    let home_id = row.teams.home.id;
    let away_id = row.teams.away.id;
    let statistics = map_statistics(&row.statistics, home_id, away_id);

    Match {
        id: row.fixture.id,
        utc_date: row.fixture.date,
        status: map_status(&row.fixture.status.short),
        minute: row.fixture.status.elapsed,
        home_team: Team {
            id: home_id,
            name: row.teams.home.name,
            crest: row.teams.home.logo.unwrap_or_default(),
        },
        away_team: Team {
            id: away_id,
            name: row.teams.away.name,
            crest: row.teams.away.logo.unwrap_or_default(),
        },
        score: Score {
            full_time: FullTime {
                home: row.goals.home,
                away: row.goals.away,
            },
        },
        competition: Competition {
            id: row.league.id,
            name: row.league.name,
            emblem: row.league.logo,
        },
        stage: row.league.round.unwrap_or_default(),
        group: None,
        provider: Provider::ApiFootball,
        venue: row.fixture.venue.name,
        statistics,
        events: map_events(row.events),
    }
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Match>, ProviderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let response: AfResponse = serde_json::from_str(trimmed)?;
    Ok(response.response.into_iter().map(map_fixture).collect())
}

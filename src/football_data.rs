//! Primary provider adapter (football-data.org). Inexpensive and
//! schedule-oriented; the source of truth for fixture existence and timing.

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::http_client::{get_with_retry, http_client, FetchError};
use crate::model::{
    Competition, FullTime, Match, MatchDetail, MatchStatus, Provider, Score, Team,
};
use crate::provider::{FixtureProvider, ProviderError};

const BASE_URL: &str = "https://api.football-data.org/v4";

pub struct FootballDataAdapter {
    token: String,
    allowed: Vec<i64>,
}

impl FootballDataAdapter {
    pub fn new(token: String) -> Self {
        Self {
            token,
            allowed: Vec::new(),
        }
    }

    fn fetch(&self, path_and_query: &str) -> Result<String, FetchError> {
        let client = http_client().map_err(FetchError::Build)?;
        let url = format!("{BASE_URL}{path_and_query}");
        get_with_retry(|| client.get(&url).header("X-Auth-Token", &self.token))
    }

    fn competitions_param(&self) -> String {
        self.allowed
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn range_query(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Match>, ProviderError> {
        // Fetching without a competitions filter returns every match on the
        // planet; default-deny until the allow-list is configured.
        if self.allowed.is_empty() {
            warn!("no allowed leagues configured, blocking football-data request");
            return Ok(Vec::new());
        }

        let query = format!(
            "/matches?dateFrom={}&dateTo={}&competitions={}",
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            self.competitions_param(),
        );
        let body = self.fetch(&query).map_err(upstream)?;
        let mut matches = parse_matches_json(&body)?;
        // The API is expected to honor the filter; re-check anyway.
        matches.retain(|m| self.allowed.contains(&m.competition.id));
        Ok(matches)
    }
}

fn upstream(err: FetchError) -> ProviderError {
    ProviderError::Upstream(anyhow::Error::new(err))
}

impl FixtureProvider for FootballDataAdapter {
    fn name(&self) -> &'static str {
        Provider::FootballData.as_str()
    }

    fn set_allowed_leagues(&mut self, ids: Vec<i64>) {
        self.allowed = ids;
    }

    fn matches_for_date(&self, date: NaiveDate) -> Result<Vec<Match>, ProviderError> {
        self.range_query(date, date)
    }

    fn matches_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Match>, ProviderError> {
        self.range_query(from, to)
    }

    fn match_details(&self, id: i64) -> Result<MatchDetail, ProviderError> {
        let body = self.fetch(&format!("/matches/{id}")).map_err(|err| match err {
            FetchError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            } => ProviderError::NotFound(id),
            other => upstream(other),
        })?;
        let m = parse_match_json(&body)?;
        if !self.allowed.is_empty() && !self.allowed.contains(&m.competition.id) {
            return Err(ProviderError::NotAllowed(id));
        }
        // Events and statistics are not available on this tier; the detail
        // is the list payload with those left empty.
        Ok(m)
    }

    fn live_matches(&self) -> Result<Vec<Match>, ProviderError> {
        if self.allowed.is_empty() {
            warn!("no allowed leagues configured, blocking football-data live request");
            return Ok(Vec::new());
        }
        let query = format!(
            "/matches?status=LIVE&competitions={}",
            self.competitions_param()
        );
        let body = self.fetch(&query).map_err(upstream)?;
        let mut matches = parse_matches_json(&body)?;
        matches.retain(|m| self.allowed.contains(&m.competition.id) && m.status.is_live());
        Ok(matches)
    }
}

#[derive(Debug, Deserialize)]
struct FdMatchesResponse {
    #[serde(default)]
    matches: Vec<FdMatch>,
}

#[derive(Debug, Deserialize)]
struct FdMatch {
    id: i64,
    #[serde(rename = "utcDate")]
    utc_date: DateTime<Utc>,
    status: String,
    stage: Option<String>,
    group: Option<String>,
    competition: FdCompetition,
    #[serde(rename = "homeTeam")]
    home_team: FdTeam,
    #[serde(rename = "awayTeam")]
    away_team: FdTeam,
    score: FdScore,
}

#[derive(Debug, Deserialize)]
struct FdCompetition {
    id: i64,
    name: String,
    emblem: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FdTeam {
    id: Option<i64>,
    name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    crest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FdScore {
    #[serde(rename = "fullTime", default)]
    full_time: FdFullTime,
}

#[derive(Debug, Deserialize, Default)]
struct FdFullTime {
    home: Option<i64>,
    away: Option<i64>,
}

/// football-data.org native statuses folded into the canonical vocabulary.
pub fn map_status(raw: &str) -> MatchStatus {
    match raw {
        "IN_PLAY" | "LIVE" => MatchStatus::InPlay,
        "PAUSED" => MatchStatus::Paused,
        "FINISHED" | "AWARDED" => MatchStatus::Finished,
        "SCHEDULED" | "TIMED" => MatchStatus::Scheduled,
        "POSTPONED" => MatchStatus::Postponed,
        "SUSPENDED" => MatchStatus::Suspended,
        "CANCELLED" => MatchStatus::Canceled,
        _ => MatchStatus::Scheduled,
    }
}

/// Long official names trimmed to the display forms the rest of the system
/// expects.
fn format_team_name(name: &str, short_name: Option<&str>) -> String {
    const OVERRIDES: [(&str, &str); 16] = [
        ("FC Barcelona", "Barcelona"),
        ("Club Atlético de Madrid", "Atlético de Madrid"),
        ("Bayer 04 Leverkusen", "Bayer Leverkusen"),
        ("FC Bayern München", "Bayern Munich"),
        ("Paris Saint-Germain FC", "PSG"),
        ("Sporting Clube de Portugal", "Sporting CP"),
        ("FC Internazionale Milano", "Inter"),
        ("AC Milan", "Milan"),
        ("SSC Napoli", "Napoli"),
        ("Real Madrid CF", "Real Madrid"),
        ("Real Betis Balompié", "Betis"),
        ("Real Sociedad de Fútbol", "Real Sociedad"),
        ("Athletic Club", "Athletic Bilbao"),
        ("Manchester City FC", "Man City"),
        ("Manchester United FC", "Man United"),
        ("Wolverhampton Wanderers FC", "Wolves"),
    ];

    if let Some((_, display)) = OVERRIDES.iter().find(|(long, _)| *long == name) {
        return (*display).to_string();
    }
    if let Some(short) = short_name {
        if short != name && short.len() > 3 {
            return short.to_string();
        }
    }
    name.trim_start_matches("FC ")
        .trim_end_matches(" FC")
        .to_string()
}

fn map_team(team: FdTeam) -> Team {
    let name = team.name.unwrap_or_default();
    Team {
        id: team.id.unwrap_or_default(),
        name: format_team_name(&name, team.short_name.as_deref()),
        crest: team.crest.unwrap_or_default(),
    }
}

fn map_match(m: FdMatch) -> Match {
    Match {
        id: m.id,
        utc_date: m.utc_date,
        status: map_status(&m.status),
        // Not exposed by the list endpoint on this tier.
        minute: None,
        home_team: map_team(m.home_team),
        away_team: map_team(m.away_team),
        score: Score {
            full_time: FullTime {
                home: m.score.full_time.home,
                away: m.score.full_time.away,
            },
        },
        competition: Competition {
            id: m.competition.id,
            name: m.competition.name,
            emblem: m.competition.emblem,
        },
        stage: m.stage.unwrap_or_default(),
        group: m.group,
        provider: Provider::FootballData,
        venue: None,
        statistics: Vec::new(),
        events: Vec::new(),
    }
}

pub fn parse_matches_json(raw: &str) -> Result<Vec<Match>, ProviderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let response: FdMatchesResponse = serde_json::from_str(trimmed)?;
    Ok(response.matches.into_iter().map(map_match).collect())
}

pub fn parse_match_json(raw: &str) -> Result<Match, ProviderError> {
    let m: FdMatch = serde_json::from_str(raw.trim())?;
    Ok(map_match(m))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which upstream a canonical record originated from. The id namespace of a
/// match is scoped to this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    FootballData,
    ApiFootball,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::FootballData => "football-data",
            Provider::ApiFootball => "api-football",
        }
    }

    pub fn from_str(raw: &str) -> Option<Provider> {
        match raw {
            "football-data" => Some(Provider::FootballData),
            "api-football" => Some(Provider::ApiFootball),
            _ => None,
        }
    }
}

/// Canonical match status. Adapters map their native vocabularies into this
/// set before a value reaches the engine or the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    InPlay,
    Paused,
    Finished,
    Postponed,
    Suspended,
    Canceled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "SCHEDULED",
            MatchStatus::InPlay => "IN_PLAY",
            MatchStatus::Paused => "PAUSED",
            MatchStatus::Finished => "FINISHED",
            MatchStatus::Postponed => "POSTPONED",
            MatchStatus::Suspended => "SUSPENDED",
            MatchStatus::Canceled => "CANCELED",
        }
    }

    pub fn from_str(raw: &str) -> Option<MatchStatus> {
        match raw {
            "SCHEDULED" => Some(MatchStatus::Scheduled),
            "IN_PLAY" => Some(MatchStatus::InPlay),
            "PAUSED" => Some(MatchStatus::Paused),
            "FINISHED" => Some(MatchStatus::Finished),
            "POSTPONED" => Some(MatchStatus::Postponed),
            "SUSPENDED" => Some(MatchStatus::Suspended),
            "CANCELED" => Some(MatchStatus::Canceled),
            _ => None,
        }
    }

    /// A fixture currently in progress (including half-time and other
    /// official pauses).
    pub fn is_live(&self) -> bool {
        matches!(self, MatchStatus::InPlay | MatchStatus::Paused)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub crest: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullTime {
    pub home: Option<i64>,
    pub away: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub full_time: FullTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub id: i64,
    pub name: String,
    pub emblem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub kind: String,
    pub minute: u32,
    pub team: String,
    pub player: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatistic {
    pub kind: String,
    pub home: String,
    pub away: String,
}

/// Canonical fixture record, one per provider-scoped id. Events are owned by
/// the match and fully replaced on every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: i64,
    pub utc_date: DateTime<Utc>,
    pub status: MatchStatus,
    pub minute: Option<u32>,
    pub home_team: Team,
    pub away_team: Team,
    pub score: Score,
    pub competition: Competition,
    pub stage: String,
    pub group: Option<String>,
    pub provider: Provider,
    pub venue: Option<String>,
    pub statistics: Vec<MatchStatistic>,
    pub events: Vec<MatchEvent>,
}

/// A match guaranteed to carry its events and statistics (detail endpoints
/// always resolve them, list endpoints may not).
pub type MatchDetail = Match;

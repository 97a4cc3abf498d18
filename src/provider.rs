use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{Match, MatchDetail};

/// Failure signal for upstream calls. Adapters never substitute cached or
/// partial data; the caller decides how to degrade.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    Configuration(&'static str),
    #[error("upstream unavailable: {0}")]
    Upstream(anyhow::Error),
    #[error("match {0} not found")]
    NotFound(i64),
    #[error("match {0} is not in an allowed competition")]
    NotAllowed(i64),
    #[error("malformed upstream payload")]
    Decode(#[from] serde_json::Error),
}

/// One upstream fixture source, normalized to the canonical model. Every
/// method filters its result to the currently configured allow-list before
/// returning; an unconfigured (empty) allow-list yields empty results rather
/// than unfiltered upstream data.
pub trait FixtureProvider {
    fn name(&self) -> &'static str;

    /// Replaces the adapter's allow-list with the given provider-external
    /// competition ids.
    fn set_allowed_leagues(&mut self, ids: Vec<i64>);

    fn matches_for_date(&self, date: NaiveDate) -> Result<Vec<Match>, ProviderError>;

    fn matches_in_range(&self, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<Match>, ProviderError>;

    fn match_details(&self, id: i64) -> Result<MatchDetail, ProviderError>;

    fn live_matches(&self) -> Result<Vec<Match>, ProviderError>;
}

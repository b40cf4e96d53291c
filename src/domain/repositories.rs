//! Repository Pattern Abstractions
//!
//! The forecasting core only ever reads raw observations; ingestion and
//! scraping live outside this crate. Implementations are provided for
//! SQLite (scraped history) and CSV dataset files.

use crate::domain::series::RawObservation;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Read-only access to raw per-commodity price observations.
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Fetch the full raw series for a commodity, oldest first.
    async fn fetch_series(&self, commodity_key: &str) -> Result<Vec<RawObservation>>;

    /// Fetch the most recent `limit` observations with parsed dates,
    /// oldest first. Used to seed the forecaster with actual prices.
    async fn recent_observations(
        &self,
        commodity_key: &str,
        limit: usize,
    ) -> Result<Vec<(NaiveDate, f64)>>;

    /// List the commodity keys this repository has data for.
    async fn list_commodities(&self) -> Result<Vec<String>>;
}

//! Upstream market-data abstractions

use crate::core::instrument::{InstrumentSource, PriceObservation};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Whether this provider knows how to fetch `source`.
    fn supports(&self, source: &InstrumentSource) -> bool;

    /// Daily observations for `source` between `start` and `end`.
    async fn fetch_history(
        &self,
        source: &InstrumentSource,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>>;
}

//! Price series persistence abstraction

use crate::core::instrument::{Instrument, PriceObservation};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn instrument_exists(&self, id: &str) -> Result<bool>;

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<()>;

    /// Observations with `start <= timestamp <= end`, ascending by time.
    async fn get_observations(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>>;

    /// Inserts observations whose timestamp is not stored yet and returns how
    /// many were added. Existing timestamps are left untouched.
    async fn upsert_observations(&self, id: &str, observations: &[PriceObservation])
    -> Result<usize>;
}

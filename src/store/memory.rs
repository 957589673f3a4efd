use crate::core::instrument::{Instrument, PriceObservation};
use crate::core::store::PriceStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Inner {
    instruments: HashMap<String, Instrument>,
    prices: HashMap<String, BTreeMap<DateTime<Utc>, PriceObservation>>,
}

/// In-memory price store, used for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryPriceStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn instrument_exists(&self, id: &str) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.instruments.contains_key(id))
    }

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<()> {
        let mut inner = self.inner.lock().await;
        debug!("Store PUT instrument {}", instrument.id);
        inner
            .instruments
            .insert(instrument.id.clone(), instrument.clone());
        Ok(())
    }

    async fn get_observations(
        &self,
        id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceObservation>> {
        if start > end {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock().await;
        let observations: Vec<PriceObservation> = inner
            .prices
            .get(id)
            .map(|series| series.range(start..=end).map(|(_, o)| *o).collect())
            .unwrap_or_default();
        debug!("Store GET {} -> {} observations", id, observations.len());
        Ok(observations)
    }

    async fn upsert_observations(
        &self,
        id: &str,
        observations: &[PriceObservation],
    ) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let series = inner.prices.entry(id.to_string()).or_default();
        let mut inserted = 0;
        for observation in observations {
            if !series.contains_key(&observation.timestamp) {
                series.insert(observation.timestamp, *observation);
                inserted += 1;
            }
        }
        debug!("Store PUT {} -> {} new observations", id, inserted);
        Ok(inserted)
    }
}

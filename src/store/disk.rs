use crate::core::instrument::{Instrument, PriceObservation};
use crate::core::store::PriceStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::debug;

/// Price store persisted in a fjall keyspace.
///
/// Prices live in one partition keyed by `instrument id, 0x00, timestamp`,
/// with the timestamp encoded so byte order matches time order.
#[derive(Clone)]
pub struct FjallPriceStore {
    keyspace: Keyspace,
    instruments: PartitionHandle,
    prices: PartitionHandle,
}

fn encode_timestamp(timestamp: DateTime<Utc>) -> [u8; 8] {
    ((timestamp.timestamp_millis() as u64) ^ (1 << 63)).to_be_bytes()
}

fn price_key(id: &str, timestamp: DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(id.len() + 9);
    key.extend_from_slice(id.as_bytes());
    key.push(0);
    key.extend_from_slice(&encode_timestamp(timestamp));
    key
}

impl FjallPriceStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open price store at {}", path.display()))?;
        let instruments =
            keyspace.open_partition("instruments", PartitionCreateOptions::default())?;
        let prices = keyspace.open_partition("prices", PartitionCreateOptions::default())?;
        debug!("Opened price store at {}", path.display());

        Ok(Self {
            keyspace,
            instruments,
            prices,
        })
    }
}

#[async_trait]
impl PriceStore for FjallPriceStore {
    async fn instrument_exists(&self, id: &str) -> Result<bool> {
        Ok(self.instruments.contains_key(id)?)
    }

    async fn upsert_instrument(&self, instrument: &Instrument) -> Result<()> {
        self.instruments
            .insert(instrument.id.as_str(), serde_json::to_vec(instrument)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Store PUT instrument {}", instrument.id);
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

        let mut observations = Vec::new();
        for item in self.prices.range(price_key(id, start)..=price_key(id, end)) {
            let (_, value) = item?;
            let observation: PriceObservation = serde_json::from_slice(&value)
                .with_context(|| format!("Corrupt price record for {id}"))?;
            observations.push(observation);
        }
        debug!("Store GET {} -> {} observations", id, observations.len());
        Ok(observations)
    }

    async fn upsert_observations(
        &self,
        id: &str,
        observations: &[PriceObservation],
    ) -> Result<usize> {
        let mut inserted = 0;
        for observation in observations {
            let key = price_key(id, observation.timestamp);
            if self.prices.contains_key(&key)? {
                continue;
            }
            self.prices.insert(key, serde_json::to_vec(observation)?)?;
            inserted += 1;
        }
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Store PUT {} -> {} new observations", id, inserted);
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instrument::InstrumentKind;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_timestamp_encoding_preserves_order() {
        let before_epoch = Utc.with_ymd_and_hms(1960, 1, 1, 0, 0, 0).unwrap();
        assert!(encode_timestamp(before_epoch) < encode_timestamp(day(0)));
        assert!(encode_timestamp(day(0)) < encode_timestamp(day(1)));
    }

    #[tokio::test]
    async fn test_fjall_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FjallPriceStore::open(dir.path()).unwrap();

        store
            .upsert_instrument(&Instrument::new("USD", "USD/BRL", InstrumentKind::Currency))
            .await
            .unwrap();
        assert!(store.instrument_exists("USD").await.unwrap());
        assert!(!store.instrument_exists("EUR").await.unwrap());

        let batch: Vec<PriceObservation> = (0..5)
            .map(|d| PriceObservation::new(day(d), 5.0 + d as f64 / 10.0))
            .collect();
        assert_eq!(store.upsert_observations("USD", &batch).await.unwrap(), 5);
        assert_eq!(store.upsert_observations("USD", &batch).await.unwrap(), 0);

        let stored = store.get_observations("USD", day(1), day(3)).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].timestamp, day(1));
        assert_eq!(stored[2].timestamp, day(3));
    }

    #[tokio::test]
    async fn test_prefix_ids_do_not_overlap() {
        let dir = tempdir().unwrap();
        let store = FjallPriceStore::open(dir.path()).unwrap();

        store
            .upsert_observations("B5P2", &[PriceObservation::new(day(1), 1.0)])
            .await
            .unwrap();
        store
            .upsert_observations("B5P211", &[PriceObservation::new(day(1), 2.0)])
            .await
            .unwrap();

        let stored = store.get_observations("B5P2", day(0), day(2)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price, 1.0);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FjallPriceStore::open(dir.path()).unwrap();
            store
                .upsert_observations("CDI", &[PriceObservation::new(day(0), 0.05)])
                .await
                .unwrap();
        }

        let store = FjallPriceStore::open(dir.path()).unwrap();
        let stored = store.get_observations("CDI", day(0), day(0)).await.unwrap();
        assert_eq!(stored.len(), 1);
    }
}

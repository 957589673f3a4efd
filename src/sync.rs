//! Pulls daily history from upstream providers into the price store.

use crate::core::history::HistoryProvider;
use crate::core::instrument::{Instrument, normalize_observations};
use crate::core::store::PriceStore;
use crate::core::window::ReturnWindow;
use crate::providers::provider_for;
use anyhow::{Result, anyhow};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of syncing one instrument.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub id: String,
    pub fetched: usize,
    pub inserted: usize,
    pub error: Option<String>,
}

async fn sync_instrument(
    instrument: &Instrument,
    providers: &[Arc<dyn HistoryProvider>],
    store: &dyn PriceStore,
    window: &ReturnWindow,
) -> Result<(usize, usize)> {
    let source = instrument
        .source
        .as_ref()
        .ok_or_else(|| anyhow!("No source configured for {}", instrument.id))?;
    let provider = provider_for(providers, source)
        .ok_or_else(|| anyhow!("No provider enabled for {:?}", source))?;

    store.upsert_instrument(instrument).await?;
    let observations = provider
        .fetch_history(source, window.start, window.end)
        .await?;
    let observations = normalize_observations(&observations);
    let inserted = store
        .upsert_observations(&instrument.id, &observations)
        .await?;
    Ok((observations.len(), inserted))
}

/// Syncs every instrument concurrently. `on_done` is called once per
/// instrument as it finishes.
///
/// A failing instrument is reported in its own [`SyncReport`] and never
/// stops the others.
pub async fn sync_instruments(
    instruments: &[Instrument],
    providers: &[Arc<dyn HistoryProvider>],
    store: &dyn PriceStore,
    window: ReturnWindow,
    on_done: &(dyn Fn(&str) + Sync),
) -> Vec<SyncReport> {
    info!(
        instruments = instruments.len(),
        start = %window.start,
        end = %window.end,
        "Syncing price history"
    );

    let window = &window;
    let futures = instruments.iter().map(|instrument| async move {
        let result = sync_instrument(instrument, providers, store, window).await;
        on_done(&instrument.id);
        match result {
            Ok((fetched, inserted)) => {
                info!("Synced {}: {} fetched, {} new", instrument.id, fetched, inserted);
                SyncReport {
                    id: instrument.id.clone(),
                    fetched,
                    inserted,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Sync failed for {}: {:#}", instrument.id, e);
                SyncReport {
                    id: instrument.id.clone(),
                    fetched: 0,
                    inserted: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    });

    join_all(futures).await
}

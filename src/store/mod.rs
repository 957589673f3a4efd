pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::PriceStore;
use anyhow::Result;
use disk::FjallPriceStore;
use std::sync::Arc;

/// Opens the on-disk price store under the configured data directory.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn PriceStore>> {
    let path = config.default_data_path()?.join("prices");
    Ok(Arc::new(FjallPriceStore::open(&path)?))
}

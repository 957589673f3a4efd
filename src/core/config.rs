use crate::core::align::AlignOptions;
use crate::core::instrument::{Instrument, InstrumentKind};
use crate::core::portfolio::PortfolioDefinition;
use crate::core::returns::DEFAULT_SANITY_BOUND;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BcbProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub bcb: Option<BcbProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
                token: None,
            }),
            bcb: Some(BcbProviderConfig {
                base_url: "https://api.bcb.gov.br".to_string(),
            }),
        }
    }
}

fn default_sanity_bound() -> f64 {
    DEFAULT_SANITY_BOUND
}

fn default_max_gap_days() -> i64 {
    7
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReturnsConfig {
    /// Absolute return, in percent, beyond which a value is discarded.
    #[serde(default = "default_sanity_bound")]
    pub sanity_bound: f64,
    #[serde(default = "default_max_gap_days")]
    pub max_gap_days: i64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ReturnsConfig {
    fn default() -> Self {
        ReturnsConfig {
            sanity_bound: default_sanity_bound(),
            max_gap_days: default_max_gap_days(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ReturnsConfig {
    pub fn align_options(&self) -> AlignOptions {
        AlignOptions {
            max_gap: chrono::Duration::try_days(self.max_gap_days)
                .unwrap_or(chrono::Duration::MAX),
            sanity_bound: self.sanity_bound,
        }
    }

    /// Rejects values that would silently discard every return or point.
    pub fn validate(&self) -> Result<()> {
        if !(self.sanity_bound.is_finite() && self.sanity_bound > 0.0) {
            bail!(
                "returns.sanity_bound must be a positive number, got {}",
                self.sanity_bound
            );
        }
        if self.max_gap_days < 0 || chrono::Duration::try_days(self.max_gap_days).is_none() {
            bail!(
                "returns.max_gap_days must be between 0 and {} days, got {}",
                chrono::Duration::MAX.num_days(),
                self.max_gap_days
            );
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub instruments: Vec<Instrument>,
    pub portfolio: PortfolioDefinition,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub returns: ReturnsConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "xbench", "xbench")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "xbench", "xbench")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Checks instrument ids are unique, the portfolio only references
    /// configured instruments with positive weights and the `returns`
    /// settings are usable.
    pub fn validate(&self) -> Result<()> {
        self.returns.validate()?;

        let mut ids = HashSet::new();
        for instrument in &self.instruments {
            if instrument.kind == InstrumentKind::Portfolio {
                bail!("Instrument {} cannot have the portfolio kind", instrument.id);
            }
            if !ids.insert(instrument.id.as_str()) {
                bail!("Duplicate instrument id: {}", instrument.id);
            }
        }

        for component in &self.portfolio.components {
            if !ids.contains(component.instrument.as_str()) {
                bail!(
                    "Portfolio component {} is not a configured instrument",
                    component.instrument
                );
            }
            if !(component.weight > 0.0) {
                bail!(
                    "Portfolio weight for {} must be positive, got {}",
                    component.instrument,
                    component.weight
                );
            }
        }

        let total = self.portfolio.total_weight();
        if (total - 1.0).abs() > 1e-6 {
            warn!("Portfolio weights sum to {total}, not 1.0");
        }
        Ok(())
    }
}

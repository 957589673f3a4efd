//! Instrument and price observation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier under which the synthetic weighted portfolio is reported.
pub const PORTFOLIO_ID: &str = "PORTFOLIO";

/// Determines which return rule applies to an instrument's series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Equity or bond ETF; `price` is a price level.
    PriceAsset,
    /// Floating reference rate; `price` is that day's percentage rate.
    Rate,
    /// FX pair; `price` is a price level.
    Currency,
    /// Synthetic weighted composite, never persisted.
    Portfolio,
}

impl InstrumentKind {
    pub fn is_rate(&self) -> bool {
        matches!(self, InstrumentKind::Rate)
    }
}

impl Display for InstrumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InstrumentKind::PriceAsset => "ETF",
                InstrumentKind::Rate => "Rate",
                InstrumentKind::Currency => "Currency",
                InstrumentKind::Portfolio => "Portfolio",
            }
        )
    }
}

/// Where the sync job pulls an instrument's history from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum InstrumentSource {
    /// Yahoo Finance chart API, e.g. `BOVA11.SA` or `BRL=X`.
    Yahoo { symbol: String },
    /// Brazilian Central Bank SGS time series, e.g. `12` for the daily CDI.
    Bcb { series: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub name: String,
    pub kind: InstrumentKind,
    pub source: Option<InstrumentSource>,
}

impl Instrument {
    pub fn new(id: &str, name: &str, kind: InstrumentKind) -> Self {
        Instrument {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            source: None,
        }
    }

    pub fn with_source(mut self, source: InstrumentSource) -> Self {
        self.source = Some(source);
        self
    }
}

/// One daily data point of an instrument.
///
/// For [`InstrumentKind::Rate`] instruments `price` is the day's percentage
/// rate (`0.05` means 0.05%), not a price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: Option<u64>,
}

impl PriceObservation {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        PriceObservation {
            timestamp,
            price,
            volume: None,
        }
    }
}

/// Sorts observations by time and drops repeated timestamps, keeping the first.
pub fn normalize_observations(observations: &[PriceObservation]) -> Vec<PriceObservation> {
    let mut sorted = observations.to_vec();
    // Stable sort keeps the first of equal timestamps in front for dedup.
    sorted.sort_by_key(|o| o.timestamp);
    sorted.dedup_by_key(|o| o.timestamp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_normalize_sorts_and_dedups() {
        let day = |d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let observations = vec![
            PriceObservation::new(day(3), 30.0),
            PriceObservation::new(day(1), 10.0),
            PriceObservation::new(day(3), 99.0),
            PriceObservation::new(day(2), 20.0),
        ];

        let normalized = normalize_observations(&observations);
        let prices: Vec<f64> = normalized.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_instrument_source_yaml() {
        let yaml = r#"
id: CDI
name: CDI
kind: rate
source:
  provider: bcb
  series: 12
"#;
        let instrument: Instrument = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(instrument.kind, InstrumentKind::Rate);
        assert_eq!(instrument.source, Some(InstrumentSource::Bcb { series: 12 }));
    }
}

//! Error taxonomy for return calculations

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReturnError {
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("No price data in the requested window")]
    NoData,

    #[error("Only one observation ({price} at {timestamp}); at least two are needed")]
    InsufficientData {
        timestamp: DateTime<Utc>,
        price: f64,
    },

    #[error("Invalid return value: {value} (bound {bound}%)")]
    InvalidReturnValue { value: f64, bound: f64 },

    #[error("All portfolio components are missing")]
    AllComponentsMissing,

    #[error("Invalid window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("At least one instrument must be requested")]
    EmptyRequest,

    #[error("Failed to fetch prices for {id}: {reason}")]
    FetchFailed { id: String, reason: String },

    #[error("Timed out fetching prices for {0}")]
    FetchTimeout(String),
}

pub type Result<T> = std::result::Result<T, ReturnError>;

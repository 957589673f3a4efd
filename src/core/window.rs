//! Date windows over which returns are computed

use crate::core::error::ReturnError;
use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Period {
    OneYear,
    ThreeYears,
    FiveYears,
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Period::OneYear => "1Y",
                Period::ThreeYears => "3Y",
                Period::FiveYears => "5Y",
            }
        )
    }
}

impl Period {
    pub fn years(&self) -> u32 {
        match self {
            Period::OneYear => 1,
            Period::ThreeYears => 3,
            Period::FiveYears => 5,
        }
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1Y" => Ok(Period::OneYear),
            "3Y" => Ok(Period::ThreeYears),
            "5Y" => Ok(Period::FiveYears),
            _ => Err(anyhow::anyhow!("Invalid period: {} (expected 1Y, 3Y or 5Y)", s)),
        }
    }
}

/// Inclusive time range for a return query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReturnWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ReturnError> {
        if start > end {
            return Err(ReturnError::InvalidWindow { start, end });
        }
        Ok(ReturnWindow { start, end })
    }

    /// Window ending at `now` and starting N calendar years earlier.
    pub fn from_period(period: Period, now: DateTime<Utc>) -> Self {
        let start = now
            .checked_sub_months(Months::new(12 * period.years()))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        ReturnWindow { start, end: now }
    }

    /// Window covering whole days, from the start of `start` to the end of `end`.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, ReturnError> {
        let start = start.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = end
            .and_hms_milli_opt(23, 59, 59, 999)
            .map(|dt| dt.and_utc())
            .unwrap_or(start);
        Self::new(start, end)
    }
}

pub mod chart;
pub mod returns;
pub mod setup;
pub mod sync;
pub mod ui;

use crate::core::window::{Period, ReturnWindow};
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};

/// Options shared by the `returns` and `chart` commands.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    pub period: Option<Period>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Instrument ids to show; empty means every configured instrument.
    pub instruments: Vec<String>,
    pub no_portfolio: bool,
    pub json: bool,
}

impl QueryArgs {
    /// Explicit dates win over a period; with neither, the last year is used.
    pub fn window(&self, now: DateTime<Utc>) -> Result<ReturnWindow> {
        match (self.start, self.end) {
            (Some(start), end) => {
                let end = end.unwrap_or_else(|| now.date_naive());
                Ok(ReturnWindow::from_dates(start, end)?)
            }
            (None, Some(_)) => bail!("--end requires --start"),
            (None, None) => Ok(ReturnWindow::from_period(
                self.period.unwrap_or(Period::OneYear),
                now,
            )),
        }
    }

    pub fn ids(&self, all: Vec<String>) -> Vec<String> {
        if self.instruments.is_empty() {
            all
        } else {
            self.instruments.clone()
        }
    }
}

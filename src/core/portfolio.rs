//! Weighted composite returns over a fixed set of benchmark components.
//!
//! Component returns are percentage points and weights are fractions, so the
//! weighted sum is already in percentage points. Partial coverage is
//! normalized by the covered weight and stays in percentage points.

use crate::core::align::AlignedPoint;
use crate::core::error::ReturnError;
use crate::core::instrument::PORTFOLIO_ID;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioComponent {
    pub instrument: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDefinition {
    pub name: String,
    pub components: Vec<PortfolioComponent>,
}

impl PortfolioDefinition {
    pub fn total_weight(&self) -> f64 {
        self.components.iter().map(|c| c.weight).sum()
    }

    pub fn instrument_ids(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(|c| c.instrument.as_str())
    }
}

/// Outcome of a table-mode portfolio computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PortfolioReturn {
    /// Every component had a return.
    Complete { value: f64 },
    /// Some components were missing; `value` is the weighted average of the
    /// available ones and `coverage` is the weight they represent.
    Partial {
        value: f64,
        warning: String,
        coverage: f64,
        missing: Vec<String>,
    },
    Failed {
        #[serde(serialize_with = "serialize_error")]
        error: ReturnError,
    },
}

fn serialize_error<S: serde::Serializer>(error: &ReturnError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&error.to_string())
}

impl PortfolioReturn {
    pub fn value(&self) -> Option<f64> {
        match self {
            PortfolioReturn::Complete { value } | PortfolioReturn::Partial { value, .. } => {
                Some(*value)
            }
            PortfolioReturn::Failed { .. } => None,
        }
    }
}

/// Weighted portfolio return from per-instrument window returns.
///
/// Instruments absent from `returns`, or mapped to `None`, count as missing.
pub fn portfolio_return(
    definition: &PortfolioDefinition,
    returns: &HashMap<String, Option<f64>>,
) -> PortfolioReturn {
    let mut accumulator = 0.0;
    let mut covered = 0.0;
    let mut missing = Vec::new();

    for component in &definition.components {
        match returns.get(&component.instrument).copied().flatten() {
            Some(value) => {
                accumulator += component.weight * value;
                covered += component.weight;
            }
            None => missing.push(component.instrument.clone()),
        }
    }

    if missing.is_empty() {
        debug!(value = accumulator, "Portfolio return with full coverage");
        return PortfolioReturn::Complete { value: accumulator };
    }

    if covered <= 0.0 {
        warn!("No portfolio component has a return");
        return PortfolioReturn::Failed {
            error: ReturnError::AllComponentsMissing,
        };
    }

    let warning = format!(
        "Missing components: {}; covering {:.0}% of the portfolio weight",
        missing.join(", "),
        covered * 100.0
    );
    warn!("{warning}");
    PortfolioReturn::Partial {
        value: accumulator / covered,
        warning,
        coverage: covered,
        missing,
    }
}

/// Portfolio value at one aligned point, only when every component is present.
pub fn point_portfolio_value(definition: &PortfolioDefinition, point: &AlignedPoint) -> Option<f64> {
    definition
        .components
        .iter()
        .map(|c| point.values.get(&c.instrument).map(|v| v * c.weight))
        .sum::<Option<f64>>()
}

/// Adds the portfolio value under [`PORTFOLIO_ID`] to each point with full
/// component coverage.
pub fn apply_portfolio(points: &mut [AlignedPoint], definition: &PortfolioDefinition) {
    let mut filled = 0;
    for point in points.iter_mut() {
        if let Some(value) = point_portfolio_value(definition, point) {
            point.values.insert(PORTFOLIO_ID.to_string(), value);
            filled += 1;
        }
    }
    debug!(filled, total = points.len(), "Applied portfolio to aligned series");
}

//! Accumulated-return calculations over a single instrument's price series.
//!
//! Price-like instruments ([`InstrumentKind::PriceAsset`],
//! [`InstrumentKind::Currency`]) compound the ratio between consecutive
//! prices. [`InstrumentKind::Rate`] instruments already carry daily percentage
//! rates and compound every rate in the window, including the first.
//!
//! All values returned here are percentages (`-1.0` means -1%).

use crate::core::error::ReturnError;
use crate::core::instrument::{InstrumentKind, PriceObservation, normalize_observations};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

/// Absolute return, in percent, above which a value is considered bad data.
pub const DEFAULT_SANITY_BOUND: f64 = 300.0;

/// How daily steps are combined into an accumulated return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccumulationMethod {
    /// `prod(1 + r_i) - 1`. Used everywhere in the engine.
    #[default]
    Compounded,
    /// `sum(r_i)`. Only an approximation for short windows.
    SimpleSum,
}

/// Accumulated return of an instrument at one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    /// `None` when the value failed the numeric sanity check.
    pub value: Option<f64>,
}

/// Return of an instrument over a window, with the endpoints it spans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReturn {
    pub value: Option<f64>,
    pub first_date: DateTime<Utc>,
    pub last_date: DateTime<Utc>,
    pub first_price: f64,
    pub last_price: f64,
}

/// Rejects non-finite values and values beyond `bound` percent.
pub fn check_return(value: f64, bound: f64) -> Result<f64, ReturnError> {
    if !value.is_finite() || value.abs() > bound {
        return Err(ReturnError::InvalidReturnValue { value, bound });
    }
    Ok(value)
}

/// Like [`check_return`] but degrades invalid values to `None`.
///
/// Each discarded value is logged at debug level; callers summarize.
pub fn validate_return(value: f64, bound: f64) -> Option<f64> {
    match check_return(value, bound) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Abnormal return value discarded: {e}");
            None
        }
    }
}

/// Growth factor contributed by a single observation.
///
/// For rates this is the day's own rate; for prices it is the ratio to the
/// previous price (and 1.0 for the first observation).
fn step_factor(kind: InstrumentKind, previous: Option<f64>, current: f64) -> f64 {
    if kind.is_rate() {
        return 1.0 + current / 100.0;
    }
    match previous {
        Some(prev) => current / prev,
        None => 1.0,
    }
}

/// Raw (unvalidated) accumulated percentages for every observation.
///
/// `observations` must already be sorted and deduplicated.
fn accumulate(
    kind: InstrumentKind,
    observations: &[PriceObservation],
    method: AccumulationMethod,
) -> Vec<f64> {
    let mut values = Vec::with_capacity(observations.len());
    let mut product = 1.0;
    let mut sum = 0.0;
    let mut previous = None;

    for observation in observations {
        let factor = step_factor(kind, previous, observation.price);
        previous = Some(observation.price);

        let value = match method {
            AccumulationMethod::Compounded => {
                product *= factor;
                (product - 1.0) * 100.0
            }
            AccumulationMethod::SimpleSum => {
                sum += (factor - 1.0) * 100.0;
                sum
            }
        };
        values.push(value);
    }
    values
}

/// Fails with [`ReturnError::NoData`] or [`ReturnError::InsufficientData`]
/// unless there are at least two observations.
///
/// `observations` must already be deduplicated.
pub fn ensure_enough(observations: &[PriceObservation]) -> Result<(), ReturnError> {
    match observations {
        [] => Err(ReturnError::NoData),
        [only] => Err(ReturnError::InsufficientData {
            timestamp: only.timestamp,
            price: only.price,
        }),
        _ => Ok(()),
    }
}

/// Accumulated return through every observation of the series, starting at
/// the first one.
///
/// The first point is the anchor: 0% for price-like instruments and the
/// first day's rate for rate instruments.
pub fn accumulated_series(
    kind: InstrumentKind,
    observations: &[PriceObservation],
    sanity_bound: f64,
) -> Result<Vec<ReturnPoint>, ReturnError> {
    let observations = normalize_observations(observations);
    ensure_enough(&observations)?;

    let values = accumulate(kind, &observations, AccumulationMethod::Compounded);
    let (values, discarded) = discard_invalid(&values, sanity_bound);
    if discarded > 0 {
        warn!(
            ?kind,
            discarded,
            points = values.len(),
            "Abnormal accumulated returns discarded from series"
        );
    }
    Ok(observations
        .iter()
        .zip(values)
        .map(|(o, value)| ReturnPoint {
            timestamp: o.timestamp,
            value,
        })
        .collect())
}

/// Validates every value, returning the checked values and how many failed.
fn discard_invalid(values: &[f64], bound: f64) -> (Vec<Option<f64>>, usize) {
    let checked: Vec<Option<f64>> = values.iter().map(|v| validate_return(*v, bound)).collect();
    let discarded = checked.iter().filter(|v| v.is_none()).count();
    (checked, discarded)
}

/// Accumulated return at every observation after the first.
pub fn daily_return_series(
    kind: InstrumentKind,
    observations: &[PriceObservation],
    sanity_bound: f64,
) -> Result<Vec<ReturnPoint>, ReturnError> {
    let mut series = accumulated_series(kind, observations, sanity_bound)?;
    series.remove(0);
    Ok(series)
}

/// Accumulated return from the first to the last observation using `method`.
///
/// The value is not sanity-checked; see [`window_return`] for the checked
/// record.
pub fn accumulated_return(
    kind: InstrumentKind,
    observations: &[PriceObservation],
    method: AccumulationMethod,
) -> Result<f64, ReturnError> {
    let observations = normalize_observations(observations);
    ensure_enough(&observations)?;
    let values = accumulate(kind, &observations, method);
    values.last().copied().ok_or(ReturnError::NoData)
}

/// Compounded return over the whole series, with its endpoints.
pub fn window_return(
    kind: InstrumentKind,
    observations: &[PriceObservation],
    sanity_bound: f64,
) -> Result<WindowReturn, ReturnError> {
    let observations = normalize_observations(observations);
    ensure_enough(&observations)?;

    let (first, last) = match (observations.first(), observations.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(ReturnError::NoData),
    };
    let raw = accumulated_return(kind, &observations, AccumulationMethod::Compounded)?;
    debug!(
        ?kind,
        points = observations.len(),
        raw,
        "Computed window return"
    );

    let value = validate_return(raw, sanity_bound);
    if value.is_none() {
        warn!(?kind, raw, "Abnormal window return discarded");
    }

    Ok(WindowReturn {
        value,
        first_date: first.timestamp,
        last_date: last.timestamp,
        first_price: first.price,
        last_price: last.price,
    })
}

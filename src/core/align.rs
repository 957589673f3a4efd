//! Aligns several instruments' accumulated returns onto one date axis.

use crate::core::instrument::{InstrumentKind, PriceObservation, normalize_observations};
use crate::core::returns::{DEFAULT_SANITY_BOUND, ReturnPoint, accumulated_series};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Raw input for one instrument.
#[derive(Debug, Clone)]
pub struct SeriesInput {
    pub id: String,
    pub kind: InstrumentKind,
    pub observations: Vec<PriceObservation>,
}

impl SeriesInput {
    pub fn new(id: &str, kind: InstrumentKind, observations: Vec<PriceObservation>) -> Self {
        SeriesInput {
            id: id.to_string(),
            kind,
            observations,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlignOptions {
    /// Farthest an observation may be from an axis point and still match it.
    pub max_gap: Duration,
    pub sanity_bound: f64,
}

impl Default for AlignOptions {
    fn default() -> Self {
        AlignOptions {
            max_gap: Duration::days(7),
            sanity_bound: DEFAULT_SANITY_BOUND,
        }
    }
}

/// One row of the unified axis: accumulated return per instrument id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedPoint {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub values: BTreeMap<String, f64>,
}

impl AlignedPoint {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        AlignedPoint {
            label: timestamp.format("%b %y").to_string(),
            timestamp,
            values: BTreeMap::new(),
        }
    }
}

/// Index of the point closest to `target`, ties resolved to the lower index.
///
/// `points` must be sorted by timestamp.
pub fn nearest_index(points: &[ReturnPoint], target: DateTime<Utc>) -> Option<usize> {
    let after = points.partition_point(|p| p.timestamp < target);
    let distance = |i: usize| (points[i].timestamp - target).abs();

    match (after.checked_sub(1), (after < points.len()).then_some(after)) {
        (Some(before), Some(after)) => {
            if distance(after) < distance(before) {
                Some(after)
            } else {
                Some(before)
            }
        }
        (Some(before), None) => Some(before),
        (None, Some(after)) => Some(after),
        (None, None) => None,
    }
}

/// Builds the unified accumulated-return series for `inputs`.
///
/// Every instrument is trimmed to the latest first-observation date among
/// them, so all series share the same anchor. Returns an empty list when no
/// instrument has at least two observations.
pub fn align_series(inputs: &[SeriesInput], options: &AlignOptions) -> Vec<AlignedPoint> {
    let candidates: Vec<(&SeriesInput, Vec<PriceObservation>)> = inputs
        .iter()
        .map(|input| (input, normalize_observations(&input.observations)))
        .filter(|(input, observations)| {
            let enough = observations.len() >= 2;
            if !enough {
                debug!("Excluding {} from alignment: fewer than two observations", input.id);
            }
            enough
        })
        .collect();

    let Some(common_start) = candidates
        .iter()
        .filter_map(|(_, observations)| observations.first().map(|o| o.timestamp))
        .max()
    else {
        return Vec::new();
    };
    debug!(%common_start, instruments = candidates.len(), "Aligning series");

    let mut series: Vec<(&str, Vec<ReturnPoint>)> = Vec::new();
    for (input, observations) in candidates {
        let trimmed: Vec<PriceObservation> = observations
            .into_iter()
            .filter(|o| o.timestamp >= common_start)
            .collect();
        match accumulated_series(input.kind, &trimmed, options.sanity_bound) {
            Ok(points) => series.push((input.id.as_str(), points)),
            Err(e) => debug!("Excluding {} from alignment: {}", input.id, e),
        }
    }

    let axis: BTreeSet<DateTime<Utc>> = series
        .iter()
        .flat_map(|(_, points)| points.iter().map(|p| p.timestamp))
        .collect();

    axis.into_iter()
        .map(|timestamp| {
            let mut point = AlignedPoint::new(timestamp);
            for (id, points) in &series {
                let matched = nearest_index(points, timestamp)
                    .map(|i| points[i])
                    .filter(|p| (p.timestamp - timestamp).abs() <= options.max_gap)
                    .and_then(|p| p.value);
                if let Some(value) = matched {
                    point.values.insert(id.to_string(), value);
                }
            }
            point
        })
        .filter(|point| !point.values.is_empty())
        .collect()
}

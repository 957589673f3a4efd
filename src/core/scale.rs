//! Y-axis domain for displaying an aligned return series.

use crate::core::align::AlignedPoint;
use serde::Serialize;

const TICK_STEPS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisScale {
    pub min: f64,
    pub max: f64,
    pub ticks: Vec<f64>,
}

impl Default for AxisScale {
    fn default() -> Self {
        AxisScale {
            min: -30.0,
            max: 30.0,
            ticks: vec![-30.0, -20.0, -10.0, 0.0, 10.0, 20.0, 30.0],
        }
    }
}

/// Domain padded by a margin and rounded outwards to multiples of ten.
pub fn scale_for_values(values: impl IntoIterator<Item = f64>) -> AxisScale {
    let (low, high) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            None => Some((v, v)),
        })
        .unwrap_or((f64::NAN, f64::NAN));

    if low.is_nan() {
        return AxisScale::default();
    }

    let margin = f64::max(5.0, (high - low) * 0.1);
    let min = ((low - margin) / 10.0).floor() * 10.0;
    let max = ((high + margin) / 10.0).ceil() * 10.0;
    let step = (max - min) / TICK_STEPS as f64;
    let ticks = (0..=TICK_STEPS).map(|i| min + i as f64 * step).collect();

    AxisScale { min, max, ticks }
}

/// Axis covering every value of every point, portfolio included.
pub fn axis_scale(points: &[AlignedPoint]) -> AxisScale {
    scale_for_values(points.iter().flat_map(|p| p.values.values().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_symmetric_small_range() {
        let scale = scale_for_values([-5.0, 5.0]);
        assert_eq!(scale.min, -10.0);
        assert_eq!(scale.max, 10.0);
        assert_eq!(scale.ticks.len(), 7);
        assert_eq!(scale.ticks[0], -10.0);
        assert!((scale.ticks[1] - (-10.0 + 20.0 / 6.0)).abs() < 1e-12);
        assert!((scale.ticks[6] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_wide_range_uses_proportional_margin() {
        // margin = 10% of 200 = 20
        let scale = scale_for_values([-50.0, 150.0]);
        assert_eq!(scale.min, -70.0);
        assert_eq!(scale.max, 170.0);
        assert!((scale.ticks[3] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_uses_default_domain() {
        assert_eq!(scale_for_values([]), AxisScale::default());
        assert_eq!(axis_scale(&[]), AxisScale::default());
        assert_eq!(scale_for_values([f64::NAN]), AxisScale::default());
    }

    #[test]
    fn test_axis_scale_reads_every_instrument() {
        let mut point = AlignedPoint::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        point.values.insert("A".to_string(), 12.0);
        point.values.insert("B".to_string(), -22.0);

        let scale = axis_scale(&[point]);
        // range 34 -> margin 5
        assert_eq!(scale.min, -30.0);
        assert_eq!(scale.max, 20.0);
    }
}

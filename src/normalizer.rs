//! Intensity normalization
//!
//! This module maps raw metric values to visualization intensities:
//! - Min-max scaling to 0-1 with a selectable response curve
//! - Linear color interpolation between a low and a high color
//! - Per-point coloring of a ride series
//!
//! Every function here is pure and never yields NaN or infinite output for
//! finite input.

use crate::types::{Color, MetricKind, Ride, SampleSeries};
use serde::{Deserialize, Serialize};

/// Offset that keeps the logarithmic curve away from `ln(0)`
pub const LOG_EPSILON: f64 = 1e-6;

/// Intensity returned when the input range is degenerate
pub const NEUTRAL_INTENSITY: f64 = 0.0;

/// Response curve applied after min-max scaling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScalingMode {
    Linear,
    Exponential { base: f64 },
    Logarithmic,
    Sigmoid { steepness: f64 },
    CustomRange { low: f64, high: f64 },
}

impl Default for ScalingMode {
    fn default() -> Self {
        ScalingMode::Linear
    }
}

/// Normalizer for converting metric values to display intensities
pub struct IntensityNormalizer;

impl IntensityNormalizer {
    /// Scale `value` within `[min, max]` and apply the curve, result in [0, 1]
    pub fn normalize(value: f64, min: f64, max: f64, mode: ScalingMode) -> f64 {
        let span = max - min;
        if !span.is_finite() || span == 0.0 || !value.is_finite() {
            return NEUTRAL_INTENSITY;
        }

        let n = ((value - min) / span).clamp(0.0, 1.0);
        let curved = match mode {
            ScalingMode::Linear => n,
            ScalingMode::Exponential { base } => n.powf(base),
            // Shifted by ln(ε) so that 0 maps to 0 and 1 maps to 1
            ScalingMode::Logarithmic => {
                ((n + LOG_EPSILON).ln() - LOG_EPSILON.ln()) / ((1.0 + LOG_EPSILON).ln() - LOG_EPSILON.ln())
            }
            ScalingMode::Sigmoid { steepness } => 1.0 / (1.0 + (-steepness * (n - 0.5)).exp()),
            ScalingMode::CustomRange { low, high } => low + n * (high - low),
        };

        if curved.is_finite() {
            curved.clamp(0.0, 1.0)
        } else {
            NEUTRAL_INTENSITY
        }
    }

    /// Per-channel linear interpolation between two colors
    pub fn color_at(proportion: f64, low: Color, high: Color) -> Color {
        let p = if proportion.is_finite() {
            proportion.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let lerp = |a: f64, b: f64| a * (1.0 - p) + b * p;

        Color {
            red: lerp(low.red, high.red),
            green: lerp(low.green, high.green),
            blue: lerp(low.blue, high.blue),
            alpha: lerp(low.alpha, high.alpha),
        }
    }

    /// Intensity of every entry, scaled against the series' own min and max
    pub fn series_intensities(series: &SampleSeries, mode: ScalingMode) -> Vec<f64> {
        let (Some(min), Some(max)) = (series.min(), series.max()) else {
            return Vec::new();
        };
        series
            .values()
            .map(|v| Self::normalize(v, min, max, mode))
            .collect()
    }

    /// Color for every entry of a series
    pub fn series_colors(series: &SampleSeries, low: Color, high: Color, mode: ScalingMode) -> Vec<Color> {
        Self::series_intensities(series, mode)
            .into_iter()
            .map(|p| Self::color_at(p, low, high))
            .collect()
    }
}

/// Colors for the selected metric of a ride, using the metric's color range
pub fn route_colors(ride: &Ride, metric: MetricKind, mode: ScalingMode) -> Vec<Color> {
    let (low, high) = metric.color_range();
    IntensityNormalizer::series_colors(metric.series(ride), low, high, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleEntry;
    use chrono::{Duration, TimeZone, Utc};

    const MODES: [ScalingMode; 6] = [
        ScalingMode::Linear,
        ScalingMode::Exponential { base: 2.0 },
        ScalingMode::Exponential { base: -1.0 },
        ScalingMode::Logarithmic,
        ScalingMode::Sigmoid { steepness: 10.0 },
        ScalingMode::CustomRange { low: 0.2, high: 0.8 },
    ];

    #[test]
    fn test_linear_scaling() {
        assert_eq!(IntensityNormalizer::normalize(15.0, 10.0, 20.0, ScalingMode::Linear), 0.5);
        assert_eq!(IntensityNormalizer::normalize(5.0, 10.0, 20.0, ScalingMode::Linear), 0.0);
        assert_eq!(IntensityNormalizer::normalize(25.0, 10.0, 20.0, ScalingMode::Linear), 1.0);
    }

    #[test]
    fn test_curves() {
        let exp = IntensityNormalizer::normalize(15.0, 10.0, 20.0, ScalingMode::Exponential { base: 2.0 });
        assert!((exp - 0.25).abs() < 1e-12);

        let sig = IntensityNormalizer::normalize(15.0, 10.0, 20.0, ScalingMode::Sigmoid { steepness: 8.0 });
        assert!((sig - 0.5).abs() < 1e-12);

        let custom = IntensityNormalizer::normalize(
            15.0,
            10.0,
            20.0,
            ScalingMode::CustomRange { low: 0.2, high: 0.6 },
        );
        assert!((custom - 0.4).abs() < 1e-12);

        let log_top = IntensityNormalizer::normalize(20.0, 10.0, 20.0, ScalingMode::Logarithmic);
        assert!((log_top - 1.0).abs() < 1e-9);
        let log_bottom = IntensityNormalizer::normalize(10.0, 10.0, 20.0, ScalingMode::Logarithmic);
        assert_eq!(log_bottom, 0.0);
    }

    #[test]
    fn test_logarithmic_curve_is_graded() {
        let curve = |v: f64| IntensityNormalizer::normalize(v, 10.0, 20.0, ScalingMode::Logarithmic);

        let mid = curve(15.0);
        assert!(mid > 0.0 && mid < 1.0, "{}", mid);
        assert!(mid > 0.5);

        let samples: Vec<f64> = [10.0, 10.5, 12.0, 15.0, 19.0, 19.99, 20.0]
            .iter()
            .map(|v| curve(*v))
            .collect();
        for pair in samples.windows(2) {
            assert!(pair[0] < pair[1], "{:?}", samples);
        }
    }

    #[test]
    fn test_degenerate_range_is_neutral() {
        for mode in MODES {
            assert_eq!(IntensityNormalizer::normalize(42.0, 42.0, 42.0, mode), NEUTRAL_INTENSITY);
        }
    }

    #[test]
    fn test_never_nan_or_infinite() {
        let values = [-1e308, -5.0, 0.0, 3.0, 10.0, 1e308];
        let ranges = [(0.0, 10.0), (10.0, 0.0), (-1e308, 1e308), (3.0, 3.0)];

        for mode in MODES {
            for &value in &values {
                for &(min, max) in &ranges {
                    let n = IntensityNormalizer::normalize(value, min, max, mode);
                    assert!(n.is_finite(), "{:?} {} {} {}", mode, value, min, max);
                    assert!((0.0..=1.0).contains(&n));
                }
            }
        }
    }

    #[test]
    fn test_color_interpolation() {
        let low = Color::rgb(0.0, 0.0, 1.0);
        let high = Color::rgb(1.0, 0.0, 0.0);

        assert_eq!(IntensityNormalizer::color_at(0.0, low, high), low);
        assert_eq!(IntensityNormalizer::color_at(1.0, low, high), high);
        assert_eq!(
            IntensityNormalizer::color_at(0.5, low, high),
            Color::rgb(0.5, 0.0, 0.5)
        );
        assert_eq!(IntensityNormalizer::color_at(f64::NAN, low, high), low);
    }

    #[test]
    fn test_series_colors_span_range() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        let series = SampleSeries::from_ordered(
            [10.0, 20.0, 30.0]
                .iter()
                .enumerate()
                .map(|(i, v)| SampleEntry::new(start + Duration::seconds(i as i64), *v))
                .collect(),
        );
        let (low, high) = MetricKind::Speed.color_range();

        let colors = IntensityNormalizer::series_colors(&series, low, high, ScalingMode::Linear);

        assert_eq!(colors.len(), 3);
        assert_eq!(colors[0], low);
        assert_eq!(colors[2], high);
        assert!(IntensityNormalizer::series_colors(&SampleSeries::empty(), low, high, ScalingMode::Linear).is_empty());
    }
}

//! Trend aggregation
//!
//! This module keeps per-metric time series built from completed rides.
//! Trends enable relative interpretation of a ride against recent history.

use crate::error::ComputeError;
use crate::types::{Ride, TrendItem};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ride summary values tracked over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    AverageSpeed,
    AverageHeartRate,
    Distance,
    Duration,
    AltitudeGained,
    ActiveEnergy,
    EffortScore,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 7] = [
        TrendMetric::AverageSpeed,
        TrendMetric::AverageHeartRate,
        TrendMetric::Distance,
        TrendMetric::Duration,
        TrendMetric::AltitudeGained,
        TrendMetric::ActiveEnergy,
        TrendMetric::EffortScore,
    ];

    pub fn unit(&self) -> &'static str {
        match self {
            TrendMetric::AverageSpeed => "km/h",
            TrendMetric::AverageHeartRate => "bpm",
            TrendMetric::Distance => "km",
            TrendMetric::Duration => "min",
            TrendMetric::AltitudeGained => "m",
            TrendMetric::ActiveEnergy => "kcal",
            TrendMetric::EffortScore => "score",
        }
    }

    /// Value of this metric for a ride, if the ride carries one
    pub fn value_for(&self, ride: &Ride) -> Option<f64> {
        let value = match self {
            TrendMetric::AverageSpeed => ride.average_speed,
            TrendMetric::AverageHeartRate => ride.average_heart_rate,
            TrendMetric::Distance => ride.distance_m / 1000.0,
            TrendMetric::Duration => ride.duration_secs / 60.0,
            TrendMetric::AltitudeGained => ride.altitude_gained_m,
            TrendMetric::ActiveEnergy => ride.active_energy_kcal,
            TrendMetric::EffortScore => ride.effort_score?,
        };
        value.is_finite().then_some(value)
    }
}

/// Summary line for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub metric: TrendMetric,
    pub unit: String,
    pub count: usize,
    pub current_average: Option<f64>,
    /// Rounded mean percent change within the window
    pub percent_change: f64,
}

/// Rolling trend series for every tracked metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendAggregator {
    series: BTreeMap<TrendMetric, Vec<TrendItem>>,
}

impl TrendAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every metric the ride carries, dated at the ride start
    pub fn append(&mut self, ride: &Ride) {
        for metric in TrendMetric::ALL {
            if let Some(value) = metric.value_for(ride) {
                self.series.entry(metric).or_default().push(TrendItem {
                    value,
                    date: ride.start_time,
                });
            }
        }
    }

    pub fn extend<'a>(&mut self, rides: impl IntoIterator<Item = &'a Ride>) {
        for ride in rides {
            self.append(ride);
        }
    }

    /// Items recorded for a metric, in insertion order
    pub fn series(&self, metric: TrendMetric) -> &[TrendItem] {
        self.series.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, metric: TrendMetric) -> usize {
        self.series(metric).len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(Vec::is_empty)
    }

    /// Mean over the full retained series
    pub fn current_average(&self, metric: TrendMetric) -> Result<f64, ComputeError> {
        let items = self.series(metric);
        if items.is_empty() {
            return Err(ComputeError::EmptyData(format!(
                "no {:?} trend values recorded",
                metric
            )));
        }
        Ok(items.iter().map(|i| i.value).sum::<f64>() / items.len() as f64)
    }

    /// Percent change over the `window` ending at the most recent item
    pub fn percent_change(&self, metric: TrendMetric, window: Duration) -> f64 {
        match self.series(metric).iter().map(|i| i.date).max() {
            Some(latest) => self.percent_change_at(metric, window, latest),
            None => 0.0,
        }
    }

    /// Mean of consecutive percent deltas for items dated in `[now - window, now]`,
    /// rounded to the nearest integer.
    ///
    /// Pairs whose earlier value is zero are skipped; with fewer than two
    /// items or no usable pair the change is 0.
    pub fn percent_change_at(&self, metric: TrendMetric, window: Duration, now: DateTime<Utc>) -> f64 {
        // Windows reaching past the representable range cover all history
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut items: Vec<&TrendItem> = self
            .series(metric)
            .iter()
            .filter(|i| i.date >= cutoff && i.date <= now)
            .collect();
        if items.len() <= 1 {
            return 0.0;
        }
        items.sort_by_key(|i| i.date);

        let deltas: Vec<f64> = items
            .windows(2)
            .filter(|pair| pair[0].value != 0.0)
            .map(|pair| (pair[1].value - pair[0].value) / pair[0].value * 100.0)
            .filter(|d| d.is_finite())
            .collect();
        if deltas.is_empty() {
            return 0.0;
        }

        (deltas.iter().sum::<f64>() / deltas.len() as f64).round()
    }

    /// Drop every item dated before `cutoff`, returning how many were removed
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for items in self.series.values_mut() {
            let before = items.len();
            items.retain(|i| i.date >= cutoff);
            removed += before - items.len();
        }
        self.series.retain(|_, items| !items.is_empty());
        removed
    }

    /// One summary line per metric
    pub fn summary(&self, window: Duration) -> Vec<TrendSummary> {
        TrendMetric::ALL
            .iter()
            .map(|&metric| TrendSummary {
                metric,
                unit: metric.unit().to_string(),
                count: self.len(metric),
                current_average: self.current_average(metric).ok(),
                percent_change: self.percent_change(metric, window),
            })
            .collect()
    }

    /// Load trends from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize trends to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleSeries;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, d, 8, 0, 0).unwrap()
    }

    fn make_ride(d: u32, speed: f64, effort: Option<f64>) -> Ride {
        Ride {
            id: uuid::Uuid::new_v4(),
            workout_id: format!("w{}", d),
            start_time: day(d),
            duration_secs: 3600.0,
            average_heart_rate: 140.0,
            max_heart_rate: 170.0,
            average_speed: speed,
            max_speed: speed * 1.5,
            distance_m: speed * 1000.0,
            active_energy_kcal: 600.0,
            altitude_gained_m: 300.0,
            effort_score: effort,
            temperature_c: None,
            humidity_pct: None,
            heart_rate: SampleSeries::empty(),
            speed: SampleSeries::empty(),
            altitude: SampleSeries::empty(),
            route: Vec::new(),
            degradations: Vec::new(),
        }
    }

    #[test]
    fn test_append_records_every_metric() {
        let mut trends = TrendAggregator::new();
        trends.append(&make_ride(1, 25.0, None));

        assert_eq!(trends.len(TrendMetric::AverageSpeed), 1);
        assert_eq!(trends.len(TrendMetric::EffortScore), 0);
        assert_eq!(trends.series(TrendMetric::Distance)[0].value, 25.0);
        assert_eq!(trends.series(TrendMetric::Duration)[0].value, 60.0);
    }

    #[test]
    fn test_current_average() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 20.0, None), make_ride(2, 30.0, None)]);

        assert_eq!(trends.current_average(TrendMetric::AverageSpeed).unwrap(), 25.0);
        assert!(matches!(
            trends.current_average(TrendMetric::EffortScore),
            Err(ComputeError::EmptyData(_))
        ));
    }

    #[test]
    fn test_percent_change_two_items() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 100.0, None), make_ride(2, 150.0, None)]);

        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7)), 50.0);
    }

    #[test]
    fn test_percent_change_is_mean_of_consecutive_deltas() {
        let mut trends = TrendAggregator::new();
        // Appended out of order: sorted by date it is 100 -> 110 -> 99
        trends.extend(&[
            make_ride(3, 99.0, None),
            make_ride(1, 100.0, None),
            make_ride(2, 110.0, None),
        ]);

        // (+10% + -10%) / 2 = 0
        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7)), 0.0);
    }

    #[test]
    fn test_percent_change_respects_window() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[
            make_ride(1, 10.0, None),
            make_ride(20, 100.0, None),
            make_ride(21, 120.0, None),
        ]);

        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(5)), 20.0);
        assert_eq!(
            trends.percent_change_at(TrendMetric::AverageSpeed, Duration::days(5), day(10)),
            0.0
        );
    }

    #[test]
    fn test_unbounded_window_covers_all_history() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 100.0, None), make_ride(2, 150.0, None)]);

        let huge = Duration::days(365 * 1_000_000);
        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, huge), 50.0);
        assert_eq!(trends.summary(huge)[0].percent_change, 50.0);
    }

    #[test]
    fn test_percent_change_degenerate_cases() {
        let mut trends = TrendAggregator::new();
        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7)), 0.0);

        trends.append(&make_ride(1, 0.0, None));
        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7)), 0.0);

        // Only pair starts at zero, so it is skipped
        trends.append(&make_ride(2, 30.0, None));
        let change = trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7));
        assert_eq!(change, 0.0);

        trends.append(&make_ride(3, 45.0, None));
        assert_eq!(trends.percent_change(TrendMetric::AverageSpeed, Duration::days(7)), 50.0);
    }

    #[test]
    fn test_prune_before() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 20.0, Some(4.0)), make_ride(10, 30.0, None)]);

        let removed = trends.prune_before(day(5));

        assert_eq!(removed, 7);
        assert_eq!(trends.len(TrendMetric::AverageSpeed), 1);
        assert_eq!(trends.len(TrendMetric::EffortScore), 0);
    }

    #[test]
    fn test_summary_covers_all_metrics() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 20.0, Some(4.0)), make_ride(2, 30.0, Some(6.0))]);

        let summary = trends.summary(Duration::days(30));

        assert_eq!(summary.len(), TrendMetric::ALL.len());
        let effort = summary
            .iter()
            .find(|s| s.metric == TrendMetric::EffortScore)
            .unwrap();
        assert_eq!(effort.count, 2);
        assert_eq!(effort.current_average, Some(5.0));
        assert_eq!(effort.percent_change, 50.0);
    }

    #[test]
    fn test_serialization() {
        let mut trends = TrendAggregator::new();
        trends.extend(&[make_ride(1, 20.0, Some(4.0)), make_ride(2, 30.0, None)]);

        let json = trends.to_json().unwrap();
        let restored = TrendAggregator::from_json(&json).unwrap();

        assert_eq!(restored, trends);
        assert!(json.contains("average_speed"));
    }
}

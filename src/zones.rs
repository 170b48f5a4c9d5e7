//! Heart rate zone classification
//!
//! Maps heart rate values onto five ordered intensity zones, either as a
//! percentage of maximum heart rate or, when a resting heart rate is known,
//! as a percentage of heart rate reserve (Karvonen method).

use crate::types::{Color, SampleSeries};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Duration attributed to a series consisting of a single sample
pub const SINGLE_SAMPLE_DURATION_SECS: i64 = 60;

/// Heart rate intensity zone, ordered from lightest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    VeryLight,
    Light,
    Moderate,
    Hard,
    VeryHard,
}

impl Zone {
    pub const ALL: [Zone; 5] = [
        Zone::VeryLight,
        Zone::Light,
        Zone::Moderate,
        Zone::Hard,
        Zone::VeryHard,
    ];

    /// Lower bound of the zone as an intensity fraction
    pub fn lower_bound(&self) -> f64 {
        match self {
            Zone::VeryLight => 0.0,
            Zone::Light => 0.60,
            Zone::Moderate => 0.70,
            Zone::Hard => 0.80,
            Zone::VeryHard => 0.90,
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Zone::VeryLight => Color::rgb(0.55, 0.55, 0.55),
            Zone::Light => Color::rgb(0.2, 0.5, 0.95),
            Zone::Moderate => Color::rgb(0.2, 0.75, 0.3),
            Zone::Hard => Color::rgb(1.0, 0.6, 0.0),
            Zone::VeryHard => Color::rgb(0.9, 0.1, 0.1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Zone::VeryLight => "Very Light",
            Zone::Light => "Light",
            Zone::Moderate => "Moderate",
            Zone::Hard => "Hard",
            Zone::VeryHard => "Very Hard",
        }
    }

    /// Zone for an intensity fraction; anything not finite or below the
    /// first bound falls back to `VeryLight`
    pub fn from_intensity(p: f64) -> Zone {
        if !p.is_finite() || p < Zone::Light.lower_bound() {
            Zone::VeryLight
        } else if p < Zone::Moderate.lower_bound() {
            Zone::Light
        } else if p < Zone::Hard.lower_bound() {
            Zone::Moderate
        } else if p < Zone::VeryHard.lower_bound() {
            Zone::Hard
        } else {
            Zone::VeryHard
        }
    }
}

/// Time spent in each zone; always holds all five zones
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDurations(BTreeMap<Zone, Duration>);

impl Default for ZoneDurations {
    fn default() -> Self {
        Self(Zone::ALL.iter().map(|z| (*z, Duration::zero())).collect())
    }
}

impl ZoneDurations {
    pub fn get(&self, zone: Zone) -> Duration {
        self.0.get(&zone).copied().unwrap_or_else(Duration::zero)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Zone, Duration)> + '_ {
        self.0.iter().map(|(z, d)| (*z, *d))
    }

    pub fn total(&self) -> Duration {
        self.0.values().fold(Duration::zero(), |acc, d| acc + *d)
    }

    /// Share of the total per zone (0-1); all zero when nothing was recorded
    pub fn percentages(&self) -> BTreeMap<Zone, f64> {
        let total_ms = self.total().num_milliseconds();
        self.0
            .iter()
            .map(|(zone, d)| {
                let share = if total_ms > 0 {
                    d.num_milliseconds() as f64 / total_ms as f64
                } else {
                    0.0
                };
                (*zone, share)
            })
            .collect()
    }

    /// Seconds per zone, for display and serialization
    pub fn to_seconds(&self) -> BTreeMap<Zone, f64> {
        self.0
            .iter()
            .map(|(zone, d)| (*zone, d.num_milliseconds() as f64 / 1000.0))
            .collect()
    }

    fn add(&mut self, zone: Zone, duration: Duration) {
        let entry = self.0.entry(zone).or_insert_with(Duration::zero);
        *entry = *entry + duration;
    }
}

/// Classifies heart rate samples into zones
pub struct ZoneClassifier;

impl ZoneClassifier {
    /// Zone for a single heart rate value
    pub fn classify(heart_rate: f64, max_hr: f64, resting_hr: Option<f64>) -> Zone {
        let p = match resting_hr {
            Some(resting) => (heart_rate - resting) / (max_hr - resting),
            None => heart_rate / max_hr,
        };
        Zone::from_intensity(p)
    }

    /// Time spent in each zone over a timestamp-sorted series.
    ///
    /// Each sample owns the interval up to the next sample. The last sample
    /// reuses the previous interval, or `SINGLE_SAMPLE_DURATION_SECS` when it
    /// is the only sample.
    pub fn aggregate_durations(
        samples: &SampleSeries,
        max_hr: f64,
        resting_hr: Option<f64>,
    ) -> ZoneDurations {
        let mut durations = ZoneDurations::default();
        let entries = samples.entries();

        for (i, sample) in entries.iter().enumerate() {
            let duration = match (entries.get(i + 1), i.checked_sub(1)) {
                (Some(next), _) => next.timestamp - sample.timestamp,
                (None, Some(prev)) => sample.timestamp - entries[prev].timestamp,
                (None, None) => Duration::seconds(SINGLE_SAMPLE_DURATION_SECS),
            };
            durations.add(Self::classify(sample.value, max_hr, resting_hr), duration);
        }

        durations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SampleEntry;
    use chrono::{DateTime, TimeZone, Utc};

    const MAX_HR: f64 = 200.0;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn series(points: &[(i64, f64)]) -> SampleSeries {
        SampleSeries::sorted(
            points
                .iter()
                .map(|(secs, hr)| SampleEntry::new(t(*secs), *hr))
                .collect(),
        )
    }

    #[test]
    fn test_classify_percent_of_max() {
        assert_eq!(ZoneClassifier::classify(MAX_HR * 0.5, MAX_HR, None), Zone::VeryLight);
        assert_eq!(ZoneClassifier::classify(MAX_HR * 0.95, MAX_HR, None), Zone::VeryHard);
        assert_eq!(ZoneClassifier::classify(120.0, MAX_HR, None), Zone::Light);
        assert_eq!(ZoneClassifier::classify(140.0, MAX_HR, None), Zone::Moderate);
        assert_eq!(ZoneClassifier::classify(160.0, MAX_HR, None), Zone::Hard);
        assert_eq!(ZoneClassifier::classify(180.0, MAX_HR, None), Zone::VeryHard);
    }

    #[test]
    fn test_classify_heart_rate_reserve() {
        // reserve = 140, 60 + 0.75 * 140 = 165
        assert_eq!(ZoneClassifier::classify(165.0, MAX_HR, Some(60.0)), Zone::Moderate);
        // 130/200 = 0.65 (Light) vs (130-60)/140 = 0.5 (VeryLight)
        assert_eq!(ZoneClassifier::classify(130.0, MAX_HR, None), Zone::Light);
        assert_eq!(ZoneClassifier::classify(130.0, MAX_HR, Some(60.0)), Zone::VeryLight);
    }

    #[test]
    fn test_out_of_range_falls_back_to_very_light() {
        assert_eq!(ZoneClassifier::classify(-20.0, MAX_HR, None), Zone::VeryLight);
        assert_eq!(ZoneClassifier::classify(40.0, MAX_HR, Some(60.0)), Zone::VeryLight);
        assert_eq!(ZoneClassifier::classify(150.0, 0.0, None), Zone::VeryLight);
        assert_eq!(ZoneClassifier::classify(150.0, 60.0, Some(60.0)), Zone::VeryLight);
        assert_eq!(ZoneClassifier::classify(60.0, 60.0, Some(60.0)), Zone::VeryLight);
    }

    #[test]
    fn test_all_zones_present_for_single_sample() {
        let durations = ZoneClassifier::aggregate_durations(&series(&[(0, 150.0)]), MAX_HR, None);

        assert_eq!(durations.len(), 5);
        assert_eq!(durations.get(Zone::Moderate), Duration::seconds(60));
        for zone in [Zone::VeryLight, Zone::Light, Zone::Hard, Zone::VeryHard] {
            assert_eq!(durations.get(zone), Duration::zero());
        }
    }

    #[test]
    fn test_all_zones_present_for_empty_series() {
        let durations = ZoneClassifier::aggregate_durations(&SampleSeries::empty(), MAX_HR, None);
        assert_eq!(durations.len(), 5);
        assert_eq!(durations.total(), Duration::zero());
    }

    #[test]
    fn test_durations_sum_to_span_plus_last_interval() {
        // 8 points spanning 420 seconds, uneven spacing, last interval 30s
        let samples = series(&[
            (0, 100.0),
            (60, 125.0),
            (120, 145.0),
            (180, 165.0),
            (240, 185.0),
            (300, 150.0),
            (390, 130.0),
            (420, 110.0),
        ]);

        let durations = ZoneClassifier::aggregate_durations(&samples, MAX_HR, None);

        assert_eq!(durations.total(), Duration::seconds(420 + 30));
        assert_eq!(durations.get(Zone::VeryLight), Duration::seconds(60 + 30));
        assert_eq!(durations.get(Zone::Light), Duration::seconds(60 + 30));
        assert_eq!(durations.get(Zone::Moderate), Duration::seconds(60 + 90));
        assert_eq!(durations.get(Zone::Hard), Duration::seconds(60));
        assert_eq!(durations.get(Zone::VeryHard), Duration::seconds(60));
    }

    #[test]
    fn test_percentages() {
        let samples = series(&[(0, 100.0), (30, 190.0), (60, 190.0)]);
        let pct = ZoneClassifier::aggregate_durations(&samples, MAX_HR, None).percentages();

        assert!((pct[&Zone::VeryLight] - 1.0 / 3.0).abs() < 1e-9);
        assert!((pct[&Zone::VeryHard] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(pct[&Zone::Moderate], 0.0);
    }
}

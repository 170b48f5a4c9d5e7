//! Core types for the Ridesync pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: store-level workout handles and raw samples, the derived sample
//! series, and the assembled `Ride` record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single timestamped scalar measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl SampleEntry {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Ordered sequence of timestamped scalar values
///
/// Series built with [`SampleSeries::sorted`] are ascending by timestamp and
/// unique per timestamp. [`SampleSeries::from_ordered`] keeps the caller's order
/// as-is, which is what derivation stages use for already-chronological input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleSeries(Vec<SampleEntry>);

impl SampleSeries {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Wrap entries that are already in chronological order
    pub fn from_ordered(entries: Vec<SampleEntry>) -> Self {
        Self(entries)
    }

    /// Sort ascending by timestamp and drop later duplicates of the same instant
    pub fn sorted(mut entries: Vec<SampleEntry>) -> Self {
        entries.sort_by_key(|e| e.timestamp);
        entries.dedup_by_key(|e| e.timestamp);
        Self(entries)
    }

    pub fn entries(&self) -> &[SampleEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> {
        self.0.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|e| e.value)
    }

    /// Arithmetic mean, `None` for an empty series
    pub fn mean(&self) -> Option<f64> {
        if self.0.is_empty() {
            return None;
        }
        Some(self.values().sum::<f64>() / self.0.len() as f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }

    pub fn min(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }
}

/// Value of a raw sample as reported by the store for one sampling interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    /// Min/max observed within the interval
    Range { min: f64, max: f64 },
    /// Single observed value
    Point(f64),
}

impl SampleValue {
    /// Representative value for the interval
    pub fn midpoint(&self) -> f64 {
        match *self {
            SampleValue::Range { min, max } => (min + max) / 2.0,
            SampleValue::Point(value) => value,
        }
    }
}

/// Raw sample returned by a series query, before it becomes a `SampleEntry`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: DateTime<Utc>,
    pub value: SampleValue,
}

impl RawSample {
    pub fn point(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value: SampleValue::Point(value),
        }
    }

    pub fn range(timestamp: DateTime<Utc>, min: f64, max: f64) -> Self {
        Self {
            timestamp,
            value: SampleValue::Range { min, max },
        }
    }

    pub fn to_entry(&self) -> SampleEntry {
        SampleEntry::new(self.timestamp, self.value.midpoint())
    }
}

/// Geo-located, timestamped route point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude above sea level (meters), when the source records one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Optional workout metadata recorded alongside the session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMetadata {
    /// Ambient temperature (celsius)
    #[serde(default)]
    pub temperature_c: Option<f64>,
    /// Relative humidity (percentage, 0-100)
    #[serde(default)]
    pub humidity_pct: Option<f64>,
    /// Externally computed effort score
    #[serde(default)]
    pub effort_score: Option<f64>,
    /// Elevation gained as recorded by the device (meters)
    #[serde(default)]
    pub elevation_ascended_m: Option<f64>,
}

/// One recorded cycling session in the activity store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutHandle {
    /// Store-assigned identifier
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Total distance (meters)
    #[serde(default)]
    pub total_distance_m: Option<f64>,
    /// Active energy burned (kcal)
    #[serde(default)]
    pub active_energy_kcal: Option<f64>,
    #[serde(default)]
    pub metadata: WorkoutMetadata,
}

impl WorkoutHandle {
    /// Elapsed session time in seconds
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds().max(0) as f64 / 1000.0
    }
}

/// One chunk of a route when the store shards it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub index: usize,
}

/// RGBA color with channels in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

impl Color {
    pub const fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: 1.0,
        }
    }

    /// `#rrggbb` representation
    pub fn to_hex(&self) -> String {
        let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!(
            "#{:02x}{:02x}{:02x}",
            channel(self.red),
            channel(self.green),
            channel(self.blue)
        )
    }
}

/// Per-ride metric that can be selected for display and coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    HeartRate,
    Speed,
    Altitude,
}

impl MetricKind {
    pub const ALL: [MetricKind; 3] = [MetricKind::HeartRate, MetricKind::Speed, MetricKind::Altitude];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "heart_rate",
            MetricKind::Speed => "speed",
            MetricKind::Altitude => "altitude",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::HeartRate => "bpm",
            MetricKind::Speed => "km/h",
            MetricKind::Altitude => "m",
        }
    }

    /// Accessor for the ride series this metric refers to
    pub fn selector(&self) -> fn(&Ride) -> &SampleSeries {
        match self {
            MetricKind::HeartRate => heart_rate_series,
            MetricKind::Speed => speed_series,
            MetricKind::Altitude => altitude_series,
        }
    }

    pub fn series<'a>(&self, ride: &'a Ride) -> &'a SampleSeries {
        (self.selector())(ride)
    }

    /// Low/high colors used when visualizing this metric
    pub fn color_range(&self) -> (Color, Color) {
        match self {
            MetricKind::HeartRate => (Color::rgb(1.0, 0.85, 0.85), Color::rgb(0.85, 0.0, 0.0)),
            MetricKind::Speed => (Color::rgb(0.0, 0.8, 0.2), Color::rgb(1.0, 0.2, 0.0)),
            MetricKind::Altitude => (Color::rgb(0.35, 0.2, 0.05), Color::rgb(0.95, 0.95, 0.95)),
        }
    }
}

fn heart_rate_series(ride: &Ride) -> &SampleSeries {
    &ride.heart_rate
}

fn speed_series(ride: &Ride) -> &SampleSeries {
    &ride.speed
}

fn altitude_series(ride: &Ride) -> &SampleSeries {
    &ride.altitude
}

/// Non-fatal reasons a ride was produced with less data than requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    RouteUnavailable { reason: String },
    RouteEmpty,
    EffortUnavailable { reason: String },
    EffortMissing,
}

/// Assembled cycling ride with summaries and derived series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    /// Freshly generated per assembly
    pub id: Uuid,
    /// Store identifier of the source workout, stable across syncs
    pub workout_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_secs: f64,
    /// Mean heart rate (bpm)
    pub average_heart_rate: f64,
    pub max_heart_rate: f64,
    /// Mean speed (km/h)
    pub average_speed: f64,
    pub max_speed: f64,
    /// Distance (meters)
    pub distance_m: f64,
    /// Active energy (kcal)
    pub active_energy_kcal: f64,
    /// Elevation gained (meters)
    pub altitude_gained_m: f64,
    pub effort_score: Option<f64>,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub heart_rate: SampleSeries,
    pub speed: SampleSeries,
    pub altitude: SampleSeries,
    pub route: Vec<GeoPoint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl Ride {
    pub fn has_route(&self) -> bool {
        !self.route.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// One point of a trend series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendItem {
    pub value: f64,
    pub date: DateTime<Utc>,
}

//! Activity export adapter
//!
//! Parses a JSON export of recorded cycling workouts and loads it into a
//! [`MemoryStore`] that the pipeline can query like any other store.

use crate::error::ComputeError;
use crate::types::{GeoPoint, RawSample, SampleValue, WorkoutHandle, WorkoutMetadata};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

use super::memory::{MemoryStore, StoredWorkout};

/// Current export format version
pub const EXPORT_FORMAT_VERSION: &str = "ridesync.export.v1";

/// Adapter for activity export payloads
pub struct ExportAdapter;

impl ExportAdapter {
    /// Parse an export payload into stored workouts
    pub fn parse(raw_json: &str) -> Result<Vec<StoredWorkout>, ComputeError> {
        let payload: ExportPayload = serde_json::from_str(raw_json)?;

        if let Some(version) = &payload.version {
            if version != EXPORT_FORMAT_VERSION {
                return Err(ComputeError::ParseError(format!(
                    "unsupported export version '{}', expected '{}'",
                    version, EXPORT_FORMAT_VERSION
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut stored = Vec::with_capacity(payload.workouts.len());

        for (index, workout) in payload.workouts.into_iter().enumerate() {
            if !seen.insert(workout.id.clone()) {
                return Err(ComputeError::ParseError(format!(
                    "duplicate workout id '{}' at index {}",
                    workout.id, index
                )));
            }
            if workout.end_date < workout.start_date {
                return Err(ComputeError::ParseError(format!(
                    "workout '{}' ends before it starts",
                    workout.id
                )));
            }
            stored.push(convert_workout(workout));
        }

        Ok(stored)
    }

    /// Parse an export payload straight into a store
    pub fn load(raw_json: &str) -> Result<MemoryStore, ComputeError> {
        Ok(MemoryStore::new().with_workouts(Self::parse(raw_json)?))
    }
}

fn convert_workout(export: ExportWorkout) -> StoredWorkout {
    let metadata = export.metadata.unwrap_or_default();

    let workout = WorkoutHandle {
        id: export.id,
        start: export.start_date,
        end: export.end_date,
        total_distance_m: export.total_distance,
        active_energy_kcal: export.total_energy_burned,
        metadata: WorkoutMetadata {
            temperature_c: metadata.temperature,
            humidity_pct: metadata.humidity,
            effort_score: export.effort_score,
            elevation_ascended_m: metadata.elevation_ascended,
        },
    };

    let heart_rate = export
        .heart_rate
        .into_iter()
        .map(|s| RawSample {
            timestamp: s.date,
            value: s.value.into(),
        })
        .collect();

    let route_segments = export
        .routes
        .into_iter()
        .map(|segment| {
            segment
                .into_iter()
                .map(|p| GeoPoint {
                    latitude: p.latitude,
                    longitude: p.longitude,
                    altitude: p.altitude,
                    timestamp: p.timestamp,
                })
                .collect()
        })
        .collect();

    StoredWorkout {
        workout,
        heart_rate,
        route_segments,
    }
}

// Export payload structures

#[derive(Debug, Deserialize)]
struct ExportPayload {
    version: Option<String>,
    #[serde(default)]
    workouts: Vec<ExportWorkout>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportWorkout {
    id: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    total_distance: Option<f64>,
    total_energy_burned: Option<f64>,
    effort_score: Option<f64>,
    metadata: Option<ExportMetadata>,
    #[serde(default)]
    heart_rate: Vec<ExportSample>,
    #[serde(default)]
    routes: Vec<Vec<ExportLocation>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportMetadata {
    temperature: Option<f64>,
    humidity: Option<f64>,
    elevation_ascended: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ExportSample {
    date: DateTime<Utc>,
    #[serde(flatten)]
    value: ExportSampleValue,
}

/// Either `{"min": .., "max": ..}` or `{"value": ..}` next to the date
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportSampleValue {
    Range { min: f64, max: f64 },
    Point { value: f64 },
}

impl From<ExportSampleValue> for SampleValue {
    fn from(v: ExportSampleValue) -> Self {
        match v {
            ExportSampleValue::Range { min, max } => SampleValue::Range { min, max },
            ExportSampleValue::Point { value } => SampleValue::Point(value),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExportLocation {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    timestamp: DateTime<Utc>,
}

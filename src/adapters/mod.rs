//! Activity store adapters
//!
//! This module defines the capability the pipeline consumes from an external
//! activity store, plus the in-process implementations shipped with the crate.

mod export;
mod memory;

pub use export::{ExportAdapter, EXPORT_FORMAT_VERSION};
pub use memory::{MemoryStore, StoredWorkout};

use crate::error::FetchError;
use crate::types::{GeoPoint, MetricKind, RawSample, RouteSegment, WorkoutHandle};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Date range for a workout query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkoutFilter {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl WorkoutFilter {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// A workout matches when it started inside the range (inclusive)
    pub fn matches(&self, workout: &WorkoutHandle) -> bool {
        workout.start >= self.start && workout.start <= self.end
    }
}

/// Ordering requested from a workout query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    EndDateDescending,
    EndDateAscending,
}

impl SortOrder {
    pub fn sort(&self, workouts: &mut [WorkoutHandle]) {
        match self {
            SortOrder::EndDateDescending => workouts.sort_by(|a, b| b.end.cmp(&a.end)),
            SortOrder::EndDateAscending => workouts.sort_by(|a, b| a.end.cmp(&b.end)),
        }
    }
}

/// Query capability of an external activity store
///
/// Implementations own timeouts and transport concerns. Every method may be
/// called concurrently for different workouts.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Cycling workouts matching `filter`, ordered by `sort`, at most `limit`
    async fn query_workouts(
        &self,
        filter: &WorkoutFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<WorkoutHandle>, FetchError>;

    /// Samples of one metric recorded during the workout, one per `interval`
    async fn query_sample_series(
        &self,
        workout: &WorkoutHandle,
        metric: MetricKind,
        interval: Duration,
    ) -> Result<Vec<RawSample>, FetchError>;

    /// Chunks the workout route is stored in
    async fn route_segments(&self, workout: &WorkoutHandle) -> Result<Vec<RouteSegment>, FetchError> {
        let _ = workout;
        Ok(vec![RouteSegment { index: 0 }])
    }

    /// Points of one route chunk
    async fn query_route(
        &self,
        workout: &WorkoutHandle,
        segment: &RouteSegment,
    ) -> Result<Vec<GeoPoint>, FetchError>;

    /// Effort score for the workout, if one was recorded
    async fn query_effort_score(&self, workout: &WorkoutHandle) -> Result<Option<f64>, FetchError> {
        Ok(workout.metadata.effort_score)
    }
}

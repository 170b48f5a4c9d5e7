//! In-process activity store
//!
//! Serves workouts held in memory. Faults and latency can be injected per
//! workout so callers can exercise degraded and failing paths.

use crate::error::FetchError;
use crate::types::{GeoPoint, MetricKind, RawSample, RouteSegment, WorkoutHandle};
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use tracing::debug;

use super::{SortOrder, WorkoutFilter, WorkoutStore};

/// A workout together with everything the store can return for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredWorkout {
    pub workout: WorkoutHandle,
    #[serde(default)]
    pub heart_rate: Vec<RawSample>,
    /// Route points, one vector per stored chunk
    #[serde(default)]
    pub route_segments: Vec<Vec<GeoPoint>>,
}

impl StoredWorkout {
    pub fn new(workout: WorkoutHandle) -> Self {
        Self {
            workout,
            heart_rate: Vec::new(),
            route_segments: Vec::new(),
        }
    }

    pub fn with_heart_rate(mut self, samples: Vec<RawSample>) -> Self {
        self.heart_rate = samples;
        self
    }

    pub fn with_route(mut self, points: Vec<GeoPoint>) -> Self {
        self.route_segments.push(points);
        self
    }
}

#[derive(Debug, Default)]
struct Faults {
    heart_rate: Option<FetchError>,
    route: Option<FetchError>,
    effort: Option<FetchError>,
}

/// Activity store backed by in-memory workouts
#[derive(Debug, Default)]
pub struct MemoryStore {
    workouts: Vec<StoredWorkout>,
    faults: HashMap<String, Faults>,
    workout_query_failures: AtomicU32,
    workout_query_error: Option<FetchError>,
    latency: Option<std::time::Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workout(mut self, stored: StoredWorkout) -> Self {
        self.workouts.push(stored);
        self
    }

    pub fn with_workouts(mut self, stored: impl IntoIterator<Item = StoredWorkout>) -> Self {
        self.workouts.extend(stored);
        self
    }

    /// Delay every heart rate query by `latency`
    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_heart_rate(mut self, workout_id: &str, error: FetchError) -> Self {
        self.faults.entry(workout_id.to_string()).or_default().heart_rate = Some(error);
        self
    }

    pub fn fail_route(mut self, workout_id: &str, error: FetchError) -> Self {
        self.faults.entry(workout_id.to_string()).or_default().route = Some(error);
        self
    }

    pub fn fail_effort(mut self, workout_id: &str, error: FetchError) -> Self {
        self.faults.entry(workout_id.to_string()).or_default().effort = Some(error);
        self
    }

    /// Fail the next `times` workout queries with `error`
    pub fn fail_workout_queries(mut self, times: u32, error: FetchError) -> Self {
        self.workout_query_failures = AtomicU32::new(times);
        self.workout_query_error = Some(error);
        self
    }

    pub fn workouts(&self) -> &[StoredWorkout] {
        &self.workouts
    }

    /// Largest number of heart rate queries observed running at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn stored(&self, workout_id: &str) -> Result<&StoredWorkout, FetchError> {
        self.workouts
            .iter()
            .find(|s| s.workout.id == workout_id)
            .ok_or_else(|| FetchError::NotFound(format!("workout {}", workout_id)))
    }

    fn fault(&self, workout_id: &str, pick: fn(&Faults) -> &Option<FetchError>) -> Result<(), FetchError> {
        match self.faults.get(workout_id).and_then(|f| pick(f).clone()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn simulate_latency(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkoutStore for MemoryStore {
    async fn query_workouts(
        &self,
        filter: &WorkoutFilter,
        sort: SortOrder,
        limit: Option<usize>,
    ) -> Result<Vec<WorkoutHandle>, FetchError> {
        let remaining = self.workout_query_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.workout_query_failures.store(remaining - 1, Ordering::SeqCst);
            if let Some(err) = &self.workout_query_error {
                return Err(err.clone());
            }
        }

        let mut workouts: Vec<WorkoutHandle> = self
            .workouts
            .iter()
            .map(|s| &s.workout)
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        sort.sort(&mut workouts);
        if let Some(limit) = limit {
            workouts.truncate(limit);
        }

        debug!(count = workouts.len(), "memory store workout query");
        Ok(workouts)
    }

    async fn query_sample_series(
        &self,
        workout: &WorkoutHandle,
        metric: MetricKind,
        _interval: Duration,
    ) -> Result<Vec<RawSample>, FetchError> {
        match metric {
            MetricKind::HeartRate => {
                self.simulate_latency().await;
                self.fault(&workout.id, |f| &f.heart_rate)?;
                Ok(self.stored(&workout.id)?.heart_rate.clone())
            }
            // Speed and altitude are derived from the route, never stored as series
            MetricKind::Speed | MetricKind::Altitude => Ok(Vec::new()),
        }
    }

    async fn route_segments(&self, workout: &WorkoutHandle) -> Result<Vec<RouteSegment>, FetchError> {
        self.fault(&workout.id, |f| &f.route)?;
        let stored = self.stored(&workout.id)?;
        Ok((0..stored.route_segments.len())
            .map(|index| RouteSegment { index })
            .collect())
    }

    async fn query_route(
        &self,
        workout: &WorkoutHandle,
        segment: &RouteSegment,
    ) -> Result<Vec<GeoPoint>, FetchError> {
        self.fault(&workout.id, |f| &f.route)?;
        self.stored(&workout.id)?
            .route_segments
            .get(segment.index)
            .cloned()
            .ok_or_else(|| {
                FetchError::NotFound(format!("route segment {} of workout {}", segment.index, workout.id))
            })
    }

    async fn query_effort_score(&self, workout: &WorkoutHandle) -> Result<Option<f64>, FetchError> {
        self.fault(&workout.id, |f| &f.effort)?;
        Ok(self.stored(&workout.id)?.workout.metadata.effort_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkoutMetadata;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 7, 0, 0).unwrap()
    }

    fn make_workout(id: &str, d: u32) -> StoredWorkout {
        StoredWorkout::new(WorkoutHandle {
            id: id.to_string(),
            start: day(d),
            end: day(d) + Duration::hours(1),
            total_distance_m: Some(25_000.0),
            active_energy_kcal: Some(600.0),
            metadata: WorkoutMetadata::default(),
        })
    }

    #[tokio::test]
    async fn test_query_filters_sorts_and_limits() {
        let store = MemoryStore::new().with_workouts(vec![
            make_workout("a", 1),
            make_workout("b", 3),
            make_workout("c", 2),
        ]);
        let filter = WorkoutFilter::new(day(2), day(30));

        let workouts = store
            .query_workouts(&filter, SortOrder::EndDateDescending, Some(5))
            .await
            .unwrap();
        let ids: Vec<&str> = workouts.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let limited = store
            .query_workouts(&filter, SortOrder::EndDateDescending, Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "b");
    }

    #[tokio::test]
    async fn test_query_ascending_order() {
        let store = MemoryStore::new().with_workouts(vec![
            make_workout("a", 1),
            make_workout("b", 3),
            make_workout("c", 2),
        ]);
        let filter = WorkoutFilter::new(day(1), day(30));

        let workouts = store
            .query_workouts(&filter, SortOrder::EndDateAscending, Some(2))
            .await
            .unwrap();
        let ids: Vec<&str> = workouts.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_workout_query_failures_are_consumed() {
        let store = MemoryStore::new()
            .with_workout(make_workout("a", 1))
            .fail_workout_queries(1, FetchError::Unavailable("busy".to_string()));
        let filter = WorkoutFilter::new(day(1), day(30));

        assert!(store.query_workouts(&filter, SortOrder::EndDateDescending, None).await.is_err());
        assert_eq!(
            store
                .query_workouts(&filter, SortOrder::EndDateDescending, None)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_route_fault_applies_to_segments() {
        let store = MemoryStore::new()
            .with_workout(make_workout("a", 1))
            .fail_route("a", FetchError::PermissionDenied("route".to_string()));
        let workout = store.workouts()[0].workout.clone();

        assert_eq!(
            store.route_segments(&workout).await,
            Err(FetchError::PermissionDenied("route".to_string()))
        );
    }
}

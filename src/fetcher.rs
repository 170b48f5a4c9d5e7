//! Workout fetching
//!
//! Queries the activity store for cycling workouts in a date range, most
//! recent first. Errors are surfaced as-is; retrying is up to the caller.

use crate::adapters::{SortOrder, WorkoutFilter, WorkoutStore};
use crate::error::FetchError;
use crate::types::WorkoutHandle;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Fetches workout handles from a store
#[derive(Clone)]
pub struct WorkoutFetcher {
    store: Arc<dyn WorkoutStore>,
}

impl WorkoutFetcher {
    pub fn new(store: Arc<dyn WorkoutStore>) -> Self {
        Self { store }
    }

    /// Workouts that started in `[start, end]`, sorted descending by end time
    pub async fn fetch(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: Option<usize>,
    ) -> Result<Vec<WorkoutHandle>, FetchError> {
        if end < start {
            debug!(%start, %end, "empty workout range");
            return Ok(Vec::new());
        }

        let filter = WorkoutFilter::new(start, end);
        let mut workouts = self
            .store
            .query_workouts(&filter, SortOrder::EndDateDescending, limit)
            .await?;

        // Stores are asked for this order, but not all of them honor it
        SortOrder::EndDateDescending.sort(&mut workouts);
        if let Some(limit) = limit {
            workouts.truncate(limit);
        }

        debug!(count = workouts.len(), %start, %end, "fetched workouts");
        Ok(workouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryStore, StoredWorkout};
    use crate::types::WorkoutMetadata;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use crate::types::{GeoPoint, MetricKind, RawSample, RouteSegment};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 7, 0, 0).unwrap()
    }

    fn make_handle(id: &str, d: u32, minutes: i64) -> WorkoutHandle {
        WorkoutHandle {
            id: id.to_string(),
            start: day(d),
            end: day(d) + Duration::minutes(minutes),
            total_distance_m: None,
            active_energy_kcal: None,
            metadata: WorkoutMetadata::default(),
        }
    }

    /// Store that ignores the requested sort order and limit
    struct UnorderedStore(Vec<WorkoutHandle>);

    #[async_trait]
    impl WorkoutStore for UnorderedStore {
        async fn query_workouts(
            &self,
            _filter: &WorkoutFilter,
            _sort: SortOrder,
            _limit: Option<usize>,
        ) -> Result<Vec<WorkoutHandle>, FetchError> {
            Ok(self.0.clone())
        }

        async fn query_sample_series(
            &self,
            _workout: &WorkoutHandle,
            _metric: MetricKind,
            _interval: Duration,
        ) -> Result<Vec<RawSample>, FetchError> {
            Ok(Vec::new())
        }

        async fn query_route(
            &self,
            _workout: &WorkoutHandle,
            _segment: &RouteSegment,
        ) -> Result<Vec<GeoPoint>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_fetch_sorts_descending_by_end() {
        let store = UnorderedStore(vec![
            make_handle("early", 1, 60),
            make_handle("late", 5, 60),
            make_handle("middle", 3, 60),
        ]);
        let fetcher = WorkoutFetcher::new(Arc::new(store));

        let workouts = fetcher.fetch(day(1), day(30), Some(2)).await.unwrap();
        let ids: Vec<&str> = workouts.iter().map(|w| w.id.as_str()).collect();

        assert_eq!(ids, vec!["late", "middle"]);
    }

    #[tokio::test]
    async fn test_fetch_surfaces_store_error() {
        let store = MemoryStore::new()
            .with_workout(StoredWorkout::new(make_handle("a", 2, 30)))
            .fail_workout_queries(1, FetchError::PermissionDenied("workouts".to_string()));
        let fetcher = WorkoutFetcher::new(Arc::new(store));

        let result = fetcher.fetch(day(1), day(30), None).await;
        assert_eq!(result, Err(FetchError::PermissionDenied("workouts".to_string())));
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let store = MemoryStore::new().with_workout(StoredWorkout::new(make_handle("a", 2, 30)));
        let fetcher = WorkoutFetcher::new(Arc::new(store));

        assert!(fetcher.fetch(day(30), day(1), None).await.unwrap().is_empty());
    }
}

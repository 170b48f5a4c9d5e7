//! Ride assembly
//!
//! Builds one `Ride` per workout. Heart rate, route and effort score are
//! fetched concurrently and joined before anything is derived:
//!
//! `Started → {HeartRate, Route, Effort} → Joined → Derived → Completed`
//!
//! A heart rate failure aborts the ride. Route and effort failures only
//! degrade it.

use crate::adapters::WorkoutStore;
use crate::config::SyncConfig;
use crate::error::{AssemblyError, FetchError};
use crate::route::{self, RouteDeriver};
use crate::types::{Degradation, GeoPoint, MetricKind, Ride, SampleSeries, WorkoutHandle};
use futures_util::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Assembles rides from store queries
#[derive(Clone)]
pub struct RideAssembler {
    store: Arc<dyn WorkoutStore>,
    config: SyncConfig,
}

impl RideAssembler {
    pub fn new(store: Arc<dyn WorkoutStore>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Assemble a ride. `cancel` is honored before the fan-out, while the
    /// sub-fetches are in flight, and after the join.
    pub async fn assemble(
        &self,
        workout: &WorkoutHandle,
        cancel: &CancellationToken,
    ) -> Result<Ride, AssemblyError> {
        let cancelled = || AssemblyError::Cancelled {
            workout_id: workout.id.clone(),
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let joined = async {
            tokio::join!(
                self.fetch_heart_rate(workout),
                self.fetch_route(workout, cancel),
                self.store.query_effort_score(workout),
            )
        };
        let (heart_rate, route, effort) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(workout_id = %workout.id, "assembly cancelled in flight");
                return Err(cancelled());
            }
            joined = joined => joined,
        };

        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let heart_rate = heart_rate.map_err(|source| AssemblyError::HeartRate {
            workout_id: workout.id.clone(),
            source,
        })?;
        let Some(average_heart_rate) = heart_rate.mean() else {
            return Err(AssemblyError::EmptyData {
                workout_id: workout.id.clone(),
                metric: MetricKind::HeartRate.as_str().to_string(),
            });
        };

        let mut degradations = Vec::new();

        let route = match route {
            Ok(points) if points.is_empty() => {
                degradations.push(Degradation::RouteEmpty);
                points
            }
            Ok(points) => points,
            Err(err) => {
                degradations.push(Degradation::RouteUnavailable {
                    reason: err.to_string(),
                });
                Vec::new()
            }
        };

        let effort_score = match effort {
            Ok(Some(score)) => Some(score),
            Ok(None) => {
                degradations.push(Degradation::EffortMissing);
                None
            }
            Err(err) => {
                degradations.push(Degradation::EffortUnavailable {
                    reason: err.to_string(),
                });
                None
            }
        };

        if !degradations.is_empty() {
            warn!(workout_id = %workout.id, ?degradations, "ride assembled with degraded data");
        }

        Ok(build_ride(
            workout,
            HeartRateSummary {
                series: heart_rate,
                average: average_heart_rate,
            },
            route,
            effort_score,
            degradations,
        ))
    }

    async fn fetch_heart_rate(&self, workout: &WorkoutHandle) -> Result<SampleSeries, FetchError> {
        let raw = self
            .store
            .query_sample_series(workout, MetricKind::HeartRate, self.config.heart_rate_interval())
            .await?;

        let total = raw.len();
        let entries: Vec<_> = raw
            .iter()
            .map(|s| s.to_entry())
            .filter(|e| e.value.is_finite() && e.value >= 0.0)
            .collect();
        if entries.len() < total {
            debug!(
                workout_id = %workout.id,
                dropped = total - entries.len(),
                "dropped invalid heart rate samples"
            );
        }

        Ok(SampleSeries::sorted(entries))
    }

    /// Fetch all route segments concurrently and merge them
    async fn fetch_route(
        &self,
        workout: &WorkoutHandle,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeoPoint>, FetchError> {
        let segments = self.store.route_segments(workout).await?;
        if segments.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let chunks = join_all(
            segments
                .iter()
                .map(|segment| self.store.query_route(workout, segment)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

        debug!(workout_id = %workout.id, segments = chunks.len(), "fetched route segments");
        Ok(route::merge_segments(chunks, self.config.route_sampling_interval()))
    }
}

struct HeartRateSummary {
    series: SampleSeries,
    average: f64,
}

fn build_ride(
    workout: &WorkoutHandle,
    heart_rate: HeartRateSummary,
    route: Vec<GeoPoint>,
    effort_score: Option<f64>,
    degradations: Vec<Degradation>,
) -> Ride {
    let derived = RouteDeriver::derive(&route);
    let duration_secs = workout.duration_secs();

    let distance_m = workout
        .total_distance_m
        .unwrap_or_else(|| route::total_distance(&route));

    let average_speed = if duration_secs > 0.0 && distance_m > 0.0 {
        distance_m / duration_secs * 3.6
    } else {
        derived.speed.mean().unwrap_or(0.0)
    };

    let altitude_gained_m = workout
        .metadata
        .elevation_ascended_m
        .unwrap_or_else(|| route::altitude_gain(&derived.altitude));

    Ride {
        id: Uuid::new_v4(),
        workout_id: workout.id.clone(),
        start_time: workout.start,
        duration_secs,
        average_heart_rate: heart_rate.average,
        max_heart_rate: heart_rate.series.max().unwrap_or(heart_rate.average),
        average_speed,
        max_speed: derived.speed.max().unwrap_or(0.0),
        distance_m,
        active_energy_kcal: workout.active_energy_kcal.unwrap_or(0.0),
        altitude_gained_m,
        effort_score,
        temperature_c: workout.metadata.temperature_c,
        humidity_pct: workout.metadata.humidity_pct,
        heart_rate: heart_rate.series,
        speed: derived.speed,
        altitude: derived.altitude,
        route,
        degradations,
    }
}

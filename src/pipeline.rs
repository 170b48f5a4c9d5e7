//! Pipeline orchestration
//!
//! This module provides the public entry point for a sync:
//! 1. WorkoutFetcher - List workouts in the requested range (with retries)
//! 2. RideAssembler - Assemble each workout, a bounded number at a time
//! 3. SyncReport - Collect rides and per-workout failures
//!
//! A failing workout never aborts the sync; only a failing workout listing
//! or a cancellation does.

use crate::adapters::WorkoutStore;
use crate::assembler::RideAssembler;
use crate::config::SyncConfig;
use crate::error::{FailureKind, FetchError, SyncError};
use crate::fetcher::WorkoutFetcher;
use crate::trends::{TrendAggregator, TrendSummary};
use crate::types::{Ride, WorkoutHandle};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A workout that could not be turned into a ride
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutFailure {
    pub workout_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of a sync: every ride that could be assembled plus what failed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    /// Rides in the order their workouts were fetched (most recent first)
    pub rides: Vec<Ride>,
    pub failures: Vec<WorkoutFailure>,
    pub workouts_fetched: usize,
}

impl SyncReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether at least one workout failed
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn degraded_count(&self) -> usize {
        self.rides.iter().filter(|r| r.is_degraded()).count()
    }
}

/// Top-level sync orchestrator
pub struct SyncPipeline {
    fetcher: WorkoutFetcher,
    assembler: RideAssembler,
    config: SyncConfig,
}

impl SyncPipeline {
    pub fn new(store: Arc<dyn WorkoutStore>, config: SyncConfig) -> Self {
        Self {
            fetcher: WorkoutFetcher::new(store.clone()),
            assembler: RideAssembler::new(store, config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Sync every workout since `since` up to now
    pub async fn sync(&self, since: DateTime<Utc>) -> Result<SyncReport, SyncError> {
        self.sync_range(since, Utc::now(), &CancellationToken::new())
            .await
    }

    /// Sync with a caller-owned cancellation token
    pub async fn sync_with_cancel(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        self.sync_range(since, Utc::now(), cancel).await
    }

    /// Sync workouts that started in `[start, end]`
    pub async fn sync_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, SyncError> {
        let workouts = self.fetch_with_retry(start, end, cancel).await?;
        let workouts_fetched = workouts.len();

        let assembler = &self.assembler;
        let results: Vec<_> = stream::iter(workouts.iter())
            .map(|workout| async move { (workout, assembler.assemble(workout, cancel).await) })
            .buffered(self.config.concurrency())
            .collect()
            .await;

        if cancel.is_cancelled() {
            info!("sync cancelled, discarding partial results");
            return Err(SyncError::Cancelled);
        }

        let mut report = SyncReport {
            workouts_fetched,
            ..SyncReport::default()
        };
        for (workout, result) in results {
            match result {
                Ok(ride) => report.rides.push(ride),
                Err(err) => {
                    warn!(workout_id = %workout.id, error = %err, "skipping workout");
                    report.failures.push(WorkoutFailure {
                        workout_id: err.workout_id().to_string(),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            fetched = report.workouts_fetched,
            rides = report.rides.len(),
            degraded = report.degraded_count(),
            failed = report.failure_count(),
            "sync finished"
        );
        Ok(report)
    }

    /// Sync and feed the resulting rides into `trends`. A failed or
    /// cancelled sync leaves `trends` untouched.
    pub async fn sync_into(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
        trends: &mut TrendAggregator,
    ) -> Result<SyncReport, SyncError> {
        let report = self.sync_with_cancel(since, cancel).await?;
        trends.extend(&report.rides);
        Ok(report)
    }

    /// Trend summary over the configured trend window
    pub fn trend_summary(&self, trends: &TrendAggregator) -> Vec<TrendSummary> {
        trends.summary(self.config.trend_window())
    }

    async fn fetch_with_retry(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<WorkoutHandle>, SyncError> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match self.fetcher.fetch(start, end, self.config.page_size).await {
                Ok(workouts) => return Ok(workouts),
                Err(err) if err.is_transient() && attempt < self.config.fetch_retries => {
                    let backoff = self.backoff(attempt);
                    warn!(attempt = attempt + 1, ?backoff, error = %err, "retrying workout fetch");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = cancel.cancelled() => return Err(SyncError::Cancelled),
                    }
                    attempt += 1;
                }
                Err(FetchError::Cancelled) => return Err(SyncError::Cancelled),
                Err(err) => return Err(SyncError::Fetch(err)),
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(1u64 << attempt.min(16)))
    }
}

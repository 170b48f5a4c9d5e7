//! Sync configuration
//!
//! Configuration is passed explicitly into the pipeline and the trend
//! aggregator; nothing in the crate reads process-wide settings.

use crate::error::ComputeError;
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Default maximum heart rate used for zone classification (bpm)
pub const DEFAULT_MAX_HEART_RATE: f64 = 190.0;

/// Default number of workouts assembled concurrently
pub const DEFAULT_MAX_CONCURRENT_WORKOUTS: usize = 4;

/// Default trend window in days
pub const DEFAULT_TREND_WINDOW_DAYS: i64 = 30;

/// Longest accepted trend window in days; longer windows are treated as this
pub const MAX_TREND_WINDOW_DAYS: i64 = 1_000_000;

/// Settings for a sync run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum heart rate (bpm)
    pub max_heart_rate: f64,
    /// Resting heart rate (bpm); enables heart-rate-reserve zones
    pub resting_heart_rate: Option<f64>,
    /// Upper bound on workouts fetched per sync
    pub page_size: Option<usize>,
    /// Workouts assembled at the same time
    pub max_concurrent_workouts: usize,
    /// Sampling interval requested for heart rate series (seconds)
    pub heart_rate_interval_secs: i64,
    /// Minimum gap between accepted route points when merging segments (seconds)
    pub route_sampling_interval_secs: f64,
    /// Retries of a transient workout-list fetch failure
    pub fetch_retries: u32,
    /// Delay before the first retry, doubled on each attempt (milliseconds)
    pub retry_backoff_ms: u64,
    /// Window used for percent-change summaries (days)
    pub trend_window_days: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
            resting_heart_rate: None,
            page_size: None,
            max_concurrent_workouts: DEFAULT_MAX_CONCURRENT_WORKOUTS,
            heart_rate_interval_secs: 5,
            route_sampling_interval_secs: 1.0,
            fetch_retries: 2,
            retry_backoff_ms: 250,
            trend_window_days: DEFAULT_TREND_WINDOW_DAYS,
        }
    }
}

impl SyncConfig {
    /// Load configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_heart_rate(mut self, max_heart_rate: f64) -> Self {
        self.max_heart_rate = max_heart_rate;
        self
    }

    pub fn with_resting_heart_rate(mut self, resting_heart_rate: Option<f64>) -> Self {
        self.resting_heart_rate = resting_heart_rate;
        self
    }

    pub fn with_page_size(mut self, page_size: Option<usize>) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_concurrent_workouts(mut self, max_concurrent_workouts: usize) -> Self {
        self.max_concurrent_workouts = max_concurrent_workouts;
        self
    }

    pub fn with_trend_window_days(mut self, trend_window_days: i64) -> Self {
        self.trend_window_days = trend_window_days;
        self
    }

    pub fn with_fetch_retries(mut self, fetch_retries: u32, retry_backoff_ms: u64) -> Self {
        self.fetch_retries = fetch_retries;
        self.retry_backoff_ms = retry_backoff_ms;
        self
    }

    /// Check value ranges that would make zone math meaningless
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.max_heart_rate.is_finite() && self.max_heart_rate > 0.0) {
            return Err(ComputeError::InvalidInput(format!(
                "max_heart_rate must be positive, got {}",
                self.max_heart_rate
            )));
        }
        if let Some(resting) = self.resting_heart_rate {
            if !(resting.is_finite() && resting >= 0.0 && resting < self.max_heart_rate) {
                return Err(ComputeError::InvalidInput(format!(
                    "resting_heart_rate must be in [0, {}), got {}",
                    self.max_heart_rate, resting
                )));
            }
        }
        if self.heart_rate_interval_secs <= 0 {
            return Err(ComputeError::InvalidInput(
                "heart_rate_interval_secs must be positive".to_string(),
            ));
        }
        if !(self.route_sampling_interval_secs.is_finite() && self.route_sampling_interval_secs >= 0.0) {
            return Err(ComputeError::InvalidInput(
                "route_sampling_interval_secs must be non-negative".to_string(),
            ));
        }
        if !(1..=MAX_TREND_WINDOW_DAYS).contains(&self.trend_window_days) {
            return Err(ComputeError::InvalidInput(format!(
                "trend_window_days must be in [1, {}], got {}",
                MAX_TREND_WINDOW_DAYS, self.trend_window_days
            )));
        }
        Ok(())
    }

    /// Concurrency limit, never below one
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_workouts.max(1)
    }

    pub fn heart_rate_interval(&self) -> Duration {
        Duration::seconds(self.heart_rate_interval_secs)
    }

    pub fn route_sampling_interval(&self) -> Duration {
        Duration::milliseconds((self.route_sampling_interval_secs * 1000.0).round() as i64)
    }

    /// Window for percent-change summaries, clamped to `[1, MAX_TREND_WINDOW_DAYS]` days
    pub fn trend_window(&self) -> Duration {
        Duration::days(self.trend_window_days.clamp(1, MAX_TREND_WINDOW_DAYS))
    }
}

//! RideSync - Cycling workout sync and derived-metrics engine
//!
//! RideSync turns workouts recorded in an activity store into ride records
//! through a concurrent pipeline: workout fetch → per-workout fan-out (heart
//! rate, route, effort) → speed/altitude derivation → ride assembly.
//!
//! ## Modules
//!
//! - **Pipeline**: Sync workouts into rides with bounded concurrency and cancellation
//! - **Analysis**: Heart rate zones, intensity normalization and trend aggregation

pub mod adapters;
pub mod assembler;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod normalizer;
pub mod pipeline;
pub mod route;
pub mod trends;
pub mod types;
pub mod zones;

pub use adapters::{ExportAdapter, MemoryStore, WorkoutStore};
pub use config::SyncConfig;
pub use error::{AssemblyError, ComputeError, FetchError, SyncError};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use normalizer::{IntensityNormalizer, ScalingMode};
pub use pipeline::{SyncPipeline, SyncReport};
pub use trends::{TrendAggregator, TrendMetric};
pub use types::{MetricKind, Ride};
pub use zones::{Zone, ZoneClassifier};

/// RideSync version
pub const RIDESYNC_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name embedded in CLI reports
pub const PRODUCER_NAME: &str = "ridesync";

//! Error types for Ridesync

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the external activity store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Permission denied by activity store: {0}")]
    PermissionDenied(String),

    #[error("Activity store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found in activity store: {0}")]
    NotFound(String),

    #[error("Query cancelled")]
    Cancelled,
}

impl FetchError {
    /// Whether a retry at the sync level may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Unavailable(_))
    }
}

/// Errors that can occur during metric computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("No data available: {0}")]
    EmptyData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to parse activity export: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Errors that abort the assembly of a single ride
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Heart rate fetch failed for workout {workout_id}: {source}")]
    HeartRate {
        workout_id: String,
        #[source]
        source: FetchError,
    },

    #[error("No {metric} samples for workout {workout_id}")]
    EmptyData { workout_id: String, metric: String },

    #[error("Assembly cancelled for workout {workout_id}")]
    Cancelled { workout_id: String },
}

impl AssemblyError {
    /// Workout the failure belongs to
    pub fn workout_id(&self) -> &str {
        match self {
            AssemblyError::HeartRate { workout_id, .. }
            | AssemblyError::EmptyData { workout_id, .. }
            | AssemblyError::Cancelled { workout_id } => workout_id,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AssemblyError::HeartRate { .. } => FailureKind::Fetch,
            AssemblyError::EmptyData { .. } => FailureKind::EmptyData,
            AssemblyError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Errors that abort a whole sync
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Workout fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Sync cancelled")]
    Cancelled,
}

/// Coarse classification of a per-workout failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    EmptyData,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_transient() {
        assert!(FetchError::Unavailable("timeout".to_string()).is_transient());
        assert!(!FetchError::PermissionDenied("heart rate".to_string()).is_transient());
        assert!(!FetchError::Cancelled.is_transient());
    }

    #[test]
    fn test_assembly_error_carries_workout_id() {
        let err = AssemblyError::HeartRate {
            workout_id: "w-1".to_string(),
            source: FetchError::Unavailable("offline".to_string()),
        };
        assert_eq!(err.workout_id(), "w-1");
        assert_eq!(err.kind(), FailureKind::Fetch);
        assert!(err.to_string().contains("offline"));
    }
}

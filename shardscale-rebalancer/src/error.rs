//! Resharding errors

use std::time::Duration;
use thiserror::Error;

use crate::control_plane::ControlPlaneError;
use crate::planner::PlanError;

/// Errors surfaced by topology reads and reshard operations
#[derive(Error, Debug)]
pub enum ReshardError {
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("Split of {shard_id} failed: {source}")]
    SplitFailed {
        shard_id: String,
        #[source]
        source: ControlPlaneError,
    },

    #[error("Merge of {shard_to_merge} with {adjacent_shard_to_merge} failed: {source}")]
    MergeFailed {
        shard_to_merge: String,
        adjacent_shard_to_merge: String,
        #[source]
        source: ControlPlaneError,
    },

    /// The mutation for `step` was accepted but the stream never confirmed it
    #[error(
        "Step {step}/{total} ({description}) was applied but did not complete \
         ({steps_completed} earlier steps done): {source}"
    )]
    StepIncomplete {
        step: usize,
        total: usize,
        description: String,
        steps_completed: usize,
        #[source]
        source: Box<ReshardError>,
    },

    #[error("Stream {stream} did not become ACTIVE within {waited:?}")]
    WaitTimedOut { stream: String, waited: Duration },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ReshardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_failure_names_pair() {
        let err = ReshardError::MergeFailed {
            shard_to_merge: "shardId-000000000001".to_string(),
            adjacent_shard_to_merge: "shardId-000000000002".to_string(),
            source: ControlPlaneError::InvalidResponse("boom".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("shardId-000000000001"));
        assert!(msg.contains("shardId-000000000002"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_timeout_display() {
        let err = ReshardError::WaitTimedOut {
            stream: "clicks".to_string(),
            waited: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Stream clicks did not become ACTIVE within 30s");
    }

    #[test]
    fn test_step_incomplete_keeps_cause() {
        use std::error::Error as _;

        let err = ReshardError::StepIncomplete {
            step: 2,
            total: 4,
            description: "split shardId-000000000001".to_string(),
            steps_completed: 1,
            source: Box::new(ReshardError::Cancelled),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Step 2/4 (split shardId-000000000001) was applied"));
        assert!(msg.contains("1 earlier steps done"));
        assert!(msg.ends_with("Operation cancelled"));
        assert!(err.source().is_some());
    }
}

//! Error types for timeline allocation.
//!
//! All errors implement `std::error::Error` and carry enough structured context
//! for a presentation layer to build a user-facing message.
//!
//! ## Error Categories
//!
//! - **Edit Rejections**: boundary edits that would invert or collapse a span,
//!   removal of the last segment, invalid weights
//! - **Lookup Errors**: unknown segment ids or handle indices
//! - **Persistence Errors**: failed writes against the [`TimelineStore`](crate::store::TimelineStore)
//! - **Concurrency Errors**: revision mismatches between concurrent editors
//! - **Configuration Errors**: malformed or out-of-range engine configuration
//!
//! Two conditions the engine handles are deliberately *not* errors. A drag that would
//! shrink a segment below the minimum width is clamped, and a degenerate allocation
//! (zero total weight or an empty span) falls back to an equal split or zero durations.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use timeshare::AllocationError;
//!
//! let error = AllocationError::persistence_failed("segment s-1", "connection reset");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::fmt;
use thiserror::Error;

/// Result type alias for allocation operations.
pub type Result<T, E = AllocationError> = std::result::Result<T, E>;

/// Main error type for allocation operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AllocationError {
    #[error("Invalid boundary: {reason}")]
    InvalidBoundary { reason: String },

    #[error("A timeline must keep at least one segment")]
    EmptyTimeline,

    #[error("Segment '{id}' not found in timeline")]
    SegmentNotFound { id: String },

    #[error("Segment index {index} out of range for {len} segments")]
    SegmentIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid segment weight {weight}: weights must be positive and finite")]
    InvalidWeight { weight: f64 },

    #[error("No timeline found for owner '{owner}'")]
    NotFound { owner: String },

    #[error("Failed to persist {target}: {reason}")]
    Persistence {
        target: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Commit incomplete: {} write(s) failed, {succeeded} succeeded", .failures.len())]
    CommitFailed { failures: Vec<WriteFailure>, succeeded: usize },

    #[error("Timeline revision conflict: expected {expected}, found {found}")]
    RevisionConflict { expected: u64, found: u64 },

    #[error("Invariant {invariant} violated: {details}")]
    InvariantViolated { invariant: u8, details: String },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },
}

/// What a failed commit write was targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteTarget {
    /// The timeline's global start/end boundary.
    Boundary { timeline_id: String },
    /// Partial update of an existing segment.
    Segment { segment_id: String },
    /// Creation of a segment added in the draft.
    Create { segment_id: String },
    /// Deletion of a segment removed from the draft.
    Delete { segment_id: String },
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Boundary { timeline_id } => write!(f, "timeline {} boundary", timeline_id),
            WriteTarget::Segment { segment_id } => write!(f, "segment {}", segment_id),
            WriteTarget::Create { segment_id } => write!(f, "new segment {}", segment_id),
            WriteTarget::Delete { segment_id } => write!(f, "removal of segment {}", segment_id),
        }
    }
}

/// One write that failed during a commit.
#[derive(Debug)]
pub struct WriteFailure {
    pub target: WriteTarget,
    pub error: AllocationError,
}

impl fmt::Display for WriteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

impl AllocationError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AllocationError::Persistence { .. } => true,
            AllocationError::CommitFailed { .. } => true,
            AllocationError::InvalidBoundary { .. } => false,
            AllocationError::EmptyTimeline => false,
            AllocationError::SegmentNotFound { .. } => false,
            AllocationError::SegmentIndexOutOfRange { .. } => false,
            AllocationError::InvalidWeight { .. } => false,
            AllocationError::NotFound { .. } => false,
            AllocationError::RevisionConflict { .. } => false,
            AllocationError::InvariantViolated { .. } => false,
            AllocationError::Config { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            AllocationError::InvalidBoundary { .. } => vec![
                "Pick an end time after the start time",
                "Keep every session at least one minute long",
            ],
            AllocationError::EmptyTimeline => vec![
                "Add another session before removing this one",
                "Delete the whole timeline instead",
            ],
            AllocationError::SegmentNotFound { .. } => vec![
                "Reload the timeline to pick up concurrent changes",
                "Check the session identifier",
            ],
            AllocationError::SegmentIndexOutOfRange { .. } => vec![
                "Use a handle index between 0 and the segment count minus two",
                "Refresh the presentation layer after structural edits",
            ],
            AllocationError::InvalidWeight { .. } => vec![
                "Use a positive, finite weight",
                "Use a difficulty default weight",
            ],
            AllocationError::NotFound { .. } => vec![
                "Check the owner identifier",
                "Create the timeline before opening a session on it",
            ],
            AllocationError::Persistence { .. } => vec![
                "Retry the commit; writes are idempotent",
                "Check connectivity to the persistence backend",
            ],
            AllocationError::CommitFailed { .. } => vec![
                "Retry the commit; only outstanding writes are re-sent",
                "Inspect individual write failures",
                "Keep the draft open so no edits are lost",
            ],
            AllocationError::RevisionConflict { .. } => vec![
                "Another editor committed first; discard and reload",
                "Re-apply your edits on the reloaded timeline",
            ],
            AllocationError::InvariantViolated { .. } => vec![
                "Discard the draft and reload the timeline",
                "Report the sequence of edits that led here",
            ],
            AllocationError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Keep the minimum segment percent between 1 and 49",
                "Use positive difficulty weights",
            ],
        }
    }

    /// Helper constructor for rejected boundary edits.
    pub fn invalid_boundary(reason: impl Into<String>) -> Self {
        AllocationError::InvalidBoundary { reason: reason.into() }
    }

    /// Helper constructor for unknown segment ids.
    pub fn segment_not_found(id: impl fmt::Display) -> Self {
        AllocationError::SegmentNotFound { id: id.to_string() }
    }

    /// Helper constructor for failed persistence writes.
    pub fn persistence_failed(target: impl Into<String>, reason: impl Into<String>) -> Self {
        AllocationError::Persistence { target: target.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for failed persistence writes with an underlying cause.
    pub fn persistence_failed_with_source(
        target: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        AllocationError::Persistence {
            target: target.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        AllocationError::Config { context: context.into(), details: details.into() }
    }

    /// Helper constructor for invariant violations.
    pub fn invariant_violated(invariant: u8, details: impl Into<String>) -> Self {
        AllocationError::InvariantViolated { invariant, details: details.into() }
    }
}

impl From<serde_yaml_ng::Error> for AllocationError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        AllocationError::Config { context: "YAML deserialization".to_string(), details: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_carry_their_context(
            reason in ".*",
            id in "[a-z0-9-]{1,16}",
            index in 0usize..64,
            len in 0usize..64,
            expected in 0u64..1000,
            found in 0u64..1000,
          ) {
            let boundary = AllocationError::invalid_boundary(reason.clone());
            prop_assert!(boundary.to_string().contains(&reason));

            let missing = AllocationError::segment_not_found(&id);
            prop_assert!(missing.to_string().contains(&id));

            let range = AllocationError::SegmentIndexOutOfRange { index, len };
            prop_assert!(range.to_string().contains(&index.to_string()));
            prop_assert!(range.to_string().contains(&len.to_string()));

            let conflict = AllocationError::RevisionConflict { expected, found };
            let msg = conflict.to_string();
            prop_assert!(msg.contains(&expected.to_string()));
            prop_assert!(msg.contains(&found.to_string()));
          }

          #[test]
          fn commit_failure_counts_every_write(
            failed in 1usize..8,
            succeeded in 0usize..8,
          ) {
            let failures = (0..failed)
              .map(|i| WriteFailure {
                target: WriteTarget::Segment { segment_id: format!("s-{}", i) },
                error: AllocationError::persistence_failed(format!("s-{}", i), "down"),
              })
              .collect();
            let error = AllocationError::CommitFailed { failures, succeeded };
            let msg = error.to_string();
            let expected_failed = format!("{} write(s) failed", failed);
            let expected_succeeded = format!("{} succeeded", succeeded);
            prop_assert!(msg.contains(&expected_failed));
            prop_assert!(msg.contains(&expected_succeeded));
            prop_assert!(error.is_retryable());
          }
        }
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<AllocationError>();

        let error = AllocationError::EmptyTimeline;
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn retry_classification() {
        assert!(AllocationError::persistence_failed("segment a", "timeout").is_retryable());
        assert!(!AllocationError::EmptyTimeline.is_retryable());
        assert!(!AllocationError::invalid_boundary("end before start").is_retryable());
        assert!(!AllocationError::RevisionConflict { expected: 1, found: 2 }.is_retryable());
    }

    #[test]
    fn recovery_suggestions_are_descriptive() {
        let errors = [
            AllocationError::EmptyTimeline,
            AllocationError::invalid_boundary("x"),
            AllocationError::InvalidWeight { weight: -1.0 },
            AllocationError::config_error("file", "bad"),
            AllocationError::CommitFailed { failures: Vec::new(), succeeded: 0 },
        ];

        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn persistence_source_is_chained() {
        let io = std::io::Error::other("socket closed");
        let error = AllocationError::persistence_failed_with_source("segment a", "write", Box::new(io));
        let source = std::error::Error::source(&error).expect("source should be preserved");
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn write_failure_display_names_target() {
        let failure = WriteFailure {
            target: WriteTarget::Boundary { timeline_id: "t-1".to_string() },
            error: AllocationError::persistence_failed("timeline t-1", "rejected"),
        };
        let text = failure.to_string();
        assert!(text.contains("timeline t-1 boundary"));
        assert!(text.contains("rejected"));
    }
}

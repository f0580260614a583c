//! Weight-based time allocation for project timelines.
//!
//! Timeshare divides a project's time span between its sessions by relative
//! weight. Weights are the source of truth: every session's duration, dates and
//! display percentage are derived from them, so the allocation always covers the
//! whole span with no gaps or overlaps, and percentages always sum to 100.
//!
//! # Features
//!
//! - **Drag renegotiation**: move the handle between two sessions and only those
//!   two trade time, with no drift over a long gesture
//! - **Boundary edits**: type a new start or end date and the weights follow
//! - **Draft sessions**: edit freely, commit the diff, discard to reload
//! - **Pluggable storage**: any [`TimelineStore`] backend, with an in-memory one
//!   included
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use timeshare::{EngineConfig, MemoryStore, Timeline, TimelineSession};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> timeshare::Result<()> {
//!     let start = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
//!     let end = Utc.with_ymd_and_hms(2025, 3, 3, 14, 0, 0).unwrap();
//!
//!     let store = MemoryStore::new();
//!     store.insert(Timeline::from_weights("plan", "project-1", start, end, &[60.0, 100.0, 140.0]));
//!
//!     let mut session = TimelineSession::open(store, "project-1", EngineConfig::default()).await?;
//!     assert_eq!(session.view().percentages(), vec![20, 33, 47]);
//!
//!     session.apply_drag(0, 0.10)?;
//!     session.end_drag();
//!     assert_eq!(session.view().percentages(), vec![10, 43, 47]);
//!
//!     session.commit().await?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Allocation engine
pub mod allocation;
pub mod boundary;
pub mod config;
pub mod drag;

// Draft editing and persistence
pub mod commit;
pub mod session;
pub mod store;
pub mod stores;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

// Engine exports
pub use allocation::{Allocation, Degeneracy, Slot, allocate, apportion, check_invariants, percentages};
pub use boundary::{BoundaryEdit, propagate};
pub use config::{DifficultyWeights, EngineConfig};
pub use drag::{DragOutcome, DragSnapshot, renegotiate};

// Session exports
pub use commit::{CommitPlan, CommitReport};
pub use session::TimelineSession;
pub use store::{BoundaryPatch, NewSegment, SegmentPatch, TimelineStore};
pub use stores::{MemoryStore, WriteRecord};
pub use stream::{Coalesce, CoalesceExt};

//! Core types for timeline allocation.
//!
//! ## Model
//!
//! - [`Timeline`] is the bounded interval being divided, with an ordered, non-empty
//!   list of [`Segment`]s
//! - [`Segment::weight`] is the only canonical proportion; durations, dates and
//!   percentages are projections of the weights over the timeline's span
//! - [`TimelineView`] is the read-only snapshot handed to presentation layers, with
//!   reconciled display percentages
//!
//! ## Usage Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use timeshare::types::Timeline;
//!
//! let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap();
//! let timeline = Timeline::from_weights("tl-1", "project-1", start, end, &[60.0, 100.0, 140.0]);
//!
//! let allocation = timeline.allocation();
//! assert_eq!(allocation.percentages(), vec![20, 33, 47]);
//! assert_eq!(timeline.segments[2].end_at, end);
//! ```

mod difficulty;
mod ids;
mod timeline;
mod view;

pub use difficulty::Difficulty;
pub use ids::{OwnerId, SegmentId, TimelineId};
pub use timeline::{Segment, Timeline};
pub use view::{AllocatedSegment, BoundaryField, SessionState, TimelineView};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{at, minutes_after};

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_view_projection_mirrors_segments(
            weights in prop::collection::vec(1.0f64..500.0, 1..12),
            span in 0i64..10_000,
        ) {
            let start = at(2025, 1, 6, 8, 0);
            let timeline = Timeline::from_weights("tl", "owner", start, minutes_after(start, span), &weights);
            let allocation = timeline.allocation();
            let view = TimelineView::project(&timeline, &allocation, SessionState::Clean);

            prop_assert_eq!(view.segments.len(), timeline.segments.len());
            prop_assert_eq!(view.weights(), weights);
            prop_assert_eq!(view.durations().iter().sum::<i64>(), span);
            prop_assert_eq!(view.percentages().iter().sum::<u32>(), 100);
            for (segment, projected) in timeline.segments.iter().zip(&view.segments) {
                prop_assert_eq!(&segment.id, &projected.id);
                prop_assert_eq!(segment.start_at, projected.start_at);
                prop_assert_eq!(segment.end_at, projected.end_at);
            }
        }
    }

    #[test]
    fn difficulty_levels_are_ordered() {
        assert_eq!(Difficulty::ALL, [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard]);
        assert_eq!(Difficulty::default(), Difficulty::Medium);
    }
}

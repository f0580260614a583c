//! Timeline and segment records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OwnerId, SegmentId, TimelineId};
use crate::allocation::{self, Allocation};

/// One weighted sub-interval of a timeline.
///
/// `weight` is the only canonical field. `duration_minutes`, `start_at` and `end_at`
/// are materialized from the weights whenever the owning timeline is re-derived, and
/// are carried here because the persistence layer stores them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: SegmentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub weight: f64,
    #[serde(default)]
    pub duration_minutes: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl Segment {
    /// Create a segment with the given weight. Derived fields are filled in by
    /// [`Timeline::rederive`].
    pub fn new(id: SegmentId, weight: f64, anchor: DateTime<Utc>) -> Self {
        Self { id, title: None, weight, duration_minutes: 0, start_at: anchor, end_at: anchor }
    }

    /// Attach a display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A bounded interval divided into an ordered sequence of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: TimelineId,
    pub owner: OwnerId,
    /// Optimistic-concurrency token, advanced on every successful commit.
    #[serde(default)]
    pub revision: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub segments: Vec<Segment>,
}

impl Timeline {
    /// Build a timeline from weights alone and derive every segment's dates.
    pub fn from_weights(
        id: impl Into<TimelineId>,
        owner: impl Into<OwnerId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        weights: &[f64],
    ) -> Self {
        let segments = weights
            .iter()
            .map(|&weight| Segment::new(SegmentId::generate(), weight, start))
            .collect();
        let mut timeline =
            Self { id: id.into(), owner: owner.into(), revision: 0, start, end, segments };
        timeline.rederive();
        timeline
    }

    /// Whole minutes between the timeline's start and end.
    pub fn span_minutes(&self) -> i64 {
        allocation::minutes_between(self.start, self.end)
    }

    /// Segment weights in allocation order.
    pub fn weights(&self) -> Vec<f64> {
        self.segments.iter().map(|segment| segment.weight).collect()
    }

    /// Sum of all segment weights.
    pub fn total_weight(&self) -> f64 {
        self.segments.iter().map(|segment| segment.weight).sum()
    }

    /// Position of a segment in allocation order.
    pub fn index_of(&self, id: &SegmentId) -> Option<usize> {
        self.segments.iter().position(|segment| &segment.id == id)
    }

    /// Compute the allocation for the current weights without touching the segments.
    pub fn allocation(&self) -> Allocation {
        allocation::allocate(self.start, self.end, &self.weights())
    }

    /// Recompute durations and dates of every segment from the weights.
    ///
    /// Returns the allocation that was applied, which also carries the display
    /// percentages.
    pub fn rederive(&mut self) -> Allocation {
        let allocation = self.allocation();
        for (segment, slot) in self.segments.iter_mut().zip(&allocation.slots) {
            segment.duration_minutes = slot.duration_minutes;
            segment.start_at = slot.start_at;
            segment.end_at = slot.end_at;
        }
        allocation
    }
}

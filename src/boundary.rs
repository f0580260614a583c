//! Boundary propagation for direct edits of a segment's start or end.
//!
//! Editing a date does not move dates directly. It infers a new weight for the
//! edited segment from the duration the user asked for. For the first segment's
//! start or the last segment's end it also infers a new timeline boundary. The
//! caller then re-derives every date from the weights.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::allocation::minutes_between;
use crate::config::EngineConfig;
use crate::types::{BoundaryField, Timeline};
use crate::{AllocationError, Result};

/// Outcome of a boundary edit, ready to be applied to a draft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryEdit {
    pub index: usize,
    pub weight: f64,
    /// Timeline start after the edit.
    pub start: DateTime<Utc>,
    /// Timeline end after the edit.
    pub end: DateTime<Utc>,
    /// The edit moved the timeline's own start or end.
    pub moves_timeline: bool,
    /// Duration the edited segment was asked to have.
    pub requested_minutes: i64,
}

impl BoundaryEdit {
    /// Apply the edit to a timeline and re-derive its dates.
    pub fn apply_to(&self, timeline: &mut Timeline) {
        timeline.start = self.start;
        timeline.end = self.end;
        timeline.segments[self.index].weight = self.weight;
        timeline.rederive();
    }
}

/// Infer the new weight (and possibly timeline span) for moving `field` of the
/// segment at `index` to `timestamp`.
///
/// Rejected with [`AllocationError::InvalidBoundary`] when the edited segment would
/// have no positive duration or the timeline would shrink below the minimum span.
pub fn propagate(
    timeline: &Timeline,
    index: usize,
    field: BoundaryField,
    timestamp: DateTime<Utc>,
    config: &EngineConfig,
) -> Result<BoundaryEdit> {
    let len = timeline.segments.len();
    let segment = timeline
        .segments
        .get(index)
        .ok_or(AllocationError::SegmentIndexOutOfRange { index, len })?;

    let (segment_start, segment_end) = match field {
        BoundaryField::Start => (timestamp, segment.end_at),
        BoundaryField::End => (segment.start_at, timestamp),
    };

    let requested_minutes = minutes_between(segment_start, segment_end);
    if requested_minutes <= 0 {
        return Err(AllocationError::invalid_boundary(format!(
            "segment {} would last {} minutes",
            segment.id, requested_minutes
        )));
    }

    let moves_timeline = match field {
        BoundaryField::Start => index == 0,
        BoundaryField::End => index == len - 1,
    };

    let (start, end) = match (moves_timeline, field) {
        (true, BoundaryField::Start) => (timestamp, timeline.end),
        (true, BoundaryField::End) => (timeline.start, timestamp),
        (false, _) => (timeline.start, timeline.end),
    };

    let span_minutes = minutes_between(start, end);
    if span_minutes < config.min_span_minutes {
        return Err(AllocationError::invalid_boundary(format!(
            "timeline would span {} minutes, minimum is {}",
            span_minutes, config.min_span_minutes
        )));
    }

    let other_minutes = span_minutes - requested_minutes;
    let other_weights = timeline.total_weight() - segment.weight;
    let weight = if other_weights > 0.0 && other_minutes > 0 {
        (requested_minutes as f64 / other_minutes as f64 * other_weights).round().max(1.0)
    } else {
        segment.weight
    };

    debug!(
        segment = %segment.id,
        ?field,
        requested_minutes,
        span_minutes,
        old_weight = segment.weight,
        new_weight = weight,
        moves_timeline,
        "Propagated boundary edit"
    );

    Ok(BoundaryEdit { index, weight, start, end, moves_timeline, requested_minutes })
}

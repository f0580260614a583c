//! Store trait for the persistence collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::Result;
use crate::types::{OwnerId, Segment, SegmentId, Timeline, TimelineId};

/// Partial update of a persisted segment. Only changed fields are set.
///
/// Values are absolute, so applying the same patch twice is harmless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct SegmentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
    /// New index in allocation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl SegmentPatch {
    /// Fields that differ between the persisted and the draft version of a segment.
    pub fn between(persisted: &Segment, persisted_position: usize, draft: &Segment, draft_position: usize) -> Self {
        Self {
            weight: (persisted.weight != draft.weight).then_some(draft.weight),
            duration_minutes: (persisted.duration_minutes != draft.duration_minutes)
                .then_some(draft.duration_minutes),
            start_at: (persisted.start_at != draft.start_at).then_some(draft.start_at),
            end_at: (persisted.end_at != draft.end_at).then_some(draft.end_at),
            position: (persisted_position != draft_position).then_some(draft_position as u32),
        }
    }

    /// Every field of `segment`, used to resend a write that failed before.
    pub fn full(segment: &Segment, position: usize) -> Self {
        Self {
            weight: Some(segment.weight),
            duration_minutes: Some(segment.duration_minutes),
            start_at: Some(segment.start_at),
            end_at: Some(segment.end_at),
            position: Some(position as u32),
        }
    }

    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.weight.is_none()
            && self.duration_minutes.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
            && self.position.is_none()
    }

    /// Apply the patch to a stored segment.
    pub fn apply_to(&self, segment: &mut Segment) {
        if let Some(weight) = self.weight {
            segment.weight = weight;
        }
        if let Some(duration) = self.duration_minutes {
            segment.duration_minutes = duration;
        }
        if let Some(start_at) = self.start_at {
            segment.start_at = start_at;
        }
        if let Some(end_at) = self.end_at {
            segment.end_at = end_at;
        }
    }
}

/// Partial update of a timeline's global boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct BoundaryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<DateTime<Utc>>,
}

impl BoundaryPatch {
    /// Boundary fields that differ between two versions of a timeline.
    pub fn between(persisted: &Timeline, draft: &Timeline) -> Self {
        Self {
            start_at: (persisted.start != draft.start).then_some(draft.start),
            end_at: (persisted.end != draft.end).then_some(draft.end),
        }
    }

    /// True when the boundary did not move.
    pub fn is_empty(&self) -> bool {
        self.start_at.is_none() && self.end_at.is_none()
    }
}

/// A segment added in a draft, to be created by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct NewSegment {
    pub segment: Segment,
    pub position: u32,
}

/// Persistence collaborator for timelines.
///
/// Implementations own the authoritative copy of every timeline. The engine only
/// ever reads a whole timeline and writes partial updates back; it never assumes
/// writes within one commit are transactional.
#[async_trait::async_trait]
pub trait TimelineStore: Send + Sync + 'static {
    /// Fetch the timeline owned by `owner`, segments in allocation order.
    ///
    /// Returns:
    /// - `Ok(timeline)` - Timeline found
    /// - `Err(AllocationError::NotFound)` - Owner has no timeline
    /// - `Err(e)` - Backend failure
    async fn fetch_timeline(&self, owner: &OwnerId) -> Result<Timeline>;

    /// Apply a partial update to one segment.
    async fn persist_segment(&self, segment_id: &SegmentId, patch: SegmentPatch) -> Result<()>;

    /// Move a timeline's global start and/or end.
    async fn persist_boundary(&self, timeline_id: &TimelineId, patch: BoundaryPatch) -> Result<()>;

    /// Create a segment that was added in a draft.
    async fn create_segment(&self, timeline_id: &TimelineId, segment: NewSegment) -> Result<()>;

    /// Delete a segment that was removed from a draft.
    async fn delete_segment(&self, segment_id: &SegmentId) -> Result<()>;

    /// Claim the next revision of a timeline.
    ///
    /// Called once at the start of every commit with the revision the draft was
    /// loaded at. Stores that track revisions return
    /// [`AllocationError::RevisionConflict`](crate::AllocationError::RevisionConflict)
    /// when another editor committed in between. The default accepts every claim.
    async fn claim_revision(&self, timeline_id: &TimelineId, expected: u64) -> Result<u64> {
        let _ = timeline_id;
        Ok(expected + 1)
    }
}

#[async_trait::async_trait]
impl<S> TimelineStore for Arc<S>
where
    S: TimelineStore + ?Sized,
{
    async fn fetch_timeline(&self, owner: &OwnerId) -> Result<Timeline> {
        (**self).fetch_timeline(owner).await
    }

    async fn persist_segment(&self, segment_id: &SegmentId, patch: SegmentPatch) -> Result<()> {
        (**self).persist_segment(segment_id, patch).await
    }

    async fn persist_boundary(&self, timeline_id: &TimelineId, patch: BoundaryPatch) -> Result<()> {
        (**self).persist_boundary(timeline_id, patch).await
    }

    async fn create_segment(&self, timeline_id: &TimelineId, segment: NewSegment) -> Result<()> {
        (**self).create_segment(timeline_id, segment).await
    }

    async fn delete_segment(&self, segment_id: &SegmentId) -> Result<()> {
        (**self).delete_segment(segment_id).await
    }

    async fn claim_revision(&self, timeline_id: &TimelineId, expected: u64) -> Result<u64> {
        (**self).claim_revision(timeline_id, expected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{difficulty_timeline, minutes_after};

    #[test]
    fn patch_between_only_carries_changes() {
        let timeline = difficulty_timeline();
        let persisted = &timeline.segments[0];
        let mut draft = persisted.clone();
        draft.weight = 30.0;
        draft.end_at = minutes_after(draft.start_at, 30);

        let patch = SegmentPatch::between(persisted, 0, &draft, 0);
        assert_eq!(patch.weight, Some(30.0));
        assert_eq!(patch.end_at, Some(draft.end_at));
        assert_eq!(patch.start_at, None);
        assert_eq!(patch.duration_minutes, None);
        assert_eq!(patch.position, None);
        assert!(SegmentPatch::between(persisted, 0, persisted, 0).is_empty());
    }

    #[test]
    fn patch_serializes_without_unchanged_fields() {
        let patch = SegmentPatch { weight: Some(12.0), position: Some(2), ..SegmentPatch::default() };
        let yaml = serde_yaml_ng::to_string(&patch).unwrap();
        assert!(yaml.contains("weight: 12"));
        assert!(yaml.contains("position: 2"));
        assert!(!yaml.contains("startAt"));
    }

    #[test]
    fn boundary_patch_detects_moves() {
        let persisted = difficulty_timeline();
        let mut draft = persisted.clone();
        assert!(BoundaryPatch::between(&persisted, &draft).is_empty());

        draft.end = minutes_after(draft.end, 15);
        let patch = BoundaryPatch::between(&persisted, &draft);
        assert_eq!(patch.start_at, None);
        assert_eq!(patch.end_at, Some(draft.end));
    }

    #[test]
    fn full_patch_applies_every_field() {
        let timeline = difficulty_timeline();
        let source = &timeline.segments[2];
        let mut target = timeline.segments[0].clone();
        SegmentPatch::full(source, 2).apply_to(&mut target);
        assert_eq!(target.weight, source.weight);
        assert_eq!(target.start_at, source.start_at);
        assert_eq!(target.end_at, source.end_at);
        assert_eq!(target.duration_minutes, source.duration_minutes);
    }
}

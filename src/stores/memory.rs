//! In-process store for tests and embedders without a backend

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

use crate::store::{BoundaryPatch, NewSegment, SegmentPatch, TimelineStore};
use crate::types::{OwnerId, Segment, SegmentId, Timeline, TimelineId};
use crate::{AllocationError, Result, WriteTarget};

/// One write the store accepted, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    Claim { timeline_id: TimelineId, revision: u64 },
    Boundary { timeline_id: TimelineId, patch: BoundaryPatch },
    Segment { segment_id: SegmentId, patch: SegmentPatch },
    Create { timeline_id: TimelineId, segment_id: SegmentId, position: u32 },
    Delete { segment_id: SegmentId },
}

#[derive(Debug, Clone)]
struct StoredSegment {
    segment: Segment,
    position: u32,
}

#[derive(Debug, Clone)]
struct StoredTimeline {
    header: Timeline,
    segments: Vec<StoredSegment>,
}

impl StoredTimeline {
    fn from_timeline(mut timeline: Timeline) -> Self {
        let segments = std::mem::take(&mut timeline.segments)
            .into_iter()
            .enumerate()
            .map(|(position, segment)| StoredSegment { segment, position: position as u32 })
            .collect();
        Self { header: timeline, segments }
    }

    fn to_timeline(&self) -> Timeline {
        let mut ordered: Vec<&StoredSegment> = self.segments.iter().collect();
        ordered.sort_by_key(|stored| stored.position);
        let mut timeline = self.header.clone();
        timeline.segments = ordered.into_iter().map(|stored| stored.segment.clone()).collect();
        timeline
    }
}

#[derive(Debug, Default)]
struct Inner {
    timelines: BTreeMap<TimelineId, StoredTimeline>,
    owners: HashMap<OwnerId, TimelineId>,
    failures: Vec<(WriteTarget, usize)>,
    journal: Vec<WriteRecord>,
}

impl Inner {
    /// Consume one injected failure for `target`, if any is armed.
    fn take_failure(&mut self, target: &WriteTarget) -> bool {
        let Some(slot) = self.failures.iter_mut().find(|(armed, left)| armed == target && *left > 0) else {
            return false;
        };
        slot.1 -= 1;
        true
    }

    fn timeline_mut(&mut self, timeline_id: &TimelineId) -> Result<&mut StoredTimeline> {
        self.timelines.get_mut(timeline_id).ok_or_else(|| {
            AllocationError::persistence_failed(format!("timeline {}", timeline_id), "unknown timeline")
        })
    }

    fn segment_mut(&mut self, segment_id: &SegmentId) -> Option<&mut StoredSegment> {
        self.timelines
            .values_mut()
            .flat_map(|timeline| timeline.segments.iter_mut())
            .find(|stored| &stored.segment.id == segment_id)
    }
}

/// `TimelineStore` kept entirely in memory.
///
/// Tracks revisions for optimistic concurrency, journals every accepted write and
/// can be told to fail specific writes a number of times.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every write by `latency` to exercise concurrent commits.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    /// Insert or replace a timeline.
    pub fn insert(&self, timeline: Timeline) {
        let mut inner = self.lock();
        debug!(timeline = %timeline.id, owner = %timeline.owner, "Storing timeline");
        inner.owners.insert(timeline.owner.clone(), timeline.id.clone());
        inner.timelines.insert(timeline.id.clone(), StoredTimeline::from_timeline(timeline));
    }

    /// Current persisted state of a timeline.
    pub fn timeline(&self, timeline_id: &TimelineId) -> Option<Timeline> {
        self.lock().timelines.get(timeline_id).map(StoredTimeline::to_timeline)
    }

    /// Make the next `times` writes to `target` fail.
    pub fn fail_writes(&self, target: WriteTarget, times: usize) {
        self.lock().failures.push((target, times));
    }

    /// Every write accepted so far, in arrival order.
    pub fn journal(&self) -> Vec<WriteRecord> {
        self.lock().journal.clone()
    }

    /// Forget the journal.
    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Advance a timeline's revision as if another editor had committed.
    pub fn bump_revision(&self, timeline_id: &TimelineId) {
        if let Some(stored) = self.lock().timelines.get_mut(timeline_id) {
            stored.header.revision += 1;
        }
    }
}

fn injected(target: &WriteTarget) -> AllocationError {
    AllocationError::persistence_failed(target.to_string(), "injected failure")
}

#[async_trait::async_trait]
impl TimelineStore for MemoryStore {
    async fn fetch_timeline(&self, owner: &OwnerId) -> Result<Timeline> {
        let inner = self.lock();
        let timeline = inner
            .owners
            .get(owner)
            .and_then(|timeline_id| inner.timelines.get(timeline_id))
            .map(StoredTimeline::to_timeline)
            .ok_or_else(|| AllocationError::NotFound { owner: owner.to_string() })?;
        trace!(owner = %owner, segments = timeline.segments.len(), "Fetched timeline");
        Ok(timeline)
    }

    async fn persist_segment(&self, segment_id: &SegmentId, patch: SegmentPatch) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        let target = WriteTarget::Segment { segment_id: segment_id.to_string() };
        if inner.take_failure(&target) {
            return Err(injected(&target));
        }

        let stored = inner
            .segment_mut(segment_id)
            .ok_or_else(|| AllocationError::persistence_failed(target.to_string(), "unknown segment"))?;
        patch.apply_to(&mut stored.segment);
        if let Some(position) = patch.position {
            stored.position = position;
        }

        inner.journal.push(WriteRecord::Segment { segment_id: segment_id.clone(), patch });
        Ok(())
    }

    async fn persist_boundary(&self, timeline_id: &TimelineId, patch: BoundaryPatch) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        let target = WriteTarget::Boundary { timeline_id: timeline_id.to_string() };
        if inner.take_failure(&target) {
            return Err(injected(&target));
        }

        let stored = inner.timeline_mut(timeline_id)?;
        if let Some(start) = patch.start_at {
            stored.header.start = start;
        }
        if let Some(end) = patch.end_at {
            stored.header.end = end;
        }

        inner.journal.push(WriteRecord::Boundary { timeline_id: timeline_id.clone(), patch });
        Ok(())
    }

    async fn create_segment(&self, timeline_id: &TimelineId, new_segment: NewSegment) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        let target = WriteTarget::Create { segment_id: new_segment.segment.id.to_string() };
        if inner.take_failure(&target) {
            return Err(injected(&target));
        }

        let segment_id = new_segment.segment.id.clone();
        let position = new_segment.position;
        let stored = inner.timeline_mut(timeline_id)?;
        match stored.segments.iter_mut().find(|s| s.segment.id == segment_id) {
            Some(existing) => {
                existing.segment = new_segment.segment;
                existing.position = position;
            }
            None => stored.segments.push(StoredSegment { segment: new_segment.segment, position }),
        }

        inner.journal.push(WriteRecord::Create { timeline_id: timeline_id.clone(), segment_id, position });
        Ok(())
    }

    async fn delete_segment(&self, segment_id: &SegmentId) -> Result<()> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        let target = WriteTarget::Delete { segment_id: segment_id.to_string() };
        if inner.take_failure(&target) {
            return Err(injected(&target));
        }

        for stored in inner.timelines.values_mut() {
            stored.segments.retain(|s| &s.segment.id != segment_id);
        }

        inner.journal.push(WriteRecord::Delete { segment_id: segment_id.clone() });
        Ok(())
    }

    async fn claim_revision(&self, timeline_id: &TimelineId, expected: u64) -> Result<u64> {
        let mut inner = self.lock();
        let stored = inner.timeline_mut(timeline_id)?;
        let found = stored.header.revision;
        if found != expected {
            return Err(AllocationError::RevisionConflict { expected, found });
        }

        stored.header.revision += 1;
        let revision = stored.header.revision;
        inner.journal.push(WriteRecord::Claim { timeline_id: timeline_id.clone(), revision });
        Ok(revision)
    }
}

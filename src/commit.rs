//! Commit planning and execution
//!
//! A commit is the diff between the baseline (the state the store last
//! acknowledged) and the draft. Writes are not transactional. The boundary write
//! goes first and is awaited, because segment dates only make sense against an
//! accepted boundary. Segment creates, updates and deletes then run concurrently.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::store::{BoundaryPatch, NewSegment, SegmentPatch, TimelineStore};
use crate::types::{SegmentId, Timeline};
use crate::{Result, WriteFailure, WriteTarget};

/// Writes needed to bring the store in line with a draft.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    pub boundary: Option<BoundaryPatch>,
    pub creates: Vec<NewSegment>,
    pub updates: Vec<(SegmentId, SegmentPatch)>,
    pub deletes: Vec<SegmentId>,
}

impl CommitPlan {
    /// Diff `draft` against `baseline`.
    ///
    /// Segments in `stale` had a write fail earlier and are resent in full.
    pub fn diff(baseline: &Timeline, draft: &Timeline, stale: &BTreeSet<SegmentId>) -> Self {
        let boundary = BoundaryPatch::between(baseline, draft);
        let persisted: HashMap<&SegmentId, (usize, &crate::types::Segment)> = baseline
            .segments
            .iter()
            .enumerate()
            .map(|(position, segment)| (&segment.id, (position, segment)))
            .collect();

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        for (position, segment) in draft.segments.iter().enumerate() {
            match persisted.get(&segment.id) {
                None => creates.push(NewSegment { segment: segment.clone(), position: position as u32 }),
                Some(_) if stale.contains(&segment.id) => {
                    updates.push((segment.id.clone(), SegmentPatch::full(segment, position)));
                }
                Some((old_position, old)) => {
                    let patch = SegmentPatch::between(old, *old_position, segment, position);
                    if !patch.is_empty() {
                        updates.push((segment.id.clone(), patch));
                    }
                }
            }
        }

        let deletes = baseline
            .segments
            .iter()
            .filter(|segment| draft.index_of(&segment.id).is_none())
            .map(|segment| segment.id.clone())
            .collect();

        Self {
            boundary: (!boundary.is_empty()).then_some(boundary),
            creates,
            updates,
            deletes,
        }
    }

    /// True when the draft matches the baseline.
    pub fn is_empty(&self) -> bool {
        self.boundary.is_none() && self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of store writes the plan issues.
    pub fn write_count(&self) -> usize {
        usize::from(self.boundary.is_some()) + self.creates.len() + self.updates.len() + self.deletes.len()
    }
}

/// Summary of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReport {
    /// Revision the timeline is at after the commit.
    pub revision: u64,
    pub boundary_written: bool,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl CommitReport {
    /// Total number of writes issued.
    pub fn writes(&self) -> usize {
        usize::from(self.boundary_written) + self.created + self.updated + self.deleted
    }
}

/// Per-write results of executing a plan, in issue order.
#[derive(Debug, Default)]
pub(crate) struct Execution {
    pub succeeded: Vec<WriteTarget>,
    pub failures: Vec<WriteFailure>,
}

impl Execution {
    fn record(&mut self, target: WriteTarget, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded.push(target),
            Err(error) => {
                warn!("Write to {} failed: {}", target, error);
                self.failures.push(WriteFailure { target, error });
            }
        }
    }

    /// Targets that failed, for reverting the baseline.
    pub fn failed_targets(&self) -> impl Iterator<Item = &WriteTarget> {
        self.failures.iter().map(|failure| &failure.target)
    }
}

/// Issue every write in `plan` against `store`.
pub(crate) async fn execute<S>(store: &S, timeline: &Timeline, plan: &CommitPlan) -> Execution
where
    S: TimelineStore + ?Sized,
{
    let mut execution = Execution::default();

    if let Some(patch) = &plan.boundary {
        let target = WriteTarget::Boundary { timeline_id: timeline.id.to_string() };
        let result = store.persist_boundary(&timeline.id, patch.clone()).await;
        let failed = result.is_err();
        execution.record(target, result);
        if failed {
            debug!("Boundary write failed, skipping {} segment writes", plan.write_count() - 1);
            return execution;
        }
    }

    let mut writes: Vec<BoxFuture<'_, (WriteTarget, Result<()>)>> = Vec::with_capacity(plan.write_count());

    for new_segment in &plan.creates {
        let target = WriteTarget::Create { segment_id: new_segment.segment.id.to_string() };
        writes.push(
            async move { (target, store.create_segment(&timeline.id, new_segment.clone()).await) }.boxed(),
        );
    }

    for (segment_id, patch) in &plan.updates {
        let target = WriteTarget::Segment { segment_id: segment_id.to_string() };
        writes.push(async move { (target, store.persist_segment(segment_id, patch.clone()).await) }.boxed());
    }

    for segment_id in &plan.deletes {
        let target = WriteTarget::Delete { segment_id: segment_id.to_string() };
        writes.push(async move { (target, store.delete_segment(segment_id).await) }.boxed());
    }

    for (target, result) in join_all(writes).await {
        execution.record(target, result);
    }

    execution
}

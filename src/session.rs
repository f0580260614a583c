//! Timeline session: the stateful owner of a draft timeline.
//!
//! A session loads one timeline from a [`TimelineStore`] and keeps two copies of
//! it. The **baseline** is what the store last acknowledged; the **draft** is what
//! the user is editing. Every mutation runs synchronously against the draft,
//! re-derives dates and percentages, validates the invariants and publishes a
//! fresh [`TimelineView`] to subscribers. Only [`TimelineSession::commit`],
//! [`TimelineSession::load`] and [`TimelineSession::discard`] touch the store.
//!
//! ```text
//!            load / discard / commit ok
//!        ┌──────────────────────────────┐
//!        ▼                              │
//!     Clean ── drag / edit / add / ──► Dirty ──┐
//!                 remove                 ▲     │ commit failed
//!                                        └─────┘
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, trace, warn};

use crate::allocation::{Allocation, check_invariants};
use crate::boundary::{self, BoundaryEdit};
use crate::commit::{self, CommitPlan, CommitReport};
use crate::config::EngineConfig;
use crate::drag::{DragOutcome, DragSnapshot, renegotiate};
use crate::store::TimelineStore;
use crate::stream::{Coalesce, CoalesceExt};
use crate::types::{
    BoundaryField, Difficulty, OwnerId, Segment, SegmentId, SessionState, Timeline, TimelineView,
};
use crate::{AllocationError, Result, WriteTarget};

/// An in-progress drag gesture.
#[derive(Debug, Clone)]
struct DragGesture {
    snapshot: DragSnapshot,
    state_before: SessionState,
    last: Option<DragOutcome>,
}

/// Editing session over one timeline.
pub struct TimelineSession<S: TimelineStore> {
    store: S,
    owner: OwnerId,
    config: EngineConfig,
    baseline: Timeline,
    draft: Timeline,
    allocation: Allocation,
    state: SessionState,
    drag: Option<DragGesture>,
    /// Segments whose last write failed; resent in full on the next commit.
    stale: BTreeSet<SegmentId>,
    updates: watch::Sender<Arc<TimelineView>>,
}

impl<S: TimelineStore> TimelineSession<S> {
    /// Fetch the timeline owned by `owner` and open a clean session on it.
    pub async fn open(store: S, owner: impl Into<OwnerId>, config: EngineConfig) -> Result<Self> {
        let owner = owner.into();
        config.validate()?;
        info!(owner = %owner, "Opening timeline session");

        let timeline = store.fetch_timeline(&owner).await?;
        Self::from_timeline(store, timeline, config)
    }

    /// Open a clean session on a timeline the caller already fetched.
    pub fn from_timeline(store: S, timeline: Timeline, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let (draft, allocation) = prepare(timeline.clone(), &config)?;
        let view = TimelineView::project(&draft, &allocation, SessionState::Clean);
        let (updates, _) = watch::channel(Arc::new(view));

        info!(
            "Session ready: timeline {} with {} segments over {} minutes",
            draft.id,
            draft.segments.len(),
            draft.span_minutes()
        );

        Ok(Self {
            store,
            owner: timeline.owner.clone(),
            config,
            baseline: timeline,
            draft,
            allocation,
            state: SessionState::Clean,
            drag: None,
            stale: BTreeSet::new(),
            updates,
        })
    }

    /// Replace the draft with a fresh copy from the store.
    pub async fn load(&mut self) -> Result<()> {
        let timeline = self.store.fetch_timeline(&self.owner).await?;
        self.load_timeline(timeline)
    }

    /// Replace the draft with `timeline`, treating it as the authoritative state.
    pub fn load_timeline(&mut self, timeline: Timeline) -> Result<()> {
        let (draft, allocation) = prepare(timeline.clone(), &self.config)?;
        info!(timeline = %draft.id, revision = draft.revision, "Loaded timeline");

        self.owner = timeline.owner.clone();
        self.baseline = timeline;
        self.draft = draft;
        self.allocation = allocation;
        self.state = SessionState::Clean;
        self.drag = None;
        self.stale.clear();
        self.publish();
        Ok(())
    }

    /// Throw away uncommitted edits and reload from the store.
    pub async fn discard(&mut self) -> Result<()> {
        if self.state == SessionState::Dirty {
            debug!(timeline = %self.draft.id, "Discarding draft edits");
        }
        self.load().await
    }

    /// Start a drag gesture on the handle between `handle` and `handle + 1`.
    ///
    /// Optional: [`apply_drag`](Self::apply_drag) starts a gesture on its own.
    pub fn begin_drag(&mut self, handle: usize) -> Result<()> {
        match self.drag.as_ref().map(|gesture| gesture.snapshot.handle) {
            Some(current) if current == handle => return Ok(()),
            Some(_) => {
                self.end_drag();
            }
            None => {}
        }

        let snapshot = DragSnapshot::capture(&self.draft.weights(), handle)?;
        trace!(handle, combined = snapshot.combined_percentage(), "Drag started");
        self.drag = Some(DragGesture { snapshot, state_before: self.state, last: None });
        Ok(())
    }

    /// Move the handle after segment `handle` to `pointer_fraction` of the track.
    ///
    /// Called on every pointer move. Always computed from the weights captured when
    /// the gesture started, so repeated calls with the same position are stable.
    pub fn apply_drag(&mut self, handle: usize, pointer_fraction: f64) -> Result<DragOutcome> {
        self.begin_drag(handle)?;
        let len = self.draft.segments.len();
        let gesture = self.drag.as_mut().ok_or(AllocationError::SegmentIndexOutOfRange { index: handle, len })?;

        let outcome = renegotiate(&gesture.snapshot, pointer_fraction, &self.config);
        gesture.last = Some(outcome);
        if !outcome.applied {
            return Ok(outcome);
        }

        let weights = gesture.snapshot.weights_with(outcome.left_weight, outcome.right_weight);
        let mut candidate = self.draft.clone();
        for (segment, weight) in candidate.segments.iter_mut().zip(weights) {
            segment.weight = weight;
        }
        self.replace_draft(candidate)?;
        Ok(outcome)
    }

    /// Finish the current drag gesture, keeping its last computed weights.
    pub fn end_drag(&mut self) -> Option<DragOutcome> {
        let gesture = self.drag.take()?;
        debug!(
            handle = gesture.snapshot.handle,
            target_percentage = ?gesture.last.map(|outcome| outcome.target_percentage),
            "Drag finished"
        );
        gesture.last
    }

    /// Abandon the current drag gesture and restore the weights it started from.
    pub fn cancel_drag(&mut self) {
        let Some(gesture) = self.drag.take() else {
            return;
        };

        for (segment, weight) in self.draft.segments.iter_mut().zip(&gesture.snapshot.weights) {
            segment.weight = *weight;
        }
        self.allocation = self.draft.rederive();
        self.state = gesture.state_before;
        debug!(handle = gesture.snapshot.handle, "Drag cancelled");
        self.publish();
    }

    /// Move the start or end of a segment to `timestamp`.
    ///
    /// The draft is left untouched when the edit is rejected.
    pub fn apply_boundary_edit(
        &mut self,
        segment_id: &SegmentId,
        field: BoundaryField,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<BoundaryEdit> {
        self.end_drag();
        let index = self.index_of(segment_id)?;
        let edit = boundary::propagate(&self.draft, index, field, timestamp, &self.config)?;

        let mut candidate = self.draft.clone();
        edit.apply_to(&mut candidate);
        self.replace_draft(candidate)?;
        Ok(edit)
    }

    /// Append a segment with `weight` to the end of the timeline.
    pub fn add_segment(&mut self, weight: f64) -> Result<SegmentId> {
        if !(weight.is_finite() && weight > 0.0) {
            return Err(AllocationError::InvalidWeight { weight });
        }
        self.end_drag();

        let id = SegmentId::generate();
        let mut candidate = self.draft.clone();
        candidate.segments.push(Segment::new(id.clone(), weight, candidate.end));
        self.replace_draft(candidate)?;
        debug!(segment = %id, weight, "Segment added");
        Ok(id)
    }

    /// Append a segment weighted by the configured default for `difficulty`.
    pub fn add_segment_with_difficulty(&mut self, difficulty: Difficulty) -> Result<SegmentId> {
        self.add_segment(self.config.default_weight(difficulty))
    }

    /// Remove a segment; the rest keep their ratios over the unchanged span.
    pub fn remove_segment(&mut self, segment_id: &SegmentId) -> Result<Segment> {
        let index = self.index_of(segment_id)?;
        if self.draft.segments.len() == 1 {
            return Err(AllocationError::EmptyTimeline);
        }
        self.end_drag();

        let mut candidate = self.draft.clone();
        let removed = candidate.segments.remove(index);
        self.replace_draft(candidate)?;
        debug!(segment = %removed.id, "Segment removed");
        Ok(removed)
    }

    /// Persist the draft.
    ///
    /// On success the draft becomes the new baseline and the session is clean. If
    /// any write fails the session stays dirty and the error lists every failure.
    /// Writes that did succeed are kept, so calling `commit` again only resends
    /// what is still outstanding.
    pub async fn commit(&mut self) -> Result<CommitReport> {
        self.end_drag();
        let plan = CommitPlan::diff(&self.baseline, &self.draft, &self.stale);
        if plan.is_empty() {
            debug!(timeline = %self.draft.id, "Nothing to commit");
            self.state = SessionState::Clean;
            self.publish();
            return Ok(CommitReport { revision: self.draft.revision, ..CommitReport::default() });
        }

        info!(
            "Committing timeline {}: boundary={}, {} created, {} updated, {} deleted",
            self.draft.id,
            plan.boundary.is_some(),
            plan.creates.len(),
            plan.updates.len(),
            plan.deletes.len()
        );

        let revision = match self.store.claim_revision(&self.draft.id, self.draft.revision).await {
            Ok(revision) => revision,
            Err(error) => {
                warn!("Commit of timeline {} rejected: {}", self.draft.id, error);
                return Err(error);
            }
        };
        self.draft.revision = revision;
        self.baseline.revision = revision;

        let execution = commit::execute(&self.store, &self.draft, &plan).await;

        if execution.failures.is_empty() {
            self.baseline = self.draft.clone();
            self.stale.clear();
            self.state = SessionState::Clean;
            self.publish();
            info!(timeline = %self.draft.id, revision, "Commit complete");
            return Ok(CommitReport {
                revision,
                boundary_written: plan.boundary.is_some(),
                created: plan.creates.len(),
                updated: plan.updates.len(),
                deleted: plan.deletes.len(),
            });
        }

        self.absorb_partial_commit(&execution.succeeded, execution.failed_targets());
        self.publish();
        warn!(
            "Commit of timeline {} incomplete: {} of {} writes failed",
            self.draft.id,
            execution.failures.len(),
            plan.write_count()
        );
        Err(AllocationError::CommitFailed {
            succeeded: execution.succeeded.len(),
            failures: execution.failures,
        })
    }

    /// Advance the baseline past every write that succeeded.
    fn absorb_partial_commit<'a>(
        &mut self,
        succeeded: &[WriteTarget],
        failed: impl Iterator<Item = &'a WriteTarget>,
    ) {
        let mut baseline = self.draft.clone();
        for target in failed {
            match target {
                WriteTarget::Boundary { .. } => {
                    // Nothing else was attempted.
                    self.baseline.revision = self.draft.revision;
                    return;
                }
                WriteTarget::Segment { segment_id } => {
                    self.stale.insert(SegmentId::from(segment_id.as_str()));
                }
                WriteTarget::Create { segment_id } => {
                    baseline.segments.retain(|segment| segment.id.as_str() != segment_id);
                }
                WriteTarget::Delete { segment_id } => {
                    let id = SegmentId::from(segment_id.as_str());
                    if let Some(index) = self.baseline.index_of(&id) {
                        baseline.segments.push(self.baseline.segments[index].clone());
                    }
                }
            }
        }

        for target in succeeded {
            if let WriteTarget::Segment { segment_id } = target {
                self.stale.remove(&SegmentId::from(segment_id.as_str()));
            }
        }
        self.baseline = baseline;
    }

    fn index_of(&self, segment_id: &SegmentId) -> Result<usize> {
        self.draft.index_of(segment_id).ok_or_else(|| AllocationError::segment_not_found(segment_id))
    }

    /// Re-derive `candidate`, validate it and make it the draft.
    fn replace_draft(&mut self, mut candidate: Timeline) -> Result<()> {
        let allocation = candidate.rederive();
        check_invariants(&candidate, &allocation)?;

        trace!(percentages = ?allocation.percentages(), "Draft updated");
        self.draft = candidate;
        self.allocation = allocation;
        self.state = SessionState::Dirty;
        self.publish();
        Ok(())
    }

    fn publish(&self) {
        self.updates.send_replace(Arc::new(self.view()));
    }

    /// Snapshot of the draft.
    pub fn view(&self) -> TimelineView {
        TimelineView::project(&self.draft, &self.allocation, self.state)
    }

    /// Draft updates, starting with the current snapshot.
    pub fn subscribe(&self) -> WatchStream<Arc<TimelineView>> {
        WatchStream::new(self.updates.subscribe())
    }

    /// Draft updates limited to one per `period`.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime with the time driver enabled.
    pub fn subscribe_coalesced(&self, period: Duration) -> Coalesce<WatchStream<Arc<TimelineView>>> {
        self.subscribe().coalesce(period)
    }

    /// Whether the draft mirrors the baseline.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True when there are uncommitted edits.
    pub fn is_dirty(&self) -> bool {
        self.state == SessionState::Dirty
    }

    /// True while a drag gesture is open.
    pub fn drag_in_progress(&self) -> bool {
        self.drag.is_some()
    }

    /// The draft timeline.
    pub fn timeline(&self) -> &Timeline {
        &self.draft
    }

    /// The state the store last acknowledged.
    pub fn baseline(&self) -> &Timeline {
        &self.baseline
    }

    /// Allocation of the draft, including display percentages.
    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// A draft segment by id.
    pub fn segment(&self, segment_id: &SegmentId) -> Option<&Segment> {
        self.draft.segments.iter().find(|segment| &segment.id == segment_id)
    }

    /// Owner of the timeline.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Engine configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Validate a fetched timeline and derive its draft copy.
fn prepare(mut timeline: Timeline, config: &EngineConfig) -> Result<(Timeline, Allocation)> {
    if timeline.segments.is_empty() {
        return Err(AllocationError::EmptyTimeline);
    }

    if let Some(segment) = timeline.segments.iter().find(|s| !(s.weight.is_finite() && s.weight > 0.0)) {
        return Err(AllocationError::InvalidWeight { weight: segment.weight });
    }

    let span = timeline.span_minutes();
    if span < config.min_span_minutes {
        return Err(AllocationError::invalid_boundary(format!(
            "timeline {} spans {} minutes, minimum is {}",
            timeline.id, span, config.min_span_minutes
        )));
    }

    let allocation = timeline.rederive();
    check_invariants(&timeline, &allocation)?;
    Ok((timeline, allocation))
}

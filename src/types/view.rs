//! Read-only projections handed to presentation layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OwnerId, SegmentId, Timeline, TimelineId};
use crate::allocation::Allocation;

/// Which endpoint of a segment a direct date edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub enum BoundaryField {
    Start,
    End,
}

/// Whether the draft mirrors the last committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    #[default]
    Clean,
    Dirty,
}

/// A segment together with its display percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct AllocatedSegment {
    pub id: SegmentId,
    pub title: Option<String>,
    pub weight: f64,
    pub duration_minutes: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub percentage: u32,
}

/// Snapshot of a draft timeline, published after every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    pub id: TimelineId,
    pub owner: OwnerId,
    pub revision: u64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: SessionState,
    pub segments: Vec<AllocatedSegment>,
}

impl TimelineView {
    /// Project a derived timeline and its allocation into a view.
    pub fn project(timeline: &Timeline, allocation: &Allocation, state: SessionState) -> Self {
        let segments = timeline
            .segments
            .iter()
            .zip(&allocation.slots)
            .map(|(segment, slot)| AllocatedSegment {
                id: segment.id.clone(),
                title: segment.title.clone(),
                weight: segment.weight,
                duration_minutes: slot.duration_minutes,
                start_at: slot.start_at,
                end_at: slot.end_at,
                percentage: slot.percentage,
            })
            .collect();

        Self {
            id: timeline.id.clone(),
            owner: timeline.owner.clone(),
            revision: timeline.revision,
            start: timeline.start,
            end: timeline.end,
            state,
            segments,
        }
    }

    /// Display percentages in allocation order.
    pub fn percentages(&self) -> Vec<u32> {
        self.segments.iter().map(|segment| segment.percentage).collect()
    }

    /// Durations in minutes in allocation order.
    pub fn durations(&self) -> Vec<i64> {
        self.segments.iter().map(|segment| segment.duration_minutes).collect()
    }

    /// Weights in allocation order.
    pub fn weights(&self) -> Vec<f64> {
        self.segments.iter().map(|segment| segment.weight).collect()
    }
}

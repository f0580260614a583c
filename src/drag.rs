//! Weight renegotiation for drag-resizing the handle between two segments.
//!
//! A gesture starts by capturing a [`DragSnapshot`] of the weights and display
//! percentages. Every pointer move then calls [`renegotiate`] against that same
//! snapshot, never against the previous move's result, so repeated moves to the
//! same position produce identical weights.
//!
//! Only the two segments either side of the handle change. Their combined share
//! of the timeline is fixed, and each keeps at least the configured minimum share
//! of the whole timeline. Moves past that floor are clamped silently.

use tracing::trace;

use crate::allocation::percentages;
use crate::config::EngineConfig;
use crate::{AllocationError, Result};

/// Weights and percentages captured when a drag gesture starts.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSnapshot {
    /// Index of the segment left of the handle; the handle sits between
    /// `handle` and `handle + 1`.
    pub handle: usize,
    pub weights: Vec<f64>,
    pub percentages: Vec<u32>,
}

impl DragSnapshot {
    /// Capture the state needed to renegotiate the handle after segment `handle`.
    pub fn capture(weights: &[f64], handle: usize) -> Result<Self> {
        if handle + 1 >= weights.len() {
            return Err(AllocationError::SegmentIndexOutOfRange { index: handle, len: weights.len() });
        }
        Ok(Self { handle, weights: weights.to_vec(), percentages: percentages(weights) })
    }

    /// Weight of the segment left of the handle at drag start.
    pub fn left_weight(&self) -> f64 {
        self.weights[self.handle]
    }

    /// Weight of the segment right of the handle at drag start.
    pub fn right_weight(&self) -> f64 {
        self.weights[self.handle + 1]
    }

    /// Display percentage shared by the two segments.
    pub fn combined_percentage(&self) -> u32 {
        self.percentages[self.handle] + self.percentages[self.handle + 1]
    }

    /// Display percentage of every segment before the handle's left neighbour.
    pub fn offset_percentage(&self) -> u32 {
        self.percentages[..self.handle].iter().sum()
    }

    /// Full weight list with the pair replaced.
    pub fn weights_with(&self, left: f64, right: f64) -> Vec<f64> {
        let mut weights = self.weights.clone();
        weights[self.handle] = left;
        weights[self.handle + 1] = right;
        weights
    }
}

/// Result of one pointer move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragOutcome {
    pub left_weight: f64,
    pub right_weight: f64,
    /// Display percentage the left segment ends up with.
    pub target_percentage: u32,
    /// The pointer asked for less than the minimum share on either side.
    pub clamped: bool,
    /// False when the pair is too narrow to renegotiate at all.
    pub applied: bool,
}

/// Recompute the pair's weights for a pointer at `pointer_fraction` of the track.
///
/// `pointer_fraction` spans the whole timeline (`0.0..=1.0`); values outside are
/// clamped and NaN counts as the track start.
pub fn renegotiate(snapshot: &DragSnapshot, pointer_fraction: f64, config: &EngineConfig) -> DragOutcome {
    let left_before = snapshot.percentages[snapshot.handle];
    let combined = snapshot.combined_percentage();
    let floor = config.min_segment_percent;

    let unchanged = DragOutcome {
        left_weight: snapshot.left_weight(),
        right_weight: snapshot.right_weight(),
        target_percentage: left_before,
        clamped: false,
        applied: false,
    };

    if combined < floor * 2 {
        trace!(handle = snapshot.handle, combined, "Pair too narrow to renegotiate");
        return unchanged;
    }

    let fraction = if pointer_fraction.is_nan() { 0.0 } else { pointer_fraction.clamp(0.0, 1.0) };
    let requested = (fraction * 100.0 - snapshot.offset_percentage() as f64).round();
    let lower = floor as f64;
    let upper = (combined - floor) as f64;
    let clamped = requested < lower || requested > upper;
    let target = requested.clamp(lower, upper) as u32;

    let (left_weight, right_weight) = match rounded_split(snapshot, target, config) {
        Some(split) => split,
        None => match exact_split(snapshot, target) {
            Some(split) => split,
            None => return unchanged,
        },
    };

    trace!(
        "Handle {} -> {}% (combined {}%, clamped={}): weights {} / {}",
        snapshot.handle, target, combined, clamped, left_weight, right_weight
    );

    DragOutcome { left_weight, right_weight, target_percentage: target, clamped, applied: true }
}

/// Whole-unit split of the pair's weight pool, accepted only when it reproduces
/// the target percentages without disturbing any other segment.
fn rounded_split(snapshot: &DragSnapshot, target: u32, config: &EngineConfig) -> Option<(f64, f64)> {
    if !config.round_drag_weights {
        return None;
    }

    let combined = snapshot.combined_percentage();
    let pool = snapshot.left_weight() + snapshot.right_weight();
    let left = (target as f64 / combined as f64 * pool).round().max(1.0);
    let right = (pool - left).max(1.0);

    let projected = percentages(&snapshot.weights_with(left, right));
    let expected = expected_percentages(snapshot, target);
    (projected == expected).then_some((left, right))
}

/// Real-valued split that moves the pair's raw shares by whole percentage points,
/// leaving every fractional remainder, and so every other segment's reconciled
/// percentage, exactly as it was.
fn exact_split(snapshot: &DragSnapshot, target: u32) -> Option<(f64, f64)> {
    let total: f64 = snapshot.weights.iter().sum();
    let shift = (target as f64 - snapshot.percentages[snapshot.handle] as f64) / 100.0 * total;
    let left = snapshot.left_weight() + shift;
    let right = snapshot.right_weight() - shift;
    (left > 0.0 && right > 0.0).then_some((left, right))
}

fn expected_percentages(snapshot: &DragSnapshot, target: u32) -> Vec<u32> {
    let mut expected = snapshot.percentages.clone();
    expected[snapshot.handle] = target;
    expected[snapshot.handle + 1] = snapshot.combined_percentage() - target;
    expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn difficulty_snapshot(handle: usize) -> DragSnapshot {
        DragSnapshot::capture(&[60.0, 100.0, 140.0], handle).unwrap()
    }

    #[test]
    fn drag_first_handle_to_ten_percent() {
        let snapshot = difficulty_snapshot(0);
        assert_eq!(snapshot.combined_percentage(), 53);

        let outcome = renegotiate(&snapshot, 0.10, &EngineConfig::default());
        assert!(outcome.applied);
        assert!(!outcome.clamped);
        assert_eq!(outcome.target_percentage, 10);
        assert_eq!((outcome.left_weight, outcome.right_weight), (30.0, 130.0));

        let weights = snapshot.weights_with(outcome.left_weight, outcome.right_weight);
        assert_eq!(percentages(&weights), vec![10, 43, 47]);
    }

    #[test]
    fn drag_below_floor_clamps_at_five() {
        let snapshot = difficulty_snapshot(0);
        let outcome = renegotiate(&snapshot, 0.01, &EngineConfig::default());
        assert!(outcome.clamped);
        assert_eq!(outcome.target_percentage, 5);

        let weights = snapshot.weights_with(outcome.left_weight, outcome.right_weight);
        assert_eq!(percentages(&weights), vec![5, 48, 47]);
    }

    #[test]
    fn drag_past_neighbour_clamps_at_upper_bound() {
        let snapshot = difficulty_snapshot(0);
        let outcome = renegotiate(&snapshot, 0.95, &EngineConfig::default());
        assert!(outcome.clamped);
        assert_eq!(outcome.target_percentage, 48);

        let weights = snapshot.weights_with(outcome.left_weight, outcome.right_weight);
        assert_eq!(percentages(&weights), vec![48, 5, 47]);
    }

    #[test]
    fn later_handles_measure_from_their_own_offset() {
        let snapshot = difficulty_snapshot(1);
        assert_eq!(snapshot.offset_percentage(), 20);

        let outcome = renegotiate(&snapshot, 0.50, &EngineConfig::default());
        assert_eq!(outcome.target_percentage, 30);
        assert_eq!((outcome.left_weight, outcome.right_weight), (90.0, 150.0));
    }

    #[test]
    fn narrow_pair_is_left_alone() {
        let snapshot = DragSnapshot::capture(&[4.0, 4.0, 92.0], 0).unwrap();
        assert_eq!(snapshot.combined_percentage(), 8);

        let outcome = renegotiate(&snapshot, 0.06, &EngineConfig::default());
        assert!(!outcome.applied);
        assert_eq!((outcome.left_weight, outcome.right_weight), (4.0, 4.0));
    }

    #[test]
    fn handle_after_last_segment_is_out_of_range() {
        let error = DragSnapshot::capture(&[1.0, 2.0], 1).unwrap_err();
        assert!(matches!(error, AllocationError::SegmentIndexOutOfRange { index: 1, len: 2 }));
    }

    #[test]
    fn pointer_outside_track_is_clamped() {
        let snapshot = difficulty_snapshot(0);
        let below = renegotiate(&snapshot, -3.0, &EngineConfig::default());
        let nan = renegotiate(&snapshot, f64::NAN, &EngineConfig::default());
        assert_eq!(below, nan);
        assert_eq!(below.target_percentage, 5);
    }

    #[test]
    fn unrounded_mode_uses_exact_shift() {
        let config = EngineConfig { round_drag_weights: false, ..EngineConfig::default() };
        let snapshot = difficulty_snapshot(0);
        let outcome = renegotiate(&snapshot, 0.10, &config);
        assert!((outcome.left_weight - 30.0).abs() < 1e-9);
        assert!((outcome.right_weight - 130.0).abs() < 1e-9);
    }

    #[test]
    fn hundred_identical_moves_match_one() {
        let snapshot = DragSnapshot::capture(&[17.0, 31.0, 52.0, 9.0], 1).unwrap();
        let config = EngineConfig::default();
        let once = renegotiate(&snapshot, 0.42, &config);
        for _ in 0..100 {
            assert_eq!(renegotiate(&snapshot, 0.42, &config), once);
        }
    }

    proptest! {
        #[test]
        fn prop_drag_conserves_other_segments(
            weights in prop::collection::vec(1.0f64..500.0, 2..8),
            handle_seed in any::<prop::sample::Index>(),
            fraction in -0.2f64..1.2,
            round in any::<bool>(),
        ) {
            let handle = handle_seed.index(weights.len() - 1);
            let config = EngineConfig { round_drag_weights: round, ..EngineConfig::default() };
            let snapshot = DragSnapshot::capture(&weights, handle).unwrap();
            let outcome = renegotiate(&snapshot, fraction, &config);
            let after = percentages(&snapshot.weights_with(outcome.left_weight, outcome.right_weight));

            prop_assert!(outcome.left_weight > 0.0);
            prop_assert!(outcome.right_weight > 0.0);
            prop_assert_eq!(after.iter().sum::<u32>(), 100);
            for (index, (&before, &now)) in snapshot.percentages.iter().zip(&after).enumerate() {
                if index != handle && index != handle + 1 {
                    prop_assert_eq!(before, now);
                }
            }
            prop_assert_eq!(after[handle] + after[handle + 1], snapshot.combined_percentage());

            if outcome.applied {
                prop_assert!(after[handle] >= 5);
                prop_assert!(after[handle + 1] >= 5);
                prop_assert_eq!(after[handle], outcome.target_percentage);
            }
        }

        #[test]
        fn prop_drag_is_idempotent_per_snapshot(
            weights in prop::collection::vec(1.0f64..500.0, 2..6),
            fraction in 0.0f64..1.0,
        ) {
            let snapshot = DragSnapshot::capture(&weights, 0).unwrap();
            let config = EngineConfig::default();
            let first = renegotiate(&snapshot, fraction, &config);
            let second = renegotiate(&snapshot, fraction, &config);
            prop_assert_eq!(first, second);
        }
    }
}

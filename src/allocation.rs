//! Interval math: durations, dates and display percentages from weights.
//!
//! Everything in this module is pure. The session calls [`allocate`] after every
//! mutation of the draft and then [`check_invariants`] on the result.
//!
//! Both durations and percentages are apportioned with the largest-remainder
//! method: each share is floored, then the leftover units go one at a time to the
//! shares with the largest fractional remainder, earlier segments winning ties.
//! This keeps durations summing to the span and percentages summing to 100
//! without ever touching the weights.

use chrono::{DateTime, Duration, Utc};
use tracing::{trace, warn};

use crate::types::Timeline;
use crate::{AllocationError, Result};

/// Total the display percentages always reconcile to.
pub const PERCENT_TOTAL: i64 = 100;

/// Fractional remainders closer than this are treated as ties.
const REMAINDER_RESOLUTION: f64 = 1e6;

/// Slack when flooring shares so float noise on integral shares floors correctly.
const FLOOR_SLACK: f64 = 1e-9;

/// Whole minutes from `start` to `end`, truncated toward zero.
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

/// Derived placement of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub duration_minutes: i64,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub percentage: u32,
}

/// Why an allocation fell back to safe defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// Total weight was zero, negative or not finite; weights were treated as equal.
    ZeroWeight,
    /// The span was zero or negative; every segment collapsed onto the start.
    EmptySpan,
}

/// Result of allocating a span over a list of weights.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Allocation {
    pub slots: Vec<Slot>,
    pub degeneracy: Option<Degeneracy>,
}

impl Allocation {
    /// Display percentages in allocation order.
    pub fn percentages(&self) -> Vec<u32> {
        self.slots.iter().map(|slot| slot.percentage).collect()
    }

    /// Durations in minutes in allocation order.
    pub fn durations(&self) -> Vec<i64> {
        self.slots.iter().map(|slot| slot.duration_minutes).collect()
    }

    /// Sum of the display percentages of the segments before `index`.
    pub fn percentage_before(&self, index: usize) -> u32 {
        self.slots.iter().take(index).map(|slot| slot.percentage).sum()
    }
}

/// Allocate the span between `start` and `end` over `weights`.
///
/// Durations are within one minute of `round(span * weight / total_weight)` and
/// equal to it whenever that share is integral. When the span has at least one
/// minute per segment, no segment gets less than a minute. A sub-minute tail of the
/// span is absorbed by the last segment so it always ends exactly at `end`.
pub fn allocate(start: DateTime<Utc>, end: DateTime<Utc>, weights: &[f64]) -> Allocation {
    if weights.is_empty() {
        return Allocation::default();
    }

    let total_minutes = minutes_between(start, end);
    let (weights, mut degeneracy) = match normalized_weights(weights) {
        Some(weights) => (weights, None),
        None => {
            warn!(count = weights.len(), "Degenerate weights, falling back to an equal split");
            (vec![1.0; weights.len()], Some(Degeneracy::ZeroWeight))
        }
    };

    let durations = if total_minutes <= 0 {
        if degeneracy.is_none() {
            degeneracy = Some(Degeneracy::EmptySpan);
        }
        warn!(total_minutes, "Empty span, collapsing every segment onto the start");
        vec![0; weights.len()]
    } else {
        let mut durations = apportion(total_minutes, &weights);
        enforce_minimum_minute(&mut durations, total_minutes);
        durations
    };

    let percentages = apportion(PERCENT_TOTAL, &weights);

    let last = weights.len() - 1;
    let mut cursor = start;
    let slots = durations
        .iter()
        .zip(&percentages)
        .enumerate()
        .map(|(index, (&duration_minutes, &percentage))| {
            let start_at = cursor;
            let end_at = if index == last && total_minutes > 0 {
                end
            } else {
                cursor + Duration::minutes(duration_minutes)
            };
            cursor = end_at;
            Slot { duration_minutes, start_at, end_at, percentage: percentage as u32 }
        })
        .collect();

    trace!("Allocated {} minutes over {} segments", total_minutes, weights.len());

    Allocation { slots, degeneracy }
}

/// Display percentages for `weights`, reconciled to sum to exactly 100.
pub fn percentages(weights: &[f64]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let weights = normalized_weights(weights).unwrap_or_else(|| vec![1.0; weights.len()]);
    apportion(PERCENT_TOTAL, &weights).into_iter().map(|p| p as u32).collect()
}

/// Split `total` whole units proportionally to `weights` by largest remainder.
///
/// The result always sums to `total` (or is all zeros when `total <= 0`).
/// Weights are expected to be positive; a non-positive total weight splits equally.
pub fn apportion(total: i64, weights: &[f64]) -> Vec<i64> {
    let count = weights.len();
    if count == 0 {
        return Vec::new();
    }
    if total <= 0 {
        return vec![0; count];
    }

    let weight_sum: f64 = weights.iter().sum();
    let raw: Vec<f64> = if weight_sum > 0.0 && weight_sum.is_finite() {
        weights.iter().map(|w| total as f64 * w / weight_sum).collect()
    } else {
        vec![total as f64 / count as f64; count]
    };

    let mut shares: Vec<i64> = raw.iter().map(|r| (r + FLOOR_SLACK).floor() as i64).collect();

    // Rank by fractional remainder, largest first, earlier index first on ties.
    let mut order: Vec<usize> = (0..count).collect();
    let remainder_key =
        |i: usize| ((raw[i] - shares[i] as f64) * REMAINDER_RESOLUTION).round() as i64;
    let keys: Vec<i64> = (0..count).map(remainder_key).collect();
    order.sort_by(|&a, &b| keys[b].cmp(&keys[a]).then(a.cmp(&b)));

    let mut leftover = total - shares.iter().sum::<i64>();
    let mut cursor = 0;
    while leftover > 0 {
        shares[order[cursor % count]] += 1;
        leftover -= 1;
        cursor += 1;
    }
    // Float slack can overshoot; take back from the smallest remainders.
    let mut cursor = 0;
    while leftover < 0 && cursor < count * 2 {
        let index = order[count - 1 - (cursor % count)];
        if shares[index] > 0 {
            shares[index] -= 1;
            leftover += 1;
        }
        cursor += 1;
    }

    shares
}

/// Positive, finite copy of `weights`, or `None` when the allocation is degenerate.
fn normalized_weights(weights: &[f64]) -> Option<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return None;
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    Some(weights.to_vec())
}

fn enforce_minimum_minute(durations: &mut [i64], total_minutes: i64) {
    if total_minutes < durations.len() as i64 {
        return;
    }
    while let Some(empty) = durations.iter().position(|&d| d == 0) {
        let mut largest = 0;
        for (index, &duration) in durations.iter().enumerate() {
            if duration > durations[largest] {
                largest = index;
            }
        }
        durations[largest] -= 1;
        durations[empty] += 1;
    }
}

/// Validate a derived timeline against its allocation.
///
/// The numbers carried by [`AllocationError::InvariantViolated`]:
///
/// 1. at least one segment
/// 2. every weight finite and positive
/// 3. the first segment starts at the timeline start
/// 4. the last segment ends at the timeline end (non-empty spans)
/// 5. consecutive segments share their boundary
/// 6. display percentages sum to 100
pub fn check_invariants(timeline: &Timeline, allocation: &Allocation) -> Result<()> {
    let segments = &timeline.segments;
    let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
        return Err(AllocationError::invariant_violated(1, "timeline has no segments"));
    };

    if let Some(segment) = segments.iter().find(|s| !(s.weight.is_finite() && s.weight > 0.0)) {
        return Err(AllocationError::invariant_violated(
            2,
            format!("segment {} has weight {}", segment.id, segment.weight),
        ));
    }

    if first.start_at != timeline.start {
        return Err(AllocationError::invariant_violated(
            3,
            format!("first segment starts at {} not {}", first.start_at, timeline.start),
        ));
    }

    if timeline.span_minutes() > 0 && last.end_at != timeline.end {
        return Err(AllocationError::invariant_violated(
            4,
            format!("last segment ends at {} not {}", last.end_at, timeline.end),
        ));
    }

    for pair in segments.windows(2) {
        if pair[0].end_at != pair[1].start_at {
            return Err(AllocationError::invariant_violated(
                5,
                format!("gap between segment {} and {}", pair[0].id, pair[1].id),
            ));
        }
    }

    let percent_sum: u32 = allocation.slots.iter().map(|slot| slot.percentage).sum();
    if percent_sum as i64 != PERCENT_TOTAL {
        return Err(AllocationError::invariant_violated(
            6,
            format!("percentages sum to {}", percent_sum),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{at, minutes_after};
    use proptest::prelude::*;

    #[test]
    fn difficulty_weights_over_matching_span() {
        let start = at(2025, 3, 1, 9, 0);
        let allocation = allocate(start, minutes_after(start, 300), &[60.0, 100.0, 140.0]);

        assert_eq!(allocation.durations(), vec![60, 100, 140]);
        assert_eq!(allocation.percentages(), vec![20, 33, 47]);
        assert_eq!(allocation.slots[1].start_at, minutes_after(start, 60));
        assert_eq!(allocation.slots[2].end_at, minutes_after(start, 300));
        assert_eq!(allocation.degeneracy, None);
    }

    #[test]
    fn equal_thirds_break_ties_by_order() {
        assert_eq!(percentages(&[1.0, 1.0, 1.0]), vec![34, 33, 33]);
        assert_eq!(apportion(10, &[1.0, 1.0, 1.0]), vec![4, 3, 3]);
    }

    #[test]
    fn single_segment_takes_everything() {
        let start = at(2025, 3, 1, 9, 0);
        let allocation = allocate(start, minutes_after(start, 90), &[7.5]);
        assert_eq!(allocation.durations(), vec![90]);
        assert_eq!(allocation.percentages(), vec![100]);
    }

    #[test]
    fn zero_total_weight_splits_equally() {
        let start = at(2025, 3, 1, 9, 0);
        let allocation = allocate(start, minutes_after(start, 100), &[0.0, 0.0]);
        assert_eq!(allocation.durations(), vec![50, 50]);
        assert_eq!(allocation.percentages(), vec![50, 50]);
        assert_eq!(allocation.degeneracy, Some(Degeneracy::ZeroWeight));
    }

    #[test]
    fn empty_span_collapses_onto_start() {
        let start = at(2025, 3, 1, 9, 0);
        let allocation = allocate(start, minutes_after(start, -30), &[1.0, 2.0]);
        assert_eq!(allocation.durations(), vec![0, 0]);
        for slot in &allocation.slots {
            assert_eq!(slot.start_at, start);
            assert_eq!(slot.end_at, start);
        }
        assert_eq!(allocation.percentages().iter().sum::<u32>(), 100);
        assert_eq!(allocation.degeneracy, Some(Degeneracy::EmptySpan));
    }

    #[test]
    fn tiny_weights_still_get_a_minute() {
        let start = at(2025, 3, 1, 9, 0);
        let allocation = allocate(start, minutes_after(start, 10), &[1000.0, 1.0, 1.0]);
        assert_eq!(allocation.durations(), vec![8, 1, 1]);
    }

    #[test]
    fn sub_minute_tail_goes_to_last_segment() {
        let start = at(2025, 3, 1, 9, 0);
        let end = minutes_after(start, 10) + Duration::seconds(30);
        let allocation = allocate(start, end, &[1.0, 1.0]);
        assert_eq!(allocation.durations(), vec![5, 5]);
        assert_eq!(allocation.slots[1].end_at, end);
    }

    #[test]
    fn invariants_hold_on_derived_timeline() {
        let start = at(2025, 3, 1, 9, 0);
        let mut timeline =
            Timeline::from_weights("tl", "owner", start, minutes_after(start, 240), &[3.0, 1.0]);
        let allocation = timeline.rederive();
        assert!(check_invariants(&timeline, &allocation).is_ok());

        timeline.segments[1].start_at = minutes_after(start, 1);
        let error = check_invariants(&timeline, &allocation).unwrap_err();
        assert!(matches!(error, AllocationError::InvariantViolated { invariant: 5, .. }));
    }

    #[test]
    fn invariant_two_rejects_non_positive_weight() {
        let start = at(2025, 3, 1, 9, 0);
        let mut timeline =
            Timeline::from_weights("tl", "owner", start, minutes_after(start, 60), &[1.0, 1.0]);
        timeline.segments[0].weight = 0.0;
        let allocation = timeline.rederive();
        let error = check_invariants(&timeline, &allocation).unwrap_err();
        assert!(matches!(error, AllocationError::InvariantViolated { invariant: 2, .. }));
    }

    proptest! {
        #[test]
        fn prop_percentages_sum_to_one_hundred(
            weights in prop::collection::vec(0.001f64..10_000.0, 1..40),
        ) {
            let shares = percentages(&weights);
            prop_assert_eq!(shares.iter().sum::<u32>(), 100);
        }

        #[test]
        fn prop_percentages_within_one_point_of_raw_share(
            weights in prop::collection::vec(0.5f64..1_000.0, 1..20),
        ) {
            let total: f64 = weights.iter().sum();
            for (weight, share) in weights.iter().zip(percentages(&weights)) {
                let raw = 100.0 * weight / total;
                prop_assert!((share as f64 - raw).abs() < 1.0 + 1e-6);
            }
        }

        #[test]
        fn prop_durations_tile_the_span(
            weights in prop::collection::vec(0.5f64..1_000.0, 1..20),
            span in 0i64..20_000,
        ) {
            let start = at(2025, 6, 2, 0, 0);
            let end = minutes_after(start, span);
            let allocation = allocate(start, end, &weights);

            prop_assert_eq!(allocation.durations().iter().sum::<i64>(), span);
            prop_assert_eq!(allocation.slots[0].start_at, start);
            prop_assert_eq!(allocation.slots[weights.len() - 1].end_at, end);
            for pair in allocation.slots.windows(2) {
                prop_assert_eq!(pair[0].end_at, pair[1].start_at);
            }
            if span >= weights.len() as i64 {
                prop_assert!(allocation.durations().iter().all(|&d| d >= 1));
            }
        }
    }
}

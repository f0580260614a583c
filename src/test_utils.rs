//! Test utilities for building timelines and stores
//!
//! Shared by unit tests and the benchmark harness so every suite builds its
//! fixtures the same way.

#![cfg(any(test, feature = "benchmark"))]

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::stores::MemoryStore;
use crate::types::{OwnerId, Segment, SegmentId, Timeline};

/// Owner used by fixture timelines.
pub const FIXTURE_OWNER: &str = "project-fixture";

/// Identifier used by fixture timelines.
pub const FIXTURE_TIMELINE: &str = "timeline-fixture";

/// UTC timestamp at minute precision.
///
/// # Panics
///
/// Panics on an impossible calendar date; fixtures are always literal.
pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid fixture date {}-{}-{} {}:{}", year, month, day, hour, minute))
}

/// `base` shifted by `minutes` (negative values move backwards).
pub fn minutes_after(base: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    base + Duration::minutes(minutes)
}

/// Start instant shared by fixture timelines.
pub fn fixture_start() -> DateTime<Utc> {
    at(2025, 3, 3, 9, 0)
}

/// Timeline over `span_minutes` with segments `s-0`, `s-1`, ... carrying `weights`.
///
/// Segment ids are deterministic so tests can address them by name.
pub fn fixture_timeline(weights: &[f64], span_minutes: i64) -> Timeline {
    let start = fixture_start();
    let segments = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| {
            Segment::new(SegmentId::new(format!("s-{}", index)), weight, start)
                .with_title(format!("Session {}", index + 1))
        })
        .collect();

    let mut timeline = Timeline {
        id: FIXTURE_TIMELINE.into(),
        owner: OwnerId::from(FIXTURE_OWNER),
        revision: 1,
        start,
        end: minutes_after(start, span_minutes),
        segments,
    };
    timeline.rederive();
    timeline
}

/// The three-segment difficulty timeline: weights 60/100/140 over 300 minutes.
pub fn difficulty_timeline() -> Timeline {
    fixture_timeline(&[60.0, 100.0, 140.0], 300)
}

/// Memory store seeded with `timeline`.
pub fn seeded_store(timeline: Timeline) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(timeline);
    store
}

/// Install a test subscriber once; repeated calls are harmless.
#[cfg(test)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

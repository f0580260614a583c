//! TypeScript Generation Tests
//!
//! Validates that timeshare types can be exported to TypeScript when the tauri
//! feature is enabled.

#[cfg(feature = "tauri")]
#[test]
fn test_core_types_implement_specta_type() {
    use specta::Type;

    fn assert_type<T: Type>() {}

    // Model types
    assert_type::<timeshare::Timeline>();
    assert_type::<timeshare::Segment>();
    assert_type::<timeshare::Difficulty>();
    assert_type::<timeshare::SegmentId>();

    // View types
    assert_type::<timeshare::TimelineView>();
    assert_type::<timeshare::AllocatedSegment>();
    assert_type::<timeshare::SessionState>();
    assert_type::<timeshare::BoundaryField>();

    // Commands and configuration
    assert_type::<timeshare::SegmentPatch>();
    assert_type::<timeshare::EngineConfig>();
}

#[cfg(not(feature = "tauri"))]
#[test]
fn test_tauri_feature_disabled() {
    // Types still compile without specta::Type
    let _ = timeshare::SessionState::Clean;
}

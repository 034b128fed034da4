use padcal_core::error::{BuildError, SessionError};
use padcal_core::{
    Controller, Position, PositionPlan, RecordOutcome, SessionState, SessionStatus,
};
use padcal_core::mocks::NoopSensor;

fn plan(n: usize) -> PositionPlan {
    PositionPlan::new(
        (0..n)
            .map(|i| Position {
                x: i as u8,
                y: 0,
                dx: 0,
                dy: i as i32,
            })
            .collect(),
    )
}

#[test]
fn builder_requires_sensor_and_plan() {
    // Missing everything
    let err = Controller::builder().try_build().expect_err("no sensor");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingSensor)
    ));

    // Missing plan
    let err = Controller::builder()
        .with_sensor(NoopSensor)
        .with_weight_id("w-100g")
        .try_build()
        .expect_err("no plan");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingPlan)
    ));
}

#[test]
fn builder_rejects_bad_config() {
    let err = Controller::builder()
        .with_sensor(NoopSensor)
        .with_plan(plan(2))
        .with_weight_id("w-100g")
        .with_frames_per_position(0)
        .build()
        .expect_err("zero frames");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));

    let err = Controller::builder()
        .with_sensor(NoopSensor)
        .with_plan(plan(2))
        .build()
        .expect_err("missing weight id");
    assert!(format!("{err}").contains("weight id"));

    let err = Controller::builder()
        .with_sensor(NoopSensor)
        .with_plan(PositionPlan::new(Vec::new()))
        .with_weight_id("w-100g")
        .build()
        .expect_err("empty plan");
    assert!(format!("{err}").contains("position plan"));
}

#[test]
fn builder_accepts_defaults() {
    let c = Controller::builder()
        .with_sensor(NoopSensor)
        .with_plan(plan(3))
        .with_weight_id("w-100g")
        .build();
    match c {
        Ok(_) => {}
        Err(e) => panic!("builder with defaults should succeed, got error: {e}"),
    }
}

#[test]
fn record_fails_outside_active_and_leaves_samples_untouched() {
    let mut s = SessionState::new(plan(2), 2, "center", "w-100g").expect("session");
    // Idle
    let err = s.record_frame(1.0).expect_err("idle record");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::NotActive)
    ));
    assert!(s.samples().is_empty());

    // Completed
    s.begin();
    for _ in 0..4 {
        let _ = s.record_frame(2.0).expect("record");
    }
    assert_eq!(s.status(), SessionStatus::Completed);
    let err = s.record_frame(3.0).expect_err("completed record");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::NotActive)
    ));
    assert_eq!(s.samples().len(), 2);

    // Stopped
    let mut s = SessionState::new(plan(2), 2, "center", "w-100g").expect("session");
    s.begin();
    s.mark_stopped();
    let err = s.record_frame(1.0).expect_err("stopped record");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::NotActive)
    ));
}

#[test]
fn begin_resets_everything() {
    let mut s = SessionState::new(plan(3), 1, "center", "w-100g").expect("session");
    s.begin();
    let _ = s.record_frame(5.0).expect("record");
    let _ = s.record_frame(5.0).expect("record");
    s.mark_stopped();
    assert_eq!(s.samples().len(), 2);
    assert_eq!(s.current_index(), 2);

    s.begin();
    assert_eq!(s.status(), SessionStatus::Active);
    assert_eq!(s.current_index(), 0);
    assert!(s.samples().is_empty());
    assert_eq!(s.pending_frames(), 0);
}

#[test]
fn frame_quota_seals_samples_and_summary_counts_frames() {
    let mut s = SessionState::new(plan(2), 3, "center", "w-100g").expect("session");
    s.begin();
    assert!(matches!(
        s.record_frame(1.0).expect("frame"),
        RecordOutcome::FrameRecorded { have: 1, need: 3 }
    ));
    assert!(matches!(
        s.record_frame(1.0).expect("frame"),
        RecordOutcome::FrameRecorded { have: 2, need: 3 }
    ));
    assert!(matches!(
        s.record_frame(1.0).expect("frame"),
        RecordOutcome::PositionComplete { next: Some(_) }
    ));

    let _ = s.record_frame(2.0).expect("frame");
    let sum = s.summary();
    assert_eq!(sum.collected, 1);
    assert_eq!(sum.total, 2);
    assert_eq!(sum.frames, 4);
    assert_eq!(sum.status, SessionStatus::Active);
}

#[test]
fn step_back_requires_active() {
    let mut s = SessionState::new(plan(2), 1, "center", "w-100g").expect("session");
    let err = s.step_back().expect_err("idle step back");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::NotActive)
    ));
}

#[test]
fn stopped_with_data_distinguishes_empty_stops() {
    let mut s = SessionState::new(plan(2), 1, "center", "w-100g").expect("session");
    s.begin();
    s.mark_stopped();
    assert!(!s.stopped_with_data());

    let mut s = SessionState::new(plan(2), 1, "center", "w-100g").expect("session");
    s.begin();
    let _ = s.record_frame(4.0).expect("record");
    s.mark_stopped();
    assert!(s.stopped_with_data());
}

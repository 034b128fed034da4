use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use padcal_core::error::SessionError;
use padcal_core::runner::{MeasurementMode, RunParams, SessionCommand, run};
use padcal_core::{Controller, Position, PositionPlan, SessionStatus};
use padcal_traits::PressureSensor;

/// Sensor producing a steady reading around 10,000 counts (100 kPa with
/// the default calibration).
struct SteadySensor;

impl PressureSensor for SteadySensor {
    fn read(&mut self, _timeout: Duration) -> Result<i32, Box<dyn Error + Send + Sync>> {
        Ok(10_000)
    }
}

struct FailingSensor;

impl PressureSensor for FailingSensor {
    fn read(&mut self, _timeout: Duration) -> Result<i32, Box<dyn Error + Send + Sync>> {
        Err("sensor timeout".into())
    }
}

fn plan(n: usize) -> PositionPlan {
    PositionPlan::new(
        (0..n)
            .map(|i| Position {
                x: 20 + i as u8,
                y: 20,
                dx: i as i32,
                dy: 0,
            })
            .collect(),
    )
}

fn controller(sensor: impl PressureSensor + 'static, n: usize, frames: usize) -> Controller {
    Controller::builder()
        .with_sensor(sensor)
        .with_plan(plan(n))
        .with_frames_per_position(frames)
        .with_weight_id("w-100g")
        .with_guide_refresh_ms(10_000)
        .build()
        .expect("build controller")
}

fn scripted(cmds: impl Into<VecDeque<SessionCommand>>) -> impl FnMut() -> Option<SessionCommand> {
    let mut cmds: VecDeque<SessionCommand> = cmds.into();
    move || cmds.pop_front()
}

fn fast_params(mode: MeasurementMode) -> RunParams {
    RunParams {
        mode,
        frame_interval: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
    }
}

#[test]
fn guided_run_completes_on_record_commands() {
    let mut c = controller(SteadySensor, 2, 2);
    let shutdown = AtomicBool::new(false);
    let pressed: std::cell::RefCell<Vec<(u8, u8)>> = std::cell::RefCell::new(Vec::new());

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Guided),
        scripted([
            SessionCommand::Record,
            SessionCommand::Record,
            SessionCommand::Next,
            SessionCommand::Next,
        ]),
        |p| pressed.borrow_mut().push((p.x, p.y)),
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.collected, 2);
    assert_eq!(summary.frames, 4);
    // The press hook followed the plan: two frames per position.
    assert_eq!(
        pressed.into_inner(),
        vec![(20, 20), (20, 20), (21, 20), (21, 20)]
    );
}

#[test]
fn guided_stop_command_ends_with_stopped_summary() {
    let mut c = controller(SteadySensor, 3, 2);
    let shutdown = AtomicBool::new(false);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Guided),
        scripted([SessionCommand::Record, SessionCommand::Stop]),
        |_| {},
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Stopped);
    assert_eq!(summary.collected, 0);
    assert_eq!(summary.frames, 0, "pending frames are discarded on stop");
}

#[test]
fn vetoed_close_keeps_the_session_running() {
    // Default confirm collaborator proceeds; use a controller whose
    // confirm always resumes to exercise the veto path.
    use padcal_traits::{CloseResponse, StopConfirm};
    struct AlwaysResume;
    impl StopConfirm for AlwaysResume {
        fn confirm_stop(&mut self, _c: usize, _t: usize) -> CloseResponse {
            CloseResponse::Resume
        }
    }

    let mut c = Controller::builder()
        .with_sensor(SteadySensor)
        .with_plan(plan(2))
        .with_frames_per_position(1)
        .with_weight_id("w-100g")
        .with_guide_refresh_ms(10_000)
        .with_confirm(AlwaysResume)
        .build()
        .expect("build controller");
    let shutdown = AtomicBool::new(false);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Guided),
        scripted([
            SessionCommand::Record,
            SessionCommand::CloseGuide,
            SessionCommand::Record,
        ]),
        |_| {},
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.collected, 2, "the vetoed close lost no data");
}

#[test]
fn confirmed_close_stops_the_run() {
    // The default confirm collaborator always proceeds.
    let mut c = controller(SteadySensor, 3, 1);
    let shutdown = AtomicBool::new(false);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Guided),
        scripted([SessionCommand::Record, SessionCommand::CloseGuide]),
        |_| {},
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Stopped);
    assert_eq!(summary.collected, 1);
}

#[test]
fn auto_run_completes_without_commands() {
    let mut c = controller(SteadySensor, 3, 2);
    let shutdown = AtomicBool::new(false);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Auto),
        || None,
        |_| {},
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Completed);
    assert_eq!(summary.collected, 3);
    assert_eq!(summary.frames, 6);
}

#[test]
fn auto_run_ignores_manual_record_commands() {
    let mut c = controller(SteadySensor, 2, 1);
    let shutdown = AtomicBool::new(false);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Auto),
        scripted([SessionCommand::Record, SessionCommand::Back]),
        |_| {},
        &shutdown,
    )
    .expect("run");

    // Exactly the plan's worth of frames, none from the manual commands.
    assert_eq!(summary.frames, 2);
    assert_eq!(summary.status, SessionStatus::Completed);
}

#[test]
fn preset_shutdown_flag_stops_before_any_frame() {
    let mut c = controller(SteadySensor, 3, 1);
    let shutdown = AtomicBool::new(true);

    let summary = run(
        &mut c,
        fast_params(MeasurementMode::Auto),
        || None,
        |_| {},
        &shutdown,
    )
    .expect("run");

    assert_eq!(summary.status, SessionStatus::Stopped);
    assert_eq!(summary.collected, 0);
}

#[test]
fn sensor_failure_tears_down_and_propagates() {
    let mut c = controller(FailingSensor, 2, 1);
    let shutdown = AtomicBool::new(false);

    let err = run(
        &mut c,
        fast_params(MeasurementMode::Auto),
        || None,
        |_| {},
        &shutdown,
    )
    .expect_err("sensor failure must propagate");

    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Timeout)
    ));
    assert_eq!(c.session().status(), SessionStatus::Stopped);
    assert!(!c.guide_running(), "teardown ran before the error returned");
}

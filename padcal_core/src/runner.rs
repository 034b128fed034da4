//! Session runner: drives a controller to a terminal state on the
//! caller's thread.
//!
//! Cooperative and single-threaded: the loop below is the only mutator of
//! the session. Guide ticks and operator commands are polled between
//! handlers and every handler runs to completion before the next event is
//! processed. Cancellation is cooperative via the shared shutdown flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use padcal_traits::PressureSensor;

use crate::controller::{CloseOutcome, GuidedController};
use crate::error::Result;
use crate::positions::Position;
use crate::session::{RecordOutcome, SessionSummary};

/// How frames are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementMode {
    /// Operator-paced: frames are recorded on explicit commands.
    Guided,
    /// Timer-paced: one frame per interval until the plan is exhausted.
    Auto,
}

/// Operator commands consumed by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    /// Record one frame at the current position.
    Record,
    /// Record one frame; positions advance automatically once their frame
    /// quota is met, so "next" and "record" act the same.
    Next,
    /// Go back one position for re-measurement.
    Back,
    /// Explicit stop.
    Stop,
    /// The guide window was closed by the host.
    CloseGuide,
}

#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    pub mode: MeasurementMode,
    /// Pace of automatic collection.
    pub frame_interval: Duration,
    /// Idle poll period while waiting for operator commands.
    pub poll_interval: Duration,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            mode: MeasurementMode::Guided,
            frame_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Run a session until it completes or stops, returning the final summary.
///
/// `next_command` is polled for operator input (`None` when idle);
/// `press_hook` is invoked with the target position right before each
/// frame is recorded, letting simulated rigs move the press.
pub fn run<S, F, H>(
    controller: &mut GuidedController<S>,
    params: RunParams,
    mut next_command: F,
    mut press_hook: H,
    shutdown: &AtomicBool,
) -> Result<SessionSummary>
where
    S: PressureSensor,
    F: FnMut() -> Option<SessionCommand>,
    H: FnMut(&Position),
{
    controller.start()?;
    let clock = controller.clock().clone();

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested, stopping session");
            controller.user_stop();
            return Ok(controller.summary());
        }

        controller.on_tick();

        // Drain pending operator commands before pacing.
        let mut handled_any = false;
        while let Some(cmd) = next_command() {
            handled_any = true;
            match cmd {
                SessionCommand::Record | SessionCommand::Next => {
                    if params.mode == MeasurementMode::Auto {
                        tracing::debug!("manual record ignored in auto mode");
                        continue;
                    }
                    if let Err(e) = record_one(controller, &mut press_hook) {
                        controller.user_stop();
                        return Err(e);
                    }
                }
                SessionCommand::Back => {
                    if params.mode == MeasurementMode::Auto {
                        tracing::debug!("manual step-back ignored in auto mode");
                        continue;
                    }
                    if let Err(e) = controller.step_back() {
                        controller.user_stop();
                        return Err(e);
                    }
                }
                SessionCommand::Stop => {
                    controller.user_stop();
                    return Ok(controller.summary());
                }
                SessionCommand::CloseGuide => {
                    if controller.window_closed() == CloseOutcome::SessionStopped {
                        return Ok(controller.summary());
                    }
                }
            }
            if controller.summary().status.is_terminal() {
                return Ok(controller.summary());
            }
        }

        match params.mode {
            MeasurementMode::Auto => {
                if let Err(e) = record_one(controller, &mut press_hook) {
                    controller.user_stop();
                    return Err(e);
                }
                if controller.summary().status.is_terminal() {
                    return Ok(controller.summary());
                }
                clock.sleep(params.frame_interval);
            }
            MeasurementMode::Guided => {
                if controller.summary().status.is_terminal() {
                    return Ok(controller.summary());
                }
                if !handled_any {
                    clock.sleep(params.poll_interval);
                }
            }
        }
    }
}

fn record_one<S, H>(controller: &mut GuidedController<S>, press_hook: &mut H) -> Result<()>
where
    S: PressureSensor,
    H: FnMut(&Position),
{
    if let Some(p) = controller.session().current_position().copied() {
        press_hook(&p);
    }
    match controller.record()? {
        RecordOutcome::SessionComplete => {
            tracing::info!("session complete");
        }
        RecordOutcome::PositionComplete { next: Some(next) } => {
            tracing::info!(x = next.x, y = next.y, "position sealed, move the weight");
        }
        RecordOutcome::PositionComplete { next: None } | RecordOutcome::FrameRecorded { .. } => {}
    }
    Ok(())
}

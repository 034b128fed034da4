//! Guided measurement controller.
//!
//! Owns the session state, the sensor, the guide timer, and the host
//! collaborators (guide display, stop confirmation, affordance panel).
//! `Stopped` and `Completed` share one teardown sequence that runs exactly
//! once per session; every teardown step is individually guarded so a
//! failure in one (e.g., a display already disposed) never prevents the
//! others from running.

use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use padcal_config::Calibration;
use padcal_traits::{
    Affordance, Clock, CloseResponse, GuideCue, GuideDisplay, MonotonicClock, PressureSensor,
    StopConfirm,
};

use crate::error::{BuildError, Result, SessionError};
use crate::guide::GuideTimer;
use crate::mocks::{AlwaysProceed, NullDisplay, NullPanel};
use crate::positions::{Position, PositionPlan};
use crate::session::{RecordOutcome, SessionState, SessionStatus, SessionSummary};

// For typed backend error mapping
#[cfg(feature = "hardware-errors")]
use padcal_hardware::HwError;

/// Why the teardown ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Completed,
    UserStop,
    GuideClosed,
}

/// Result of delivering a window-close notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The operator confirmed; the session was stopped.
    SessionStopped,
    /// The close was vetoed; the guide was reopened and the session
    /// remains active.
    Vetoed,
    /// No session was active; nothing to confirm.
    Ignored,
}

/// Outcome of one teardown pass. Failed steps were logged and skipped
/// over; they never abort the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownReport {
    pub reason: StopReason,
    pub failed_steps: Vec<&'static str>,
}

impl TeardownReport {
    fn clean(reason: StopReason) -> Self {
        Self {
            reason,
            failed_steps: Vec::new(),
        }
    }
}

/// The single mapping from session state to enabled affordances, applied
/// atomically on every transition.
pub fn affordance_table(status: SessionStatus, has_samples: bool) -> Vec<(Affordance, bool)> {
    let active = status == SessionStatus::Active;
    vec![
        (Affordance::GeneratePositions, !active),
        (Affordance::StartSession, !active),
        (Affordance::StopSession, active),
        (Affordance::RecordFrame, active),
        (Affordance::NextPosition, active),
        (Affordance::PreviousPosition, active),
        (Affordance::Analyze, !active && has_samples),
        (Affordance::SaveResults, !active && has_samples),
    ]
}

pub struct GuidedController<S: PressureSensor> {
    sensor: S,
    session: SessionState,
    calibration: Calibration,
    display: Box<dyn GuideDisplay>,
    confirm: Box<dyn StopConfirm>,
    panel: Box<dyn padcal_traits::AffordancePanel>,
    clock: Arc<dyn Clock + Send + Sync>,
    timer: Option<GuideTimer>,
    guide_refresh: Duration,
    sensor_timeout: Duration,
    /// Tracks whether we believe the guide window is on screen; close is
    /// only attempted while true, so a second close can never error.
    display_open: bool,
    torn_down: bool,
    blink_on: bool,
    last_kpa: f32,
}

impl<S: PressureSensor> core::fmt::Debug for GuidedController<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GuidedController")
            .field("status", &self.session.status())
            .field("current_index", &self.session.current_index())
            .field("last_kpa", &self.last_kpa)
            .finish()
    }
}

impl<S: PressureSensor> GuidedController<S> {
    /// Start a new session. Allowed from `Idle` and from both terminal
    /// states; starting always resets the cursor and clears prior samples.
    pub fn start(&mut self) -> Result<()> {
        if self.session.status() == SessionStatus::Active {
            return Err(eyre::Report::new(SessionError::InvalidParameter(
                "a session is already active".into(),
            )));
        }
        // Open the guide first: a display that cannot open fails the start
        // and there is nothing to tear down yet.
        self.display
            .open()
            .map_err(|e| eyre::Report::new(SessionError::Hardware(e.to_string())))
            .wrap_err("open guide display")?;
        self.display_open = true;

        self.session.begin();
        self.torn_down = false;
        self.blink_on = false;
        self.last_kpa = 0.0;
        self.timer = Some(GuideTimer::spawn(self.guide_refresh, self.clock.clone()));
        self.apply_affordances();
        self.refresh_guide();
        tracing::info!(
            positions = self.session.positions().len(),
            frames_per_position = self.session.frames_per_position(),
            region = self.session.region_id(),
            weight = self.session.weight_id(),
            "guided session start"
        );
        Ok(())
    }

    /// Read the sensor and record one frame at the current position.
    pub fn record(&mut self) -> Result<RecordOutcome> {
        let raw = self
            .sensor
            .read(self.sensor_timeout)
            .map_err(|e| eyre::Report::new(map_hw_error_dyn(&*e)))
            .wrap_err("reading pad")?;
        self.record_from_raw(raw)
    }

    /// Record a pre-sampled raw count (external sampling integration).
    pub fn record_from_raw(&mut self, raw: i32) -> Result<RecordOutcome> {
        let kpa = self.calibration.to_kpa(raw);
        let outcome = self.session.record_frame(kpa)?;
        self.last_kpa = kpa;
        match outcome {
            RecordOutcome::SessionComplete => {
                tracing::info!(
                    collected = self.session.samples().len(),
                    "all positions measured"
                );
                self.teardown(StopReason::Completed);
            }
            RecordOutcome::PositionComplete { .. } | RecordOutcome::FrameRecorded { .. } => {
                self.refresh_guide();
            }
        }
        Ok(outcome)
    }

    /// Explicit cancellation. Safe to call at any time; repeating it after
    /// the session is already down is a no-op.
    pub fn user_stop(&mut self) -> TeardownReport {
        self.session.mark_stopped();
        self.teardown(StopReason::UserStop)
    }

    /// The host window was closed. While a session is active the operator
    /// is asked to confirm; declining (or dismissing the prompt) vetoes
    /// the close and reopens the guide.
    pub fn window_closed(&mut self) -> CloseOutcome {
        self.display_open = false;
        if self.session.status() != SessionStatus::Active {
            return CloseOutcome::Ignored;
        }
        let s = self.session.summary();
        match self.confirm.confirm_stop(s.collected, s.total) {
            CloseResponse::Proceed => {
                tracing::info!("guide closed, operator confirmed stop");
                self.session.mark_stopped();
                self.teardown(StopReason::GuideClosed);
                CloseOutcome::SessionStopped
            }
            CloseResponse::Resume | CloseResponse::Cancel => {
                match self.display.open() {
                    Ok(()) => {
                        self.display_open = true;
                        self.refresh_guide();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not reopen guide display after veto");
                    }
                }
                CloseOutcome::Vetoed
            }
        }
    }

    /// Drive the guide from the timer: toggle the blink phase and refresh
    /// the display when a tick arrived.
    pub fn on_tick(&mut self) {
        if self.session.status() != SessionStatus::Active {
            return;
        }
        let ticked = self
            .timer
            .as_ref()
            .map(|t| t.tick_pending())
            .unwrap_or(false);
        if ticked {
            self.blink_on = !self.blink_on;
            self.refresh_guide();
        }
    }

    /// Manual control: go back one position for re-measurement.
    pub fn step_back(&mut self) -> Result<Option<Position>> {
        let pos = self.session.step_back()?;
        self.refresh_guide();
        Ok(pos)
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn summary(&self) -> SessionSummary {
        self.session.summary()
    }

    /// Last calibrated reading in kPa.
    pub fn last_kpa(&self) -> f32 {
        self.last_kpa
    }

    pub fn guide_running(&self) -> bool {
        self.timer.as_ref().map(|t| !t.is_stopped()).unwrap_or(false)
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    fn cue(&self) -> Option<GuideCue> {
        self.session.current_position().map(|p| GuideCue {
            index: self.session.current_index(),
            total: self.session.positions().len(),
            x: p.x,
            y: p.y,
            dx: p.dx,
            dy: p.dy,
            blink_on: self.blink_on,
        })
    }

    /// Refresh the guide display; never fatal, a failing display only logs.
    fn refresh_guide(&mut self) {
        if !self.display_open {
            return;
        }
        if let Some(cue) = self.cue()
            && let Err(e) = self.display.refresh(&cue)
        {
            tracing::warn!(error = %e, "guide refresh failed");
        }
    }

    fn apply_affordances(&mut self) {
        let table = affordance_table(self.session.status(), self.session.has_samples());
        if let Err(e) = self.panel.apply(&table) {
            let err = SessionError::Teardown {
                step: "apply affordances",
                message: e.to_string(),
            };
            tracing::warn!(error = %err, "affordance update failed");
        }
    }

    /// The idempotent stop sequence shared by `Stopped` and `Completed`.
    /// Steps are independently guarded; partial failure is logged and the
    /// remaining steps still execute.
    fn teardown(&mut self, reason: StopReason) -> TeardownReport {
        if self.torn_down {
            return TeardownReport::clean(reason);
        }
        self.torn_down = true;
        let mut report = TeardownReport::clean(reason);

        // 1) stop the guide timer (idempotent by construction)
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }

        // 2) close the guide display if it is still on screen
        if self.display_open {
            self.display_open = false;
            if let Err(e) = self.display.close() {
                let err = SessionError::Teardown {
                    step: "close guide display",
                    message: e.to_string(),
                };
                tracing::warn!(error = %err, "teardown step failed");
                report.failed_steps.push("close guide display");
            }
        }

        // 3) freeze manual controls, enable result-dependent affordances
        //    iff the session holds data
        let table = affordance_table(self.session.status(), self.session.has_samples());
        if let Err(e) = self.panel.apply(&table) {
            let err = SessionError::Teardown {
                step: "apply affordances",
                message: e.to_string(),
            };
            tracing::warn!(error = %err, "teardown step failed");
            report.failed_steps.push("apply affordances");
        }

        let s = self.session.summary();
        tracing::info!(
            reason = ?reason,
            collected = s.collected,
            total = s.total,
            failed_steps = report.failed_steps.len(),
            "session teardown complete"
        );
        report
    }
}

// Map any error to a typed SessionError, with special handling for
// backend errors.
fn map_hw_error_dyn(e: &(dyn std::error::Error + 'static)) -> SessionError {
    if let Some(mapped) = try_map_hw_error(e) {
        return mapped;
    }
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        SessionError::Timeout
    } else {
        SessionError::Hardware(s)
    }
}

#[cfg(feature = "hardware-errors")]
fn try_map_hw_error(e: &(dyn std::error::Error + 'static)) -> Option<SessionError> {
    e.downcast_ref::<HwError>().map(|hw| match hw {
        HwError::Timeout | HwError::NotReady => SessionError::Timeout,
        other => SessionError::HardwareFault(other.to_string()),
    })
}

#[cfg(not(feature = "hardware-errors"))]
fn try_map_hw_error(_e: &(dyn std::error::Error + 'static)) -> Option<SessionError> {
    None
}

/// Boxed controller produced by the builder.
pub type Controller = GuidedController<Box<dyn PressureSensor>>;

// Type-state markers for the builder
pub struct Missing;
pub struct Set;

use std::marker::PhantomData;

/// Builder for `GuidedController`. All fields are validated on `build()`.
pub struct ControllerBuilder<S, P> {
    sensor: Option<Box<dyn PressureSensor>>,
    plan: Option<PositionPlan>,
    frames_per_position: Option<usize>,
    region_id: Option<String>,
    weight_id: Option<String>,
    calibration: Option<Calibration>,
    display: Option<Box<dyn GuideDisplay>>,
    confirm: Option<Box<dyn StopConfirm>>,
    panel: Option<Box<dyn padcal_traits::AffordancePanel>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    guide_refresh_ms: Option<u64>,
    sensor_timeout_ms: Option<u64>,
    // Type-state markers
    _s: PhantomData<S>,
    _p: PhantomData<P>,
}

impl Default for ControllerBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensor: None,
            plan: None,
            frames_per_position: None,
            region_id: None,
            weight_id: None,
            calibration: None,
            display: None,
            confirm: None,
            panel: None,
            clock: None,
            guide_refresh_ms: None,
            sensor_timeout_ms: None,
            _s: PhantomData,
            _p: PhantomData,
        }
    }
}

impl Controller {
    /// Start building a controller.
    pub fn builder() -> ControllerBuilder<Missing, Missing> {
        ControllerBuilder::default()
    }
}

impl<S, P> ControllerBuilder<S, P> {
    /// Fallible build available in any type-state; returns a detailed
    /// BuildError for missing pieces.
    pub fn try_build(self) -> Result<Controller> {
        let ControllerBuilder {
            sensor,
            plan,
            frames_per_position,
            region_id,
            weight_id,
            calibration,
            display,
            confirm,
            panel,
            clock,
            guide_refresh_ms,
            sensor_timeout_ms,
            _s: _,
            _p: _,
        } = self;

        let sensor = sensor.ok_or_else(|| eyre::Report::new(BuildError::MissingSensor))?;
        let plan = plan.ok_or_else(|| eyre::Report::new(BuildError::MissingPlan))?;
        if plan.is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "position plan must not be empty",
            )));
        }

        let frames_per_position = frames_per_position.unwrap_or(10);
        if frames_per_position == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "frames per position must be >= 1",
            )));
        }
        let weight_id = weight_id.unwrap_or_default();
        if weight_id.trim().is_empty() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "weight id must not be empty",
            )));
        }
        let guide_refresh_ms = guide_refresh_ms.unwrap_or(500);
        if guide_refresh_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "guide refresh must be >= 1 ms",
            )));
        }
        let sensor_timeout_ms = sensor_timeout_ms.unwrap_or(150);
        if sensor_timeout_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "sensor timeout must be >= 1 ms",
            )));
        }

        let region_id = region_id.unwrap_or_else(|| "custom".to_string());
        let session = SessionState::new(plan, frames_per_position, region_id, weight_id)?;

        let clock: Arc<dyn Clock + Send + Sync> = match clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(GuidedController {
            sensor,
            session,
            calibration: calibration.unwrap_or_default(),
            display: display.unwrap_or_else(|| Box::new(NullDisplay)),
            confirm: confirm.unwrap_or_else(|| Box::new(AlwaysProceed)),
            panel: panel.unwrap_or_else(|| Box::new(NullPanel)),
            clock,
            timer: None,
            guide_refresh: Duration::from_millis(guide_refresh_ms),
            sensor_timeout: Duration::from_millis(sensor_timeout_ms),
            display_open: false,
            torn_down: false,
            blink_on: false,
            last_kpa: 0.0,
        })
    }
}

/// Chainable setters that do not affect type-state
impl<S, P> ControllerBuilder<S, P> {
    pub fn with_frames_per_position(mut self, frames: usize) -> Self {
        self.frames_per_position = Some(frames);
        self
    }
    pub fn with_region_id(mut self, id: impl Into<String>) -> Self {
        self.region_id = Some(id.into());
        self
    }
    pub fn with_weight_id(mut self, id: impl Into<String>) -> Self {
        self.weight_id = Some(id.into());
        self
    }
    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }
    pub fn with_display(mut self, display: impl GuideDisplay + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }
    pub fn with_confirm(mut self, confirm: impl StopConfirm + 'static) -> Self {
        self.confirm = Some(Box::new(confirm));
        self
    }
    pub fn with_panel(mut self, panel: impl padcal_traits::AffordancePanel + 'static) -> Self {
        self.panel = Some(Box::new(panel));
        self
    }
    pub fn with_guide_refresh_ms(mut self, ms: u64) -> Self {
        self.guide_refresh_ms = Some(ms);
        self
    }
    pub fn with_sensor_timeout_ms(mut self, ms: u64) -> Self {
        self.sensor_timeout_ms = Some(ms);
        self
    }
    /// Provide a custom clock implementation; defaults to MonotonicClock
    /// when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state when providing mandatory components
impl<P> ControllerBuilder<Missing, P> {
    pub fn with_sensor(self, sensor: impl PressureSensor + 'static) -> ControllerBuilder<Set, P> {
        let ControllerBuilder {
            sensor: _,
            plan,
            frames_per_position,
            region_id,
            weight_id,
            calibration,
            display,
            confirm,
            panel,
            clock,
            guide_refresh_ms,
            sensor_timeout_ms,
            _s: _,
            _p: _,
        } = self;
        ControllerBuilder {
            sensor: Some(Box::new(sensor)),
            plan,
            frames_per_position,
            region_id,
            weight_id,
            calibration,
            display,
            confirm,
            panel,
            clock,
            guide_refresh_ms,
            sensor_timeout_ms,
            _s: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<S> ControllerBuilder<S, Missing> {
    pub fn with_plan(self, plan: PositionPlan) -> ControllerBuilder<S, Set> {
        let ControllerBuilder {
            sensor,
            plan: _,
            frames_per_position,
            region_id,
            weight_id,
            calibration,
            display,
            confirm,
            panel,
            clock,
            guide_refresh_ms,
            sensor_timeout_ms,
            _s: _,
            _p: _,
        } = self;
        ControllerBuilder {
            sensor,
            plan: Some(plan),
            frames_per_position,
            region_id,
            weight_id,
            calibration,
            display,
            confirm,
            panel,
            clock,
            guide_refresh_ms,
            sensor_timeout_ms,
            _s: PhantomData,
            _p: PhantomData,
        }
    }
}

impl ControllerBuilder<Set, Set> {
    /// Validate and build. Only available when sensor and plan are set.
    pub fn build(self) -> Result<Controller> {
        self.try_build()
    }
}

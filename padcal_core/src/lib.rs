#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core guided-measurement logic (backend-agnostic).
//!
//! This crate provides the sensor-independent survey engine. All sensor
//! interactions go through the `padcal_traits::PressureSensor` trait; the
//! host UI is reached only through the collaborator capabilities
//! (`GuideDisplay`, `StopConfirm`, `AffordancePanel`).
//!
//! ## Architecture
//!
//! - **Positions**: jittered plan generation and sequencing (`positions`)
//! - **Session**: append-only sample store with the status invariants (`session`)
//! - **Controller**: start/record/stop state machine with one idempotent
//!   teardown shared by stop and completion (`controller`)
//! - **Guide timer**: periodic prompt source on its own thread (`guide`)
//! - **Analysis**: per-position and position-CV statistics with grading (`analysis`)
//! - **Report**: serializable records and the plain-text report (`report`)
//! - **Runner**: cooperative loop driving a session to a terminal state (`runner`)

pub mod analysis;
pub mod controller;
pub mod error;
pub mod guide;
pub mod mocks;
pub mod positions;
pub mod report;
pub mod runner;
pub mod session;

pub use analysis::{
    OverallStats, PositionStats, SensitivityAnalysis, SensitivityGrade, analyze, grade_for,
};
pub use controller::{
    CloseOutcome, Controller, ControllerBuilder, GuidedController, StopReason, TeardownReport,
    affordance_table,
};
pub use error::{BuildError, SessionError};
pub use guide::GuideTimer;
pub use positions::{Position, PositionPlan, generate_positions};
pub use report::{AnalysisRecord, SessionRecord, TestInfo, render_text_report};
pub use runner::{MeasurementMode, RunParams, SessionCommand, run};
pub use session::{RecordOutcome, Sample, SessionState, SessionStatus, SessionSummary};

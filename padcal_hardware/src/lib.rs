//! Sensor backends for the pad survey toolkit.
//!
//! All backends implement `padcal_traits::PressureSensor` and return raw
//! ADC counts; calibration to pressure units happens in `padcal_core`.

pub mod error;
pub mod replay;
pub mod sim;

pub use error::HwError;
pub use replay::ReplayPad;
pub use sim::{DeadPad, SimulatedPad, StimulusHandle};

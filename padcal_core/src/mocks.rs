//! Test and helper mocks for padcal_core

use padcal_traits::{
    Affordance, CloseResponse, GuideCue, GuideDisplay, PressureSensor, StopConfirm,
};

/// A sensor that always errors on read; useful when driving the session
/// with externally sampled raw counts via `record_from_raw`.
pub struct NoopSensor;

impl PressureSensor for NoopSensor {
    fn read(
        &mut self,
        _timeout: std::time::Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(std::io::Error::other("noop sensor")))
    }
}

/// Display that renders nowhere; default collaborator for headless runs.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl GuideDisplay for NullDisplay {
    fn open(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
    fn refresh(&mut self, _cue: &GuideCue) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

/// Confirmation collaborator that always stops; closing the guide in a
/// headless run is an unambiguous stop request.
#[derive(Debug, Default)]
pub struct AlwaysProceed;

impl StopConfirm for AlwaysProceed {
    fn confirm_stop(&mut self, _collected: usize, _total: usize) -> CloseResponse {
        CloseResponse::Proceed
    }
}

/// Affordance sink that applies nowhere.
#[derive(Debug, Default)]
pub struct NullPanel;

impl padcal_traits::AffordancePanel for NullPanel {
    fn apply(
        &mut self,
        _states: &[(Affordance, bool)],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }
}

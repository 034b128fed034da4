//! Simulated pressure pad.
//!
//! The response model follows the reference rig: a press produces a base
//! pressure scaled by how far the press landed from the region base, plus
//! uniform noise. The pad emits raw counts; the default gain matches the
//! default runtime calibration (1 count = 0.01 kPa).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use padcal_traits::PressureSensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::HwError;

/// Cloneable handle that moves the simulated press while the sensor itself
/// is owned by the controller. `None` means the pad is untouched.
#[derive(Debug, Clone, Default)]
pub struct StimulusHandle(Arc<Mutex<Option<f32>>>);

impl StimulusHandle {
    /// Simulate a press at the given offset distance (cells) from the
    /// region base.
    pub fn press_at_distance(&self, distance: f32) {
        if let Ok(mut s) = self.0.lock() {
            *s = Some(distance.max(0.0));
        }
    }

    /// Lift the weight off the pad.
    pub fn release(&self) {
        if let Ok(mut s) = self.0.lock() {
            *s = None;
        }
    }

    fn current(&self) -> Option<f32> {
        self.0.lock().map(|s| *s).unwrap_or(None)
    }
}

pub struct SimulatedPad {
    /// Nominal pressure under the reference weight, in kPa.
    base_kpa: f32,
    /// Half-width of the uniform noise band, in kPa.
    noise_kpa: f32,
    /// Raw counts per kPa.
    counts_per_kpa: f32,
    stimulus: StimulusHandle,
    rng: StdRng,
}

impl SimulatedPad {
    /// Build a pad with the default response model and a deterministic RNG.
    /// Returns the pad and the stimulus handle used to move the press.
    pub fn new(seed: u64) -> (Self, StimulusHandle) {
        let handle = StimulusHandle::default();
        let pad = Self {
            base_kpa: 100.0,
            noise_kpa: 5.0,
            counts_per_kpa: 100.0,
            stimulus: handle.clone(),
            rng: StdRng::seed_from_u64(seed),
        };
        (pad, handle)
    }

    pub fn with_base_kpa(mut self, base_kpa: f32) -> Self {
        self.base_kpa = base_kpa;
        self
    }

    pub fn with_noise_kpa(mut self, noise_kpa: f32) -> Self {
        self.noise_kpa = noise_kpa.max(0.0);
        self
    }

    fn frame_kpa(&mut self) -> f32 {
        let noise = if self.noise_kpa > 0.0 {
            self.rng.gen_range(-self.noise_kpa..=self.noise_kpa)
        } else {
            0.0
        };
        match self.stimulus.current() {
            // Response falls off by 1% per cell of press-placement error.
            Some(distance) => self.base_kpa * (1.0 + 0.01 * distance) + noise,
            // Untouched pad: baseline noise only.
            None => noise.abs() * 0.1,
        }
    }
}

impl PressureSensor for SimulatedPad {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        let kpa = self.frame_kpa();
        let raw = (kpa * self.counts_per_kpa).round() as i32;
        tracing::trace!(raw, kpa, "simulated pad frame");
        Ok(raw)
    }
}

/// A pad that always fails; exercises the timeout path.
pub struct DeadPad;

impl PressureSensor for DeadPad {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(HwError::Timeout))
    }
}

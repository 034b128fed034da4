//! Replay sensor: feeds raw counts recorded earlier, one per line.
//!
//! Blank lines and `#` comments are skipped. When the recording runs out
//! the sensor reports `NotReady` so a session cannot silently keep
//! recording stale data.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use padcal_traits::PressureSensor;

use crate::error::{HwError, Result};

#[derive(Debug)]
pub struct ReplayPad {
    frames: std::vec::IntoIter<i32>,
}

impl ReplayPad {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut frames = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let raw: i32 = trimmed
                .parse()
                .map_err(|e| HwError::Fault(format!("replay line {}: {e}", idx + 1)))?;
            frames.push(raw);
        }
        tracing::debug!(frames = frames.len(), path = %path.display(), "replay loaded");
        Ok(Self {
            frames: frames.into_iter(),
        })
    }

    pub fn from_frames(frames: Vec<i32>) -> Self {
        Self {
            frames: frames.into_iter(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl PressureSensor for ReplayPad {
    fn read(
        &mut self,
        _timeout: Duration,
    ) -> std::result::Result<i32, Box<dyn std::error::Error + Send + Sync>> {
        match self.frames.next() {
            Some(raw) => Ok(raw),
            None => Err(Box::new(HwError::NotReady)),
        }
    }
}

//! Measurement session state.
//!
//! Frames accumulate in a pending buffer; a `Sample` is appended to the
//! session only when the current position's frame quota is met, and is
//! never mutated afterwards. The plan cursor doubles as `current_index`,
//! so the invariants below hold by construction:
//!
//! - `current_index` is always within `[0, positions.len()]`
//! - `status == Completed` iff `current_index == positions.len()`
//! - `samples.len() <= positions.len()`

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::positions::{Position, PositionPlan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Active,
    Stopped,
    Completed,
}

impl SessionStatus {
    /// Terminal for the current session; a new session may still start.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Stopped | SessionStatus::Completed)
    }
}

/// All frames recorded at one position. Sealed on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub position: Position,
    pub frames: Vec<f32>,
}

/// What a successful `record_frame` did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordOutcome {
    /// Frame stored; the current position still needs more.
    FrameRecorded { have: usize, need: usize },
    /// Quota met; the sample was sealed and the cursor advanced.
    PositionComplete { next: Option<Position> },
    /// The last position was sealed; the session is complete.
    SessionComplete,
}

/// Pure snapshot of the session for status displays and logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SessionSummary {
    pub status: SessionStatus,
    /// Sealed samples.
    pub collected: usize,
    /// Planned positions.
    pub total: usize,
    /// Frames recorded overall, pending included.
    pub frames: usize,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    status: SessionStatus,
    plan: PositionPlan,
    samples: Vec<Sample>,
    pending: Vec<f32>,
    frames_per_position: usize,
    region_id: String,
    weight_id: String,
}

impl SessionState {
    pub fn new(
        plan: PositionPlan,
        frames_per_position: usize,
        region_id: impl Into<String>,
        weight_id: impl Into<String>,
    ) -> Result<Self> {
        if plan.is_empty() {
            return Err(eyre::Report::new(SessionError::InvalidParameter(
                "position plan must not be empty".into(),
            )));
        }
        if frames_per_position == 0 {
            return Err(eyre::Report::new(SessionError::InvalidParameter(
                "frames per position must be >= 1".into(),
            )));
        }
        let weight_id = weight_id.into();
        if weight_id.trim().is_empty() {
            return Err(eyre::Report::new(SessionError::InvalidParameter(
                "weight id must not be empty".into(),
            )));
        }
        Ok(Self {
            status: SessionStatus::Idle,
            plan,
            samples: Vec::new(),
            pending: Vec::with_capacity(frames_per_position),
            frames_per_position,
            region_id: region_id.into(),
            weight_id,
        })
    }

    /// Reset for a new run: cursor to 0, samples and pending cleared,
    /// status `Active`.
    pub fn begin(&mut self) {
        self.plan.rewind();
        self.samples.clear();
        self.pending.clear();
        self.status = SessionStatus::Active;
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn current_index(&self) -> usize {
        self.plan.cursor()
    }

    pub fn current_position(&self) -> Option<&Position> {
        self.plan.current()
    }

    pub fn positions(&self) -> &[Position] {
        self.plan.positions()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }

    pub fn stopped_with_data(&self) -> bool {
        self.status == SessionStatus::Stopped && self.has_samples()
    }

    pub fn frames_per_position(&self) -> usize {
        self.frames_per_position
    }

    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn weight_id(&self) -> &str {
        &self.weight_id
    }

    /// Record one calibrated frame at the current position.
    ///
    /// Fails with `NotActive` in any state but `Active`; the session is
    /// left untouched in that case.
    pub fn record_frame(&mut self, kpa: f32) -> Result<RecordOutcome> {
        if self.status != SessionStatus::Active {
            return Err(eyre::Report::new(SessionError::NotActive));
        }
        // Active implies a position under the cursor: the transition to
        // Completed happens in the same call that seals the last sample.
        let Some(position) = self.plan.current().copied() else {
            return Err(eyre::Report::new(SessionError::NotActive));
        };

        self.pending.push(kpa);
        if self.pending.len() < self.frames_per_position {
            return Ok(RecordOutcome::FrameRecorded {
                have: self.pending.len(),
                need: self.frames_per_position,
            });
        }

        let frames = std::mem::take(&mut self.pending);
        self.samples.push(Sample { position, frames });
        let next = self.plan.advance().copied();
        debug_assert!(self.samples.len() <= self.plan.len());
        match next {
            Some(next) => Ok(RecordOutcome::PositionComplete { next: Some(next) }),
            None => {
                self.status = SessionStatus::Completed;
                Ok(RecordOutcome::SessionComplete)
            }
        }
    }

    /// Discard pending frames; when none were pending, pop the last sealed
    /// sample and move the cursor back so the position is re-measured.
    /// Returns the position now under the cursor.
    pub fn step_back(&mut self) -> Result<Option<Position>> {
        if self.status != SessionStatus::Active {
            return Err(eyre::Report::new(SessionError::NotActive));
        }
        if !self.pending.is_empty() {
            self.pending.clear();
            return Ok(self.plan.current().copied());
        }
        if self.plan.cursor() > 0 {
            self.samples.pop();
            return Ok(self.plan.step_back().copied());
        }
        Ok(self.plan.current().copied())
    }

    /// Explicit cancellation; only meaningful from `Active`.
    pub fn mark_stopped(&mut self) {
        if self.status == SessionStatus::Active {
            self.pending.clear();
            self.status = SessionStatus::Stopped;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            status: self.status,
            collected: self.samples.len(),
            total: self.plan.len(),
            frames: self
                .samples
                .iter()
                .map(|s| s.frames.len())
                .sum::<usize>()
                + self.pending.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(n: usize) -> PositionPlan {
        PositionPlan::new(
            (0..n)
                .map(|i| Position {
                    x: i as u8,
                    y: 0,
                    dx: i as i32,
                    dy: 0,
                })
                .collect(),
        )
    }

    #[test]
    fn rejects_empty_weight_id() {
        let err = SessionState::new(plan(2), 3, "center", "  ").expect_err("empty weight id");
        assert!(format!("{err}").contains("weight id"));
    }

    #[test]
    fn completed_iff_cursor_at_end() {
        let mut s = SessionState::new(plan(2), 1, "center", "w-100g").unwrap();
        s.begin();
        assert!(matches!(
            s.record_frame(10.0).unwrap(),
            RecordOutcome::PositionComplete { .. }
        ));
        assert_eq!(s.status(), SessionStatus::Active);
        assert!(matches!(
            s.record_frame(11.0).unwrap(),
            RecordOutcome::SessionComplete
        ));
        assert_eq!(s.status(), SessionStatus::Completed);
        assert_eq!(s.current_index(), s.positions().len());
    }
}

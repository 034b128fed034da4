//! Position generation and sequencing.
//!
//! A plan is a batch of jittered positions around a region base. Positions
//! are immutable once generated; the plan cursor is the single source of
//! truth for "which position is next".

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Attempts per position before giving up on finding a distinct cell.
const MAX_PLACEMENT_ATTEMPTS: usize = 100;

/// One test location on the pad: grid coordinate plus the jitter offset
/// from the region base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: u8,
    pub y: u8,
    pub dx: i32,
    pub dy: i32,
}

impl Position {
    /// Euclidean distance of the jitter offset, in cells.
    pub fn distance(&self) -> f32 {
        (((self.dx * self.dx) + (self.dy * self.dy)) as f32).sqrt()
    }

    /// Stable display label derived from the plan index ("pos_1", ...).
    pub fn label(index: usize) -> String {
        format!("pos_{}", index + 1)
    }
}

/// Generate `count` distinct positions jittered around `base` within the
/// grid. Offsets are drawn uniformly per axis in `[-jitter, +jitter]`;
/// out-of-grid or duplicate cells are retried up to a bounded number of
/// attempts.
pub fn generate_positions(
    base: (u8, u8),
    count: usize,
    jitter: i32,
    grid: (u8, u8),
    rng: &mut impl Rng,
) -> Result<Vec<Position>> {
    if count == 0 {
        return Err(invalid("position count must be >= 1"));
    }
    if jitter <= 0 {
        return Err(invalid("jitter must be > 0"));
    }
    let (gw, gh) = grid;
    if gw < 2 || gh < 2 {
        return Err(invalid("grid must be at least 2x2"));
    }
    let (bx, by) = base;
    if bx >= gw || by >= gh {
        return Err(invalid("region base lies outside the grid"));
    }

    let mut positions: Vec<Position> = Vec::with_capacity(count);
    for _ in 0..count {
        let mut placed = false;
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let dx = rng.gen_range(-jitter..=jitter);
            let dy = rng.gen_range(-jitter..=jitter);
            let nx = bx as i32 + dx;
            let ny = by as i32 + dy;
            if nx < 0 || ny < 0 || nx >= gw as i32 || ny >= gh as i32 {
                continue;
            }
            let (nx, ny) = (nx as u8, ny as u8);
            if positions.iter().any(|p| p.x == nx && p.y == ny) {
                continue;
            }
            positions.push(Position {
                x: nx,
                y: ny,
                dx,
                dy,
            });
            placed = true;
            break;
        }
        if !placed {
            return Err(eyre::Report::new(SessionError::InvalidParameter(format!(
                "could not place {count} distinct positions with jitter {jitter} around ({bx}, {by})"
            ))));
        }
    }
    tracing::debug!(
        count = positions.len(),
        jitter,
        base_x = bx,
        base_y = by,
        "positions generated"
    );
    Ok(positions)
}

fn invalid(msg: &str) -> eyre::Report {
    eyre::Report::new(SessionError::InvalidParameter(msg.to_string()))
}

/// Ordered positions plus the cursor. The cursor counts sealed positions:
/// it sits on the position being measured and equals `len()` when the
/// plan is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionPlan {
    positions: Vec<Position>,
    cursor: usize,
}

impl PositionPlan {
    pub fn new(positions: Vec<Position>) -> Self {
        Self {
            positions,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.positions.len()
    }

    /// Position under the cursor, or `None` when exhausted.
    pub fn current(&self) -> Option<&Position> {
        self.positions.get(self.cursor)
    }

    /// Move the cursor forward and return the new current position, or
    /// `None` once the sequence is exhausted. Never errors.
    pub fn advance(&mut self) -> Option<&Position> {
        if self.cursor < self.positions.len() {
            self.cursor += 1;
        }
        self.positions.get(self.cursor)
    }

    /// Move the cursor back one position (re-measurement); no-op at the
    /// start of the plan. Returns the new current position.
    pub fn step_back(&mut self) -> Option<&Position> {
        self.cursor = self.cursor.saturating_sub(1);
        self.positions.get(self.cursor)
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

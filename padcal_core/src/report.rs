//! Result snapshots and the plain-text survey report.
//!
//! `SessionRecord` is the on-disk shape of a finished (or stopped)
//! session; `AnalysisRecord` pairs the test info with the statistics.
//! Serialization to JSON happens at the CLI layer.

use serde::{Deserialize, Serialize};

use crate::analysis::SensitivityAnalysis;
use crate::positions::Position;
use crate::session::{Sample, SessionState, SessionStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub region_id: String,
    pub weight_id: String,
    pub positions: usize,
    pub frames_per_position: usize,
    /// Caller-supplied timestamp string (e.g. "20260806_142455").
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub info: TestInfo,
    pub status: SessionStatus,
    pub positions: Vec<Position>,
    pub samples: Vec<Sample>,
}

impl SessionRecord {
    pub fn from_state(state: &SessionState, timestamp: impl Into<String>) -> Self {
        Self {
            info: TestInfo {
                region_id: state.region_id().to_string(),
                weight_id: state.weight_id().to_string(),
                positions: state.positions().len(),
                frames_per_position: state.frames_per_position(),
                timestamp: timestamp.into(),
            },
            status: state.status(),
            positions: state.positions().to_vec(),
            samples: state.samples().to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub info: TestInfo,
    pub analysis: SensitivityAnalysis,
}

/// Render the survey report as plain text.
pub fn render_text_report(rec: &AnalysisRecord) -> String {
    use core::fmt::Write;
    use crate::analysis::SensitivityGrade;

    let mut out = String::new();
    let rule = "=".repeat(72);
    let thin = "-".repeat(56);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Local pad sensitivity survey report");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Survey time: {}", rec.info.timestamp);
    let _ = writeln!(out);

    let _ = writeln!(out, "Test setup");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "Region:              {}", rec.info.region_id);
    let _ = writeln!(out, "Reference weight:    {}", rec.info.weight_id);
    let _ = writeln!(out, "Positions:           {}", rec.info.positions);
    let _ = writeln!(out, "Frames per position: {}", rec.info.frames_per_position);
    let _ = writeln!(out);

    let a = &rec.analysis;
    let _ = writeln!(out, "Overall statistics");
    let _ = writeln!(out, "{thin}");
    let _ = writeln!(out, "Mean pressure:       {:.2} kPa", a.overall.mean_kpa);
    let _ = writeln!(out, "Std deviation:       {:.2} kPa", a.overall.std_kpa);
    let _ = writeln!(out, "Overall CV:          {:.3}", a.overall.cv);
    let _ = writeln!(out, "Position CV:         {:.3}", a.position_cv);
    let _ = writeln!(out, "Grade:               {}", a.grade);
    let _ = writeln!(out);

    let _ = writeln!(out, "Per-position results");
    let _ = writeln!(out, "{thin}");
    for p in &a.per_position {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", p.label);
        let _ = writeln!(out, "  coordinate: ({}, {})", p.x, p.y);
        let _ = writeln!(out, "  offset:     ({:+}, {:+})", p.dx, p.dy);
        let _ = writeln!(out, "  distance:   {:.2}", p.distance);
        let _ = writeln!(out, "  mean:       {:.2} kPa", p.mean_kpa);
        let _ = writeln!(out, "  std:        {:.2} kPa", p.std_kpa);
        let _ = writeln!(out, "  cv:         {:.3}", p.cv);
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Assessment");
    let _ = writeln!(out, "{thin}");
    let verdict = match a.grade {
        SensitivityGrade::Excellent => {
            "Local sensitivity is excellent; the pad responds uniformly to near-identical presses."
        }
        SensitivityGrade::Good => {
            "Local sensitivity is good; minor non-uniformity, tuning may help."
        }
        SensitivityGrade::Fair => {
            "Local sensitivity is fair; check the pad calibration."
        }
        SensitivityGrade::Poor => {
            "Local sensitivity is poor; the pad should be recalibrated."
        }
    };
    let _ = writeln!(out, "{verdict}");
    out
}

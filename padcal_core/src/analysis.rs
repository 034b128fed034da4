//! Local sensitivity statistics.
//!
//! Per-position mean/std/CV, overall stats across all frames, and the
//! position CV (CV of the per-position means) which drives the grade.
//! Accumulation is done in f64; standard deviations are population
//! deviations, matching the reference analysis.

use serde::{Deserialize, Serialize};

use padcal_config::Grading;

use crate::error::{Result, SessionError};
use crate::session::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl core::fmt::Display for SensitivityGrade {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            SensitivityGrade::Excellent => "excellent",
            SensitivityGrade::Good => "good",
            SensitivityGrade::Fair => "fair",
            SensitivityGrade::Poor => "poor",
        };
        f.write_str(s)
    }
}

/// Map a position CV to a grade using the configured thresholds.
pub fn grade_for(position_cv: f32, grading: &Grading) -> SensitivityGrade {
    if position_cv < grading.excellent {
        SensitivityGrade::Excellent
    } else if position_cv < grading.good {
        SensitivityGrade::Good
    } else if position_cv < grading.fair {
        SensitivityGrade::Fair
    } else {
        SensitivityGrade::Poor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    pub label: String,
    pub x: u8,
    pub y: u8,
    pub dx: i32,
    pub dy: i32,
    /// Offset distance from the region base, in cells.
    pub distance: f32,
    pub mean_kpa: f32,
    pub std_kpa: f32,
    pub cv: f32,
    pub frames: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub mean_kpa: f32,
    pub std_kpa: f32,
    pub cv: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityAnalysis {
    pub per_position: Vec<PositionStats>,
    pub overall: OverallStats,
    /// CV of the per-position means: the headline uniformity number.
    pub position_cv: f32,
    pub grade: SensitivityGrade,
}

/// Analyze sealed samples. Fails with `NoSamples` when there is nothing
/// to analyze (a stopped session may legitimately hold no data).
pub fn analyze(samples: &[Sample], grading: &Grading) -> Result<SensitivityAnalysis> {
    if samples.is_empty() {
        return Err(eyre::Report::new(SessionError::NoSamples));
    }

    let mut per_position = Vec::with_capacity(samples.len());
    let mut all_frames: Vec<f32> = Vec::new();
    for (i, sample) in samples.iter().enumerate() {
        let (mean, std) = mean_std(&sample.frames);
        let cv = if mean > 0.0 { std / mean } else { 0.0 };
        let p = sample.position;
        per_position.push(PositionStats {
            label: crate::positions::Position::label(i),
            x: p.x,
            y: p.y,
            dx: p.dx,
            dy: p.dy,
            distance: p.distance(),
            mean_kpa: mean as f32,
            std_kpa: std as f32,
            cv: cv as f32,
            frames: sample.frames.len(),
        });
        all_frames.extend_from_slice(&sample.frames);
    }

    let (overall_mean, overall_std) = mean_std(&all_frames);
    let overall_cv = if overall_mean > 0.0 {
        overall_std / overall_mean
    } else {
        0.0
    };
    let overall = OverallStats {
        mean_kpa: overall_mean as f32,
        std_kpa: overall_std as f32,
        cv: overall_cv as f32,
    };

    let means: Vec<f32> = per_position.iter().map(|p| p.mean_kpa).collect();
    let (mean_of_means, std_of_means) = mean_std(&means);
    let position_cv = if mean_of_means > 0.0 {
        (std_of_means / mean_of_means) as f32
    } else {
        0.0
    };
    let grade = grade_for(position_cv, grading);

    tracing::debug!(
        positions = per_position.len(),
        position_cv,
        %grade,
        "sensitivity analysis done"
    );

    Ok(SensitivityAnalysis {
        per_position,
        overall,
        position_cv,
        grade,
    })
}

/// Mean and population standard deviation, accumulated in f64.
fn mean_std(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_std_matches_hand_computation() {
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m - 5.0).abs() < 1e-9);
        assert!((s - 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_mean_yields_zero_cv() {
        let samples = vec![Sample {
            position: crate::positions::Position {
                x: 0,
                y: 0,
                dx: 0,
                dy: 0,
            },
            frames: vec![0.0, 0.0],
        }];
        let a = analyze(&samples, &Grading::default()).unwrap();
        assert_eq!(a.overall.cv, 0.0);
        assert_eq!(a.position_cv, 0.0);
    }
}

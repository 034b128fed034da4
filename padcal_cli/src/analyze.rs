//! Offline analysis of a saved session.

use std::path::Path;

use eyre::WrapErr;

use padcal_config::Config;
use padcal_core::{AnalysisRecord, SessionRecord, analyze, render_text_report};

pub fn run_analyze(
    cfg: &Config,
    input: &Path,
    report: Option<&Path>,
    json: bool,
) -> eyre::Result<()> {
    let text = std::fs::read_to_string(input)
        .wrap_err_with(|| format!("read session JSON {input:?}"))?;
    let record: SessionRecord = serde_json::from_str(&text)
        .map_err(|e| eyre::eyre!("parse session JSON {input:?}: {e}"))?;

    let analysis = analyze(&record.samples, &cfg.grading)?;
    let rec = AnalysisRecord {
        info: record.info.clone(),
        analysis,
    };

    if json {
        println!("{}", serde_json::to_string(&rec)?);
    } else {
        println!(
            "survey of region '{}' with weight '{}' ({}, {} frames/position)",
            rec.info.region_id, rec.info.weight_id, rec.info.timestamp, rec.info.frames_per_position
        );
        println!();
        for p in &rec.analysis.per_position {
            println!(
                "{:<8} ({:>2},{:>2})  mean {:9.2} kPa  std {:7.2}  cv {:.3}",
                p.label, p.x, p.y, p.mean_kpa, p.std_kpa, p.cv
            );
        }
        println!();
        println!(
            "overall mean {:.2} kPa, std {:.2}, cv {:.3}",
            rec.analysis.overall.mean_kpa, rec.analysis.overall.std_kpa, rec.analysis.overall.cv
        );
        println!(
            "position CV {:.3}, grade: {}",
            rec.analysis.position_cv, rec.analysis.grade
        );
    }

    if let Some(path) = report {
        std::fs::write(path, render_text_report(&rec))
            .wrap_err_with(|| format!("write report {path:?}"))?;
        if !json {
            println!("report written to {}", path.display());
        }
    }
    Ok(())
}

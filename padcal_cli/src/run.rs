//! Session execution: config mapping, rig assembly, and the survey run.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use rand::rngs::StdRng;
use rand::SeedableRng;

use padcal_config::{Calibration, Config};
use padcal_core::error::SessionError;
use padcal_core::runner::{MeasurementMode, RunParams, SessionCommand};
use padcal_core::{Controller, PositionPlan, SessionRecord, SessionStatus, generate_positions};
use padcal_hardware::SimulatedPad;
use padcal_traits::{CloseResponse, StopConfirm};
use padcal_ui::{ConsoleGuide, ConsolePanel};

pub struct SessionArgs {
    pub region: String,
    pub weight: String,
    pub auto: bool,
    pub positions: Option<usize>,
    pub jitter: Option<i32>,
    pub frames: Option<usize>,
    pub seed: Option<u64>,
    pub out: Option<PathBuf>,
}

/// Stop confirmation fed from the shared stdin line channel; the runner
/// thread is the only consumer, so commands and answers cannot race.
struct ChannelPrompt {
    rx: xch::Receiver<String>,
}

impl StopConfirm for ChannelPrompt {
    fn confirm_stop(&mut self, collected: usize, total: usize) -> CloseResponse {
        println!(
            "guide closed with {collected}/{total} positions measured; stop the survey? [y/N]"
        );
        match self.rx.recv_timeout(Duration::from_secs(60)) {
            Ok(line) => match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => CloseResponse::Proceed,
                _ => CloseResponse::Resume,
            },
            Err(_) => CloseResponse::Cancel,
        }
    }
}

fn parse_command(line: &str) -> Option<SessionCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "r" | "record" => Some(SessionCommand::Record),
        "n" | "next" => Some(SessionCommand::Next),
        "b" | "back" => Some(SessionCommand::Back),
        "c" | "close" => Some(SessionCommand::CloseGuide),
        "q" | "quit" | "stop" => Some(SessionCommand::Stop),
        _ => None,
    }
}

pub fn run_session(
    cfg: &Config,
    calibration: Calibration,
    args: &SessionArgs,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let region = cfg.region(&args.region).ok_or_else(|| {
        eyre::Report::new(SessionError::InvalidParameter(format!(
            "unknown region '{}'",
            args.region
        )))
    })?;

    let count = args.positions.unwrap_or(cfg.positions.count);
    let jitter = args.jitter.unwrap_or(cfg.positions.jitter);
    let frames = args.frames.unwrap_or(cfg.sampling.frames_per_position);
    let seed = args.seed.or(cfg.positions.seed);

    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let positions = generate_positions(
        (region.x, region.y),
        count,
        jitter,
        (cfg.grid.width, cfg.grid.height),
        &mut rng,
    )?;
    let plan = PositionPlan::new(positions);

    // The simulated rig: the press follows the guide via the stimulus handle.
    let (pad, stimulus) = SimulatedPad::new(seed.unwrap_or(0x70ad));

    // One stdin reader feeds both operator commands and confirm answers.
    let (line_tx, line_rx) = xch::unbounded::<String>();
    if !args.auto {
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(l) => {
                        if line_tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        println!("commands: r=record  n=next  b=back  c=close guide  q=stop");
    }

    let builder = Controller::builder()
        .with_sensor(pad)
        .with_plan(plan)
        .with_frames_per_position(frames)
        .with_region_id(region.id.clone())
        .with_weight_id(args.weight.clone())
        .with_calibration(calibration)
        .with_guide_refresh_ms(cfg.guide.refresh_ms)
        .with_sensor_timeout_ms(cfg.sampling.sensor_timeout_ms)
        .with_display(ConsoleGuide::new(std::io::stdout()))
        .with_panel(ConsolePanel::new(std::io::stdout()));
    let builder = if args.auto {
        builder
    } else {
        builder.with_confirm(ChannelPrompt {
            rx: line_rx.clone(),
        })
    };
    let mut controller = builder.build()?;

    let params = RunParams {
        mode: if args.auto {
            MeasurementMode::Auto
        } else {
            MeasurementMode::Guided
        },
        frame_interval: Duration::from_millis(cfg.sampling.frame_interval_ms),
        poll_interval: Duration::from_millis(10),
    };

    let auto = args.auto;
    let next_command = move || -> Option<SessionCommand> {
        if auto {
            // Auto mode keeps stdin out of the loop; Ctrl-C stops.
            return None;
        }
        loop {
            match line_rx.try_recv() {
                Ok(line) => match parse_command(&line) {
                    Some(cmd) => return Some(cmd),
                    None => {
                        if !line.trim().is_empty() {
                            println!("unknown command '{}'", line.trim());
                        }
                        continue;
                    }
                },
                // End of input means no further operator commands can
                // arrive; treat it as a stop so the session cannot hang.
                Err(xch::TryRecvError::Disconnected) => return Some(SessionCommand::Stop),
                Err(xch::TryRecvError::Empty) => return None,
            }
        }
    };
    let press = |p: &padcal_core::Position| {
        stimulus.press_at_distance(p.distance());
    };

    let summary = padcal_core::runner::run(&mut controller, params, next_command, press, &shutdown)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let record = SessionRecord::from_state(controller.session(), timestamp);
    if let Some(out) = &args.out {
        let text = serde_json::to_string_pretty(&record)?;
        std::fs::write(out, text).wrap_err_with(|| format!("write session JSON {out:?}"))?;
        tracing::info!(path = %out.display(), "session saved");
    }

    if *crate::cli::JSON_MODE.get().unwrap_or(&false) {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        match summary.status {
            SessionStatus::Completed => println!(
                "survey complete: {}/{} positions, {} frames recorded",
                summary.collected, summary.total, summary.frames
            ),
            SessionStatus::Stopped => println!(
                "survey stopped: {}/{} positions, {} frames recorded",
                summary.collected, summary.total, summary.frames
            ),
            _ => println!(
                "survey ended in state {:?} with {}/{} positions",
                summary.status, summary.collected, summary.total
            ),
        }
        if let Some(out) = &args.out {
            println!("session saved to {}", out.display());
        }
    }
    Ok(())
}

pub fn self_check(cfg: &Config, calibration: Calibration) -> eyre::Result<()> {
    let (mut pad, stimulus) = SimulatedPad::new(1);
    stimulus.press_at_distance(0.0);
    let raw = padcal_traits::PressureSensor::read(
        &mut pad,
        Duration::from_millis(cfg.sampling.sensor_timeout_ms),
    )
    .map_err(|e| eyre::eyre!("simulated pad read failed: {e}"))?;
    let kpa = calibration.to_kpa(raw);
    println!(
        "self-check ok: simulated pad read {raw} counts ({kpa:.2} kPa), {} regions configured",
        cfg.regions.len()
    );
    Ok(())
}

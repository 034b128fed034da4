//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "padcal", version, about = "Pad sensitivity survey CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults apply when omitted and
    /// etc/padcal.toml does not exist
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Optional calibration CSV (strict 'raw,kpa' header)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log as JSON lines instead of pretty; results and errors are
    /// emitted as JSON too
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a sensitivity survey against the simulated pad
    Session {
        /// Region to survey (id from the config; defaults include
        /// "center", "top-left", ...)
        #[arg(long, default_value = "center")]
        region: String,
        /// Reference weight label recorded with the session
        #[arg(long)]
        weight: String,
        /// Timer-paced collection instead of operator-paced commands
        #[arg(long, action = ArgAction::SetTrue)]
        auto: bool,
        /// Override positions.count from the config
        #[arg(long)]
        positions: Option<usize>,
        /// Override positions.jitter from the config
        #[arg(long)]
        jitter: Option<i32>,
        /// Override sampling.frames_per_position from the config
        #[arg(long)]
        frames: Option<usize>,
        /// RNG seed for a reproducible position plan
        #[arg(long)]
        seed: Option<u64>,
        /// Write the finalized session as JSON
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Analyze a saved session and print or save the survey report
    Analyze {
        /// Session JSON produced by `session --out`
        #[arg(long, value_name = "FILE")]
        input: PathBuf,
        /// Also write the plain-text report here
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
    /// Quick health check (simulated pad read, config/calibration load)
    SelfCheck,
}

mod analyze;
mod cli;
mod error_fmt;
mod run;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;

use padcal_config::{Calibration, Config};

const DEFAULT_CONFIG_PATH: &str = "etc/padcal.toml";

fn main() {
    let args = cli::Cli::parse();
    let _ = cli::JSON_MODE.set(args.json);

    if let Err(err) = try_main(&args) {
        if *cli::JSON_MODE.get().unwrap_or(&false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn try_main(args: &cli::Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    let cfg = load_config(args.config.as_deref())?;
    init_tracing(args, &cfg.logging);

    let calibration = load_calibration(&cfg, args.calibration.as_deref())?;

    match &args.cmd {
        cli::Commands::Session {
            region,
            weight,
            auto,
            positions,
            jitter,
            frames,
            seed,
            out,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let shutdown_handler = shutdown.clone();
            ctrlc::set_handler(move || {
                shutdown_handler.store(true, Ordering::Relaxed);
            })
            .wrap_err("install Ctrl-C handler")?;

            run::run_session(
                &cfg,
                calibration,
                &run::SessionArgs {
                    region: region.clone(),
                    weight: weight.clone(),
                    auto: *auto,
                    positions: *positions,
                    jitter: *jitter,
                    frames: *frames,
                    seed: *seed,
                    out: out.clone(),
                },
                shutdown,
            )
        }
        cli::Commands::Analyze { input, report } => {
            analyze::run_analyze(&cfg, input, report.as_deref(), args.json)
        }
        cli::Commands::SelfCheck => run::self_check(&cfg, calibration),
    }
}

/// Load and validate the config. An explicit --config path must exist;
/// otherwise the default path is used when present, and built-in defaults
/// apply when it is not.
fn load_config(explicit: Option<&Path>) -> eyre::Result<Config> {
    let path: Option<PathBuf> = match explicit {
        Some(p) => {
            if !p.exists() {
                eyre::bail!("config file {p:?} does not exist");
            }
            Some(p.to_path_buf())
        }
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            default.exists().then_some(default)
        }
    };
    let cfg = match path {
        Some(p) => {
            let text =
                std::fs::read_to_string(&p).wrap_err_with(|| format!("read config {p:?}"))?;
            padcal_config::load_toml(&text).map_err(|e| eyre::eyre!("parse config {p:?}: {e}"))?
        }
        None => Config::default(),
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Calibration precedence: CLI CSV, then persisted config table, then the
/// default linear model.
fn load_calibration(cfg: &Config, csv: Option<&Path>) -> eyre::Result<Calibration> {
    if let Some(path) = csv {
        return padcal_config::load_calibration_csv(path);
    }
    Ok(cfg
        .calibration
        .map(Calibration::from)
        .unwrap_or_default())
}

fn init_tracing(args: &cli::Cli, logging: &padcal_config::Logging) {
    use tracing_subscriber::EnvFilter;

    let level = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| args.log_level.clone());
    let filter = EnvFilter::new(level);

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "padcal.log".to_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = cli::FILE_GUARD.set(guard);
        if args.json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
        }
    } else if args.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

//! Human-readable error descriptions and structured JSON error formatting.

use padcal_core::error::{BuildError, SessionError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSensor => {
                "What happened: No sensor was provided to the survey engine.\nLikely causes: The pad backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor is created successfully and passed via with_sensor(...).".to_string()
            }
            BuildError::MissingPlan => {
                "What happened: No position plan was provided.\nLikely causes: Positions were never generated before starting the session.\nHow to fix: Generate positions first (region, count, jitter) and pass the plan via with_plan(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or CLI overrides.\nHow to fix: Edit the config file or flags, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::InvalidParameter(msg) => format!(
                "What happened: Invalid parameter ({msg}).\nLikely causes: Out-of-range generation arguments or an unknown region id.\nHow to fix: Check --region/--positions/--jitter/--weight and the [positions] config section."
            ),
            SessionError::NotActive => {
                "What happened: The operation requires an active session.\nLikely causes: Recording was attempted before start or after the session ended.\nHow to fix: Start a session first; terminal sessions can be restarted.".to_string()
            }
            SessionError::NoSamples => {
                "What happened: There is no recorded data to analyze.\nLikely causes: The session was stopped before any position was fully measured.\nHow to fix: Run a session to completion (or at least one sealed position), then analyze.".to_string()
            }
            SessionError::Timeout => {
                "What happened: Sensor read timed out.\nLikely causes: The pad produced no frame within the configured timeout.\nHow to fix: Check the sensor backend and consider raising sampling.sensor_timeout_ms.".to_string()
            }
            SessionError::Hardware(_) | SessionError::HardwareFault(_) => format!(
                "What happened: {se}.\nLikely causes: The sensor backend failed mid-session.\nHow to fix: Check the backend logs; re-run with --log-level=debug for detail."
            ),
            SessionError::Teardown { .. } => format!(
                "What happened: {se}.\nLikely causes: A host collaborator failed during the stop sequence.\nHow to fix: Nothing blocking; the remaining teardown steps still ran. See the warnings in the log."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,kpa'.".to_string();
    }

    if lower.contains("grading") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid.\nDetail: {msg}\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::InvalidParameter(_) => "InvalidParameter",
            SessionError::NotActive => "NotActive",
            SessionError::NoSamples => "NoSamples",
            SessionError::Timeout => "Timeout",
            SessionError::Hardware(_) => "Hardware",
            SessionError::HardwareFault(_) => "HardwareFault",
            SessionError::Teardown { .. } => "Teardown",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "BuildError";
    }
    "Error"
}

/// Map typed errors to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(se) = err.downcast_ref::<SessionError>() {
        return match se {
            SessionError::InvalidParameter(_) | SessionError::NotActive => 2,
            SessionError::NoSamples => 3,
            SessionError::Timeout => 4,
            SessionError::Hardware(_) | SessionError::HardwareFault(_) => 5,
            SessionError::Teardown { .. } => 1,
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
    })
    .to_string()
}

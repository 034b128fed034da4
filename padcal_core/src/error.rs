use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("no active session")]
    NotActive,
    #[error("no samples to analyze")]
    NoSamples,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    /// Constructed when a guarded teardown step fails. It is logged and
    /// counted, never returned: the stop sequence always completes.
    #[error("teardown step '{step}' failed: {message}")]
    Teardown {
        step: &'static str,
        message: String,
    },
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sensor")]
    MissingSensor,
    #[error("missing position plan")]
    MissingPlan,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("pad read timeout")]
    Timeout,
    #[error("no frame ready")]
    NotReady,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("pad fault: {0}")]
    Fault(String),
}

pub type Result<T> = std::result::Result<T, HwError>;

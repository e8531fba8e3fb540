use thiserror::Error;

/// Errors raised by outputs and the output manager
#[derive(Error, Debug)]
pub enum OutputError {
    /// Another frame or list mutation currently holds the output list
    #[error("output list is busy")]
    Busy,

    #[error("output index {0} out of range")]
    NoSuchOutput(usize),

    #[error("failed to open {description}: {reason}")]
    OpenFailed { description: String, reason: String },

    #[error("output {0} is not open")]
    NotOpen(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;

use thiserror::Error;

use crate::context::Interrupted;

/// Errors produced by the srep protocol and client layers.
#[derive(Debug, Error)]
pub enum SrepError {
    /// The streaming connection could not be established.
    #[error("connection failed{}: {reason}", suffix("status", .status))]
    Connect { status: Option<u16>, reason: String },

    /// The play exists but its shell is not provisioned yet (HTTP 425).
    #[error("shell not ready yet")]
    TooEarly,

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    /// The remote end went away without a normal close handshake.
    #[error("connection closed unexpectedly{}", suffix("code", .code))]
    UnexpectedClose { code: Option<u16> },

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("retry attempts exhausted")]
    RetryExhausted,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("unexpected status code: {status}")]
    Http { status: u16 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SrepError {
    /// Whether this error came from the caller's cancellation or deadline.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, SrepError::Cancelled | SrepError::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for SrepError {
    fn from(e: serde_json::Error) -> Self {
        SrepError::Decode(e.to_string())
    }
}

impl From<Interrupted> for SrepError {
    fn from(i: Interrupted) -> Self {
        match i {
            Interrupted::Cancelled => SrepError::Cancelled,
            Interrupted::DeadlineExceeded => SrepError::DeadlineExceeded,
        }
    }
}

pub type SrepResult<T> = Result<T, SrepError>;

fn suffix(label: &str, value: &Option<u16>) -> String {
    value.map(|v| format!(" ({label} {v})")).unwrap_or_default()
}

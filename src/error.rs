use thiserror::Error;

/// Errors surfaced by the frame tracker.
///
/// Numerical degeneracy (singular inverse, near-zero quaternion denominator) and
/// buffer underflow are absorbed locally and never show up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("Session already recording")]
    AlreadyRecording,

    #[error("Session not recording")]
    NotRecording,

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for frame tracker operations
pub type FrameResult<T> = Result<T, FrameError>;

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for FrameError {
    fn from(err: serde_json::Error) -> Self {
        FrameError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for FrameError {
    fn from(err: csv::Error) -> Self {
        FrameError::Storage(err.to_string())
    }
}

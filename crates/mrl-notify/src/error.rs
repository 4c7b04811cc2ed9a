use std::io;

/// Errors produced by the notification subsystem.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// I/O error during WAL or file operations.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Checkpoint offset is beyond the current WAL write position.
    #[error("checkpoint offset {requested} exceeds current write position {current}")]
    InvalidCheckpoint { requested: u64, current: u64 },
}

/// Convenience alias used throughout the notify crate.
pub type Result<T> = std::result::Result<T, NotifyError>;

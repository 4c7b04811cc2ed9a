use mrl_types::{PrincipalId, Timestamp};

/// Errors produced by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("the {role} principal is null")]
    NullPrincipal { role: &'static str },

    #[error("the {field} field is empty")]
    EmptyField { field: &'static str },

    #[error("invalid consent window: valid_from {valid_from} is not before valid_until {valid_until}")]
    InvalidWindow {
        valid_from: Timestamp,
        valid_until: Timestamp,
    },

    #[error("consent window already closed: valid_until {valid_until} is not after now {now}")]
    WindowAlreadyClosed {
        valid_until: Timestamp,
        now: Timestamp,
    },

    #[error("no consent grant for grantor {grantor}, grantee {grantee}")]
    GrantNotFound {
        grantor: PrincipalId,
        grantee: PrincipalId,
    },

    #[error("index {index} out of bounds for collection of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidTimeRange { start: Timestamp, end: Timestamp },

    #[error("restore out of order: expected sequence {expected}, found {found}")]
    SequenceMismatch { expected: u64, found: u64 },

    #[error("registry lock poisoned")]
    LockPoisoned,
}

/// Coarse classification of a [`RegistryError`], mirroring the error
/// taxonomy callers are expected to branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: empty identifiers, invalid time windows.
    Validation,
    /// The operation contract requires a record that does not exist.
    NotFound,
    /// Index-based access beyond the collection's bound.
    Range,
    /// A fault in the registry itself, not in the caller's input.
    Internal,
}

impl RegistryError {
    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NullPrincipal { .. }
            | Self::EmptyField { .. }
            | Self::InvalidWindow { .. }
            | Self::WindowAlreadyClosed { .. }
            | Self::InvalidTimeRange { .. } => ErrorKind::Validation,
            Self::GrantNotFound { .. } => ErrorKind::NotFound,
            Self::IndexOutOfBounds { .. } => ErrorKind::Range,
            Self::SequenceMismatch { .. } | Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

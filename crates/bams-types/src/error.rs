use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unknown ledger kind: {0}")]
    UnknownKind(String),

    #[error("invalid attendance status: {0} (expected Present, Absent, or Leave)")]
    InvalidStatus(String),
}

use std::path::PathBuf;

/// Errors from snapshot store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot file exists but could not be decoded. The original bytes
    /// were copied to `backup` first.
    #[error("corrupt snapshot {}: {reason} (original kept at {})", .path.display(), .backup.display())]
    CorruptSnapshot {
        path: PathBuf,
        backup: PathBuf,
        reason: String,
    },

    /// A lock guarding in-memory state was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

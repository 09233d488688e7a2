//! # Errors
//!
//! Storage failures are kept separate from domain failures so that adapters
//! only ever need to know about [`StorageError`].

use thiserror::Error;

/// Failure reported by a [`crate::ports::Storage`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The path does not exist on the medium.
    #[error("{0} not found")]
    NotFound(String),

    /// A directory operation was attempted on a file.
    #[error("{0} is not a directory")]
    NotADirectory(String),

    /// The path escapes the storage root or is otherwise unusable.
    #[error("invalid storage path: {0}")]
    InvalidPath(String),

    /// Any other failure of the medium (removed card, full disk, ...).
    #[error("storage I/O error: {0}")]
    Io(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// The primary error type for catalog, transfer and forum operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Disallowed extension, missing required field, malformed identifier.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing document or thread.
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// A completed upload did not read back as written.
    #[error("verification failed for {path}: {reason}")]
    Verification { path: String, reason: String },

    /// A forum record could not be serialised.
    #[error("record encoding failed: {0}")]
    Encoding(String),

    /// The medium failed to initialise at startup.
    #[error("storage unavailable")]
    StorageUnavailable,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;

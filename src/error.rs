//! Error types for partlock.
//!
//! Uses thiserror for derive macros. Each variant maps to a CLI exit code and
//! to the HTTP status an embedding web layer is expected to answer with.

use crate::exit_codes;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for partlock operations.
#[derive(Error, Debug)]
pub enum PartlockError {
    /// An open, read, write or lock call on a backing file failed.
    #[error("I/O failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document could not be encoded as JSON. Nothing was written.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The key is already checked out.
    #[error("'{key}' is already locked by {owner}")]
    AlreadyHeld { key: String, owner: String },

    /// The key is not checked out.
    #[error("'{key}' is not locked")]
    NotHeld { key: String },

    /// The key is checked out by someone else.
    #[error("'{key}' is locked by {owner}, not by you")]
    NotOwner { key: String, owner: String },

    /// No record with this identifier exists.
    #[error("{0} not found")]
    NotFound(String),

    /// The file lock was not granted within the configured wait.
    #[error("timed out after {}ms waiting for lock on '{}'", waited.as_millis(), path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Caller supplied an unusable argument (empty key, empty owner, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// Configuration could not be read or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PartlockError {
    /// Wrap an `io::Error` with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PartlockError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            PartlockError::Io { .. } | PartlockError::Serialization(_) => {
                exit_codes::STORAGE_FAILURE
            }
            PartlockError::AlreadyHeld { .. }
            | PartlockError::NotHeld { .. }
            | PartlockError::NotOwner { .. } => exit_codes::CONFLICT,
            PartlockError::NotFound(_) => exit_codes::USER_ERROR,
            PartlockError::LockTimeout { .. } => exit_codes::LOCK_TIMEOUT,
            PartlockError::InvalidInput(_) | PartlockError::Config(_) => exit_codes::USER_ERROR,
        }
    }

    /// HTTP status code a web handler should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            PartlockError::AlreadyHeld { .. } => 409,
            PartlockError::NotOwner { .. } => 403,
            PartlockError::NotHeld { .. } | PartlockError::NotFound(_) => 404,
            PartlockError::InvalidInput(_) => 400,
            PartlockError::LockTimeout { .. } => 503,
            PartlockError::Io { .. }
            | PartlockError::Serialization(_)
            | PartlockError::Config(_) => 500,
        }
    }

    /// Whether this error is a refused checkout/check-in rather than a failure.
    pub fn is_conflict(&self) -> bool {
        self.exit_code() == exit_codes::CONFLICT
    }
}

/// Result type alias for partlock operations.
pub type Result<T> = std::result::Result<T, PartlockError>;

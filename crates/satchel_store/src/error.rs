//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another context holds the exclusive store lock.
    ///
    /// Callers retry with a fixed delay; see
    /// [`LocalStore::open_with_retry`](crate::LocalStore::open_with_retry).
    #[error("store unavailable: another context holds the lock on {path}")]
    Unavailable {
        /// Path of the contended store.
        path: String,
    },

    /// The store was closed underneath the caller.
    ///
    /// The store can close at arbitrary times (e.g. a schema upgrade in
    /// another context); callers re-check open state per batch.
    #[error("store is closed")]
    Closed,

    /// An I/O error while reading or writing the journal.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A journal line could not be decoded.
    #[error("journal corrupted at line {line}: {message}")]
    Journal {
        /// 1-based line number of the bad entry.
        line: usize,
        /// Description of the failure.
        message: String,
    },

    /// A record failed to serialize.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates an unavailable error for the given path.
    pub fn unavailable(path: impl Into<String>) -> Self {
        Self::Unavailable { path: path.into() }
    }

    /// Creates a journal corruption error.
    pub fn journal(line: usize, message: impl Into<String>) -> Self {
        Self::Journal {
            line,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::unavailable("/tmp/satchel.journal");
        assert!(err.to_string().contains("/tmp/satchel.journal"));

        let err = StoreError::journal(7, "bad json");
        assert!(err.to_string().contains("line 7"));

        assert_eq!(StoreError::Closed.to_string(), "store is closed");
    }
}

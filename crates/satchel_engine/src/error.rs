//! Error types for the sync engine.

use satchel_model::CollectionName;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote is unreachable; nothing was attempted.
    #[error("remote is offline")]
    Offline,

    /// Remote call failed.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote rejected a batch outright (schema or constraint
    /// violation). Never retryable as-is.
    #[error("remote rejected batch for '{collection}': {message}")]
    Rejected {
        /// Target collection.
        collection: CollectionName,
        /// Rejection reason reported by the remote.
        message: String,
    },

    /// Local store error.
    #[error("store error: {0}")]
    Store(#[from] satchel_store::StoreError),

    /// Model-level decode or validation error.
    #[error("model error: {0}")]
    Model(#[from] satchel_model::ModelError),

    /// A collection was referenced that no adapter is registered for.
    #[error("no adapter registered for collection '{0}'")]
    UnknownCollection(CollectionName),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a rejection error.
    pub fn rejected(collection: CollectionName, message: impl Into<String>) -> Self {
        Self::Rejected {
            collection,
            message: message.into(),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::Offline => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::remote_retryable("connection reset").is_retryable());
        assert!(!SyncError::remote_fatal("invalid credentials").is_retryable());
        assert!(SyncError::Offline.is_retryable());

        let tasks = CollectionName::new("tasks").unwrap();
        assert!(!SyncError::rejected(tasks, "not-null violation").is_retryable());
    }

    #[test]
    fn error_display() {
        let err = SyncError::Offline;
        assert_eq!(err.to_string(), "remote is offline");

        let tasks = CollectionName::new("tasks").unwrap();
        let err = SyncError::rejected(tasks, "bad row");
        assert!(err.to_string().contains("tasks"));
        assert!(err.to_string().contains("bad row"));
    }
}

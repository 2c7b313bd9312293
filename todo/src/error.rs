//! Error types for task validation and persistence.

use serde::{Deserialize, Serialize};
use taskstore_runtime::StoreError;
use thiserror::Error;

/// Classification shared by every storage strategy
///
/// Strategies map their medium-specific failures (I/O errors, HTTP
/// statuses, malformed payloads) onto these kinds so callers can react
/// without knowing which backend failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageErrorKind {
    /// The remote endpoint could not be reached or timed out
    #[serde(rename = "network-error")]
    Network,
    /// The medium refused access (HTTP 401/403, file permissions)
    #[serde(rename = "permission-error")]
    Permission,
    /// The snapshot does not fit in the medium
    #[serde(rename = "quota-exceeded")]
    QuotaExceeded,
    /// Stored or received data could not be decoded
    #[serde(rename = "invalid-data")]
    InvalidData,
    /// The backend is not there (HTTP 404/5xx, missing directory, offline)
    #[serde(rename = "service-unavailable")]
    ServiceUnavailable,
    /// Anything else
    #[serde(rename = "unknown-error")]
    Unknown,
}

impl StorageErrorKind {
    /// Wire name of the kind
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network-error",
            Self::Permission => "permission-error",
            Self::QuotaExceeded => "quota-exceeded",
            Self::InvalidData => "invalid-data",
            Self::ServiceUnavailable => "service-unavailable",
            Self::Unknown => "unknown-error",
        }
    }
}

impl std::fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed storage operation
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct StorageError {
    kind: StorageErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create an error of the given kind
    pub fn new(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for a [`StorageErrorKind::Network`] error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::Network, message)
    }

    /// Shorthand for a [`StorageErrorKind::ServiceUnavailable`] error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::ServiceUnavailable, message)
    }

    /// Shorthand for a [`StorageErrorKind::InvalidData`] error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::InvalidData, message)
    }

    /// What went wrong, as a kind
    #[must_use]
    pub const fn kind(&self) -> StorageErrorKind {
        self.kind
    }

    /// Human readable description
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Task input rejected before any state change
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title is empty or whitespace only
    #[error("Task title cannot be empty")]
    EmptyTitle,

    /// Title exceeds the maximum length
    #[error("Task title too long ({actual} characters, max {max})")]
    TitleTooLong {
        /// Maximum allowed characters
        max: usize,
        /// Characters in the rejected title
        actual: usize,
    },

    /// Another task already has the requested id
    #[error("Task id {0} is already in use")]
    DuplicateId(String),
}

/// Errors surfaced by [`crate::service::TaskService`]
#[derive(Debug, Error)]
pub enum TodoError {
    /// Input failed validation; nothing was dispatched
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A storage strategy failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The store rejected the action
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The action was dispatched but its result is no longer in the store
    #[error("task was not kept by the store")]
    NotApplied,
}

/// Convenience alias for service results
pub type Result<T> = std::result::Result<T, TodoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_uses_wire_names() {
        assert_eq!(StorageErrorKind::Network.to_string(), "network-error");
        assert_eq!(StorageErrorKind::QuotaExceeded.to_string(), "quota-exceeded");
        assert_eq!(StorageErrorKind::Unknown.to_string(), "unknown-error");
    }

    #[test]
    fn kind_serializes_like_display() {
        let json = serde_json::to_string(&StorageErrorKind::ServiceUnavailable).ok();
        assert_eq!(json.as_deref(), Some("\"service-unavailable\""));
    }

    #[test]
    fn storage_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = StorageError::new(StorageErrorKind::Permission, "cannot write").with_source(io);

        assert_eq!(err.kind(), StorageErrorKind::Permission);
        assert_eq!(err.to_string(), "permission-error: cannot write");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_error_messages() {
        let err = ValidationError::TitleTooLong { max: 100, actual: 120 };
        assert_eq!(err.to_string(), "Task title too long (120 characters, max 100)");

        let wrapped: TodoError = ValidationError::EmptyTitle.into();
        assert!(matches!(wrapped, TodoError::Validation(ValidationError::EmptyTitle)));
    }
}

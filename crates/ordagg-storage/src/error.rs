//! Storage error types for the catalog storage abstraction layer.

use std::fmt;

/// Errors that can occur during catalog storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested row was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Table or resource kind that was queried.
        kind: String,
        /// The ID that was not found.
        id: String,
    },

    /// Attempted to create a row that already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Table or resource kind.
        kind: String,
        /// The conflicting ID.
        id: String,
    },

    /// The data handed to the store is invalid.
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of why the input is invalid.
        message: String,
    },

    /// A row lock could not be acquired.
    #[error("Lock unavailable for {kind}/{id}")]
    LockUnavailable {
        /// Table of the locked row.
        kind: String,
        /// The locked row's ID.
        id: String,
    },

    /// An error occurred during transaction begin/commit/rollback.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidInput` error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new `LockUnavailable` error.
    #[must_use]
    pub fn lock_unavailable(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::LockUnavailable {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::LockUnavailable { .. } => ErrorCategory::Conflict,
            Self::InvalidInput { .. } => ErrorCategory::Validation,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Row not found.
    NotFound,
    /// Conflict (existence or lock).
    Conflict,
    /// Validation error.
    Validation,
    /// Transaction-related error.
    Transaction,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("application", "123");
        assert_eq!(err.to_string(), "application not found: 123");

        let err = StorageError::already_exists("vendor", "456");
        assert_eq!(err.to_string(), "vendor already exists: 456");

        let err = StorageError::lock_unavailable("application", "789");
        assert_eq!(err.to_string(), "Lock unavailable for application/789");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("application", "123");
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());

        let err = StorageError::transaction_error("commit failed");
        assert!(!err.is_not_found());
        assert_eq!(err.category(), ErrorCategory::Transaction);
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("api", "1").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("api", "1").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::invalid_input("bad data").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            StorageError::connection_error("refused").category().to_string(),
            "infrastructure"
        );
    }
}

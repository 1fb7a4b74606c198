use thiserror::Error;

/// Core error types for catalog model operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid resource kind: {0}")]
    InvalidResourceKind(String),

    #[error("Invalid operation data: {0}")]
    InvalidOperationData(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new InvalidResourceKind error
    pub fn invalid_resource_kind(kind: impl Into<String>) -> Self {
        Self::InvalidResourceKind(kind.into())
    }

    /// Create a new InvalidOperationData error
    pub fn invalid_operation_data(message: impl Into<String>) -> Self {
        Self::InvalidOperationData(message.into())
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

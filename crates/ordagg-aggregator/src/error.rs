//! Error types of the aggregation engine.

use ordagg_core::CoreError;
use ordagg_storage::{ErrorCategory, StorageError};

/// Failure to retrieve ORD documents or specification content.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("{url} responded with status {status}")]
    Http { url: String, status: u16 },

    #[error("failed to parse response from {url}: {message}")]
    Parse { url: String, message: String },

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl ClientError {
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn http(url: impl Into<String>, status: u16) -> Self {
        Self::Http {
            url: url.into(),
            status,
        }
    }

    #[must_use]
    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// The HTTP status if the remote answered with a non-success code.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Issues found while validating or sanitizing one application's documents.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ORD documents: {}", .issues.join("; "))]
pub struct ValidationError {
    pub issues: Vec<String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(issues: Vec<String>) -> Self {
        Self { issues }
    }

    #[must_use]
    pub fn single(issue: impl Into<String>) -> Self {
        Self {
            issues: vec![issue.into()],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("failed to hash resource {ord_id}: {message}")]
    Hash { ord_id: String, message: String },

    #[error("ORD data aggregation failed for {failed} application(s)")]
    ApplicationsFailed { failed: usize },

    #[error("failed to list applications: {0}")]
    PageFetch(#[source] StorageError),

    #[error("ORD data aggregation failed for {failed} application(s) and listing applications failed: {source}")]
    Combined {
        failed: usize,
        #[source]
        source: StorageError,
    },

    #[error("global registry may declare only vendors and products, found {kind}")]
    GlobalRegistryForbiddenKind { kind: String },

    #[error("global registry URL is not configured")]
    GlobalRegistryNotConfigured,

    #[error("ORD data aggregation failed for {failed} application(s) of template {template_id}")]
    Template { template_id: String, failed: usize },
}

impl AggregationError {
    #[must_use]
    pub fn hash(ord_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hash {
            ord_id: ord_id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn forbidden_global_kind(kind: impl Into<String>) -> Self {
        Self::GlobalRegistryForbiddenKind { kind: kind.into() }
    }

    /// Number of applications that failed, for run-level errors.
    #[must_use]
    pub fn failed_applications(&self) -> usize {
        match self {
            Self::ApplicationsFailed { failed }
            | Self::Combined { failed, .. }
            | Self::Template { failed, .. } => *failed,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_page_fetch(&self) -> bool {
        matches!(self, Self::PageFetch(_) | Self::Combined { .. })
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::GlobalRegistryForbiddenKind { .. }
        )
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(e) | Self::PageFetch(e) | Self::Combined { source: e, .. } => {
                e.category()
            }
            Self::Validation(_)
            | Self::Core(_)
            | Self::GlobalRegistryForbiddenKind { .. }
            | Self::GlobalRegistryNotConfigured => ErrorCategory::Validation,
            Self::Client(_) => ErrorCategory::Infrastructure,
            Self::Hash { .. } | Self::ApplicationsFailed { .. } | Self::Template { .. } => {
                ErrorCategory::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_level_errors_expose_failure_count() {
        let err = AggregationError::Combined {
            failed: 3,
            source: StorageError::connection_error("db down"),
        };
        assert_eq!(err.failed_applications(), 3);
        assert!(err.is_page_fetch());
        assert_eq!(err.category(), ErrorCategory::Infrastructure);
        assert!(err.to_string().contains("db down"));

        let err = AggregationError::ApplicationsFailed { failed: 2 };
        assert!(!err.is_page_fetch());
        assert_eq!(err.failed_applications(), 2);
    }

    #[test]
    fn validation_error_joins_issues() {
        let err = ValidationError::new(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "invalid ORD documents: a; b");
        assert!(AggregationError::from(err).is_validation());
    }

    #[test]
    fn client_error_status() {
        assert_eq!(ClientError::http("https://x", 503).status(), Some(503));
        assert_eq!(ClientError::network("https://x", "refused").status(), None);
    }
}

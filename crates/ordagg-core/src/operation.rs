//! Scheduled aggregation operations.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    #[serde(rename = "ORD_AGGREGATION")]
    OrdAggregation,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrdAggregation => write!(f, "ORD_AGGREGATION"),
        }
    }
}

/// Lifecycle of a queued operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Failed,
}

impl OperationStatus {
    /// Completed and failed operations wait to be rescheduled.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Payload of an aggregation operation.
///
/// Equality is structural over both fields; two payloads whose JSON differs
/// only in key order or whitespace are equal once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationData {
    #[serde(rename = "applicationID", default)]
    pub application_id: String,
    #[serde(rename = "applicationTemplateID", default)]
    pub application_template_id: String,
}

impl OperationData {
    pub fn new(application_id: impl Into<String>, application_template_id: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            application_template_id: application_template_id.into(),
        }
    }

    pub fn for_application(application_id: impl Into<String>) -> Self {
        Self::new(application_id, "")
    }

    pub fn for_template(application_template_id: impl Into<String>) -> Self {
        Self::new("", application_template_id)
    }

    /// At least one of the two identifiers must be set.
    pub fn validate(&self) -> Result<()> {
        if self.application_id.is_empty() && self.application_template_id.is_empty() {
            return Err(CoreError::invalid_operation_data(
                "applicationID or applicationTemplateID must be provided",
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let data: Self = serde_json::from_value(value.clone())?;
        data.validate()?;
        Ok(data)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub id: String,
    pub op_type: OperationType,
    pub status: OperationStatus,
    /// Serialized [`OperationData`].
    pub data: serde_json::Value,
    /// Error of the last failed attempt.
    pub error: Option<String>,
}

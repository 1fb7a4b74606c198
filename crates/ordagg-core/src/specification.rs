//! API/event specifications and the fetch requests that retrieve their content.

use std::fmt;
use time::OffsetDateTime;

use crate::document::ResourceDefinition;
use crate::kind::DefinitionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchCondition {
    /// Created, content not yet retrieved.
    Initial,
    Succeeded,
    Failed,
}

impl FetchCondition {
    /// Pending and failed fetches are resubmitted when the owner's version is unchanged.
    pub fn needs_refetch(&self) -> bool {
        !matches!(self, FetchCondition::Succeeded)
    }
}

impl fmt::Display for FetchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "INITIAL"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequestStatus {
    pub condition: FetchCondition,
    pub message: Option<String>,
    pub timestamp: OffsetDateTime,
}

impl FetchRequestStatus {
    pub fn initial() -> Self {
        Self::new(FetchCondition::Initial, None)
    }

    pub fn succeeded() -> Self {
        Self::new(FetchCondition::Succeeded, None)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(FetchCondition::Failed, Some(message.into()))
    }

    fn new(condition: FetchCondition, message: Option<String>) -> Self {
        Self {
            condition,
            message,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Record tracking the retrieval of one specification's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: String,
    pub spec_id: String,
    pub url: String,
    pub status: FetchRequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification {
    pub id: String,
    pub object_kind: DefinitionKind,
    pub object_id: String,
    pub definition_type: String,
    pub media_type: String,
    pub url: String,
    pub data: Option<String>,
    pub fetch_condition: FetchCondition,
}

impl Specification {
    pub fn from_definition(
        id: String,
        object_kind: DefinitionKind,
        object_id: String,
        definition: &ResourceDefinition,
    ) -> Self {
        Self {
            id,
            object_kind,
            object_id,
            definition_type: definition.definition_type.clone(),
            media_type: definition.media_type.clone(),
            url: definition.url.clone(),
            data: None,
            fetch_condition: FetchCondition::Initial,
        }
    }
}

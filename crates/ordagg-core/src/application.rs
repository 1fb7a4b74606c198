use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity used when fetching the tenant-less global catalog.
pub const GLOBAL_REGISTRY_ID: &str = "global-registry";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub application_template_id: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Value of the `applicationType` label, attached by the dispatcher.
    #[serde(default)]
    pub application_type: Option<String>,
}

impl Application {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            application_template_id: None,
            base_url: None,
            application_type: None,
        }
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.application_template_id = Some(template_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationTemplate {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub start_cursor: String,
    pub end_cursor: String,
    pub has_next_page: bool,
}

/// One cursor-delimited page of applications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPage {
    pub data: Vec<Application>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookType {
    #[serde(rename = "OPEN_RESOURCE_DISCOVERY")]
    OpenResourceDiscovery,
    #[serde(rename = "CONFIGURATION_CHANGED")]
    ConfigurationChanged,
}

impl fmt::Display for WebhookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenResourceDiscovery => write!(f, "OPEN_RESOURCE_DISCOVERY"),
            Self::ConfigurationChanged => write!(f, "CONFIGURATION_CHANGED"),
        }
    }
}

/// The object a webhook is registered on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum WebhookOwner {
    Application(String),
    ApplicationTemplate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: String,
    pub owner: WebhookOwner,
    pub webhook_type: WebhookType,
    #[serde(default)]
    pub url: Option<String>,
}

impl Webhook {
    /// Returns the URL if this webhook points at an ORD provider.
    pub fn ord_url(&self) -> Option<&str> {
        match (&self.webhook_type, self.url.as_deref()) {
            (WebhookType::OpenResourceDiscovery, Some(url)) if !url.is_empty() => Some(url),
            _ => None,
        }
    }
}

/// Who a catalog document is being fetched for.
#[derive(Debug, Clone, Copy)]
pub enum FetchSubject<'a> {
    Application(&'a Application),
    GlobalRegistry,
}

impl FetchSubject<'_> {
    pub fn id(&self) -> &str {
        match self {
            FetchSubject::Application(app) => &app.id,
            FetchSubject::GlobalRegistry => GLOBAL_REGISTRY_ID,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FetchSubject::Application(app) => &app.name,
            FetchSubject::GlobalRegistry => GLOBAL_REGISTRY_ID,
        }
    }
}

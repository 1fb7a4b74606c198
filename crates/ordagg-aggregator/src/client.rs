//! Retrieval of ORD documents from provider endpoints.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use url::Url;

use ordagg_core::{Document, Documents, FetchSubject, Webhook, WellKnownConfig};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Fetches the documents an ORD provider publishes.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Returns the documents together with the base URL relative references
    /// inside them resolve against.
    async fn fetch_documents(
        &self,
        subject: FetchSubject<'_>,
        webhook: &Webhook,
    ) -> Result<(Documents, String), ClientError>;
}

/// `reqwest`-backed client following the well-known discovery flow.
#[derive(Debug, Clone)]
pub struct HttpDocumentClient {
    http: reqwest::Client,
    well_known_path: String,
    max_parallel_documents: usize,
}

impl HttpDocumentClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::network("", e.to_string()))?;
        Ok(Self::with_http_client(http, config))
    }

    pub fn with_http_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            well_known_path: config.well_known_path.clone(),
            max_parallel_documents: config.max_parallel_documents_per_application.max(1),
        }
    }

    /// The discovery URL for a webhook URL, appending the well-known path
    /// unless it is already present.
    pub fn well_known_url(&self, webhook_url: &str) -> Result<Url, ClientError> {
        let trimmed = webhook_url.trim_end_matches('/');
        let full = if trimmed.ends_with(&self.well_known_path) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{}", self.well_known_path)
        };
        Url::parse(&full).map_err(|e| ClientError::invalid_url(webhook_url, e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ClientError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ClientError::network(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::http(url.as_str(), status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::network(url.as_str(), e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| ClientError::parse(url.as_str(), e.to_string()))
    }
}

/// Scheme, host and port of `url`, without a trailing slash.
pub fn base_url_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[async_trait]
impl DocumentClient for HttpDocumentClient {
    async fn fetch_documents(
        &self,
        subject: FetchSubject<'_>,
        webhook: &Webhook,
    ) -> Result<(Documents, String), ClientError> {
        let webhook_url = webhook
            .ord_url()
            .ok_or_else(|| ClientError::invalid_url("", "webhook has no ORD URL"))?;
        let config_url = self.well_known_url(webhook_url)?;

        tracing::debug!(
            subject_id = %subject.id(),
            subject_name = %subject.name(),
            url = %config_url,
            "fetching ORD configuration"
        );
        let config: WellKnownConfig = self.get_json(&config_url).await?;

        let base_url = match config.base_url.as_deref() {
            Some(base) => {
                let parsed = Url::parse(base).map_err(|e| ClientError::invalid_url(base, e.to_string()))?;
                base_url_of(&parsed)
            }
            None => base_url_of(&config_url),
        };
        let base = Url::parse(&base_url).map_err(|e| ClientError::invalid_url(&base_url, e.to_string()))?;

        // results keep the order of the configuration entries
        let base = &base;
        let documents: Documents = stream::iter(config.open_resource_discovery_v1.documents)
            .map(|entry| async move {
                let document_url = base
                    .join(&entry.url)
                    .map_err(|e| ClientError::invalid_url(&entry.url, e.to_string()))?;
                self.get_json::<Document>(&document_url).await
            })
            .buffered(self.max_parallel_documents)
            .try_collect()
            .await?;

        tracing::debug!(
            subject_id = %subject.id(),
            documents = documents.len(),
            base_url = %base_url,
            "fetched ORD documents"
        );
        Ok((documents, base_url))
    }
}

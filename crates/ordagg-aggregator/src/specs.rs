//! Specification lifecycle.
//!
//! A specification is created together with a fetch request in `Initial`
//! state. The fetch pass moves it to `Succeeded` or `Failed`. Failed (and
//! never attempted) fetches are resubmitted on the next run as long as the
//! owning API/event keeps its version; a version change deletes and recreates
//! all specifications of that resource.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;

use ordagg_core::{
    DefinitionKind, FetchCondition, FetchRequest, FetchRequestStatus, ResourceDefinition,
};
use ordagg_storage::prelude::*;

use crate::config::ClientConfig;
use crate::error::{AggregationError, ClientError};
use crate::metrics;

/// Result of downloading one specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    pub content: Option<String>,
    pub status: FetchRequestStatus,
}

impl FetchOutcome {
    pub fn succeeded(content: String) -> Self {
        Self {
            content: Some(content),
            status: FetchRequestStatus::succeeded(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            content: None,
            status: FetchRequestStatus::failed(message),
        }
    }
}

/// Downloads specification content. Remote failures are reported through the
/// returned status, never as an error.
#[async_trait]
pub trait SpecFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome;
}

#[derive(Debug, Clone)]
pub struct HttpSpecFetcher {
    http: reqwest::Client,
}

impl HttpSpecFetcher {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::network("", e.to_string()))?;
        Ok(Self { http })
    }

    pub fn with_http_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SpecFetcher for HttpSpecFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let response = match self.http.get(&request.url).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::failed(format!("request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return FetchOutcome::failed(format!("unexpected status {status}"));
        }

        match response.text().await {
            Ok(body) => FetchOutcome::succeeded(body),
            Err(e) => FetchOutcome::failed(format!("failed to read body: {e}")),
        }
    }
}

/// Creates one specification per definition and returns their pending fetches.
pub(crate) async fn create_specifications(
    tx: &mut dyn CatalogTransaction,
    kind: DefinitionKind,
    object_id: &str,
    definitions: &[ResourceDefinition],
) -> Result<Vec<FetchRequest>, StorageError> {
    let mut pending = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let (_, request) = tx
            .create_specification_with_fetch_request(kind, object_id, definition)
            .await?;
        pending.push(request);
    }
    Ok(pending)
}

/// Replaces all specifications of a resource whose version changed.
pub(crate) async fn recreate_specifications(
    tx: &mut dyn CatalogTransaction,
    kind: DefinitionKind,
    object_id: &str,
    definitions: &[ResourceDefinition],
) -> Result<Vec<FetchRequest>, StorageError> {
    tx.delete_specifications_by_object(kind, object_id).await?;
    create_specifications(tx, kind, object_id, definitions).await
}

/// Fetch requests of a resource that did not succeed yet.
pub(crate) async fn requests_to_refetch(
    tx: &mut dyn CatalogTransaction,
    kind: DefinitionKind,
    object_id: &str,
) -> Result<Vec<FetchRequest>, StorageError> {
    let spec_ids = tx.list_specification_ids_by_object(kind, object_id).await?;
    if spec_ids.is_empty() {
        return Ok(Vec::new());
    }
    let requests = tx.list_fetch_requests_by_specification_ids(&spec_ids).await?;
    Ok(requests
        .into_iter()
        .filter(|request| request.status.condition.needs_refetch())
        .collect())
}

/// Downloads pending specifications and persists the results in a fresh
/// transaction.
///
/// Downloads happen before the transaction is opened. Any storage failure
/// aborts the whole pass, leaving the requests pending for the next run.
pub async fn fetch_pending_specs(
    store: &dyn CatalogStore,
    fetcher: &dyn SpecFetcher,
    pending: Vec<FetchRequest>,
    concurrency: usize,
) -> Result<(), AggregationError> {
    if pending.is_empty() {
        return Ok(());
    }

    let results: Vec<(FetchRequest, FetchOutcome)> = stream::iter(pending)
        .map(|request| async move {
            let outcome = fetcher.fetch(&request).await;
            (request, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut tx = store.begin().await?;
    let (mut succeeded, mut failed) = (0usize, 0usize);
    for (mut request, outcome) in results {
        let mut spec = tx.get_specification(&request.spec_id).await?;
        if outcome.content.is_some() {
            spec.data = outcome.content;
        }
        spec.fetch_condition = outcome.status.condition;
        tx.update_specification(&spec).await?;

        match outcome.status.condition {
            FetchCondition::Succeeded => succeeded += 1,
            _ => {
                tracing::warn!(
                    spec_id = %spec.id,
                    url = %request.url,
                    reason = outcome.status.message.as_deref().unwrap_or_default(),
                    "specification fetch failed"
                );
                failed += 1;
            }
        }
        metrics::record_spec_fetch(outcome.status.condition);

        request.status = outcome.status;
        tx.update_fetch_request(&request).await?;
    }
    tx.commit().await?;

    tracing::debug!(succeeded, failed, "persisted specification fetches");
    Ok(())
}

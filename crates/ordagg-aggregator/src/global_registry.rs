//! Tenant-less vendors and products published by the global registry.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use ordagg_core::{
    Document, FetchSubject, GLOBAL_REGISTRY_ID, OrdIdentified, ProductInput, VendorInput,
    Webhook, WebhookOwner, WebhookType,
};
use ordagg_storage::prelude::*;

use crate::client::DocumentClient;
use crate::error::AggregationError;
use crate::metrics;
use crate::reconcile::{self, ProductKind, VendorKind};

/// ORD IDs of every global vendor and product.
pub type GlobalResourceSet = HashSet<String>;

#[async_trait]
pub trait GlobalRegistry: Send + Sync {
    /// Fetches the registry document and reconciles the stored global set.
    async fn sync_global_resources(&self) -> Result<GlobalResourceSet, AggregationError>;

    /// The stored global set, without fetching.
    async fn list_global_resources(&self) -> Result<GlobalResourceSet, AggregationError>;
}

pub struct GlobalRegistryService {
    store: DynCatalogStore,
    client: Arc<dyn DocumentClient>,
    url: Option<String>,
}

impl GlobalRegistryService {
    pub fn new(store: DynCatalogStore, client: Arc<dyn DocumentClient>, url: Option<String>) -> Self {
        Self { store, client, url }
    }

    fn webhook(url: &str) -> Webhook {
        Webhook {
            id: GLOBAL_REGISTRY_ID.to_string(),
            owner: WebhookOwner::Application(GLOBAL_REGISTRY_ID.to_string()),
            webhook_type: WebhookType::OpenResourceDiscovery,
            url: Some(url.to_string()),
        }
    }

    async fn sync(&self) -> Result<GlobalResourceSet, AggregationError> {
        let url = self
            .url
            .as_deref()
            .ok_or(AggregationError::GlobalRegistryNotConfigured)?;

        let (documents, _) = self
            .client
            .fetch_documents(FetchSubject::GlobalRegistry, &Self::webhook(url))
            .await?;

        let mut vendors: Vec<VendorInput> = Vec::new();
        let mut products: Vec<ProductInput> = Vec::new();
        for document in documents {
            reject_non_global_kinds(&document)?;
            vendors.extend(document.vendors);
            products.extend(document.products);
        }

        let mut tx = self.store.begin().await?;
        let stored_vendors =
            reconcile::reconcile(&mut VendorKind, tx.as_mut(), &Scope::Global, &vendors, true)
                .await?;
        let stored_products =
            reconcile::reconcile(&mut ProductKind, tx.as_mut(), &Scope::Global, &products, true)
                .await?;
        tx.commit().await?;

        let set: GlobalResourceSet = stored_vendors
            .iter()
            .map(|v| v.ord_id().to_string())
            .chain(stored_products.iter().map(|p| p.ord_id().to_string()))
            .collect();

        tracing::info!(
            vendors = stored_vendors.len(),
            products = stored_products.len(),
            "synchronized global resources"
        );
        Ok(set)
    }
}

fn reject_non_global_kinds(document: &Document) -> Result<(), AggregationError> {
    if document.only_vendors_and_products() {
        return Ok(());
    }
    let kind = if !document.packages.is_empty() {
        "packages"
    } else if !document.consumption_bundles.is_empty() {
        "consumption bundles"
    } else if !document.api_resources.is_empty() {
        "API resources"
    } else if !document.event_resources.is_empty() {
        "event resources"
    } else {
        "tombstones"
    };
    Err(AggregationError::forbidden_global_kind(kind))
}

#[async_trait]
impl GlobalRegistry for GlobalRegistryService {
    async fn sync_global_resources(&self) -> Result<GlobalResourceSet, AggregationError> {
        let result = self.sync().await;
        metrics::record_global_sync(result.is_ok());
        result
    }

    async fn list_global_resources(&self) -> Result<GlobalResourceSet, AggregationError> {
        let mut tx = self.store.begin().await?;
        let vendors = tx.list_vendors(&Scope::Global).await?;
        let products = tx.list_products(&Scope::Global).await?;
        tx.commit().await?;

        Ok(vendors
            .into_iter()
            .map(|v| v.ord_id)
            .chain(products.into_iter().map(|p| p.ord_id))
            .collect())
    }
}

//! Reconciliation of a single application's catalog.

use std::collections::HashSet;
use std::sync::Arc;

use ordagg_core::{
    ApiInput, Application, BundleInput, Documents, EventInput, FetchRequest, FetchSubject,
    PackageInput, ProductInput, TombstoneInput, VendorInput, Webhook,
};
use ordagg_storage::prelude::*;

use crate::client::DocumentClient;
use crate::error::AggregationError;
use crate::global_registry::GlobalResourceSet;
use crate::hash::compute_resource_hashes;
use crate::reconcile::{
    self, BundleKind, Definitions, PackageKind, ProductKind, TombstoneKind, VendorKind,
};
use crate::specs::{self, SpecFetcher};
use crate::tombstone::{self, CatalogSnapshot};
use crate::validation::{DocumentValidator, ValidationContext};

/// Resource inputs of all documents of one application, in document order.
#[derive(Debug, Default)]
struct CatalogInputs {
    vendors: Vec<VendorInput>,
    products: Vec<ProductInput>,
    packages: Vec<PackageInput>,
    bundles: Vec<BundleInput>,
    apis: Vec<ApiInput>,
    events: Vec<EventInput>,
    tombstones: Vec<TombstoneInput>,
}

impl CatalogInputs {
    fn from_documents(documents: Documents) -> Self {
        let mut inputs = Self::default();
        for document in documents {
            inputs.vendors.extend(document.vendors);
            inputs.products.extend(document.products);
            inputs.packages.extend(document.packages);
            inputs.bundles.extend(document.consumption_bundles);
            inputs.apis.extend(document.api_resources);
            inputs.events.extend(document.event_resources);
            inputs.tombstones.extend(document.tombstones);
        }
        inputs
    }
}

/// Fetches, validates and reconciles the catalog of one application inside a
/// single transaction, then downloads its pending specifications.
#[derive(Clone)]
pub struct ApplicationReconciler {
    store: DynCatalogStore,
    client: Arc<dyn DocumentClient>,
    validator: Arc<dyn DocumentValidator>,
    spec_fetcher: Arc<dyn SpecFetcher>,
    spec_concurrency: usize,
}

impl ApplicationReconciler {
    pub fn new(
        store: DynCatalogStore,
        client: Arc<dyn DocumentClient>,
        validator: Arc<dyn DocumentValidator>,
        spec_fetcher: Arc<dyn SpecFetcher>,
    ) -> Self {
        Self {
            store,
            client,
            validator,
            spec_fetcher,
            spec_concurrency: 1,
        }
    }

    pub fn with_spec_concurrency(mut self, concurrency: usize) -> Self {
        self.spec_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &DynCatalogStore {
        &self.store
    }

    /// Reconciles the application with the given ID using its own ORD webhook.
    pub async fn process_application(
        &self,
        app_id: &str,
        globals: &GlobalResourceSet,
    ) -> Result<(), AggregationError> {
        self.run(app_id, None, None, globals).await
    }

    /// Reconciles an application obtained from a listing, keeping the
    /// application type attached to it.
    pub async fn process_listed_application(
        &self,
        app: &Application,
        globals: &GlobalResourceSet,
    ) -> Result<(), AggregationError> {
        self.run(&app.id, app.application_type.clone(), None, globals)
            .await
    }

    /// Reconciles every application created from a template through the
    /// template's ORD webhook, one transaction per application.
    pub async fn process_application_template(
        &self,
        template_id: &str,
        globals: &GlobalResourceSet,
    ) -> Result<(), AggregationError> {
        let mut tx = self.store.begin().await?;
        tx.get_application_template(template_id).await?;
        let webhooks = tx.list_webhooks_for_template(template_id).await?;
        let Some(webhook) = webhooks.into_iter().find(|w| w.ord_url().is_some()) else {
            tx.commit().await?;
            tracing::debug!(template_id = %template_id, "template has no ORD webhook");
            return Ok(());
        };
        let apps = tx.list_applications_by_template(template_id).await?;
        tx.commit().await?;

        let mut failed = 0usize;
        for app in &apps {
            if let Err(e) = self
                .run(&app.id, app.application_type.clone(), Some(&webhook), globals)
                .await
            {
                tracing::error!(
                    app_id = %app.id,
                    template_id = %template_id,
                    error = %e,
                    "failed to process application of template"
                );
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(AggregationError::Template {
                template_id: template_id.to_string(),
                failed,
            });
        }
        tracing::info!(template_id = %template_id, applications = apps.len(), "processed application template");
        Ok(())
    }

    async fn run(
        &self,
        app_id: &str,
        application_type: Option<String>,
        template_webhook: Option<&Webhook>,
        globals: &GlobalResourceSet,
    ) -> Result<(), AggregationError> {
        let mut tx = self.store.begin().await?;

        let tenant = tx.lowest_owner_for_application(app_id).await?;
        tx.set_tenant(&tenant);
        let mut app = tx.lock_application(app_id).await?;
        if application_type.is_some() {
            app.application_type = application_type;
        }

        let webhook = match template_webhook {
            Some(webhook) => webhook.clone(),
            None => match ord_webhook(tx.as_mut(), &app).await? {
                Some(webhook) => webhook,
                None => {
                    tracing::debug!(app_id = %app_id, "application has no ORD webhook");
                    tx.commit().await?;
                    return Ok(());
                }
            },
        };

        let (documents, base_url) = match self
            .client
            .fetch_documents(FetchSubject::Application(&app), &webhook)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(app_id = %app_id, error = %e, "failed to fetch ORD documents, skipping");
                tx.rollback().await?;
                return Ok(());
            }
        };

        let scope = Scope::application(app_id);
        let pending = match self
            .apply(tx.as_mut(), &scope, documents, &base_url, globals)
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(app_id = %app_id, error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        tracing::info!(app_id = %app_id, pending_specs = pending.len(), "reconciled application");

        specs::fetch_pending_specs(
            self.store.as_ref(),
            self.spec_fetcher.as_ref(),
            pending,
            self.spec_concurrency,
        )
        .await
    }

    /// Validates and applies the documents; returns the fetch requests left
    /// pending by the changes.
    async fn apply(
        &self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        mut documents: Documents,
        base_url: &str,
        globals: &GlobalResourceSet,
    ) -> Result<Vec<FetchRequest>, AggregationError> {
        let hashes = compute_resource_hashes(&documents)?;

        let stored_apis = tx.list_apis(scope).await?;
        let stored_events = tx.list_events(scope).await?;
        let stored_packages = tx.list_packages(scope).await?;
        let ctx = ValidationContext {
            base_url,
            apis: &stored_apis,
            events: &stored_events,
            packages: &stored_packages,
            resource_hashes: &hashes,
            global_resources: globals,
        };
        self.validator.validate(&documents, &ctx)?;
        self.validator.sanitize(&mut documents, base_url)?;

        let inputs = CatalogInputs::from_documents(documents);

        let vendors = reconcile::reconcile(&mut VendorKind, tx, scope, &inputs.vendors, false).await?;
        let products =
            reconcile::reconcile(&mut ProductKind, tx, scope, &inputs.products, false).await?;
        let packages = reconcile::reconcile(
            &mut PackageKind { hashes: &hashes },
            tx,
            scope,
            &inputs.packages,
            false,
        )
        .await?;
        let bundles = reconcile::reconcile(
            &mut BundleKind { hashes: &hashes },
            tx,
            scope,
            &inputs.bundles,
            false,
        )
        .await?;

        let mut api_kind = Definitions::<ApiInput>::new(&packages, &bundles, &hashes);
        let apis = reconcile::reconcile(&mut api_kind, tx, scope, &inputs.apis, false).await?;
        let mut event_kind = Definitions::<EventInput>::new(&packages, &bundles, &hashes);
        let events = reconcile::reconcile(&mut event_kind, tx, scope, &inputs.events, false).await?;

        let tombstones =
            reconcile::reconcile(&mut TombstoneKind, tx, scope, &inputs.tombstones, false).await?;

        let snapshot = CatalogSnapshot {
            packages: &packages,
            apis: &apis,
            events: &events,
            bundles: &bundles,
            vendors: &vendors,
            products: &products,
        };
        let removed = tombstone::apply_tombstones(tx, scope, &tombstones, &snapshot).await?;
        if removed > 0 {
            tracing::debug!(scope = %scope, removed, "applied tombstones");
        }

        let mut pending = api_kind.into_pending();
        pending.extend(event_kind.into_pending());
        live_requests(tx, pending).await
    }
}

/// The application's own ORD webhook, else the one of its template.
async fn ord_webhook(
    tx: &mut dyn CatalogTransaction,
    app: &Application,
) -> Result<Option<Webhook>, AggregationError> {
    let own = tx.list_webhooks_for_application_for_update(&app.id).await?;
    if let Some(webhook) = own.into_iter().find(|w| w.ord_url().is_some()) {
        return Ok(Some(webhook));
    }
    let Some(template_id) = app.application_template_id.as_deref() else {
        return Ok(None);
    };
    let inherited = tx.list_webhooks_for_template(template_id).await?;
    Ok(inherited.into_iter().find(|w| w.ord_url().is_some()))
}

/// Drops fetch requests whose specification was removed later in the same
/// transaction, e.g. by a tombstone.
async fn live_requests(
    tx: &mut dyn CatalogTransaction,
    mut pending: Vec<FetchRequest>,
) -> Result<Vec<FetchRequest>, AggregationError> {
    if pending.is_empty() {
        return Ok(pending);
    }
    let spec_ids: Vec<String> = pending.iter().map(|r| r.spec_id.clone()).collect();
    let live: HashSet<String> = tx
        .list_fetch_requests_by_specification_ids(&spec_ids)
        .await?
        .into_iter()
        .map(|r| r.id)
        .collect();
    pending.retain(|r| live.contains(&r.id));
    Ok(pending)
}

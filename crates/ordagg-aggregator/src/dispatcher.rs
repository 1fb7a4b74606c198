//! Full aggregation run: global sync, application paging and the worker pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use ordagg_core::{Application, ApplicationPage};
use ordagg_storage::prelude::*;

use crate::application::ApplicationReconciler;
use crate::client::{DocumentClient, HttpDocumentClient};
use crate::config::{AggregatorConfig, ClientConfig};
use crate::error::AggregationError;
use crate::global_registry::{GlobalRegistry, GlobalRegistryService, GlobalResourceSet};
use crate::metrics;
use crate::specs::{HttpSpecFetcher, SpecFetcher};
use crate::validation::{DefaultDocumentValidator, DocumentValidator};

/// Drives aggregation of every application in the catalog.
#[derive(Clone)]
pub struct Aggregator {
    reconciler: ApplicationReconciler,
    global_registry: Arc<dyn GlobalRegistry>,
    config: AggregatorConfig,
}

impl Aggregator {
    pub fn builder(store: DynCatalogStore, config: AggregatorConfig) -> AggregatorBuilder {
        AggregatorBuilder::new(store, config)
    }

    pub fn reconciler(&self) -> &ApplicationReconciler {
        &self.reconciler
    }

    pub fn global_registry(&self) -> &Arc<dyn GlobalRegistry> {
        &self.global_registry
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Synchronizes the global registry, falling back to the stored set and
    /// then to an empty one.
    pub async fn global_resources(&self) -> GlobalResourceSet {
        match self.global_registry.sync_global_resources().await {
            Ok(set) => return set,
            Err(e) => {
                tracing::error!(error = %e, "failed to synchronize global resources, using stored set");
            }
        }
        match self.global_registry.list_global_resources().await {
            Ok(set) => set,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to list stored global resources; validation of documents referencing global vendors or products may fail"
                );
                GlobalResourceSet::new()
            }
        }
    }

    /// Runs one aggregation over all applications.
    ///
    /// A failing page stops enumeration but applications already queued are
    /// still processed. The error distinguishes failed applications, a failed
    /// listing, and both.
    pub async fn run(&self) -> Result<(), AggregationError> {
        let started = Instant::now();
        let globals = Arc::new(self.global_resources().await);

        let (sender, receiver) = mpsc::channel::<Application>(1);
        let receiver = Arc::new(Mutex::new(receiver));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut workers = JoinSet::new();
        for worker in 0..self.config.max_parallel_application_processors.max(1) {
            let receiver = Arc::clone(&receiver);
            let failed = Arc::clone(&failed);
            let globals = Arc::clone(&globals);
            let reconciler = self.reconciler.clone();

            workers.spawn(async move {
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(app) = next else {
                        break;
                    };
                    match reconciler.process_listed_application(&app, &globals).await {
                        Ok(()) => metrics::record_application(true),
                        Err(e) => {
                            failed.fetch_add(1, Ordering::SeqCst);
                            metrics::record_application(false);
                            tracing::error!(worker, app_id = %app.id, error = %e, "failed to process application");
                        }
                    }
                }
            });
        }

        let page_error = self.dispatch_pages(&sender).await.err();
        drop(sender);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "application worker terminated abnormally");
            }
        }

        let failed = failed.load(Ordering::SeqCst);
        metrics::record_aggregation_duration(started.elapsed());

        match (page_error, failed) {
            (Some(source), failed) if failed > 0 => {
                tracing::error!(failed, error = %source, "aggregation finished with failures and an incomplete listing");
                Err(AggregationError::Combined { failed, source })
            }
            (Some(source), _) => {
                tracing::error!(error = %source, "failed to list applications");
                Err(AggregationError::PageFetch(source))
            }
            (None, failed) if failed > 0 => {
                tracing::error!(failed, "aggregation finished with failed applications");
                Err(AggregationError::ApplicationsFailed { failed })
            }
            (None, _) => {
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "aggregation finished");
                Ok(())
            }
        }
    }

    /// Pushes applications page by page until the listing is exhausted.
    async fn dispatch_pages(&self, sender: &mpsc::Sender<Application>) -> Result<(), StorageError> {
        let mut cursor: Option<String> = None;
        loop {
            let page = self.fetch_page(cursor.as_deref()).await?;
            let has_next = page.page_info.has_next_page;
            let end_cursor = page.page_info.end_cursor;
            tracing::debug!(applications = page.data.len(), total = page.total_count, "dispatching page");

            for app in page.data {
                if sender.send(app).await.is_err() {
                    tracing::warn!("all application workers stopped, ending dispatch");
                    return Ok(());
                }
            }

            if !has_next {
                return Ok(());
            }
            cursor = Some(end_cursor);
        }
    }

    /// One page of applications with their `applicationType` label attached.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<ApplicationPage, StorageError> {
        let store = self.reconciler.store();
        let mut tx = store.begin().await?;
        let mut page = tx
            .list_applications_page(self.config.application_page_size, cursor)
            .await?;
        let ids: Vec<String> = page.data.iter().map(|app| app.id.clone()).collect();
        let mut types = tx.application_types(&ids).await?;
        tx.commit().await?;

        for app in &mut page.data {
            if let Some(application_type) = types.remove(&app.id) {
                app.application_type = Some(application_type);
            }
        }
        Ok(page)
    }
}

/// Assembles an [`Aggregator`], defaulting to the HTTP collaborators.
pub struct AggregatorBuilder {
    store: DynCatalogStore,
    config: AggregatorConfig,
    client_config: ClientConfig,
    client: Option<Arc<dyn DocumentClient>>,
    validator: Option<Arc<dyn DocumentValidator>>,
    spec_fetcher: Option<Arc<dyn SpecFetcher>>,
    global_registry: Option<Arc<dyn GlobalRegistry>>,
}

impl AggregatorBuilder {
    pub fn new(store: DynCatalogStore, config: AggregatorConfig) -> Self {
        Self {
            store,
            config,
            client_config: ClientConfig::default(),
            client: None,
            validator: None,
            spec_fetcher: None,
            global_registry: None,
        }
    }

    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    pub fn with_document_client(mut self, client: Arc<dyn DocumentClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn DocumentValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_spec_fetcher(mut self, spec_fetcher: Arc<dyn SpecFetcher>) -> Self {
        self.spec_fetcher = Some(spec_fetcher);
        self
    }

    pub fn with_global_registry(mut self, global_registry: Arc<dyn GlobalRegistry>) -> Self {
        self.global_registry = Some(global_registry);
        self
    }

    pub fn build(self) -> Result<Aggregator, AggregationError> {
        let client: Arc<dyn DocumentClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpDocumentClient::new(&self.client_config)?),
        };
        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(DefaultDocumentValidator::new()));
        let spec_fetcher: Arc<dyn SpecFetcher> = match self.spec_fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpSpecFetcher::new(&self.client_config)?),
        };
        let global_registry = self.global_registry.unwrap_or_else(|| {
            Arc::new(GlobalRegistryService::new(
                Arc::clone(&self.store),
                Arc::clone(&client),
                self.config.global_registry_url.clone(),
            ))
        });

        let reconciler = ApplicationReconciler::new(self.store, client, validator, spec_fetcher)
            .with_spec_concurrency(self.config.max_parallel_spec_processors);

        Ok(Aggregator {
            reconciler,
            global_registry,
            config: self.config,
        })
    }
}

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::*;
use ordagg_aggregator::{
    AggregationError, Aggregator, AggregatorConfig, GlobalRegistry, GlobalResourceSet,
};
use ordagg_core::{Application, ApplicationTemplate};
use ordagg_db_memory::{FailPoint, InMemoryStore};

fn config(workers: usize, page_size: usize) -> AggregatorConfig {
    AggregatorConfig {
        max_parallel_application_processors: workers,
        application_page_size: page_size,
        ..AggregatorConfig::default()
    }
}

fn publish_all(client: &StubClient, ids: &[&str]) {
    for id in ids {
        client.publish(id, vec![catalog("1.0.0", &[])]);
    }
}

#[tokio::test]
async fn worker_pool_bounds_concurrency_and_counts_failures() {
    let ids = ["app-0", "app-1", "app-2", "app-3", "app-4", "app-5"];
    let store = InMemoryStore::new();
    seed_apps(&store, &ids);
    store.inject_failure(FailPoint::LockApplication("app-2".into()));
    store.inject_failure(FailPoint::LockApplication("app-4".into()));

    let client = Arc::new(StubClient::with_delay(Duration::from_millis(20)));
    publish_all(&client, &ids);
    let aggregator = aggregator(
        &store,
        client.clone(),
        Arc::new(StubFetcher::succeeding()),
        config(2, 2),
    );

    let err = aggregator.run().await.unwrap_err();

    assert!(matches!(err, AggregationError::ApplicationsFailed { failed: 2 }));
    assert_eq!(client.calls(), 4);
    assert!(client.max_in_flight() <= 2, "at most two applications in flight");

    let owners: std::collections::HashSet<_> = store
        .snapshot()
        .apis
        .values()
        .filter_map(|a| a.app_id.clone())
        .collect();
    assert_eq!(owners.len(), 4);
}

#[tokio::test]
async fn application_type_label_is_attached_before_dispatch() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["app-1", "app-2"]);
    store.set_application_type("app-1", "SAP S/4HANA Cloud");
    let client = Arc::new(StubClient::new());
    publish_all(&client, &["app-1", "app-2"]);

    aggregator(&store, client.clone(), Arc::new(StubFetcher::succeeding()), config(1, 1))
        .run()
        .await
        .expect("run");

    assert_eq!(client.application_type("app-1").as_deref(), Some("SAP S/4HANA Cloud"));
    assert_eq!(client.application_type("app-2"), None);
}

#[tokio::test]
async fn applications_without_own_webhook_use_their_template_webhook() {
    let store = InMemoryStore::new();
    store.add_application_template(ApplicationTemplate {
        id: "tpl-1".into(),
        name: "orders".into(),
    });
    store.add_webhook(template_webhook("tpl-1"));
    store.add_application(Application::new("app-a", "app-a").with_template("tpl-1"), TENANT);
    store.add_application(Application::new("app-b", "app-b"), TENANT);
    let client = Arc::new(StubClient::new());
    client.publish("tpl-1", vec![catalog("1.0.0", &[])]);

    aggregator(&store, client.clone(), Arc::new(StubFetcher::succeeding()), config(2, 10))
        .run()
        .await
        .expect("run");

    // app-b has no webhook at all and is skipped
    assert_eq!(client.subjects(), vec!["app-a"]);
    let state = store.snapshot();
    assert_eq!(state.apis.len(), 2);
    assert!(state.apis.values().all(|api| api.app_id.as_deref() == Some("app-a")));
}

#[tokio::test]
async fn page_failure_alone_is_reported_as_listing_error() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["a", "b"]);
    store.inject_failure(FailPoint::ApplicationPage(0));
    let client = Arc::new(StubClient::new());

    let err = aggregator(&store, client.clone(), Arc::new(StubFetcher::succeeding()), config(2, 1))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AggregationError::PageFetch(_)));
    assert_eq!(err.failed_applications(), 0);
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn queued_applications_finish_after_a_page_failure() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["a", "b", "c"]);
    store.inject_failure(FailPoint::ApplicationPage(1));
    let client = Arc::new(StubClient::new());
    publish_all(&client, &["a", "b", "c"]);

    let err = aggregator(&store, client.clone(), Arc::new(StubFetcher::succeeding()), config(2, 1))
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, AggregationError::PageFetch(_)));
    assert_eq!(client.subjects(), vec!["a"]);
    assert_eq!(store.snapshot().apis.len(), 2);
}

#[tokio::test]
async fn page_and_application_failures_are_combined() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["a", "b"]);
    store.inject_failure(FailPoint::LockApplication("a".into()));
    store.inject_failure(FailPoint::ApplicationPage(1));
    let client = Arc::new(StubClient::new());

    let err = aggregator(&store, client, Arc::new(StubFetcher::succeeding()), config(2, 1))
        .run()
        .await
        .unwrap_err();

    match err {
        AggregationError::Combined { failed, ref source } => {
            assert_eq!(failed, 1);
            assert!(source.to_string().contains("listing application page 1 failed"));
        }
        other => panic!("expected combined error, got {other:?}"),
    }
}

/// Global registry double whose answers are fixed per test.
struct FixedRegistry {
    sync: Option<GlobalResourceSet>,
    stored: Option<GlobalResourceSet>,
    sync_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl FixedRegistry {
    fn new(sync: Option<GlobalResourceSet>, stored: Option<GlobalResourceSet>) -> Self {
        Self {
            sync,
            stored,
            sync_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GlobalRegistry for FixedRegistry {
    async fn sync_global_resources(&self) -> Result<GlobalResourceSet, AggregationError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        self.sync
            .clone()
            .ok_or(AggregationError::GlobalRegistryNotConfigured)
    }

    async fn list_global_resources(&self) -> Result<GlobalResourceSet, AggregationError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.stored.clone().ok_or_else(|| {
            AggregationError::Storage(ordagg_storage::StorageError::connection_error("down"))
        })
    }
}

fn aggregator_with_registry(
    store: &InMemoryStore,
    client: Arc<StubClient>,
    registry: Arc<FixedRegistry>,
) -> Aggregator {
    Aggregator::builder(Arc::new(store.clone()), config(1, 10))
        .with_document_client(client)
        .with_spec_fetcher(Arc::new(StubFetcher::succeeding()))
        .with_global_registry(registry)
        .build()
        .expect("aggregator")
}

/// A catalog whose product and package reference a vendor it does not declare.
fn catalog_with_global_vendor() -> ordagg_core::Document {
    let mut document = catalog("1.0.0", &[]);
    document.vendors.clear();
    document
}

#[tokio::test]
async fn failed_sync_falls_back_to_stored_global_resources() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["app-1"]);
    let client = Arc::new(StubClient::new());
    client.publish("app-1", vec![catalog_with_global_vendor()]);
    let registry = Arc::new(FixedRegistry::new(None, Some(GlobalResourceSet::from([VENDOR.to_string()]))));

    aggregator_with_registry(&store, client, registry.clone())
        .run()
        .await
        .expect("stored global vendor satisfies validation");

    assert_eq!(registry.sync_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.list_calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.snapshot().products.len(), 1);
}

#[tokio::test]
async fn unavailable_global_resources_degrade_to_empty_set() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["app-1", "app-2"]);
    let client = Arc::new(StubClient::new());
    client.publish("app-1", vec![catalog("1.0.0", &[])]);
    client.publish("app-2", vec![catalog_with_global_vendor()]);
    let registry = Arc::new(FixedRegistry::new(None, None));

    let err = aggregator_with_registry(&store, client, registry.clone())
        .run()
        .await
        .unwrap_err();

    // the run continues; only the application relying on global vendors fails
    assert_eq!(err.failed_applications(), 1);
    assert_eq!(registry.list_calls.load(Ordering::SeqCst), 1);
    let owners: Vec<_> = store
        .snapshot()
        .products
        .values()
        .filter_map(|p| p.app_id.clone())
        .collect();
    assert_eq!(owners, vec!["app-1".to_string()]);
}

#[tokio::test]
async fn successful_sync_skips_stored_lookup() {
    let store = InMemoryStore::new();
    let registry = Arc::new(FixedRegistry::new(Some(GlobalResourceSet::from([VENDOR.to_string()])), None));
    let aggregator = aggregator_with_registry(&store, Arc::new(StubClient::new()), registry.clone());

    let set = aggregator.global_resources().await;

    assert!(set.contains(VENDOR));
    assert_eq!(registry.sync_calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.list_calls.load(Ordering::SeqCst), 0);
}

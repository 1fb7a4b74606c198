#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ordagg_aggregator::{
    Aggregator, AggregatorConfig, ClientError, DocumentClient, FetchOutcome, SpecFetcher,
};
use ordagg_core::{
    Application, Document, Documents, FetchRequest, FetchSubject, Webhook, WebhookOwner,
    WebhookType,
};
use ordagg_db_memory::InMemoryStore;
use serde_json::{Value, json};

pub const TENANT: &str = "tenant-1";
pub const BASE_URL: &str = "https://orders.local";

pub const VENDOR: &str = "acme:vendor:Acme:";
pub const PRODUCT: &str = "acme:product:Orders:";
pub const PACKAGE: &str = "acme.orders:package:core:v1";
pub const BUNDLE: &str = "acme.orders:consumptionBundle:public:v1";
pub const ORDERS_API: &str = "acme.orders:apiResource:orders:v1";
pub const INVOICES_API: &str = "acme.orders:apiResource:invoices:v1";
pub const CREATED_EVENT: &str = "acme.orders:eventResource:OrderCreated:v1";
pub const DELETED_EVENT: &str = "acme.orders:eventResource:OrderDeleted:v1";

fn api(ord_id: &str, name: &str, version: &str) -> Value {
    json!({
        "ordId": ord_id,
        "title": format!("{name} API"),
        "version": version,
        "partOfPackage": PACKAGE,
        "partOfConsumptionBundles": [{ "ordId": BUNDLE }],
        "defaultConsumptionBundle": BUNDLE,
        "entryPoints": [format!("/api/{name}")],
        "resourceDefinitions": [{
            "type": "openapi-v3",
            "mediaType": "application/json",
            "url": format!("/specs/{name}.json")
        }]
    })
}

fn event(ord_id: &str, name: &str) -> Value {
    json!({
        "ordId": ord_id,
        "title": name,
        "version": "1.0.0",
        "partOfPackage": PACKAGE,
        "partOfConsumptionBundles": [{ "ordId": BUNDLE }],
        "resourceDefinitions": [{
            "type": "asyncapi-v2",
            "mediaType": "application/json",
            "url": format!("/specs/{name}.json")
        }]
    })
}

/// One vendor, product, package and bundle, two APIs, two events and the
/// given tombstones.
pub fn catalog(orders_version: &str, tombstoned: &[&str]) -> Document {
    let tombstones: Vec<Value> = tombstoned
        .iter()
        .map(|ord_id| json!({ "ordId": ord_id, "removalDate": "2026-01-01T00:00:00Z" }))
        .collect();

    serde_json::from_value(json!({
        "openResourceDiscovery": "1.9",
        "vendors": [{ "ordId": VENDOR, "title": "Acme" }],
        "products": [{
            "ordId": PRODUCT, "title": "Orders", "shortDescription": "Order management",
            "vendor": VENDOR
        }],
        "packages": [{
            "ordId": PACKAGE, "title": "Core", "shortDescription": "Core package",
            "description": "Core order APIs and events", "version": "1.0.0",
            "vendor": VENDOR, "partOfProducts": [PRODUCT]
        }],
        "consumptionBundles": [{ "ordId": BUNDLE, "title": "Public" }],
        "apiResources": [
            api(ORDERS_API, "orders", orders_version),
            api(INVOICES_API, "invoices", "1.0.0")
        ],
        "eventResources": [
            event(CREATED_EVENT, "OrderCreated"),
            event(DELETED_EVENT, "OrderDeleted")
        ],
        "tombstones": tombstones
    }))
    .unwrap()
}

pub fn webhook_url(owner_id: &str) -> String {
    format!("https://{owner_id}.provider.local")
}

pub fn app_webhook(app_id: &str) -> Webhook {
    Webhook {
        id: format!("wh-{app_id}"),
        owner: WebhookOwner::Application(app_id.to_string()),
        webhook_type: WebhookType::OpenResourceDiscovery,
        url: Some(webhook_url(app_id)),
    }
}

pub fn template_webhook(template_id: &str) -> Webhook {
    Webhook {
        id: format!("wh-{template_id}"),
        owner: WebhookOwner::ApplicationTemplate(template_id.to_string()),
        webhook_type: WebhookType::OpenResourceDiscovery,
        url: Some(webhook_url(template_id)),
    }
}

/// Registers applications, each with an ORD webhook.
pub fn seed_apps(store: &InMemoryStore, ids: &[&str]) {
    for id in ids {
        store.add_application(Application::new(*id, format!("{id}-name")), TENANT);
        store.add_webhook(app_webhook(id));
    }
}

/// Document client serving documents per webhook URL; unknown URLs get 404.
#[derive(Default)]
pub struct StubClient {
    documents: Mutex<HashMap<String, Documents>>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    subjects: Mutex<Vec<String>>,
    application_types: Mutex<HashMap<String, Option<String>>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn publish(&self, owner_id: &str, documents: Documents) {
        self.documents
            .lock()
            .unwrap()
            .insert(webhook_url(owner_id), documents);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }

    /// `applicationType` each application was fetched with.
    pub fn application_type(&self, app_id: &str) -> Option<String> {
        self.application_types
            .lock()
            .unwrap()
            .get(app_id)
            .cloned()
            .flatten()
    }
}

#[async_trait]
impl DocumentClient for StubClient {
    async fn fetch_documents(
        &self,
        subject: FetchSubject<'_>,
        webhook: &Webhook,
    ) -> Result<(Documents, String), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().unwrap().push(subject.id().to_string());
        if let FetchSubject::Application(app) = subject {
            self.application_types
                .lock()
                .unwrap()
                .insert(app.id.clone(), app.application_type.clone());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let url = webhook.url.clone().unwrap_or_default();
        let documents = self.documents.lock().unwrap().get(&url).cloned();
        match documents {
            Some(documents) => Ok((documents, BASE_URL.to_string())),
            None => Err(ClientError::http(url, 404)),
        }
    }
}

/// Spec fetcher answering every request with the same outcome.
pub struct StubFetcher {
    succeed: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn succeeding() -> Self {
        Self {
            succeed: AtomicBool::new(true),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            succeed: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_succeed(&self, succeed: bool) {
        self.succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl SpecFetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        self.requests.lock().unwrap().push(request.url.clone());
        if self.succeed.load(Ordering::SeqCst) {
            FetchOutcome::succeeded(format!("{{\"source\":\"{}\"}}", request.url))
        } else {
            FetchOutcome::failed("unexpected status 503 Service Unavailable")
        }
    }
}

pub fn aggregator(
    store: &InMemoryStore,
    client: Arc<StubClient>,
    fetcher: Arc<StubFetcher>,
    config: AggregatorConfig,
) -> Aggregator {
    Aggregator::builder(Arc::new(store.clone()), config)
        .with_document_client(client)
        .with_spec_fetcher(fetcher)
        .build()
        .expect("aggregator")
}

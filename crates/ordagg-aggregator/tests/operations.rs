mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use ordagg_aggregator::{
    AggregationError, AggregatorConfig, GlobalRegistry, GlobalRegistryService, MaintenanceSummary,
    MetricsConfig, OperationMaintainer, OperationProcessor,
};
use ordagg_core::{
    ApplicationTemplate, Document, OperationData, OperationStatus, OperationType, ResourceKind,
    Webhook, WebhookOwner, WebhookType,
};
use ordagg_db_memory::{FailPoint, InMemoryStore, Mutation};
use ordagg_storage::prelude::*;
use serde_json::json;

const REGISTRY: &str = "global-registry";

fn registry_document(vendors: &[&str]) -> Document {
    let vendors: Vec<_> = vendors
        .iter()
        .map(|ord_id| json!({ "ordId": ord_id, "title": ord_id }))
        .collect();
    serde_json::from_value(json!({
        "openResourceDiscovery": "1.9",
        "vendors": vendors,
        "products": [{ "ordId": "sap:product:S4HANA:", "title": "S/4HANA", "vendor": "sap:vendor:SAP:" }]
    }))
    .unwrap()
}

fn registry(store: &InMemoryStore, client: Arc<StubClient>) -> GlobalRegistryService {
    GlobalRegistryService::new(Arc::new(store.clone()), client, Some(webhook_url(REGISTRY)))
}

#[tokio::test]
async fn global_sync_reconciles_and_deletes_absent_vendors() {
    let store = InMemoryStore::new();
    let client = Arc::new(StubClient::new());
    client.publish(REGISTRY, vec![registry_document(&["sap:vendor:SAP:", "acme:vendor:Acme:"])]);
    let registry = registry(&store, client.clone());

    let set = registry.sync_global_resources().await.expect("sync");
    assert_eq!(
        set,
        HashSet::from([
            "sap:vendor:SAP:".to_string(),
            "acme:vendor:Acme:".to_string(),
            "sap:product:S4HANA:".to_string(),
        ])
    );
    assert!(store.snapshot().vendors.values().all(|v| v.app_id.is_none()));

    client.publish(REGISTRY, vec![registry_document(&["sap:vendor:SAP:"])]);
    let set = registry.sync_global_resources().await.expect("second sync");

    assert!(!set.contains("acme:vendor:Acme:"));
    assert_eq!(store.stats().count(ResourceKind::Vendor, Mutation::Delete), 1);
    assert_eq!(registry.list_global_resources().await.expect("list"), set);
    assert_eq!(client.subjects(), vec![ordagg_core::GLOBAL_REGISTRY_ID; 2]);
}

#[tokio::test]
async fn global_registry_rejects_application_kinds() {
    let store = InMemoryStore::new();
    let client = Arc::new(StubClient::new());
    client.publish(REGISTRY, vec![catalog("1.0.0", &[])]);

    let err = registry(&store, client)
        .sync_global_resources()
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(store.snapshot().vendors.is_empty());
}

#[tokio::test]
async fn global_listing_failure_is_reported() {
    let store = InMemoryStore::new();
    store.inject_failure(FailPoint::ListGlobalVendors);
    let registry = registry(&store, Arc::new(StubClient::new()));

    let err = registry.list_global_resources().await.unwrap_err();
    assert!(matches!(err, AggregationError::Storage(_)));
}

#[tokio::test]
async fn bulk_applications_continue_past_failures() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["app-1", "app-2"]);
    let client = Arc::new(StubClient::new());
    client.publish("app-2", vec![catalog("1.0.0", &[])]);
    let aggregator = aggregator(
        &store,
        client.clone(),
        Arc::new(StubFetcher::succeeding()),
        AggregatorConfig::default(),
    );

    let ids = vec!["missing".to_string(), "app-2".to_string()];
    let err = aggregator
        .process_applications(&MetricsConfig::default(), &ids)
        .await
        .unwrap_err();

    assert_eq!(err.failed_applications(), 1);
    assert_eq!(client.subjects(), vec!["app-2"]);
    assert_eq!(store.snapshot().apis.len(), 2);
}

#[tokio::test]
async fn empty_bulk_requests_do_not_touch_storage() {
    let store = InMemoryStore::new();
    store.inject_failure(FailPoint::Begin);
    let aggregator = aggregator(
        &store,
        Arc::new(StubClient::new()),
        Arc::new(StubFetcher::succeeding()),
        AggregatorConfig::default(),
    );

    aggregator
        .process_applications(&MetricsConfig::default(), &[])
        .await
        .expect("no applications");
    aggregator
        .process_application_templates(&MetricsConfig::default(), &[])
        .await
        .expect("no templates");
}

#[tokio::test]
async fn bulk_templates_report_failed_templates() {
    let store = InMemoryStore::new();
    store.add_application_template(ApplicationTemplate {
        id: "tpl-1".into(),
        name: "orders".into(),
    });
    store.add_webhook(template_webhook("tpl-1"));
    store.add_application(
        ordagg_core::Application::new("app-1", "orders").with_template("tpl-1"),
        TENANT,
    );
    let client = Arc::new(StubClient::new());
    client.publish("tpl-1", vec![catalog("1.0.0", &[])]);
    let aggregator = aggregator(
        &store,
        client,
        Arc::new(StubFetcher::succeeding()),
        AggregatorConfig::default(),
    );

    let metrics = MetricsConfig {
        enabled: false,
        ..MetricsConfig::default()
    };
    aggregator
        .process_application_templates(&metrics, &["tpl-1".to_string()])
        .await
        .expect("template");

    let err = aggregator
        .process_application_templates(&metrics, &["tpl-1".to_string(), "unknown".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.failed_applications(), 1);
}

#[tokio::test]
async fn maintainer_converges_operations_to_webhooks() {
    let store = InMemoryStore::new();
    store.add_webhook(app_webhook("app-1"));
    store.add_webhook(template_webhook("tpl-1"));
    store.add_webhook(Webhook {
        id: "wh-config".into(),
        owner: WebhookOwner::Application("app-2".into()),
        webhook_type: WebhookType::ConfigurationChanged,
        url: Some("https://app-2.local/hook".into()),
    });

    {
        let mut tx = store.begin().await.unwrap();
        let stale = OperationData::for_application("gone").to_json().unwrap();
        tx.create_operation(OperationType::OrdAggregation, stale)
            .await
            .unwrap();
        tx.create_operation(OperationType::OrdAggregation, json!({ "applicationID": "" }))
            .await
            .unwrap();
        let kept = json!({ "applicationTemplateID": "tpl-1", "applicationID": "" });
        tx.create_operation(OperationType::OrdAggregation, kept)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    let maintainer = OperationMaintainer::new(Arc::new(store.clone()));
    let summary = maintainer.maintain().await.expect("maintain");
    assert_eq!(summary.created, 1);
    assert_eq!(summary.deleted, 2);

    let mut tx = store.begin().await.unwrap();
    let stored: HashSet<OperationData> = tx
        .list_operations(OperationType::OrdAggregation)
        .await
        .unwrap()
        .iter()
        .map(|op| OperationData::from_json(&op.data).unwrap())
        .collect();
    tx.commit().await.unwrap();
    assert_eq!(
        stored,
        HashSet::from([
            OperationData::for_application("app-1"),
            OperationData::for_template("tpl-1"),
        ])
    );

    let again = maintainer.maintain().await.expect("second pass");
    assert_eq!(again, MaintenanceSummary::default());
}

#[tokio::test]
async fn processor_executes_scheduled_operations_until_none_remain() {
    let store = InMemoryStore::new();
    seed_apps(&store, &["app-1"]);
    store.add_application_template(ApplicationTemplate {
        id: "tpl-1".into(),
        name: "orders".into(),
    });
    store.add_webhook(template_webhook("tpl-1"));
    store.add_application(
        ordagg_core::Application::new("app-t", "orders").with_template("tpl-1"),
        TENANT,
    );
    let client = Arc::new(StubClient::new());
    client.publish("app-1", vec![catalog("1.0.0", &[])]);
    client.publish("tpl-1", vec![catalog("1.0.0", &[])]);
    let aggregator = aggregator(
        &store,
        client.clone(),
        Arc::new(StubFetcher::succeeding()),
        AggregatorConfig::default(),
    );

    let maintainer = OperationMaintainer::new(Arc::new(store.clone()));
    assert_eq!(maintainer.maintain().await.expect("maintain").created, 2);
    let malformed = {
        let mut tx = store.begin().await.unwrap();
        let id = tx
            .create_operation(OperationType::OrdAggregation, json!({ "applicationID": "" }))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        id
    };

    let processor = OperationProcessor::new(aggregator);
    let mut processed = Vec::new();
    while let Some(outcome) = processor.claim_and_process().await.expect("process") {
        processed.push(outcome);
    }

    assert_eq!(processed.len(), 3);
    for outcome in &processed {
        let expected = if outcome.id == malformed {
            OperationStatus::Failed
        } else {
            OperationStatus::Completed
        };
        assert_eq!(outcome.status, expected, "operation {}", outcome.id);
    }
    let mut subjects = client.subjects();
    subjects.sort();
    assert_eq!(subjects, vec!["app-1", "app-t"]);
    assert_eq!(store.snapshot().apis.len(), 4);

    let operations = store.snapshot().operations;
    assert!(operations[&malformed].error.is_some());
    assert!(
        operations
            .values()
            .filter(|op| op.id != malformed)
            .all(|op| op.error.is_none())
    );

    let summary = maintainer.maintain().await.expect("second pass");
    assert_eq!(
        summary,
        MaintenanceSummary {
            created: 0,
            deleted: 1,
            rescheduled: 2,
        }
    );
    assert!(
        store
            .snapshot()
            .operations
            .values()
            .all(|op| op.status == OperationStatus::Scheduled)
    );
}

#[tokio::test]
async fn processor_without_scheduled_operations_is_idle() {
    let store = InMemoryStore::new();
    let processor = OperationProcessor::new(aggregator(
        &store,
        Arc::new(StubClient::new()),
        Arc::new(StubFetcher::succeeding()),
        AggregatorConfig::default(),
    ));

    assert_eq!(processor.claim_and_process().await.expect("claim"), None);
}

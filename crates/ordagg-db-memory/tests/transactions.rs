use ordagg_core::{
    ApiInput, Application, BundleInput, DefinitionKind, FetchCondition, FetchRequestStatus,
    OperationData, OperationStatus, OperationType, PackageInput, ResourceKind, Webhook, WebhookOwner, WebhookType,
};
use ordagg_db_memory::{FailPoint, InMemoryStore, Mutation};
use ordagg_storage::prelude::*;
use serde_json::json;
use tokio_test::task;
use tokio_test::{assert_pending, assert_ready_ok};

const TENANT: &str = "tenant-1";

fn store_with_apps(ids: &[&str]) -> InMemoryStore {
    let store = InMemoryStore::new();
    for id in ids {
        store.add_application(Application::new(*id, format!("{id}-name")), TENANT);
    }
    store
}

fn package(ord_id: &str) -> PackageInput {
    serde_json::from_value(json!({
        "ordId": ord_id,
        "title": "Orders",
        "version": "1.0.0"
    }))
    .unwrap()
}

fn bundle(ord_id: &str) -> BundleInput {
    serde_json::from_value(json!({ "ordId": ord_id, "title": "Bundle" })).unwrap()
}

fn api(ord_id: &str) -> ApiInput {
    serde_json::from_value(json!({
        "ordId": ord_id,
        "title": "Orders API",
        "version": "1.0.0",
        "resourceDefinitions": [
            { "type": "openapi-v3", "mediaType": "application/json", "url": "https://spec/orders.json" }
        ]
    }))
    .unwrap()
}

fn write<'a>(input: &'a ApiInput, package_id: &str) -> DefinitionWrite<'a, ApiInput> {
    DefinitionWrite {
        input,
        package_id: Some(package_id.to_string()),
        default_bundle_id: None,
        resource_hash: 1,
    }
}

#[tokio::test]
async fn application_pages_follow_cursor() {
    let store = store_with_apps(&["a", "b", "c"]);
    let mut tx = store.begin().await.unwrap();

    let first = tx.list_applications_page(2, None).await.unwrap();
    assert_eq!(first.data.len(), 2);
    assert_eq!(first.total_count, 3);
    assert!(first.page_info.has_next_page);
    assert_eq!(first.page_info.end_cursor, "b");

    let second = tx
        .list_applications_page(2, Some(&first.page_info.end_cursor))
        .await
        .unwrap();
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0].id, "c");
    assert!(!second.page_info.has_next_page);
}

#[tokio::test]
async fn failing_page_is_reported_once() {
    let store = store_with_apps(&["a"]);
    store.inject_failure(FailPoint::ApplicationPage(0));
    let mut tx = store.begin().await.unwrap();

    assert!(tx.list_applications_page(10, None).await.is_err());
    assert_eq!(tx.list_applications_page(10, None).await.unwrap().data.len(), 1);
}

#[tokio::test]
async fn row_lock_blocks_until_holder_finishes() {
    let store = store_with_apps(&["app-1"]);

    let mut first = store.begin().await.unwrap();
    first.lock_application("app-1").await.unwrap();

    let mut second = store.begin().await.unwrap();
    {
        let mut pending = task::spawn(second.lock_application("app-1"));
        assert_pending!(pending.poll());

        first.commit().await.unwrap();
        assert!(pending.is_woken());
        let app = assert_ready_ok!(pending.poll());
        assert_eq!(app.id, "app-1");
    }
    second.rollback().await.unwrap();
}

#[tokio::test]
async fn webhooks_for_update_share_the_application_row_lock() {
    let store = store_with_apps(&["app-1"]);

    let mut first = store.begin().await.unwrap();
    first
        .list_webhooks_for_application_for_update("app-1")
        .await
        .unwrap();
    // re-entrant within the holding transaction
    first.lock_application("app-1").await.unwrap();

    let mut second = store.begin().await.unwrap();
    {
        let mut pending = task::spawn(second.lock_application("app-1"));
        assert_pending!(pending.poll());

        first.rollback().await.unwrap();
        assert!(pending.is_woken());
        assert_ready_ok!(pending.poll());
    }
    second.rollback().await.unwrap();
}

#[tokio::test]
async fn deleting_package_cascades_to_definitions() {
    let store = store_with_apps(&["app-1"]);
    let scope = Scope::application("app-1");
    let mut tx = store.begin().await.unwrap();
    tx.set_tenant(TENANT);

    let package_id = tx
        .create_package(&scope, &package("ns:package:orders:v1"), 7)
        .await
        .unwrap();
    let bundle_id = tx
        .create_bundle(&scope, &bundle("ns:consumptionBundle:orders:v1"), 8)
        .await
        .unwrap();
    let input = api("ns:apiResource:orders:v1");
    let bundles: TargetUrlPerBundle = [(bundle_id.clone(), None)].into_iter().collect();
    let api_id = tx
        .create_api(&scope, write(&input, &package_id), &bundles)
        .await
        .unwrap();
    tx.create_specification_with_fetch_request(
        DefinitionKind::Api,
        &api_id,
        &input.resource_definitions[0],
    )
    .await
    .unwrap();

    tx.delete_package(&scope, &package_id).await.unwrap();
    tx.commit().await.unwrap();

    let state = store.snapshot();
    assert!(state.apis.is_empty());
    assert!(state.bundle_references.is_empty());
    assert!(state.specifications.is_empty());
    assert!(state.fetch_requests.is_empty());
    assert_eq!(state.bundles.len(), 1);
}

#[tokio::test]
async fn update_applies_bundle_delta() {
    let store = store_with_apps(&["app-1"]);
    let scope = Scope::application("app-1");
    let mut tx = store.begin().await.unwrap();
    tx.set_tenant(TENANT);

    let package_id = tx
        .create_package(&scope, &package("ns:package:p:v1"), 1)
        .await
        .unwrap();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let ord_id = format!("ns:consumptionBundle:{name}:v1");
        ids.push(tx.create_bundle(&scope, &bundle(&ord_id), 1).await.unwrap());
    }
    let input = api("ns:apiResource:orders:v1");
    let initial: TargetUrlPerBundle = ids[..2].iter().map(|id| (id.clone(), None)).collect();
    let api_id = tx
        .create_api(&scope, write(&input, &package_id), &initial)
        .await
        .unwrap();

    let desired: TargetUrlPerBundle = [
        (ids[1].clone(), Some("https://b/entry".to_string())),
        (ids[2].clone(), None),
    ]
    .into_iter()
    .collect();
    let current = tx
        .bundle_ids_for_object(DefinitionKind::Api, &api_id)
        .await
        .unwrap();
    let delta = BundleReferenceDelta::compute(desired, &current);
    tx.update_api(&scope, &api_id, write(&input, &package_id), &delta)
        .await
        .unwrap();

    let mut now = tx
        .bundle_ids_for_object(DefinitionKind::Api, &api_id)
        .await
        .unwrap();
    now.sort();
    let mut expected = vec![ids[1].clone(), ids[2].clone()];
    expected.sort();
    assert_eq!(now, expected);

    let state = store.snapshot();
    let kept = state
        .bundle_references
        .values()
        .find(|r| r.bundle_id == ids[1])
        .unwrap();
    assert_eq!(kept.default_target_url.as_deref(), Some("https://b/entry"));
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn specification_round_trip_through_fetch_request() {
    let store = store_with_apps(&["app-1"]);
    let input = api("ns:apiResource:orders:v1");

    let mut tx = store.begin().await.unwrap();
    let (spec_id, mut request) = tx
        .create_specification_with_fetch_request(
            DefinitionKind::Api,
            "api-1",
            &input.resource_definitions[0],
        )
        .await
        .unwrap();
    assert_eq!(request.status.condition, FetchCondition::Initial);
    assert_eq!(request.url, "https://spec/orders.json");

    let mut spec = tx.get_specification(&spec_id).await.unwrap();
    spec.data = Some("{}".into());
    spec.fetch_condition = FetchCondition::Succeeded;
    tx.update_specification(&spec).await.unwrap();
    request.status = FetchRequestStatus::succeeded();
    tx.update_fetch_request(&request).await.unwrap();

    let requests = tx
        .list_fetch_requests_by_specification_ids(&[spec_id.clone()])
        .await
        .unwrap();
    assert_eq!(requests[0].status.condition, FetchCondition::Succeeded);
    tx.commit().await.unwrap();

    assert_eq!(
        store.snapshot().specifications[&spec_id].data.as_deref(),
        Some("{}")
    );
}

#[tokio::test]
async fn stats_count_calls_per_kind() {
    let store = store_with_apps(&["app-1"]);
    let scope = Scope::application("app-1");
    let stats = store.stats();

    let mut tx = store.begin().await.unwrap();
    tx.set_tenant(TENANT);
    tx.list_packages(&scope).await.unwrap();
    let id = tx
        .create_package(&scope, &package("ns:package:p:v1"), 1)
        .await
        .unwrap();
    tx.update_package(&scope, &id, &package("ns:package:p:v1"), 2)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(stats.count(ResourceKind::Package, Mutation::List), 1);
    assert_eq!(stats.count(ResourceKind::Package, Mutation::Create), 1);
    assert_eq!(stats.count(ResourceKind::Package, Mutation::Update), 1);
    assert_eq!(stats.total_mutations(), 2);
}

#[tokio::test]
async fn webhooks_and_operations() {
    let store = store_with_apps(&["app-1"]);
    store.add_webhook(Webhook {
        id: "wh-1".into(),
        owner: WebhookOwner::Application("app-1".into()),
        webhook_type: WebhookType::OpenResourceDiscovery,
        url: Some("https://provider".into()),
    });
    store.add_webhook(Webhook {
        id: "wh-2".into(),
        owner: WebhookOwner::ApplicationTemplate("tpl-1".into()),
        webhook_type: WebhookType::OpenResourceDiscovery,
        url: Some("https://template".into()),
    });

    let mut tx = store.begin().await.unwrap();
    assert_eq!(
        tx.list_webhooks_for_application_for_update("app-1")
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(tx.list_webhooks_for_template("tpl-1").await.unwrap().len(), 1);
    assert_eq!(
        tx.list_webhooks_by_type(&WebhookType::OpenResourceDiscovery)
            .await
            .unwrap()
            .len(),
        2
    );

    let data = OperationData::for_application("app-1").to_json().unwrap();
    let op_id = tx
        .create_operation(OperationType::OrdAggregation, data)
        .await
        .unwrap();
    assert_eq!(
        tx.list_operations(OperationType::OrdAggregation)
            .await
            .unwrap()
            .len(),
        1
    );
    tx.delete_operation(&op_id).await.unwrap();
    assert!(tx.delete_operation(&op_id).await.unwrap_err().is_not_found());
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn operations_are_claimed_once() {
    let store = InMemoryStore::new();
    let op_id = {
        let mut tx = store.begin().await.unwrap();
        let data = OperationData::for_template("tpl-1").to_json().unwrap();
        let id = tx
            .create_operation(OperationType::OrdAggregation, data)
            .await
            .unwrap();
        tx.commit().await.unwrap();
        id
    };

    // a rolled back claim leaves the operation scheduled
    let mut tx = store.begin().await.unwrap();
    assert!(tx.claim_operation(OperationType::OrdAggregation).await.unwrap().is_some());
    tx.rollback().await.unwrap();
    assert_eq!(store.snapshot().operations[&op_id].status, OperationStatus::Scheduled);

    let mut first = store.begin().await.unwrap();
    let mut second = store.begin().await.unwrap();
    let claimed = first
        .claim_operation(OperationType::OrdAggregation)
        .await
        .unwrap()
        .expect("scheduled operation");
    assert_eq!(claimed.id, op_id);
    assert_eq!(claimed.status, OperationStatus::InProgress);
    assert!(second.claim_operation(OperationType::OrdAggregation).await.unwrap().is_none());
    first.commit().await.unwrap();
    second.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    tx.update_operation_status(&op_id, OperationStatus::Failed, Some("boom"))
        .await
        .unwrap();
    assert!(
        tx.update_operation_status("missing", OperationStatus::Completed, None)
            .await
            .unwrap_err()
            .is_not_found()
    );
    tx.commit().await.unwrap();

    let stored = &store.snapshot().operations[&op_id];
    assert_eq!(stored.status, OperationStatus::Failed);
    assert_eq!(stored.error.as_deref(), Some("boom"));
}

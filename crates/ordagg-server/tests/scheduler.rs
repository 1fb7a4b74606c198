use std::sync::Arc;
use std::time::Duration;

use ordagg_aggregator::OperationMaintainer;
use ordagg_core::{OperationData, OperationStatus, OperationType, Webhook, WebhookOwner, WebhookType};
use ordagg_db_memory::InMemoryStore;
use ordagg_server::config::SchedulerConfig;
use ordagg_server::{AppConfig, Scheduler, build_aggregator};
use ordagg_storage::prelude::*;
use tokio::sync::watch;
use tokio_test::assert_ok;

fn scheduler(store: &InMemoryStore) -> Scheduler {
    let aggregator = build_aggregator(&AppConfig::default(), Arc::new(store.clone())).expect("aggregator");
    let maintainer = OperationMaintainer::new(Arc::new(store.clone()));
    Scheduler::new(aggregator, maintainer, &SchedulerConfig::default())
}

#[tokio::test]
async fn disabled_jobs_spawn_nothing() {
    let store = InMemoryStore::new();
    let (_tx, rx) = watch::channel(false);

    let tasks = scheduler(&store).spawn(rx);

    assert!(tasks.is_empty());
}

#[tokio::test]
async fn maintenance_runs_periodically_until_shutdown() {
    let store = InMemoryStore::new();
    store.add_webhook(Webhook {
        id: "wh-1".into(),
        owner: WebhookOwner::Application("app-1".into()),
        webhook_type: WebhookType::OpenResourceDiscovery,
        url: Some("https://app-1.provider.local".into()),
    });
    let (tx, rx) = watch::channel(false);

    let mut tasks = scheduler(&store)
        .with_maintenance_interval(Some(Duration::from_millis(20)))
        .spawn(rx);
    assert_eq!(tasks.len(), 1);

    let mut operations = 0;
    for _ in 0..50 {
        operations = store.snapshot().operations.len();
        if operations > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(operations, 1);

    tx.send(true).expect("send shutdown");
    let joined = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(result) = tasks.join_next().await {
            result.expect("job task");
        }
    })
    .await;
    assert_ok!(joined);
    // converged: later ticks add nothing
    assert_eq!(store.snapshot().operations.len(), 1);
}

#[tokio::test]
async fn executors_record_the_outcome_of_scheduled_operations() {
    let store = InMemoryStore::new();
    let id = {
        let mut tx = store.begin().await.expect("begin");
        let data = OperationData::for_template("unknown").to_json().expect("data");
        let id = tx
            .create_operation(OperationType::OrdAggregation, data)
            .await
            .expect("create");
        tx.commit().await.expect("commit");
        id
    };
    let (tx, rx) = watch::channel(false);

    let mut tasks = scheduler(&store)
        .with_operation_processors(2, Duration::from_millis(20))
        .spawn(rx);
    assert_eq!(tasks.len(), 2);

    let mut status = OperationStatus::Scheduled;
    for _ in 0..50 {
        status = store.snapshot().operations[&id].status;
        if status.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, OperationStatus::Failed);
    let error = store.snapshot().operations[&id].error.clone();
    assert!(error.is_some_and(|e| e.contains("unknown")));

    tx.send(true).expect("send shutdown");
    let joined = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(result) = tasks.join_next().await {
            result.expect("executor task");
        }
    })
    .await;
    assert_ok!(joined);
}

//! Keeps one scheduled aggregation operation per ORD webhook.

use std::collections::HashSet;

use ordagg_core::{OperationData, OperationStatus, OperationType, WebhookOwner, WebhookType};
use ordagg_storage::prelude::*;

use crate::error::AggregationError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub created: usize,
    pub deleted: usize,
    pub rescheduled: usize,
}

#[derive(Clone)]
pub struct OperationMaintainer {
    store: DynCatalogStore,
}

impl OperationMaintainer {
    pub fn new(store: DynCatalogStore) -> Self {
        Self { store }
    }

    /// Creates missing `ORD_AGGREGATION` operations, deletes stale or
    /// malformed ones and schedules finished ones again, in one transaction.
    pub async fn maintain(&self) -> Result<MaintenanceSummary, AggregationError> {
        let mut tx = self.store.begin().await?;

        let mut desired: HashSet<OperationData> = tx
            .list_webhooks_by_type(&WebhookType::OpenResourceDiscovery)
            .await?
            .into_iter()
            .filter(|webhook| webhook.ord_url().is_some())
            .map(|webhook| match webhook.owner {
                WebhookOwner::Application(id) => OperationData::for_application(id),
                WebhookOwner::ApplicationTemplate(id) => OperationData::for_template(id),
            })
            .collect();

        let mut summary = MaintenanceSummary::default();
        for operation in tx.list_operations(OperationType::OrdAggregation).await? {
            let keep = match OperationData::from_json(&operation.data) {
                Ok(data) => desired.remove(&data),
                Err(e) => {
                    tracing::warn!(operation_id = %operation.id, error = %e, "deleting malformed operation");
                    false
                }
            };
            if !keep {
                tx.delete_operation(&operation.id).await?;
                summary.deleted += 1;
            } else if operation.status.is_finished() {
                tx.update_operation_status(&operation.id, OperationStatus::Scheduled, None)
                    .await?;
                summary.rescheduled += 1;
            }
        }

        for data in desired {
            tx.create_operation(OperationType::OrdAggregation, data.to_json()?)
                .await?;
            summary.created += 1;
        }
        tx.commit().await?;

        tracing::info!(
            created = summary.created,
            deleted = summary.deleted,
            rescheduled = summary.rescheduled,
            "maintained aggregation operations"
        );
        Ok(summary)
    }
}

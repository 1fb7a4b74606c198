//! Executes scheduled `ORD_AGGREGATION` operations one at a time.

use ordagg_core::{OperationData, OperationStatus, OperationType};
use ordagg_storage::prelude::*;

use crate::dispatcher::Aggregator;
use crate::error::AggregationError;
use crate::metrics;

/// Outcome of one executed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedOperation {
    pub id: String,
    pub status: OperationStatus,
}

/// Claims scheduled operations and runs the targeted aggregation each one
/// describes.
#[derive(Clone)]
pub struct OperationProcessor {
    aggregator: Aggregator,
}

impl OperationProcessor {
    pub fn new(aggregator: Aggregator) -> Self {
        Self { aggregator }
    }

    fn store(&self) -> &DynCatalogStore {
        self.aggregator.reconciler().store()
    }

    /// Claims one scheduled operation, processes it and records the outcome.
    ///
    /// Returns `None` when no operation is scheduled. A failing aggregation
    /// marks the operation failed and is not an error of this call; only
    /// storage failures while claiming or recording are.
    pub async fn claim_and_process(&self) -> Result<Option<ProcessedOperation>, AggregationError> {
        let mut tx = self.store().begin().await?;
        let Some(operation) = tx.claim_operation(OperationType::OrdAggregation).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        tx.commit().await?;

        tracing::info!(operation_id = %operation.id, data = %operation.data, "processing aggregation operation");
        let result = self.process(&operation.data).await;
        metrics::record_application(result.is_ok());

        let (status, error) = match &result {
            Ok(()) => (OperationStatus::Completed, None),
            Err(e) => {
                tracing::error!(operation_id = %operation.id, error = %e, "aggregation operation failed");
                (OperationStatus::Failed, Some(e.to_string()))
            }
        };

        let mut tx = self.store().begin().await?;
        tx.update_operation_status(&operation.id, status, error.as_deref())
            .await?;
        tx.commit().await?;

        Ok(Some(ProcessedOperation {
            id: operation.id,
            status,
        }))
    }

    async fn process(&self, data: &serde_json::Value) -> Result<(), AggregationError> {
        let data = OperationData::from_json(data)?;
        let globals = self.aggregator.stored_global_resources().await;
        let reconciler = self.aggregator.reconciler();
        if !data.application_id.is_empty() {
            reconciler
                .process_application(&data.application_id, &globals)
                .await
        } else {
            reconciler
                .process_application_template(&data.application_template_id, &globals)
                .await
        }
    }
}

//! Targeted aggregation of caller-selected applications and templates.

use std::time::Instant;

use crate::config::MetricsConfig;
use crate::dispatcher::Aggregator;
use crate::error::AggregationError;
use crate::global_registry::GlobalResourceSet;
use crate::metrics;

impl Aggregator {
    /// Stored global set for targeted runs. These never sync the registry.
    pub async fn stored_global_resources(&self) -> GlobalResourceSet {
        self.global_registry()
            .list_global_resources()
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to list stored global resources, validating without them");
                GlobalResourceSet::new()
            })
    }

    /// Reconciles the given applications one after another.
    ///
    /// Every application is attempted; the error reports how many failed.
    pub async fn process_applications(
        &self,
        metrics_config: &MetricsConfig,
        app_ids: &[String],
    ) -> Result<(), AggregationError> {
        if app_ids.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let globals = self.stored_global_resources().await;

        let mut failed = 0usize;
        for app_id in app_ids {
            let result = self.reconciler().process_application(app_id, &globals).await;
            metrics::record_application(result.is_ok());
            if let Err(e) = result {
                tracing::error!(app_id = %app_id, error = %e, "failed to process application");
                failed += 1;
            }
        }

        finish(metrics_config, "applications", started, failed)
    }

    /// Reconciles every application of the given templates, one template
    /// after another.
    pub async fn process_application_templates(
        &self,
        metrics_config: &MetricsConfig,
        template_ids: &[String],
    ) -> Result<(), AggregationError> {
        if template_ids.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let globals = self.stored_global_resources().await;

        let mut failed = 0usize;
        for template_id in template_ids {
            if let Err(e) = self
                .reconciler()
                .process_application_template(template_id, &globals)
                .await
            {
                tracing::error!(template_id = %template_id, error = %e, "failed to process application template");
                failed += 1;
            }
        }

        finish(metrics_config, "application_templates", started, failed)
    }
}

fn finish(
    metrics_config: &MetricsConfig,
    target: &str,
    started: Instant,
    failed: usize,
) -> Result<(), AggregationError> {
    if metrics_config.enabled {
        metrics::record_job(
            &format!("{}_{target}", metrics_config.job_name),
            started.elapsed(),
            failed,
        );
    }
    if failed > 0 {
        return Err(AggregationError::ApplicationsFailed { failed });
    }
    Ok(())
}

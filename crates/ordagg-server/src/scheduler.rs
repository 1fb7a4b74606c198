//! Periodic aggregation runs, operation maintenance and operation executors.

use std::future::Future;
use std::time::Duration;

use ordagg_aggregator::{Aggregator, OperationMaintainer, OperationProcessor};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval_at};

use crate::config::SchedulerConfig;

pub struct Scheduler {
    aggregator: Aggregator,
    maintainer: OperationMaintainer,
    processor: OperationProcessor,
    aggregation_interval: Option<Duration>,
    maintenance_interval: Option<Duration>,
    processors: usize,
    quiet_period: Duration,
}

impl Scheduler {
    pub fn new(aggregator: Aggregator, maintainer: OperationMaintainer, config: &SchedulerConfig) -> Self {
        Self {
            processor: OperationProcessor::new(aggregator.clone()),
            aggregator,
            maintainer,
            aggregation_interval: config.aggregation_interval(),
            maintenance_interval: config.maintain_operations_interval(),
            processors: config.parallel_operation_processors,
            quiet_period: config.operation_processor_quiet_period(),
        }
    }

    pub fn with_aggregation_interval(mut self, interval: Option<Duration>) -> Self {
        self.aggregation_interval = interval;
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Option<Duration>) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn with_operation_processors(mut self, count: usize, quiet_period: Duration) -> Self {
        self.processors = count;
        self.quiet_period = quiet_period;
        self
    }

    /// Spawns one task per enabled job. Tasks finish once `shutdown` flips to
    /// `true` or its sender is dropped.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();

        if let Some(period) = self.aggregation_interval {
            let aggregator = self.aggregator;
            tasks.spawn(every(period, shutdown.clone(), "aggregation", move || {
                let aggregator = aggregator.clone();
                async move {
                    match aggregator.run().await {
                        Ok(()) => tracing::info!("scheduled ORD aggregation finished"),
                        Err(e) => tracing::error!(
                            error = %e,
                            failed = e.failed_applications(),
                            "scheduled ORD aggregation failed"
                        ),
                    }
                }
            }));
        } else {
            tracing::info!("scheduled aggregation disabled");
        }

        if let Some(period) = self.maintenance_interval {
            let maintainer = self.maintainer;
            tasks.spawn(every(period, shutdown.clone(), "operation_maintenance", move || {
                let maintainer = maintainer.clone();
                async move {
                    match maintainer.maintain().await {
                        Ok(summary) => tracing::info!(
                            created = summary.created,
                            deleted = summary.deleted,
                            rescheduled = summary.rescheduled,
                            "maintained ORD aggregation operations"
                        ),
                        Err(e) => tracing::error!(error = %e, "operation maintenance failed"),
                    }
                }
            }));
        } else {
            tracing::info!("operation maintenance disabled");
        }

        for worker in 0..self.processors {
            tasks.spawn(execute_operations(
                self.processor.clone(),
                worker,
                self.quiet_period,
                shutdown.clone(),
            ));
        }
        if self.processors == 0 {
            tracing::info!("operation processing disabled");
        }

        tasks
    }
}

/// Claims and processes operations back to back, pausing for `quiet_period`
/// whenever none is scheduled or claiming fails.
async fn execute_operations(
    processor: OperationProcessor,
    worker: usize,
    quiet_period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(worker, "operation executor started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        let idle = match processor.claim_and_process().await {
            Ok(Some(operation)) => {
                tracing::info!(
                    worker,
                    operation_id = %operation.id,
                    status = %operation.status,
                    "operation processed"
                );
                false
            }
            Ok(None) => true,
            Err(e) => {
                tracing::error!(worker, error = %e, "failed to claim or record operation");
                true
            }
        };
        if idle {
            tokio::select! {
                _ = tokio::time::sleep(quiet_period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
    tracing::info!(worker, "operation executor stopped");
}

async fn every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, job: &'static str, mut tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let mut interval = interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tracing::info!(job, period_secs = period.as_secs_f64(), "scheduled job started");

    loop {
        tokio::select! {
            _ = interval.tick() => tick().await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!(job, "scheduled job stopped");
}

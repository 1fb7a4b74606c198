//! Aggregation metrics, recorded through the `metrics` facade.
//!
//! The server installs the Prometheus recorder; without one these calls are no-ops.

use std::time::Duration;

use ::metrics::{counter, histogram};
use ordagg_core::FetchCondition;

pub mod names {
    pub const APPLICATIONS_PROCESSED_TOTAL: &str = "ord_applications_processed_total";
    pub const AGGREGATION_DURATION_SECONDS: &str = "ord_aggregation_duration_seconds";
    pub const SPEC_FETCH_TOTAL: &str = "ord_spec_fetch_total";
    pub const GLOBAL_REGISTRY_SYNC_TOTAL: &str = "ord_global_registry_sync_total";
    pub const JOB_DURATION_SECONDS: &str = "ord_job_duration_seconds";
    pub const JOB_FAILURES_TOTAL: &str = "ord_job_failures_total";
}

fn outcome(success: bool) -> &'static str {
    if success { "success" } else { "failure" }
}

pub fn record_application(success: bool) {
    counter!(names::APPLICATIONS_PROCESSED_TOTAL, "result" => outcome(success)).increment(1);
}

pub fn record_aggregation_duration(duration: Duration) {
    histogram!(names::AGGREGATION_DURATION_SECONDS).record(duration.as_secs_f64());
}

pub fn record_spec_fetch(condition: FetchCondition) {
    let result = match condition {
        FetchCondition::Succeeded => "succeeded",
        FetchCondition::Failed => "failed",
        FetchCondition::Initial => "initial",
    };
    counter!(names::SPEC_FETCH_TOTAL, "result" => result).increment(1);
}

pub fn record_global_sync(success: bool) {
    counter!(names::GLOBAL_REGISTRY_SYNC_TOTAL, "result" => outcome(success)).increment(1);
}

/// Duration and failure count of one operation job.
pub fn record_job(job: &str, duration: Duration, failed: usize) {
    histogram!(names::JOB_DURATION_SECONDS, "job" => job.to_string())
        .record(duration.as_secs_f64());
    if failed > 0 {
        counter!(names::JOB_FAILURES_TOTAL, "job" => job.to_string()).increment(failed as u64);
    }
}

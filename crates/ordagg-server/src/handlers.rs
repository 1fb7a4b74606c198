use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use ordagg_aggregator::{Aggregator, MetricsConfig};
use ordagg_api::{ApiError, StatusBody};
use serde::{Deserialize, Serialize};

pub const APPLICATIONS_FAILED: &str = "ORD data aggregation failed for one or more applications";
pub const TEMPLATES_FAILED: &str =
    "ORD data aggregation failed for one or more application templates";

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub metrics: MetricsConfig,
    full_run: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(aggregator: Aggregator, metrics: MetricsConfig) -> Self {
        Self {
            aggregator,
            metrics,
            full_run: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run started through `/aggregate/all` is still going.
    pub fn full_run_in_progress(&self) -> bool {
        self.full_run.load(Ordering::SeqCst)
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = crate::metrics::render_metrics()
        .ok_or_else(|| ApiError::service_unavailable("metrics recorder is not installed"))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Query of the single trigger: exactly one of the two must be set.
#[derive(Debug, Default, Deserialize)]
pub struct AggregateParams {
    #[serde(rename = "appID", default)]
    pub app_id: Option<String>,
    #[serde(rename = "appTemplateID", default)]
    pub app_template_id: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Application(String),
    Template(String),
}

impl AggregateParams {
    fn target(self) -> Result<Target, ApiError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (present(self.app_id), present(self.app_template_id)) {
            (Some(app_id), None) => Ok(Target::Application(app_id)),
            (None, Some(template_id)) => Ok(Target::Template(template_id)),
            (Some(_), Some(_)) => Err(ApiError::bad_request(
                "appID and appTemplateID are mutually exclusive",
            )),
            (None, None) => Err(ApiError::bad_request(
                "one of appID or appTemplateID is required",
            )),
        }
    }
}

/// POST /aggregate?appID=..|appTemplateID=..
pub async fn aggregate(
    State(state): State<AppState>,
    Query(params): Query<AggregateParams>,
) -> Result<Json<StatusBody>, ApiError> {
    let target = params.target()?;
    let globals = state.aggregator.stored_global_resources().await;
    let reconciler = state.aggregator.reconciler();

    let result = match &target {
        Target::Application(app_id) => reconciler.process_application(app_id, &globals).await,
        Target::Template(template_id) => {
            reconciler
                .process_application_template(template_id, &globals)
                .await
        }
    };
    result.map_err(|e| {
        tracing::error!(trigger = ?target, error = %e, "ORD data aggregation failed");
        ApiError::bad_request(e.to_string())
    })?;

    Ok(Json(StatusBody::ok()))
}

#[derive(Debug, Default, Deserialize)]
pub struct BulkAggregationRequest {
    #[serde(rename = "applicationIDs", default)]
    pub application_ids: Vec<String>,
    #[serde(rename = "applicationTemplateIDs", default)]
    pub application_template_ids: Vec<String>,
}

/// POST /aggregate/bulk
///
/// Both lists are always processed; an application failure is reported
/// ahead of a template failure.
pub async fn aggregate_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkAggregationRequest>,
) -> Result<Json<StatusBody>, ApiError> {
    let applications = state
        .aggregator
        .process_applications(&state.metrics, &request.application_ids)
        .await;
    let templates = state
        .aggregator
        .process_application_templates(&state.metrics, &request.application_template_ids)
        .await;

    if let Err(e) = applications {
        tracing::error!(error = %e, "bulk application aggregation failed");
        return Err(ApiError::internal(APPLICATIONS_FAILED));
    }
    if let Err(e) = templates {
        tracing::error!(error = %e, "bulk application template aggregation failed");
        return Err(ApiError::internal(TEMPLATES_FAILED));
    }
    Ok(Json(StatusBody::ok()))
}

/// Clears the in-progress flag of a full run when dropped, also on panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// POST /aggregate/all: starts a full run in the background.
pub async fn aggregate_all(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<StatusBody>), ApiError> {
    if state.full_run.swap(true, Ordering::SeqCst) {
        return Err(ApiError::conflict("an aggregation run is already in progress"));
    }

    let aggregator = state.aggregator.clone();
    let running = RunningGuard(state.full_run.clone());
    tokio::spawn(async move {
        let _running = running;
        match aggregator.run().await {
            Ok(()) => tracing::info!("ORD aggregation run finished"),
            Err(e) => tracing::error!(
                error = %e,
                failed = e.failed_applications(),
                "ORD aggregation run failed"
            ),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(StatusBody::accepted())))
}

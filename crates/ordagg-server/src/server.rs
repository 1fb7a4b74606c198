use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use ordagg_aggregator::{Aggregator, OperationMaintainer};
use ordagg_db_memory::InMemoryStore;
use ordagg_storage::DynCatalogStore;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::handlers::{self, AppState};
use crate::scheduler::Scheduler;

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route("/aggregate", post(handlers::aggregate))
        .route("/aggregate/bulk", post(handlers::aggregate_bulk))
        .route("/aggregate/all", post(handlers::aggregate_all))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &axum::http::Request<_>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &axum::http::Response<_>,
                             latency: std::time::Duration,
                             span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(middleware::from_fn(track_metrics)),
        )
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();
    let response = next.run(req).await;
    crate::metrics::record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

/// Builds the aggregator over `store` with the configured clients.
pub fn build_aggregator(cfg: &AppConfig, store: DynCatalogStore) -> anyhow::Result<Aggregator> {
    let aggregator = Aggregator::builder(store, cfg.aggregator.clone())
        .client_config(cfg.client.clone())
        .build()?;
    Ok(aggregator)
}

pub struct OrdaggServer {
    addr: SocketAddr,
    app: Router,
    scheduler: Scheduler,
}

pub struct ServerBuilder {
    config: AppConfig,
    store: Option<DynCatalogStore>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
            store: None,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Catalog backend; defaults to an empty in-memory store.
    pub fn with_store(mut self, store: DynCatalogStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> anyhow::Result<OrdaggServer> {
        let store: DynCatalogStore = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let aggregator = build_aggregator(&self.config, store.clone())?;
        let scheduler = Scheduler::new(
            aggregator.clone(),
            OperationMaintainer::new(store),
            &self.config.scheduler,
        );
        let state = AppState::new(aggregator, self.config.metrics.clone());

        Ok(OrdaggServer {
            addr: self.config.addr(),
            app: build_app(state, &self.config),
            scheduler,
        })
    }
}

impl OrdaggServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut jobs = self.scheduler.spawn(shutdown_rx);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        let _ = shutdown_tx.send(true);
        while let Some(joined) = jobs.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "scheduled job panicked");
            }
        }
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

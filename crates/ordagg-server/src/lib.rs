pub mod config;
pub mod handlers;
pub mod metrics;
pub mod observability;
pub mod scheduler;
pub mod server;

pub use config::{AppConfig, LoggingConfig, SchedulerConfig, ServerConfig};
pub use handlers::AppState;
pub use observability::{init_tracing, shutdown_tracing};
pub use scheduler::Scheduler;
pub use server::{OrdaggServer, ServerBuilder, build_aggregator, build_app};

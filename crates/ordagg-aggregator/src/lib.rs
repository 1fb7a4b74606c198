//! # ordagg-aggregator
//!
//! Reconciles the ORD catalogs applications publish with the stored catalog.
//!
//! A run ([`Aggregator::run`]) synchronizes the global registry, pages through
//! all applications and hands them to a fixed pool of workers. Each worker
//! runs the [`ApplicationReconciler`]: fetch the documents, validate them,
//! reconcile vendors, products, packages, bundles, APIs, events and
//! tombstones in that order, apply the tombstones, commit, and finally
//! download the specifications left pending.
//!
//! The [`OperationMaintainer`] keeps one scheduled operation per ORD webhook
//! and the [`OperationProcessor`] executes them one at a time.

pub mod application;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod global_registry;
pub mod hash;
pub mod maintainer;
pub mod metrics;
pub mod operations;
pub mod processor;
pub mod reconcile;
pub mod specs;
pub mod tombstone;
pub mod validation;

pub use application::ApplicationReconciler;
pub use client::{DocumentClient, HttpDocumentClient};
pub use config::{AggregatorConfig, ClientConfig, MetricsConfig};
pub use dispatcher::{Aggregator, AggregatorBuilder};
pub use error::{AggregationError, ClientError, ValidationError};
pub use global_registry::{GlobalRegistry, GlobalRegistryService, GlobalResourceSet};
pub use hash::{ResourceHashes, compute_resource_hashes, hash_resource};
pub use maintainer::{MaintenanceSummary, OperationMaintainer};
pub use processor::{OperationProcessor, ProcessedOperation};
pub use specs::{FetchOutcome, HttpSpecFetcher, SpecFetcher, fetch_pending_specs};
pub use tombstone::{CatalogSnapshot, apply_tombstones};
pub use validation::{DefaultDocumentValidator, DocumentValidator, ValidationContext};

//! # ordagg-storage
//!
//! Storage abstraction layer for the ORD aggregation engine.
//!
//! This crate defines the repository traits a catalog backend must implement.
//! It does not contain any implementations; `ordagg-db-memory` provides one.
//!
//! ## Overview
//!
//! The aggregation engine never touches rows directly. Every read and mutation
//! goes through a [`CatalogTransaction`] obtained from a [`CatalogStore`]:
//!
//! ```ignore
//! use ordagg_storage::{CatalogStore, Scope, StorageError};
//!
//! async fn vendor_ids(store: &dyn CatalogStore, app_id: &str) -> Result<Vec<String>, StorageError> {
//!     let mut tx = store.begin().await?;
//!     let vendors = tx.list_vendors(&Scope::application(app_id)).await?;
//!     tx.commit().await?;
//!     Ok(vendors.into_iter().map(|v| v.ord_id).collect())
//! }
//! ```
//!
//! Dropping a transaction without committing it rolls it back.

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{
    ApiRepository, ApplicationRepository, BundleReferenceRepository, BundleRepository,
    CatalogStore, CatalogTransaction, EventRepository, LabelRepository, OperationRepository,
    PackageRepository, ProductRepository, SpecificationRepository, TenantRepository,
    TombstoneRepository, VendorRepository, WebhookRepository,
};
pub use types::{BundleReferenceDelta, DefinitionWrite, Scope, TargetUrlPerBundle};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared catalog store.
pub type DynCatalogStore = std::sync::Arc<dyn CatalogStore>;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        ApiRepository, ApplicationRepository, BundleReferenceDelta, BundleReferenceRepository,
        BundleRepository, CatalogStore, CatalogTransaction, DefinitionWrite, DynCatalogStore,
        EventRepository, LabelRepository, OperationRepository, PackageRepository,
        ProductRepository, Scope, SpecificationRepository, StorageError, StorageResult,
        TargetUrlPerBundle, TenantRepository, TombstoneRepository, VendorRepository,
        WebhookRepository,
    };
}

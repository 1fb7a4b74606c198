//! In-memory catalog storage backend for the ORD aggregation engine.
//!
//! This crate implements the `CatalogStore` trait from `ordagg-storage` on top
//! of `parking_lot`-guarded tables. Writes are applied immediately and recorded
//! in a per-transaction undo log; dropping a transaction without committing
//! replays the log in reverse. Application row locks are `tokio` mutexes held
//! until the owning transaction ends.
//!
//! # Example
//!
//! ```ignore
//! use ordagg_core::Application;
//! use ordagg_db_memory::InMemoryStore;
//! use ordagg_storage::{CatalogStore, Scope};
//!
//! let store = InMemoryStore::new();
//! store.add_application(Application::new("app-1", "orders"), "tenant-1");
//!
//! let mut tx = store.begin().await?;
//! let app = tx.lock_application("app-1").await?;
//! let vendors = tx.list_vendors(&Scope::application(&app.id)).await?;
//! tx.commit().await?;
//! ```

mod state;
mod stats;
pub mod store;
mod transaction;

pub use ordagg_storage::{CatalogStore, CatalogTransaction, StorageError};
pub use state::CatalogState;
pub use stats::{Mutation, MutationStats};
pub use store::{FailPoint, InMemoryStore};
pub use transaction::InMemoryTransaction;

/// Creates a new shareable in-memory catalog store.
pub fn create_catalog_store() -> ordagg_storage::DynCatalogStore {
    std::sync::Arc::new(InMemoryStore::new())
}

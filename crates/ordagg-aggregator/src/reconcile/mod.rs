//! Generic diff-and-apply of desired catalog inputs against stored rows.
//!
//! Each resource kind implements [`CatalogKind`] on top of its repository.
//! [`reconcile`] then runs the same algorithm for all of them:
//!
//! 1. list the stored rows of the scope
//! 2. update rows whose ORD ID is desired, create the missing ones
//! 3. optionally delete stored rows that are no longer desired
//! 4. list again and return the authoritative post-apply set
//!
//! Per-application reconciliation never deletes here; removal is driven by
//! tombstones (see [`crate::tombstone`]). Only the global registry deletes
//! absent vendors and products.

mod definitions;
mod kinds;

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use ordagg_core::{OrdIdentified, ResourceKind};
use ordagg_storage::{CatalogTransaction, Scope, StorageError};

use crate::error::AggregationError;

pub use definitions::{DefinitionInput, Definitions};
pub use kinds::{BundleKind, PackageKind, ProductKind, TombstoneKind, VendorKind};

/// Storage operations of one resource kind.
#[async_trait]
pub trait CatalogKind: Send + Sync {
    type Input: OrdIdentified + Send + Sync;
    type Stored: OrdIdentified + Send + Sync;

    const KIND: ResourceKind;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Self::Stored>, StorageError>;

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &Self::Input,
    ) -> Result<(), AggregationError>;

    /// Brings `stored` in line with `input`. Implementations skip the storage
    /// call when nothing changed.
    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Self::Stored,
        input: &Self::Input,
    ) -> Result<(), AggregationError>;

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Self::Stored,
    ) -> Result<(), StorageError>;
}

/// Applies `inputs` for one kind and returns the stored set after the changes.
pub async fn reconcile<K: CatalogKind>(
    kind: &mut K,
    tx: &mut dyn CatalogTransaction,
    scope: &Scope,
    inputs: &[K::Input],
    delete_absent: bool,
) -> Result<Vec<K::Stored>, AggregationError> {
    let current = kind.list(tx, scope).await?;
    let by_ord_id: HashMap<&str, &K::Stored> =
        current.iter().map(|stored| (stored.ord_id(), stored)).collect();

    let (mut created, mut updated, mut deleted) = (0usize, 0usize, 0usize);
    for input in inputs {
        match by_ord_id.get(input.ord_id()) {
            Some(stored) => {
                kind.update(tx, scope, stored, input).await?;
                updated += 1;
            }
            None => {
                kind.create(tx, scope, input).await?;
                created += 1;
            }
        }
    }

    if delete_absent {
        let desired: HashSet<&str> = inputs.iter().map(OrdIdentified::ord_id).collect();
        for stored in current.iter().filter(|s| !desired.contains(s.ord_id())) {
            kind.delete(tx, scope, stored).await?;
            deleted += 1;
        }
    }

    tracing::debug!(
        kind = %K::KIND,
        scope = %scope,
        created,
        updated,
        deleted,
        "reconciled resources"
    );

    Ok(kind.list(tx, scope).await?)
}

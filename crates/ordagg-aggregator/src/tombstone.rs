//! Tombstone cascade: removes resources whose ORD ID has been tombstoned.

use std::collections::HashSet;

use ordagg_core::{
    Api, Bundle, Event, OrdIdentified, Package, Product, ResourceKind, Tombstone, Vendor,
};
use ordagg_storage::prelude::*;

/// Post-apply resource sets of one application.
#[derive(Debug, Clone, Copy)]
pub struct CatalogSnapshot<'a> {
    pub packages: &'a [Package],
    pub apis: &'a [Api],
    pub events: &'a [Event],
    pub bundles: &'a [Bundle],
    pub vendors: &'a [Vendor],
    pub products: &'a [Product],
}

fn find_id<'a, T>(rows: &'a [T], ord_id: &str, id: impl Fn(&'a T) -> &'a str) -> Option<&'a str>
where
    T: OrdIdentified,
{
    rows.iter().find(|row| row.ord_id() == ord_id).map(id)
}

impl<'a> CatalogSnapshot<'a> {
    /// First resource carrying `ord_id`, searching packages, APIs, events,
    /// bundles, vendors and then products.
    ///
    /// ORD IDs are not enforced unique across kinds. When they collide only
    /// the first kind in this order is returned.
    pub fn find_tombstone_target(&self, ord_id: &str) -> Option<(ResourceKind, &'a str)> {
        find_id(self.packages, ord_id, |p| p.id.as_str())
            .map(|id| (ResourceKind::Package, id))
            .or_else(|| find_id(self.apis, ord_id, |a| a.id.as_str()).map(|id| (ResourceKind::Api, id)))
            .or_else(|| {
                find_id(self.events, ord_id, |e| e.id.as_str()).map(|id| (ResourceKind::Event, id))
            })
            .or_else(|| {
                find_id(self.bundles, ord_id, |b| b.id.as_str()).map(|id| (ResourceKind::Bundle, id))
            })
            .or_else(|| {
                find_id(self.vendors, ord_id, |v| v.id.as_str()).map(|id| (ResourceKind::Vendor, id))
            })
            .or_else(|| {
                find_id(self.products, ord_id, |p| p.id.as_str())
                    .map(|id| (ResourceKind::Product, id))
            })
    }
}

async fn delete_target(
    tx: &mut dyn CatalogTransaction,
    scope: &Scope,
    kind: ResourceKind,
    id: &str,
) -> Result<(), StorageError> {
    match kind {
        ResourceKind::Package => tx.delete_package(scope, id).await,
        ResourceKind::Api => tx.delete_api(scope, id).await,
        ResourceKind::Event => tx.delete_event(scope, id).await,
        ResourceKind::Bundle => tx.delete_bundle(scope, id).await,
        ResourceKind::Vendor => tx.delete_vendor(scope, id).await,
        ResourceKind::Product => tx.delete_product(scope, id).await,
        ResourceKind::Tombstone => Ok(()),
    }
}

/// Deletes every resource targeted by a tombstone and returns how many were
/// removed.
///
/// Deleting a package also removes its APIs and events, so a later tombstone
/// for one of them finds nothing to delete.
pub async fn apply_tombstones(
    tx: &mut dyn CatalogTransaction,
    scope: &Scope,
    tombstones: &[Tombstone],
    snapshot: &CatalogSnapshot<'_>,
) -> Result<usize, StorageError> {
    let mut deleted: HashSet<&str> = HashSet::new();

    for tombstone in tombstones {
        let Some((kind, id)) = snapshot.find_tombstone_target(&tombstone.ord_id) else {
            continue;
        };
        if !deleted.insert(id) {
            continue;
        }

        match delete_target(tx, scope, kind, id).await {
            Ok(()) => {
                tracing::debug!(ord_id = %tombstone.ord_id, kind = %kind, "deleted tombstoned resource");
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(ord_id = %tombstone.ord_id, kind = %kind, "tombstoned resource already removed");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(deleted.len())
}

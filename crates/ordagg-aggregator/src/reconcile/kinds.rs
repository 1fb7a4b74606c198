use async_trait::async_trait;

use ordagg_core::{
    Bundle, BundleInput, Package, PackageInput, Product, ProductInput, ResourceKind, Tombstone,
    TombstoneInput, Vendor, VendorInput,
};
use ordagg_storage::prelude::*;

use super::CatalogKind;
use crate::error::AggregationError;
use crate::hash::ResourceHashes;

fn resource_hash(hashes: &ResourceHashes, ord_id: &str) -> Result<u64, AggregationError> {
    hashes
        .get(ord_id)
        .copied()
        .ok_or_else(|| AggregationError::hash(ord_id, "no hash computed for resource"))
}

#[derive(Debug, Default)]
pub struct VendorKind;

#[async_trait]
impl CatalogKind for VendorKind {
    type Input = VendorInput;
    type Stored = Vendor;

    const KIND: ResourceKind = ResourceKind::Vendor;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Vendor>, StorageError> {
        tx.list_vendors(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &VendorInput,
    ) -> Result<(), AggregationError> {
        tx.create_vendor(scope, input).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Vendor,
        input: &VendorInput,
    ) -> Result<(), AggregationError> {
        if !stored.matches(input) {
            tx.update_vendor(scope, &stored.id, input).await?;
        }
        Ok(())
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Vendor,
    ) -> Result<(), StorageError> {
        tx.delete_vendor(scope, &stored.id).await
    }
}

#[derive(Debug, Default)]
pub struct ProductKind;

#[async_trait]
impl CatalogKind for ProductKind {
    type Input = ProductInput;
    type Stored = Product;

    const KIND: ResourceKind = ResourceKind::Product;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Product>, StorageError> {
        tx.list_products(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &ProductInput,
    ) -> Result<(), AggregationError> {
        tx.create_product(scope, input).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Product,
        input: &ProductInput,
    ) -> Result<(), AggregationError> {
        if !stored.matches(input) {
            tx.update_product(scope, &stored.id, input).await?;
        }
        Ok(())
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Product,
    ) -> Result<(), StorageError> {
        tx.delete_product(scope, &stored.id).await
    }
}

/// Packages, skipping updates whose content hash is unchanged.
#[derive(Debug)]
pub struct PackageKind<'a> {
    pub hashes: &'a ResourceHashes,
}

#[async_trait]
impl<'a> CatalogKind for PackageKind<'a> {
    type Input = PackageInput;
    type Stored = Package;

    const KIND: ResourceKind = ResourceKind::Package;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Package>, StorageError> {
        tx.list_packages(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &PackageInput,
    ) -> Result<(), AggregationError> {
        let hash = resource_hash(self.hashes, &input.ord_id)?;
        tx.create_package(scope, input, hash).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Package,
        input: &PackageInput,
    ) -> Result<(), AggregationError> {
        let hash = resource_hash(self.hashes, &input.ord_id)?;
        if stored.resource_hash != Some(hash) {
            tx.update_package(scope, &stored.id, input, hash).await?;
        }
        Ok(())
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Package,
    ) -> Result<(), StorageError> {
        tx.delete_package(scope, &stored.id).await
    }
}

#[derive(Debug)]
pub struct BundleKind<'a> {
    pub hashes: &'a ResourceHashes,
}

#[async_trait]
impl<'a> CatalogKind for BundleKind<'a> {
    type Input = BundleInput;
    type Stored = Bundle;

    const KIND: ResourceKind = ResourceKind::Bundle;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Bundle>, StorageError> {
        tx.list_bundles(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &BundleInput,
    ) -> Result<(), AggregationError> {
        let hash = resource_hash(self.hashes, &input.ord_id)?;
        tx.create_bundle(scope, input, hash).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Bundle,
        input: &BundleInput,
    ) -> Result<(), AggregationError> {
        let hash = resource_hash(self.hashes, &input.ord_id)?;
        if stored.resource_hash != Some(hash) {
            tx.update_bundle(scope, &stored.id, input, hash).await?;
        }
        Ok(())
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Bundle,
    ) -> Result<(), StorageError> {
        tx.delete_bundle(scope, &stored.id).await
    }
}

#[derive(Debug, Default)]
pub struct TombstoneKind;

#[async_trait]
impl CatalogKind for TombstoneKind {
    type Input = TombstoneInput;
    type Stored = Tombstone;

    const KIND: ResourceKind = ResourceKind::Tombstone;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Tombstone>, StorageError> {
        tx.list_tombstones(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &TombstoneInput,
    ) -> Result<(), AggregationError> {
        tx.create_tombstone(scope, input).await?;
        Ok(())
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Tombstone,
        input: &TombstoneInput,
    ) -> Result<(), AggregationError> {
        if !stored.matches(input) {
            tx.update_tombstone(scope, &stored.id, input).await?;
        }
        Ok(())
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Tombstone,
    ) -> Result<(), StorageError> {
        tx.delete_tombstone(scope, &stored.id).await
    }
}

//! Repository traits for catalog storage backends.
//!
//! Each resource kind gets a CRUD-shaped repository. A backend exposes them all
//! through one [`CatalogTransaction`], so every call made while reconciling one
//! application shares the same transaction.

use async_trait::async_trait;
use std::collections::HashMap;

use ordagg_core::{
    Api, ApiInput, Application, ApplicationPage, ApplicationTemplate, Bundle, BundleInput,
    DefinitionKind, Event, EventInput, FetchRequest, Operation, OperationStatus, OperationType,
    Package, PackageInput, Product, ProductInput, ResourceDefinition, Specification, Tombstone,
    TombstoneInput, Vendor, VendorInput, Webhook, WebhookType,
};

use crate::error::StorageError;
use crate::types::{BundleReferenceDelta, DefinitionWrite, Scope, TargetUrlPerBundle};

// ==================== Catalog resources ====================

#[async_trait]
pub trait VendorRepository: Send + Sync {
    async fn list_vendors(&mut self, scope: &Scope) -> Result<Vec<Vendor>, StorageError>;

    /// Creates a vendor and returns its storage ID.
    async fn create_vendor(
        &mut self,
        scope: &Scope,
        input: &VendorInput,
    ) -> Result<String, StorageError>;

    async fn update_vendor(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &VendorInput,
    ) -> Result<(), StorageError>;

    async fn delete_vendor(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(&mut self, scope: &Scope) -> Result<Vec<Product>, StorageError>;

    async fn create_product(
        &mut self,
        scope: &Scope,
        input: &ProductInput,
    ) -> Result<String, StorageError>;

    async fn update_product(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &ProductInput,
    ) -> Result<(), StorageError>;

    async fn delete_product(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn list_packages(&mut self, scope: &Scope) -> Result<Vec<Package>, StorageError>;

    async fn create_package(
        &mut self,
        scope: &Scope,
        input: &PackageInput,
        resource_hash: u64,
    ) -> Result<String, StorageError>;

    async fn update_package(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &PackageInput,
        resource_hash: u64,
    ) -> Result<(), StorageError>;

    /// Deletes a package together with the APIs and events it contains.
    async fn delete_package(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait BundleRepository: Send + Sync {
    async fn list_bundles(&mut self, scope: &Scope) -> Result<Vec<Bundle>, StorageError>;

    async fn create_bundle(
        &mut self,
        scope: &Scope,
        input: &BundleInput,
        resource_hash: u64,
    ) -> Result<String, StorageError>;

    async fn update_bundle(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &BundleInput,
        resource_hash: u64,
    ) -> Result<(), StorageError>;

    /// Deletes a bundle and every bundle reference pointing at it.
    async fn delete_bundle(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ApiRepository: Send + Sync {
    async fn list_apis(&mut self, scope: &Scope) -> Result<Vec<Api>, StorageError>;

    /// Creates an API and a bundle reference for every entry of `bundles`.
    async fn create_api(
        &mut self,
        scope: &Scope,
        write: DefinitionWrite<'_, ApiInput>,
        bundles: &TargetUrlPerBundle,
    ) -> Result<String, StorageError>;

    /// Updates an API and applies the bundle reference delta.
    async fn update_api(
        &mut self,
        scope: &Scope,
        id: &str,
        write: DefinitionWrite<'_, ApiInput>,
        bundles: &BundleReferenceDelta,
    ) -> Result<(), StorageError>;

    /// Deletes an API with its specifications and bundle references.
    async fn delete_api(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn list_events(&mut self, scope: &Scope) -> Result<Vec<Event>, StorageError>;

    async fn create_event(
        &mut self,
        scope: &Scope,
        write: DefinitionWrite<'_, EventInput>,
        bundles: &TargetUrlPerBundle,
    ) -> Result<String, StorageError>;

    async fn update_event(
        &mut self,
        scope: &Scope,
        id: &str,
        write: DefinitionWrite<'_, EventInput>,
        bundles: &BundleReferenceDelta,
    ) -> Result<(), StorageError>;

    async fn delete_event(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait TombstoneRepository: Send + Sync {
    async fn list_tombstones(&mut self, scope: &Scope) -> Result<Vec<Tombstone>, StorageError>;

    async fn create_tombstone(
        &mut self,
        scope: &Scope,
        input: &TombstoneInput,
    ) -> Result<String, StorageError>;

    async fn update_tombstone(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &TombstoneInput,
    ) -> Result<(), StorageError>;

    async fn delete_tombstone(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait BundleReferenceRepository: Send + Sync {
    /// IDs of the bundles an API/event currently belongs to.
    async fn bundle_ids_for_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<Vec<String>, StorageError>;
}

// ==================== Specifications ====================

#[async_trait]
pub trait SpecificationRepository: Send + Sync {
    /// Creates a specification whose content is fetched later, returning its ID
    /// and the pending fetch request.
    async fn create_specification_with_fetch_request(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
        definition: &ResourceDefinition,
    ) -> Result<(String, FetchRequest), StorageError>;

    async fn delete_specifications_by_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<(), StorageError>;

    async fn list_specification_ids_by_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<Vec<String>, StorageError>;

    async fn list_fetch_requests_by_specification_ids(
        &mut self,
        spec_ids: &[String],
    ) -> Result<Vec<FetchRequest>, StorageError>;

    async fn get_specification(&mut self, id: &str) -> Result<Specification, StorageError>;

    async fn update_specification(&mut self, spec: &Specification) -> Result<(), StorageError>;

    async fn update_fetch_request(&mut self, request: &FetchRequest) -> Result<(), StorageError>;
}

// ==================== Applications ====================

#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Lists one page of all applications across tenants.
    async fn list_applications_page(
        &mut self,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ApplicationPage, StorageError>;

    /// Loads an application and holds its row lock until the transaction ends.
    async fn lock_application(&mut self, id: &str) -> Result<Application, StorageError>;

    async fn list_applications_by_template(
        &mut self,
        template_id: &str,
    ) -> Result<Vec<Application>, StorageError>;

    async fn get_application_template(
        &mut self,
        id: &str,
    ) -> Result<ApplicationTemplate, StorageError>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// The lowest tenant in the ownership hierarchy of an application.
    async fn lowest_owner_for_application(&mut self, app_id: &str) -> Result<String, StorageError>;
}

#[async_trait]
pub trait LabelRepository: Send + Sync {
    /// Values of the `applicationType` label keyed by application ID.
    async fn application_types(
        &mut self,
        app_ids: &[String],
    ) -> Result<HashMap<String, String>, StorageError>;
}

#[async_trait]
pub trait WebhookRepository: Send + Sync {
    /// Webhooks of an application, locked for the rest of the transaction.
    async fn list_webhooks_for_application_for_update(
        &mut self,
        app_id: &str,
    ) -> Result<Vec<Webhook>, StorageError>;

    async fn list_webhooks_for_template(
        &mut self,
        template_id: &str,
    ) -> Result<Vec<Webhook>, StorageError>;

    async fn list_webhooks_by_type(
        &mut self,
        webhook_type: &WebhookType,
    ) -> Result<Vec<Webhook>, StorageError>;
}

#[async_trait]
pub trait OperationRepository: Send + Sync {
    async fn list_operations(
        &mut self,
        op_type: OperationType,
    ) -> Result<Vec<Operation>, StorageError>;

    async fn create_operation(
        &mut self,
        op_type: OperationType,
        data: serde_json::Value,
    ) -> Result<String, StorageError>;

    async fn delete_operation(&mut self, id: &str) -> Result<(), StorageError>;

    /// Moves one scheduled operation of `op_type` to in progress and returns
    /// it; `None` when nothing is scheduled. Concurrent callers never claim
    /// the same operation.
    async fn claim_operation(
        &mut self,
        op_type: OperationType,
    ) -> Result<Option<Operation>, StorageError>;

    /// Sets the status of an operation; `error` replaces the stored error.
    async fn update_operation_status(
        &mut self,
        id: &str,
        status: OperationStatus,
        error: Option<&str>,
    ) -> Result<(), StorageError>;
}

// ==================== Transactions ====================

/// A transaction over the whole catalog.
///
/// Dropping a transaction without calling [`CatalogTransaction::commit`] rolls
/// it back and releases any row locks it holds.
#[async_trait]
pub trait CatalogTransaction:
    VendorRepository
    + ProductRepository
    + PackageRepository
    + BundleRepository
    + ApiRepository
    + EventRepository
    + TombstoneRepository
    + BundleReferenceRepository
    + SpecificationRepository
    + ApplicationRepository
    + TenantRepository
    + LabelRepository
    + WebhookRepository
    + OperationRepository
{
    /// Scopes subsequent tenant-aware calls to `tenant`.
    fn set_tenant(&mut self, tenant: &str);

    fn tenant(&self) -> Option<&str>;

    /// Commits all operations in this transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if the commit fails.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    /// Rolls back all operations in this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}

/// Entry point to a catalog backend.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Begins a new transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::TransactionError` if a transaction cannot be started.
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

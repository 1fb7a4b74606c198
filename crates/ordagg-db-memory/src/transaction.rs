//! Implementation of the catalog repositories for [`InMemoryTransaction`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;

use ordagg_core::{
    Api, ApiInput, Application, ApplicationPage, ApplicationTemplate, Bundle, BundleInput,
    BundleReference, DefinitionKind, Event, EventInput, FetchRequest, FetchRequestStatus,
    Operation, OperationStatus, OperationType, OrdIdentified, Package, PackageInput, PageInfo,
    Product, ProductInput, ResourceDefinition, Specification, Tombstone, TombstoneInput, Vendor,
    VendorInput, Webhook, WebhookOwner, WebhookType, generate_id,
};
use ordagg_storage::{
    ApiRepository, ApplicationRepository, BundleReferenceDelta, BundleReferenceRepository,
    BundleRepository, CatalogTransaction, DefinitionWrite, EventRepository, LabelRepository,
    OperationRepository, PackageRepository, ProductRepository, Scope, SpecificationRepository,
    StorageError, TargetUrlPerBundle, TenantRepository, TombstoneRepository, VendorRepository,
    WebhookRepository,
};

use crate::state::{CatalogState, Row};
use crate::stats::Mutation;
use crate::store::{FailPoint, Shared};

type Undo = Box<dyn FnOnce(&mut CatalogState) + Send + Sync>;

/// Rows owned by an application, or by nobody for global rows.
trait Scoped: Row + OrdIdentified {
    fn owner(&self) -> Option<&str>;

    fn in_scope(&self, scope: &Scope) -> bool {
        self.owner() == scope.app_id()
    }
}

macro_rules! scoped {
    ($($ty:ty),*) => {
        $(impl Scoped for $ty {
            fn owner(&self) -> Option<&str> {
                self.app_id.as_deref()
            }
        })*
    };
}

scoped!(Vendor, Product, Package, Bundle, Api, Event, Tombstone);

/// A transaction over an [`InMemoryStore`](crate::InMemoryStore).
///
/// Writes become visible to other transactions immediately. Each write pushes
/// its inverse onto an undo log that is replayed in reverse when the
/// transaction is rolled back or dropped uncommitted.
pub struct InMemoryTransaction {
    shared: Arc<Shared>,
    undo: Vec<Undo>,
    guards: Vec<OwnedMutexGuard<()>>,
    locked: HashSet<String>,
    tenant: Option<String>,
    finished: bool,
}

impl InMemoryTransaction {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            undo: Vec::new(),
            guards: Vec::new(),
            locked: HashSet::new(),
            tenant: None,
            finished: false,
        }
    }

    /// Number of application row locks held.
    pub fn held_locks(&self) -> usize {
        self.guards.len()
    }

    fn read<R>(&self, f: impl FnOnce(&CatalogState) -> R) -> R {
        f(&self.shared.state.lock())
    }

    fn record<T: Row>(&self, op: Mutation) {
        self.shared.stats.record(T::TABLE, op);
    }

    fn put<T: Row>(&mut self, id: &str, row: T) {
        let previous = T::table_mut(&mut self.shared.state.lock()).insert(id.to_string(), row);
        let id = id.to_string();
        self.undo.push(Box::new(move |state| {
            let table = T::table_mut(state);
            match previous {
                Some(previous) => {
                    table.insert(id, previous);
                }
                None => {
                    table.remove(&id);
                }
            }
        }));
    }

    fn take<T: Row>(&mut self, id: &str) -> Option<T> {
        let removed = T::table_mut(&mut self.shared.state.lock()).remove(id);
        if let Some(row) = removed.clone() {
            let id = id.to_string();
            self.undo.push(Box::new(move |state| {
                T::table_mut(state).insert(id, row);
            }));
        }
        removed
    }

    /// Takes the row lock of `id` unless this transaction already holds it.
    async fn lock_row(&mut self, id: &str) {
        if self.locked.insert(id.to_string()) {
            let lock = self.shared.row_lock(id);
            self.guards.push(lock.lock_owned().await);
        }
    }

    fn undo_all(&mut self) {
        let mut state = self.shared.state.lock();
        while let Some(undo) = self.undo.pop() {
            undo(&mut state);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.undo.clear();
        self.guards.clear();
        self.locked.clear();
    }

    // ==================== Scope helpers ====================

    /// Application-scoped rows may only be touched under the owning tenant.
    fn ensure_tenant(&self, scope: &Scope) -> Result<(), StorageError> {
        let Some(app_id) = scope.app_id() else {
            return Ok(());
        };
        let owner = self.read(|state| state.tenants.get(app_id).cloned());
        match (self.tenant.as_deref(), owner.as_deref()) {
            (None, _) => Err(StorageError::invalid_input(
                "tenant must be set before accessing application resources",
            )),
            (Some(tenant), Some(owner)) if tenant == owner => Ok(()),
            _ => Err(StorageError::not_found("application", app_id)),
        }
    }

    fn scoped_rows<T: Scoped>(&self, scope: &Scope) -> Vec<T> {
        self.read(|state| {
            T::table(state)
                .values()
                .filter(|row| row.in_scope(scope))
                .cloned()
                .collect()
        })
    }

    fn scoped_row<T: Scoped>(&self, scope: &Scope, id: &str) -> Result<T, StorageError> {
        self.read(|state| T::table(state).get(id).filter(|row| row.in_scope(scope)).cloned())
            .ok_or_else(|| StorageError::not_found(T::TABLE, id))
    }

    fn list_rows<T: Scoped>(&self, scope: &Scope) -> Result<Vec<T>, StorageError> {
        self.record::<T>(Mutation::List);
        self.ensure_tenant(scope)?;
        Ok(self.scoped_rows(scope))
    }

    fn create_row<T: Scoped>(
        &mut self,
        scope: &Scope,
        ord_id: &str,
        build: impl FnOnce(String, Option<String>) -> T,
    ) -> Result<String, StorageError> {
        self.record::<T>(Mutation::Create);
        self.ensure_tenant(scope)?;
        let duplicate = self.read(|state| {
            T::table(state)
                .values()
                .any(|row| row.in_scope(scope) && row.ord_id() == ord_id)
        });
        if duplicate {
            return Err(StorageError::already_exists(T::TABLE, ord_id));
        }

        let id = generate_id();
        let row = build(id.clone(), scope.app_id().map(str::to_string));
        self.put(&id, row);
        Ok(id)
    }

    fn update_row<T: Scoped>(
        &mut self,
        scope: &Scope,
        id: &str,
        build: impl FnOnce(String, Option<String>) -> T,
    ) -> Result<(), StorageError> {
        self.record::<T>(Mutation::Update);
        self.ensure_tenant(scope)?;
        let existing: T = self.scoped_row(scope, id)?;
        let row = build(id.to_string(), existing.owner().map(str::to_string));
        self.put(id, row);
        Ok(())
    }

    fn delete_row<T: Scoped>(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.record::<T>(Mutation::Delete);
        self.ensure_tenant(scope)?;
        self.scoped_row::<T>(scope, id)?;
        self.take::<T>(id);
        Ok(())
    }

    // ==================== Definition children ====================

    fn attach_bundles(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
        bundles: &TargetUrlPerBundle,
    ) -> Result<(), StorageError> {
        for (bundle_id, target_url) in bundles {
            if !self.read(|state| state.bundles.contains_key(bundle_id)) {
                return Err(StorageError::not_found(Bundle::TABLE, bundle_id));
            }
            let id = generate_id();
            let reference = BundleReference {
                id: id.clone(),
                bundle_id: bundle_id.clone(),
                object_kind: kind,
                object_id: object_id.to_string(),
                default_target_url: target_url.clone(),
            };
            self.put(&id, reference);
        }
        Ok(())
    }

    fn apply_bundle_delta(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
        delta: &BundleReferenceDelta,
    ) -> Result<(), StorageError> {
        let current: Vec<BundleReference> = self.read(|state| {
            state
                .bundle_references
                .values()
                .filter(|r| r.object_kind == kind && r.object_id == object_id)
                .cloned()
                .collect()
        });

        for reference in current {
            if delta.to_delete.contains(&reference.bundle_id) {
                self.take::<BundleReference>(&reference.id);
                continue;
            }
            if delta.to_create.contains_key(&reference.bundle_id) {
                continue;
            }
            if let Some(target_url) = delta.all.get(&reference.bundle_id) {
                if &reference.default_target_url != target_url {
                    let id = reference.id.clone();
                    let updated = BundleReference {
                        default_target_url: target_url.clone(),
                        ..reference
                    };
                    self.put(&id, updated);
                }
            }
        }

        self.attach_bundles(kind, object_id, &delta.to_create)
    }

    /// Removes bundle references, specifications and fetch requests of a definition.
    fn drop_definition_children(&mut self, kind: DefinitionKind, object_id: &str) {
        let reference_ids: Vec<String> = self.read(|state| {
            state
                .bundle_references
                .values()
                .filter(|r| r.object_kind == kind && r.object_id == object_id)
                .map(|r| r.id.clone())
                .collect()
        });
        for id in reference_ids {
            self.take::<BundleReference>(&id);
        }
        self.drop_specifications(kind, object_id);
    }

    fn drop_specifications(&mut self, kind: DefinitionKind, object_id: &str) {
        let spec_ids: BTreeSet<String> = self.read(|state| {
            state
                .specifications
                .values()
                .filter(|s| s.object_kind == kind && s.object_id == object_id)
                .map(|s| s.id.clone())
                .collect()
        });
        let request_ids: Vec<String> = self.read(|state| {
            state
                .fetch_requests
                .values()
                .filter(|fr| spec_ids.contains(&fr.spec_id))
                .map(|fr| fr.id.clone())
                .collect()
        });
        for id in request_ids {
            self.take::<FetchRequest>(&id);
        }
        for id in spec_ids {
            self.take::<Specification>(&id);
        }
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

// ==================== Catalog resources ====================

#[async_trait]
impl VendorRepository for InMemoryTransaction {
    async fn list_vendors(&mut self, scope: &Scope) -> Result<Vec<Vendor>, StorageError> {
        if scope.is_global() && self.shared.should_fail(&FailPoint::ListGlobalVendors) {
            self.record::<Vendor>(Mutation::List);
            return Err(StorageError::connection_error("global vendors unavailable"));
        }
        self.list_rows(scope)
    }

    async fn create_vendor(
        &mut self,
        scope: &Scope,
        input: &VendorInput,
    ) -> Result<String, StorageError> {
        self.create_row(scope, &input.ord_id, |id, app_id| {
            Vendor::from_input(id, app_id, input)
        })
    }

    async fn update_vendor(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &VendorInput,
    ) -> Result<(), StorageError> {
        self.update_row(scope, id, |id, app_id| Vendor::from_input(id, app_id, input))
    }

    async fn delete_vendor(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Vendor>(scope, id)
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn list_products(&mut self, scope: &Scope) -> Result<Vec<Product>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_product(
        &mut self,
        scope: &Scope,
        input: &ProductInput,
    ) -> Result<String, StorageError> {
        self.create_row(scope, &input.ord_id, |id, app_id| {
            Product::from_input(id, app_id, input)
        })
    }

    async fn update_product(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &ProductInput,
    ) -> Result<(), StorageError> {
        self.update_row(scope, id, |id, app_id| Product::from_input(id, app_id, input))
    }

    async fn delete_product(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Product>(scope, id)
    }
}

#[async_trait]
impl PackageRepository for InMemoryTransaction {
    async fn list_packages(&mut self, scope: &Scope) -> Result<Vec<Package>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_package(
        &mut self,
        scope: &Scope,
        input: &PackageInput,
        resource_hash: u64,
    ) -> Result<String, StorageError> {
        self.create_row(scope, &input.ord_id, |id, app_id| {
            Package::from_input(id, app_id, input, resource_hash)
        })
    }

    async fn update_package(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &PackageInput,
        resource_hash: u64,
    ) -> Result<(), StorageError> {
        self.update_row(scope, id, |id, app_id| {
            Package::from_input(id, app_id, input, resource_hash)
        })
    }

    async fn delete_package(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Package>(scope, id)?;

        let package_id = Some(id.to_string());
        let (api_ids, event_ids): (Vec<String>, Vec<String>) = self.read(|state| {
            (
                state
                    .apis
                    .values()
                    .filter(|api| api.package_id == package_id)
                    .map(|api| api.id.clone())
                    .collect(),
                state
                    .events
                    .values()
                    .filter(|event| event.package_id == package_id)
                    .map(|event| event.id.clone())
                    .collect(),
            )
        });
        for api_id in api_ids {
            self.take::<Api>(&api_id);
            self.drop_definition_children(DefinitionKind::Api, &api_id);
        }
        for event_id in event_ids {
            self.take::<Event>(&event_id);
            self.drop_definition_children(DefinitionKind::Event, &event_id);
        }
        Ok(())
    }
}

#[async_trait]
impl BundleRepository for InMemoryTransaction {
    async fn list_bundles(&mut self, scope: &Scope) -> Result<Vec<Bundle>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_bundle(
        &mut self,
        scope: &Scope,
        input: &BundleInput,
        resource_hash: u64,
    ) -> Result<String, StorageError> {
        self.create_row(scope, &input.ord_id, |id, app_id| {
            Bundle::from_input(id, app_id, input, resource_hash)
        })
    }

    async fn update_bundle(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &BundleInput,
        resource_hash: u64,
    ) -> Result<(), StorageError> {
        self.update_row(scope, id, |id, app_id| {
            Bundle::from_input(id, app_id, input, resource_hash)
        })
    }

    async fn delete_bundle(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Bundle>(scope, id)?;

        let reference_ids: Vec<String> = self.read(|state| {
            state
                .bundle_references
                .values()
                .filter(|r| r.bundle_id == id)
                .map(|r| r.id.clone())
                .collect()
        });
        for reference_id in reference_ids {
            self.take::<BundleReference>(&reference_id);
        }
        Ok(())
    }
}

#[async_trait]
impl ApiRepository for InMemoryTransaction {
    async fn list_apis(&mut self, scope: &Scope) -> Result<Vec<Api>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_api(
        &mut self,
        scope: &Scope,
        write: DefinitionWrite<'_, ApiInput>,
        bundles: &TargetUrlPerBundle,
    ) -> Result<String, StorageError> {
        let DefinitionWrite {
            input,
            package_id,
            default_bundle_id,
            resource_hash,
        } = write;
        let id = self.create_row(scope, &input.ord_id, |id, app_id| {
            Api::from_input(id, app_id, input, package_id, default_bundle_id, resource_hash)
        })?;
        self.attach_bundles(DefinitionKind::Api, &id, bundles)?;
        Ok(id)
    }

    async fn update_api(
        &mut self,
        scope: &Scope,
        id: &str,
        write: DefinitionWrite<'_, ApiInput>,
        bundles: &BundleReferenceDelta,
    ) -> Result<(), StorageError> {
        let DefinitionWrite {
            input,
            package_id,
            default_bundle_id,
            resource_hash,
        } = write;
        self.update_row(scope, id, |id, app_id| {
            Api::from_input(id, app_id, input, package_id, default_bundle_id, resource_hash)
        })?;
        self.apply_bundle_delta(DefinitionKind::Api, id, bundles)
    }

    async fn delete_api(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Api>(scope, id)?;
        self.drop_definition_children(DefinitionKind::Api, id);
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryTransaction {
    async fn list_events(&mut self, scope: &Scope) -> Result<Vec<Event>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_event(
        &mut self,
        scope: &Scope,
        write: DefinitionWrite<'_, EventInput>,
        bundles: &TargetUrlPerBundle,
    ) -> Result<String, StorageError> {
        let DefinitionWrite {
            input,
            package_id,
            default_bundle_id,
            resource_hash,
        } = write;
        let id = self.create_row(scope, &input.ord_id, |id, app_id| {
            Event::from_input(id, app_id, input, package_id, default_bundle_id, resource_hash)
        })?;
        self.attach_bundles(DefinitionKind::Event, &id, bundles)?;
        Ok(id)
    }

    async fn update_event(
        &mut self,
        scope: &Scope,
        id: &str,
        write: DefinitionWrite<'_, EventInput>,
        bundles: &BundleReferenceDelta,
    ) -> Result<(), StorageError> {
        let DefinitionWrite {
            input,
            package_id,
            default_bundle_id,
            resource_hash,
        } = write;
        self.update_row(scope, id, |id, app_id| {
            Event::from_input(id, app_id, input, package_id, default_bundle_id, resource_hash)
        })?;
        self.apply_bundle_delta(DefinitionKind::Event, id, bundles)
    }

    async fn delete_event(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Event>(scope, id)?;
        self.drop_definition_children(DefinitionKind::Event, id);
        Ok(())
    }
}

#[async_trait]
impl TombstoneRepository for InMemoryTransaction {
    async fn list_tombstones(&mut self, scope: &Scope) -> Result<Vec<Tombstone>, StorageError> {
        self.list_rows(scope)
    }

    async fn create_tombstone(
        &mut self,
        scope: &Scope,
        input: &TombstoneInput,
    ) -> Result<String, StorageError> {
        self.create_row(scope, &input.ord_id, |id, app_id| {
            Tombstone::from_input(id, app_id, input)
        })
    }

    async fn update_tombstone(
        &mut self,
        scope: &Scope,
        id: &str,
        input: &TombstoneInput,
    ) -> Result<(), StorageError> {
        self.update_row(scope, id, |id, app_id| Tombstone::from_input(id, app_id, input))
    }

    async fn delete_tombstone(&mut self, scope: &Scope, id: &str) -> Result<(), StorageError> {
        self.delete_row::<Tombstone>(scope, id)
    }
}

#[async_trait]
impl BundleReferenceRepository for InMemoryTransaction {
    async fn bundle_ids_for_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.record::<BundleReference>(Mutation::List);
        Ok(self.read(|state| {
            state
                .bundle_references
                .values()
                .filter(|r| r.object_kind == kind && r.object_id == object_id)
                .map(|r| r.bundle_id.clone())
                .collect()
        }))
    }
}

// ==================== Specifications ====================

#[async_trait]
impl SpecificationRepository for InMemoryTransaction {
    async fn create_specification_with_fetch_request(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
        definition: &ResourceDefinition,
    ) -> Result<(String, FetchRequest), StorageError> {
        self.record::<Specification>(Mutation::Create);
        self.record::<FetchRequest>(Mutation::Create);

        let spec_id = generate_id();
        let spec =
            Specification::from_definition(spec_id.clone(), kind, object_id.to_string(), definition);
        self.put(&spec_id, spec);

        let request = FetchRequest {
            id: generate_id(),
            spec_id: spec_id.clone(),
            url: definition.url.clone(),
            status: FetchRequestStatus::initial(),
        };
        self.put(&request.id, request.clone());

        Ok((spec_id, request))
    }

    async fn delete_specifications_by_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<(), StorageError> {
        self.record::<Specification>(Mutation::Delete);
        self.drop_specifications(kind, object_id);
        Ok(())
    }

    async fn list_specification_ids_by_object(
        &mut self,
        kind: DefinitionKind,
        object_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        self.record::<Specification>(Mutation::List);
        Ok(self.read(|state| {
            state
                .specifications
                .values()
                .filter(|s| s.object_kind == kind && s.object_id == object_id)
                .map(|s| s.id.clone())
                .collect()
        }))
    }

    async fn list_fetch_requests_by_specification_ids(
        &mut self,
        spec_ids: &[String],
    ) -> Result<Vec<FetchRequest>, StorageError> {
        self.record::<FetchRequest>(Mutation::List);
        Ok(self.read(|state| {
            state
                .fetch_requests
                .values()
                .filter(|fr| spec_ids.contains(&fr.spec_id))
                .cloned()
                .collect()
        }))
    }

    async fn get_specification(&mut self, id: &str) -> Result<Specification, StorageError> {
        self.read(|state| state.specifications.get(id).cloned())
            .ok_or_else(|| StorageError::not_found(Specification::TABLE, id))
    }

    async fn update_specification(&mut self, spec: &Specification) -> Result<(), StorageError> {
        self.record::<Specification>(Mutation::Update);
        if self.shared.should_fail(&FailPoint::UpdateSpecification) {
            return Err(StorageError::internal("specification update failed"));
        }
        if !self.read(|state| state.specifications.contains_key(&spec.id)) {
            return Err(StorageError::not_found(Specification::TABLE, &spec.id));
        }
        self.put(&spec.id, spec.clone());
        Ok(())
    }

    async fn update_fetch_request(&mut self, request: &FetchRequest) -> Result<(), StorageError> {
        self.record::<FetchRequest>(Mutation::Update);
        if !self.read(|state| state.fetch_requests.contains_key(&request.id)) {
            return Err(StorageError::not_found(FetchRequest::TABLE, &request.id));
        }
        self.put(&request.id, request.clone());
        Ok(())
    }
}

// ==================== Applications ====================

#[async_trait]
impl ApplicationRepository for InMemoryTransaction {
    async fn list_applications_page(
        &mut self,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<ApplicationPage, StorageError> {
        let call = self.shared.next_page_call();
        if self.shared.should_fail(&FailPoint::ApplicationPage(call)) {
            return Err(StorageError::connection_error(format!(
                "listing application page {call} failed"
            )));
        }
        if page_size == 0 {
            return Err(StorageError::invalid_input("page size must be positive"));
        }

        let (data, remaining, total_count) = self.read(|state| {
            let after: Vec<&Application> = state
                .applications
                .values()
                .filter(|app| cursor.is_none_or(|cursor| app.id.as_str() > cursor))
                .collect();
            let data: Vec<Application> = after.iter().take(page_size).map(|app| (*app).clone()).collect();
            (data, after.len(), state.applications.len())
        });

        let end_cursor = data.last().map(|app| app.id.clone()).unwrap_or_default();
        Ok(ApplicationPage {
            page_info: PageInfo {
                start_cursor: cursor.unwrap_or_default().to_string(),
                end_cursor,
                has_next_page: remaining > data.len(),
            },
            data,
            total_count,
        })
    }

    async fn lock_application(&mut self, id: &str) -> Result<Application, StorageError> {
        if self
            .shared
            .should_fail(&FailPoint::LockApplication(id.to_string()))
        {
            return Err(StorageError::lock_unavailable("application", id));
        }

        let app = self
            .read(|state| state.applications.get(id).cloned())
            .ok_or_else(|| StorageError::not_found("application", id))?;

        self.lock_row(id).await;
        Ok(app)
    }

    async fn list_applications_by_template(
        &mut self,
        template_id: &str,
    ) -> Result<Vec<Application>, StorageError> {
        Ok(self.read(|state| {
            state
                .applications
                .values()
                .filter(|app| app.application_template_id.as_deref() == Some(template_id))
                .cloned()
                .collect()
        }))
    }

    async fn get_application_template(
        &mut self,
        id: &str,
    ) -> Result<ApplicationTemplate, StorageError> {
        self.read(|state| state.application_templates.get(id).cloned())
            .ok_or_else(|| StorageError::not_found("applicationTemplate", id))
    }
}

#[async_trait]
impl TenantRepository for InMemoryTransaction {
    async fn lowest_owner_for_application(&mut self, app_id: &str) -> Result<String, StorageError> {
        self.read(|state| state.tenants.get(app_id).cloned())
            .ok_or_else(|| StorageError::not_found("tenant", app_id))
    }
}

#[async_trait]
impl LabelRepository for InMemoryTransaction {
    async fn application_types(
        &mut self,
        app_ids: &[String],
    ) -> Result<HashMap<String, String>, StorageError> {
        Ok(self.read(|state| {
            app_ids
                .iter()
                .filter_map(|id| {
                    state
                        .application_types
                        .get(id)
                        .map(|value| (id.clone(), value.clone()))
                })
                .collect()
        }))
    }
}

#[async_trait]
impl WebhookRepository for InMemoryTransaction {
    async fn list_webhooks_for_application_for_update(
        &mut self,
        app_id: &str,
    ) -> Result<Vec<Webhook>, StorageError> {
        // webhooks are locked through their owning application row
        self.lock_row(app_id).await;
        let owner = WebhookOwner::Application(app_id.to_string());
        Ok(self.read(|state| {
            state
                .webhooks
                .values()
                .filter(|webhook| webhook.owner == owner)
                .cloned()
                .collect()
        }))
    }

    async fn list_webhooks_for_template(
        &mut self,
        template_id: &str,
    ) -> Result<Vec<Webhook>, StorageError> {
        let owner = WebhookOwner::ApplicationTemplate(template_id.to_string());
        Ok(self.read(|state| {
            state
                .webhooks
                .values()
                .filter(|webhook| webhook.owner == owner)
                .cloned()
                .collect()
        }))
    }

    async fn list_webhooks_by_type(
        &mut self,
        webhook_type: &WebhookType,
    ) -> Result<Vec<Webhook>, StorageError> {
        Ok(self.read(|state| {
            state
                .webhooks
                .values()
                .filter(|webhook| &webhook.webhook_type == webhook_type)
                .cloned()
                .collect()
        }))
    }
}

#[async_trait]
impl OperationRepository for InMemoryTransaction {
    async fn list_operations(
        &mut self,
        op_type: OperationType,
    ) -> Result<Vec<Operation>, StorageError> {
        self.record::<Operation>(Mutation::List);
        Ok(self.read(|state| {
            state
                .operations
                .values()
                .filter(|op| op.op_type == op_type)
                .cloned()
                .collect()
        }))
    }

    async fn create_operation(
        &mut self,
        op_type: OperationType,
        data: serde_json::Value,
    ) -> Result<String, StorageError> {
        self.record::<Operation>(Mutation::Create);
        let id = generate_id();
        self.put(
            &id,
            Operation {
                id: id.clone(),
                op_type,
                status: OperationStatus::Scheduled,
                data,
                error: None,
            },
        );
        Ok(id)
    }

    async fn delete_operation(&mut self, id: &str) -> Result<(), StorageError> {
        self.record::<Operation>(Mutation::Delete);
        self.take::<Operation>(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(Operation::TABLE, id))
    }

    async fn claim_operation(
        &mut self,
        op_type: OperationType,
    ) -> Result<Option<Operation>, StorageError> {
        self.record::<Operation>(Mutation::Update);
        // find and mark under one lock so concurrent claimers see the change
        let claimed = {
            let mut state = self.shared.state.lock();
            state
                .operations
                .values_mut()
                .find(|op| op.op_type == op_type && op.status == OperationStatus::Scheduled)
                .map(|op| {
                    let previous = op.clone();
                    op.status = OperationStatus::InProgress;
                    (previous, op.clone())
                })
        };
        let Some((previous, claimed)) = claimed else {
            return Ok(None);
        };

        let id = claimed.id.clone();
        self.undo.push(Box::new(move |state| {
            state.operations.insert(id, previous);
        }));
        Ok(Some(claimed))
    }

    async fn update_operation_status(
        &mut self,
        id: &str,
        status: OperationStatus,
        error: Option<&str>,
    ) -> Result<(), StorageError> {
        self.record::<Operation>(Mutation::Update);
        let operation = self
            .read(|state| state.operations.get(id).cloned())
            .ok_or_else(|| StorageError::not_found(Operation::TABLE, id))?;
        self.put(
            id,
            Operation {
                status,
                error: error.map(str::to_string),
                ..operation
            },
        );
        Ok(())
    }
}

// ==================== Transaction ====================

#[async_trait]
impl CatalogTransaction for InMemoryTransaction {
    fn set_tenant(&mut self, tenant: &str) {
        self.tenant = Some(tenant.to_string());
    }

    fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::transaction_error("transaction already finished"));
        }
        tracing::trace!(writes = self.undo.len(), locks = self.guards.len(), "committing");
        self.finish();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<(), StorageError> {
        if self.finished {
            return Err(StorageError::transaction_error("transaction already finished"));
        }
        tracing::trace!(writes = self.undo.len(), "rolling back");
        self.undo_all();
        self.finish();
        Ok(())
    }
}

//! APIs and events: bundle memberships, content hashes and specifications.

use std::collections::HashMap;
use std::marker::PhantomData;

use async_trait::async_trait;

use ordagg_core::{
    Api, ApiInput, Bundle, ConsumptionBundleReference, DefinitionKind, Event, EventInput,
    FetchRequest, OrdIdentified, Package, ResourceDefinition, ResourceKind,
};
use ordagg_storage::prelude::*;

use super::CatalogKind;
use crate::error::AggregationError;
use crate::hash::ResourceHashes;
use crate::specs;

/// Fields shared by API and event inputs.
pub trait DefinitionInput: OrdIdentified + Send + Sync {
    const KIND: DefinitionKind;

    fn version(&self) -> &str;
    fn part_of_package(&self) -> Option<&str>;
    fn consumption_bundles(&self) -> &[ConsumptionBundleReference];
    fn default_consumption_bundle(&self) -> Option<&str>;
    fn entry_points(&self) -> &[String];
    fn resource_definitions(&self) -> &[ResourceDefinition];
}

impl DefinitionInput for ApiInput {
    const KIND: DefinitionKind = DefinitionKind::Api;

    fn version(&self) -> &str {
        &self.version
    }
    fn part_of_package(&self) -> Option<&str> {
        self.part_of_package.as_deref()
    }
    fn consumption_bundles(&self) -> &[ConsumptionBundleReference] {
        &self.part_of_consumption_bundles
    }
    fn default_consumption_bundle(&self) -> Option<&str> {
        self.default_consumption_bundle.as_deref()
    }
    fn entry_points(&self) -> &[String] {
        &self.entry_points
    }
    fn resource_definitions(&self) -> &[ResourceDefinition] {
        &self.resource_definitions
    }
}

impl DefinitionInput for EventInput {
    const KIND: DefinitionKind = DefinitionKind::Event;

    fn version(&self) -> &str {
        &self.version
    }
    fn part_of_package(&self) -> Option<&str> {
        self.part_of_package.as_deref()
    }
    fn consumption_bundles(&self) -> &[ConsumptionBundleReference] {
        &self.part_of_consumption_bundles
    }
    fn default_consumption_bundle(&self) -> Option<&str> {
        self.default_consumption_bundle.as_deref()
    }
    fn entry_points(&self) -> &[String] {
        &[]
    }
    fn resource_definitions(&self) -> &[ResourceDefinition] {
        &self.resource_definitions
    }
}

/// Reconciles APIs (`Definitions<ApiInput>`) or events (`Definitions<EventInput>`).
///
/// Packages and bundles must already be reconciled: their post-apply sets
/// resolve ORD references to internal IDs. Fetch requests created or
/// resubmitted along the way are collected for the fetch pass.
pub struct Definitions<'a, I> {
    packages: HashMap<&'a str, &'a str>,
    bundles: HashMap<&'a str, &'a str>,
    hashes: &'a ResourceHashes,
    pending: Vec<FetchRequest>,
    _input: PhantomData<fn() -> I>,
}

impl<'a, I: DefinitionInput> Definitions<'a, I> {
    pub fn new(packages: &'a [Package], bundles: &'a [Bundle], hashes: &'a ResourceHashes) -> Self {
        Self {
            packages: packages.iter().map(|p| (p.ord_id.as_str(), p.id.as_str())).collect(),
            bundles: bundles.iter().map(|b| (b.ord_id.as_str(), b.id.as_str())).collect(),
            hashes,
            pending: Vec::new(),
            _input: PhantomData,
        }
    }

    /// Fetch requests awaiting the fetch pass.
    pub fn into_pending(self) -> Vec<FetchRequest> {
        self.pending
    }

    fn hash(&self, input: &I) -> Result<u64, AggregationError> {
        self.hashes
            .get(input.ord_id())
            .copied()
            .ok_or_else(|| AggregationError::hash(input.ord_id(), "no hash computed for resource"))
    }

    fn package_id(&self, input: &I) -> Option<String> {
        input
            .part_of_package()
            .and_then(|ord_id| self.packages.get(ord_id))
            .map(|id| id.to_string())
    }

    /// Internal ID of the default bundle, `None` when absent or unresolved.
    fn default_bundle_id(&self, input: &I) -> Option<String> {
        input
            .default_consumption_bundle()
            .and_then(|ord_id| self.bundles.get(ord_id))
            .map(|id| id.to_string())
    }

    /// Bundle memberships keyed by internal bundle ID.
    ///
    /// A resource with exactly one entry point uses it as the default target
    /// URL of every bundle that does not name its own.
    fn target_urls(&self, input: &I) -> TargetUrlPerBundle {
        let single_entry_point = match input.entry_points() {
            [only] => Some(only.clone()),
            _ => None,
        };

        let mut urls = TargetUrlPerBundle::new();
        for reference in input.consumption_bundles() {
            let Some(bundle_id) = self.bundles.get(reference.bundle_ord_id.as_str()) else {
                tracing::warn!(
                    ord_id = %input.ord_id(),
                    bundle = %reference.bundle_ord_id,
                    "consumption bundle not found, skipping membership"
                );
                continue;
            };
            let target_url = reference
                .default_entry_point
                .clone()
                .or_else(|| single_entry_point.clone());
            urls.insert(bundle_id.to_string(), target_url);
        }
        urls
    }

    fn write<'i>(&self, input: &'i I) -> Result<DefinitionWrite<'i, I>, AggregationError> {
        Ok(DefinitionWrite {
            input,
            package_id: self.package_id(input),
            default_bundle_id: self.default_bundle_id(input),
            resource_hash: self.hash(input)?,
        })
    }

    async fn after_create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        object_id: &str,
        input: &I,
    ) -> Result<(), AggregationError> {
        let requests =
            specs::create_specifications(tx, I::KIND, object_id, input.resource_definitions())
                .await?;
        self.pending.extend(requests);
        Ok(())
    }

    /// Recreates specifications on a version change, otherwise resubmits the
    /// fetches that have not succeeded.
    async fn after_update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        object_id: &str,
        stored_version: &str,
        input: &I,
    ) -> Result<(), AggregationError> {
        let requests = if stored_version != input.version() {
            tracing::debug!(
                ord_id = %input.ord_id(),
                from = %stored_version,
                to = %input.version(),
                "version changed, recreating specifications"
            );
            specs::recreate_specifications(tx, I::KIND, object_id, input.resource_definitions())
                .await?
        } else {
            specs::requests_to_refetch(tx, I::KIND, object_id).await?
        };
        self.pending.extend(requests);
        Ok(())
    }
}

#[async_trait]
impl<'a> CatalogKind for Definitions<'a, ApiInput> {
    type Input = ApiInput;
    type Stored = Api;

    const KIND: ResourceKind = ResourceKind::Api;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Api>, StorageError> {
        tx.list_apis(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &ApiInput,
    ) -> Result<(), AggregationError> {
        let write = self.write(input)?;
        let bundles = self.target_urls(input);
        let id = tx.create_api(scope, write, &bundles).await?;
        self.after_create(tx, &id, input).await
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Api,
        input: &ApiInput,
    ) -> Result<(), AggregationError> {
        let write = self.write(input)?;
        let current = tx.bundle_ids_for_object(DefinitionKind::Api, &stored.id).await?;
        let delta = BundleReferenceDelta::compute(self.target_urls(input), &current);

        let unchanged = stored.resource_hash == Some(write.resource_hash)
            && delta.to_create.is_empty()
            && delta.to_delete.is_empty();
        if !unchanged {
            tx.update_api(scope, &stored.id, write, &delta).await?;
        }
        self.after_update(tx, &stored.id, &stored.version, input).await
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Api,
    ) -> Result<(), StorageError> {
        tx.delete_api(scope, &stored.id).await
    }
}

#[async_trait]
impl<'a> CatalogKind for Definitions<'a, EventInput> {
    type Input = EventInput;
    type Stored = Event;

    const KIND: ResourceKind = ResourceKind::Event;

    async fn list(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
    ) -> Result<Vec<Event>, StorageError> {
        tx.list_events(scope).await
    }

    async fn create(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        input: &EventInput,
    ) -> Result<(), AggregationError> {
        let write = self.write(input)?;
        let bundles = self.target_urls(input);
        let id = tx.create_event(scope, write, &bundles).await?;
        self.after_create(tx, &id, input).await
    }

    async fn update(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Event,
        input: &EventInput,
    ) -> Result<(), AggregationError> {
        let write = self.write(input)?;
        let current = tx
            .bundle_ids_for_object(DefinitionKind::Event, &stored.id)
            .await?;
        let delta = BundleReferenceDelta::compute(self.target_urls(input), &current);

        let unchanged = stored.resource_hash == Some(write.resource_hash)
            && delta.to_create.is_empty()
            && delta.to_delete.is_empty();
        if !unchanged {
            tx.update_event(scope, &stored.id, write, &delta).await?;
        }
        self.after_update(tx, &stored.id, &stored.version, input).await
    }

    async fn delete(
        &mut self,
        tx: &mut dyn CatalogTransaction,
        scope: &Scope,
        stored: &Event,
    ) -> Result<(), StorageError> {
        tx.delete_event(scope, &stored.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(id: &str, ord_id: &str) -> Bundle {
        Bundle {
            id: id.into(),
            app_id: Some("app-1".into()),
            ord_id: ord_id.into(),
            title: "Bundle".into(),
            description: None,
            version: None,
            resource_hash: Some(1),
        }
    }

    fn api(value: serde_json::Value) -> ApiInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn single_entry_point_becomes_default_target_url() {
        let bundles = vec![bundle("b-1", "ns:consumptionBundle:a:v1"), bundle("b-2", "ns:consumptionBundle:b:v1")];
        let hashes = ResourceHashes::new();
        let defs = Definitions::<ApiInput>::new(&[], &bundles, &hashes);

        let input = api(json!({
            "ordId": "ns:apiResource:orders:v1", "title": "Orders", "version": "1.0.0",
            "entryPoints": ["https://orders.local/api"],
            "partOfConsumptionBundles": [
                { "ordId": "ns:consumptionBundle:a:v1" },
                { "ordId": "ns:consumptionBundle:b:v1", "defaultEntryPoint": "https://orders.local/b" },
                { "ordId": "ns:consumptionBundle:missing:v1" }
            ],
            "defaultConsumptionBundle": "ns:consumptionBundle:b:v1"
        }));

        let urls = defs.target_urls(&input);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls["b-1"].as_deref(), Some("https://orders.local/api"));
        assert_eq!(urls["b-2"].as_deref(), Some("https://orders.local/b"));
        assert_eq!(defs.default_bundle_id(&input).as_deref(), Some("b-2"));
    }

    #[test]
    fn several_entry_points_leave_target_url_unset() {
        let bundles = vec![bundle("b-1", "ns:consumptionBundle:a:v1")];
        let hashes = ResourceHashes::new();
        let defs = Definitions::<ApiInput>::new(&[], &bundles, &hashes);

        let input = api(json!({
            "ordId": "ns:apiResource:orders:v1", "title": "Orders", "version": "1.0.0",
            "entryPoints": ["https://a", "https://b"],
            "partOfConsumptionBundles": [{ "ordId": "ns:consumptionBundle:a:v1" }],
            "defaultConsumptionBundle": "ns:consumptionBundle:unknown:v1"
        }));

        assert_eq!(defs.target_urls(&input)["b-1"], None);
        assert_eq!(defs.default_bundle_id(&input), None);
        assert!(defs.write(&input).is_err());
    }
}

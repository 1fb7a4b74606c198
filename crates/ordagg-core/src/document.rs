//! Serde model of ORD provider documents.
//!
//! Documents are ephemeral: they are fetched, hashed, validated, sanitized and
//! reconciled within one application's processing and never persisted as-is.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Labels = BTreeMap<String, Vec<String>>;

/// Anything keyed by an ORD ID.
pub trait OrdIdentified {
    fn ord_id(&self) -> &str;
}

/// `/.well-known/open-resource-discovery` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellKnownConfig {
    #[serde(rename = "$schema", default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(rename = "openResourceDiscoveryV1", default)]
    pub open_resource_discovery_v1: OpenResourceDiscoveryV1,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenResourceDiscoveryV1 {
    #[serde(default)]
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    pub url: String,
    #[serde(default)]
    pub system_instance_aware: bool,
    #[serde(default)]
    pub access_strategies: Vec<AccessStrategy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessStrategy {
    #[serde(rename = "type")]
    pub strategy_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribedSystemInstance {
    #[serde(default)]
    pub base_url: Option<String>,
}

pub type Documents = Vec<Document>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "$schema", default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub open_resource_discovery: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub described_system_instance: Option<DescribedSystemInstance>,
    #[serde(default)]
    pub vendors: Vec<VendorInput>,
    #[serde(default)]
    pub products: Vec<ProductInput>,
    #[serde(default)]
    pub packages: Vec<PackageInput>,
    #[serde(default)]
    pub consumption_bundles: Vec<BundleInput>,
    #[serde(default)]
    pub api_resources: Vec<ApiInput>,
    #[serde(default)]
    pub event_resources: Vec<EventInput>,
    #[serde(default)]
    pub tombstones: Vec<TombstoneInput>,
}

impl Document {
    /// True when the document declares nothing besides vendors and products.
    pub fn only_vendors_and_products(&self) -> bool {
        self.packages.is_empty()
            && self.consumption_bundles.is_empty()
            && self.api_resources.is_empty()
            && self.event_resources.is_empty()
            && self.tombstones.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    pub vendor: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub policy_level: Option<String>,
    #[serde(default)]
    pub part_of_products: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub labels: Labels,
}

/// Membership of an API or event in a consumption bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionBundleReference {
    #[serde(rename = "ordId")]
    pub bundle_ord_id: String,
    #[serde(default)]
    pub default_entry_point: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    #[serde(rename = "type")]
    pub definition_type: String,
    pub media_type: String,
    pub url: String,
    #[serde(default)]
    pub access_strategies: Vec<AccessStrategy>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub part_of_package: Option<String>,
    #[serde(default)]
    pub part_of_products: Vec<String>,
    #[serde(default)]
    pub part_of_consumption_bundles: Vec<ConsumptionBundleReference>,
    #[serde(default)]
    pub default_consumption_bundle: Option<String>,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub api_protocol: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub release_status: Option<String>,
    #[serde(default)]
    pub resource_definitions: Vec<ResourceDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventInput {
    pub ord_id: String,
    pub title: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    #[serde(default)]
    pub part_of_package: Option<String>,
    #[serde(default)]
    pub part_of_products: Vec<String>,
    #[serde(default)]
    pub part_of_consumption_bundles: Vec<ConsumptionBundleReference>,
    #[serde(default)]
    pub default_consumption_bundle: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub release_status: Option<String>,
    #[serde(default)]
    pub resource_definitions: Vec<ResourceDefinition>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub labels: Labels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TombstoneInput {
    pub ord_id: String,
    pub removal_date: String,
}

macro_rules! impl_ord_identified {
    ($($ty:ty),* $(,)?) => {
        $(impl OrdIdentified for $ty {
            fn ord_id(&self) -> &str {
                &self.ord_id
            }
        })*
    };
}

impl_ord_identified!(
    VendorInput,
    ProductInput,
    PackageInput,
    BundleInput,
    ApiInput,
    EventInput,
    TombstoneInput,
);

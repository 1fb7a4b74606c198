//! Persisted catalog resources.
//!
//! Every stored resource carries a storage-assigned `id` used for all mutations
//! and the `ord_id` used to join it with desired state. `app_id` is `None` for
//! tenant-less global vendors and products.

use serde::{Deserialize, Serialize};

use crate::document::{
    ApiInput, BundleInput, EventInput, Labels, OrdIdentified, PackageInput, ProductInput,
    TombstoneInput, VendorInput,
};
use crate::kind::DefinitionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub app_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub partners: Vec<String>,
    pub labels: Labels,
}

impl Vendor {
    pub fn from_input(id: String, app_id: Option<String>, input: &VendorInput) -> Self {
        Self {
            id,
            app_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            partners: input.partners.clone(),
            labels: input.labels.clone(),
        }
    }

    /// True when applying `input` would not change the stored row.
    pub fn matches(&self, input: &VendorInput) -> bool {
        self.title == input.title && self.partners == input.partners && self.labels == input.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub app_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub short_description: String,
    pub vendor: String,
    pub parent: Option<String>,
    pub labels: Labels,
}

impl Product {
    pub fn from_input(id: String, app_id: Option<String>, input: &ProductInput) -> Self {
        Self {
            id,
            app_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            short_description: input.short_description.clone(),
            vendor: input.vendor.clone(),
            parent: input.parent.clone(),
            labels: input.labels.clone(),
        }
    }

    pub fn matches(&self, input: &ProductInput) -> bool {
        self.title == input.title
            && self.short_description == input.short_description
            && self.vendor == input.vendor
            && self.parent == input.parent
            && self.labels == input.labels
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub app_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub short_description: String,
    pub description: String,
    pub version: String,
    pub vendor: Option<String>,
    pub part_of_products: Vec<String>,
    pub resource_hash: Option<u64>,
}

impl Package {
    pub fn from_input(id: String, app_id: Option<String>, input: &PackageInput, hash: u64) -> Self {
        Self {
            id,
            app_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            short_description: input.short_description.clone(),
            description: input.description.clone(),
            version: input.version.clone(),
            vendor: input.vendor.clone(),
            part_of_products: input.part_of_products.clone(),
            resource_hash: Some(hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    pub app_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub resource_hash: Option<u64>,
}

impl Bundle {
    pub fn from_input(id: String, app_id: Option<String>, input: &BundleInput, hash: u64) -> Self {
        Self {
            id,
            app_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            version: input.version.clone(),
            resource_hash: Some(hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub id: String,
    pub app_id: Option<String>,
    pub package_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub entry_points: Vec<String>,
    pub visibility: Option<String>,
    pub release_status: Option<String>,
    pub default_bundle_id: Option<String>,
    pub resource_hash: Option<u64>,
}

impl Api {
    pub fn from_input(
        id: String,
        app_id: Option<String>,
        input: &ApiInput,
        package_id: Option<String>,
        default_bundle_id: Option<String>,
        hash: u64,
    ) -> Self {
        Self {
            id,
            app_id,
            package_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            version: input.version.clone(),
            entry_points: input.entry_points.clone(),
            visibility: input.visibility.clone(),
            release_status: input.release_status.clone(),
            default_bundle_id,
            resource_hash: Some(hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub app_id: Option<String>,
    pub package_id: Option<String>,
    pub ord_id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: String,
    pub visibility: Option<String>,
    pub release_status: Option<String>,
    pub default_bundle_id: Option<String>,
    pub resource_hash: Option<u64>,
}

impl Event {
    pub fn from_input(
        id: String,
        app_id: Option<String>,
        input: &EventInput,
        package_id: Option<String>,
        default_bundle_id: Option<String>,
        hash: u64,
    ) -> Self {
        Self {
            id,
            app_id,
            package_id,
            ord_id: input.ord_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            version: input.version.clone(),
            visibility: input.visibility.clone(),
            release_status: input.release_status.clone(),
            default_bundle_id,
            resource_hash: Some(hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub id: String,
    pub app_id: Option<String>,
    pub ord_id: String,
    pub removal_date: String,
}

impl Tombstone {
    pub fn from_input(id: String, app_id: Option<String>, input: &TombstoneInput) -> Self {
        Self {
            id,
            app_id,
            ord_id: input.ord_id.clone(),
            removal_date: input.removal_date.clone(),
        }
    }

    pub fn matches(&self, input: &TombstoneInput) -> bool {
        self.removal_date == input.removal_date
    }
}

/// Association between an API/event and a consumption bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleReference {
    pub id: String,
    pub bundle_id: String,
    pub object_kind: DefinitionKind,
    pub object_id: String,
    pub default_target_url: Option<String>,
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

impl_ord_identified!(Vendor, Product, Package, Bundle, Api, Event, Tombstone);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_matches_ignores_storage_fields() {
        let input = VendorInput {
            ord_id: "sap:vendor:SAP:".into(),
            title: "SAP SE".into(),
            partners: vec![],
            labels: Labels::new(),
        };
        let stored = Vendor::from_input("v-1".into(), Some("app-1".into()), &input);
        assert!(stored.matches(&input));

        let renamed = VendorInput {
            title: "SAP".into(),
            ..input
        };
        assert!(!stored.matches(&renamed));
    }

    #[test]
    fn tombstone_matches_on_removal_date() {
        let input = TombstoneInput {
            ord_id: "ns:apiResource:orders:v1".into(),
            removal_date: "2020-12-02T14:12:59Z".into(),
        };
        let stored = Tombstone::from_input("t-1".into(), None, &input);
        assert!(stored.matches(&input));
        assert!(!stored.matches(&TombstoneInput {
            removal_date: "2021-01-01T00:00:00Z".into(),
            ..input
        }));
    }
}

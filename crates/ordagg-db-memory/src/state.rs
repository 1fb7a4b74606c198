use std::collections::{BTreeMap, HashMap};

use ordagg_core::{
    Api, Application, ApplicationTemplate, Bundle, BundleReference, Event, FetchRequest,
    Operation, Package, Product, ResourceKind, Specification, Tombstone, Vendor, Webhook,
};

/// All tables of the in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct CatalogState {
    pub applications: BTreeMap<String, Application>,
    pub application_templates: BTreeMap<String, ApplicationTemplate>,
    /// Lowest owning tenant per application.
    pub tenants: HashMap<String, String>,
    /// `applicationType` label values per application.
    pub application_types: HashMap<String, String>,
    pub webhooks: BTreeMap<String, Webhook>,
    pub vendors: BTreeMap<String, Vendor>,
    pub products: BTreeMap<String, Product>,
    pub packages: BTreeMap<String, Package>,
    pub bundles: BTreeMap<String, Bundle>,
    pub apis: BTreeMap<String, Api>,
    pub events: BTreeMap<String, Event>,
    pub tombstones: BTreeMap<String, Tombstone>,
    pub bundle_references: BTreeMap<String, BundleReference>,
    pub specifications: BTreeMap<String, Specification>,
    pub fetch_requests: BTreeMap<String, FetchRequest>,
    pub operations: BTreeMap<String, Operation>,
}

/// A table row that can be written through the undo log.
pub(crate) trait Row: Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn table(state: &CatalogState) -> &BTreeMap<String, Self>;

    fn table_mut(state: &mut CatalogState) -> &mut BTreeMap<String, Self>;
}

macro_rules! row {
    ($ty:ty, $field:ident, $name:expr) => {
        impl Row for $ty {
            const TABLE: &'static str = $name;

            fn table(state: &CatalogState) -> &BTreeMap<String, Self> {
                &state.$field
            }

            fn table_mut(state: &mut CatalogState) -> &mut BTreeMap<String, Self> {
                &mut state.$field
            }
        }
    };
}

row!(Vendor, vendors, ResourceKind::Vendor.as_str());
row!(Product, products, ResourceKind::Product.as_str());
row!(Package, packages, ResourceKind::Package.as_str());
row!(Bundle, bundles, ResourceKind::Bundle.as_str());
row!(Api, apis, ResourceKind::Api.as_str());
row!(Event, events, ResourceKind::Event.as_str());
row!(Tombstone, tombstones, ResourceKind::Tombstone.as_str());
row!(BundleReference, bundle_references, "bundleReference");
row!(Specification, specifications, "specification");
row!(FetchRequest, fetch_requests, "fetchRequest");
row!(Operation, operations, "operation");

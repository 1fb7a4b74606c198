//! Boundary validation and sanitization of fetched ORD documents.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use ordagg_core::{
    Api, ConsumptionBundleReference, Documents, Event, OrdIdentified, Package,
};

use crate::error::ValidationError;
use crate::global_registry::GlobalResourceSet;
use crate::hash::ResourceHashes;

const NAMESPACE: &str = r"[a-z0-9]+(?:[.][a-z0-9]+)*";
const NAME: &str = r"[a-zA-Z0-9._\-]+";

fn ord_id_regex(kind: &str, version: &str) -> Regex {
    Regex::new(&format!("^{NAMESPACE}:{kind}:{NAME}:{version}$")).expect("Invalid ORD ID regex")
}

static VENDOR_ORD_ID: LazyLock<Regex> = LazyLock::new(|| ord_id_regex("vendor", ""));
static PRODUCT_ORD_ID: LazyLock<Regex> = LazyLock::new(|| ord_id_regex("product", ""));
static PACKAGE_ORD_ID: LazyLock<Regex> =
    LazyLock::new(|| ord_id_regex("package", "(?:v0|v[1-9][0-9]*|alpha|beta)"));
static BUNDLE_ORD_ID: LazyLock<Regex> =
    LazyLock::new(|| ord_id_regex("consumptionBundle", "(?:v0|v[1-9][0-9]*|)"));
static API_ORD_ID: LazyLock<Regex> =
    LazyLock::new(|| ord_id_regex("apiResource", "(?:v0|v[1-9][0-9]*|alpha|beta|)"));
static EVENT_ORD_ID: LazyLock<Regex> =
    LazyLock::new(|| ord_id_regex("eventResource", "(?:v0|v[1-9][0-9]*|alpha|beta|)"));
static TOMBSTONE_ORD_ID: LazyLock<Regex> = LazyLock::new(|| {
    ord_id_regex(
        "(?:vendor|product|package|consumptionBundle|apiResource|eventResource)",
        "(?:v0|v[1-9][0-9]*|alpha|beta|)",
    )
});
static SEMVER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-[0-9A-Za-z.\-]+)?(?:\+[0-9A-Za-z.\-]+)?$",
    )
    .expect("Invalid semver regex")
});

/// Stored state and precomputed data the validator checks documents against.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub base_url: &'a str,
    pub apis: &'a [Api],
    pub events: &'a [Event],
    pub packages: &'a [Package],
    pub resource_hashes: &'a ResourceHashes,
    pub global_resources: &'a GlobalResourceSet,
}

pub trait DocumentValidator: Send + Sync {
    /// Rejects the whole document set if any resource is invalid.
    fn validate(
        &self,
        documents: &Documents,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ValidationError>;

    /// Resolves relative URLs and fills in defaults. Runs after hashing.
    fn sanitize(&self, documents: &mut Documents, base_url: &str) -> Result<(), ValidationError>;
}

#[derive(Debug, Clone, Default)]
pub struct DefaultDocumentValidator;

impl DefaultDocumentValidator {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, issue: String) {
        self.0.push(issue);
    }

    fn check_ord_id(&mut self, regex: &Regex, kind: &str, ord_id: &str) {
        if !regex.is_match(ord_id) {
            self.push(format!("{kind} has invalid ordId '{ord_id}'"));
        }
    }

    fn check_version(&mut self, ord_id: &str, version: &str) {
        if !SEMVER.is_match(version) {
            self.push(format!("{ord_id} has invalid version '{version}'"));
        }
    }

    fn check_unique<'a>(&mut self, kind: &str, ids: impl Iterator<Item = &'a str>) {
        let mut seen = HashSet::new();
        for id in ids {
            if !seen.insert(id) {
                self.push(format!("duplicate {kind} '{id}'"));
            }
        }
    }

    fn check_bumped(
        &mut self,
        ord_id: &str,
        version: &str,
        stored: Option<(&str, Option<u64>)>,
        hashes: &ResourceHashes,
    ) {
        let Some((stored_version, Some(stored_hash))) = stored else {
            return;
        };
        let Some(hash) = hashes.get(ord_id) else {
            return;
        };
        if *hash != stored_hash && stored_version == version {
            self.push(format!(
                "{ord_id} changed but its version {version} was not increased"
            ));
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.0))
        }
    }
}

fn ids<T: OrdIdentified>(items: &[T]) -> impl Iterator<Item = &str> {
    items.iter().map(OrdIdentified::ord_id)
}

fn check_bundle_refs(
    issues: &mut Issues,
    owner: &str,
    refs: &[ConsumptionBundleReference],
    default_bundle: Option<&str>,
    bundles: &HashSet<&str>,
) {
    for bundle_ref in refs {
        if !bundles.contains(bundle_ref.bundle_ord_id.as_str()) {
            issues.push(format!(
                "{owner} references unknown consumption bundle '{}'",
                bundle_ref.bundle_ord_id
            ));
        }
    }
    if let Some(default_bundle) = default_bundle {
        if !refs.iter().any(|r| r.bundle_ord_id == default_bundle) {
            issues.push(format!(
                "{owner} declares default consumption bundle '{default_bundle}' it is not part of"
            ));
        }
    }
}

fn resolve(base: &Url, reference: &str) -> Result<String, String> {
    base.join(reference)
        .map(String::from)
        .map_err(|e| format!("cannot resolve '{reference}' against {base}: {e}"))
}

impl DocumentValidator for DefaultDocumentValidator {
    fn validate(
        &self,
        documents: &Documents,
        ctx: &ValidationContext<'_>,
    ) -> Result<(), ValidationError> {
        let mut issues = Issues::default();

        let vendors: Vec<_> = documents.iter().flat_map(|d| &d.vendors).collect();
        let products: Vec<_> = documents.iter().flat_map(|d| &d.products).collect();
        let packages: Vec<_> = documents.iter().flat_map(|d| &d.packages).collect();
        let bundles: Vec<_> = documents.iter().flat_map(|d| &d.consumption_bundles).collect();
        let apis: Vec<_> = documents.iter().flat_map(|d| &d.api_resources).collect();
        let events: Vec<_> = documents.iter().flat_map(|d| &d.event_resources).collect();
        let tombstones: Vec<_> = documents.iter().flat_map(|d| &d.tombstones).collect();

        let base_url = ctx.base_url.trim_end_matches('/');
        for doc in documents {
            if let Some(described) = doc
                .described_system_instance
                .as_ref()
                .and_then(|d| d.base_url.as_deref())
            {
                if described.trim_end_matches('/') != base_url {
                    issues.push(format!(
                        "describedSystemInstance baseUrl {described} does not match {base_url}"
                    ));
                }
            }
        }

        issues.check_unique("vendor", vendors.iter().map(|v| v.ord_id.as_str()));
        issues.check_unique("product", products.iter().map(|p| p.ord_id.as_str()));
        issues.check_unique("package", packages.iter().map(|p| p.ord_id.as_str()));
        issues.check_unique("consumption bundle", bundles.iter().map(|b| b.ord_id.as_str()));
        issues.check_unique("API", apis.iter().map(|a| a.ord_id.as_str()));
        issues.check_unique("event", events.iter().map(|e| e.ord_id.as_str()));
        issues.check_unique("tombstone", tombstones.iter().map(|t| t.ord_id.as_str()));

        let known_vendors: HashSet<&str> = vendors.iter().map(|v| v.ord_id.as_str()).collect();
        let known_products: HashSet<&str> = products.iter().map(|p| p.ord_id.as_str()).collect();
        let known_packages: HashSet<&str> = packages
            .iter()
            .map(|p| p.ord_id.as_str())
            .chain(ids(ctx.packages))
            .collect();
        let known_bundles: HashSet<&str> = bundles.iter().map(|b| b.ord_id.as_str()).collect();
        let vendor_known = |id: &str| known_vendors.contains(id) || ctx.global_resources.contains(id);
        let product_known =
            |id: &str| known_products.contains(id) || ctx.global_resources.contains(id);

        for vendor in &vendors {
            issues.check_ord_id(&VENDOR_ORD_ID, "vendor", &vendor.ord_id);
        }

        for product in &products {
            issues.check_ord_id(&PRODUCT_ORD_ID, "product", &product.ord_id);
            if !vendor_known(&product.vendor) {
                issues.push(format!(
                    "product {} references unknown vendor '{}'",
                    product.ord_id, product.vendor
                ));
            }
        }

        let stored_packages: HashMap<&str, &Package> =
            ctx.packages.iter().map(|p| (p.ord_id.as_str(), p)).collect();
        for package in &packages {
            issues.check_ord_id(&PACKAGE_ORD_ID, "package", &package.ord_id);
            issues.check_version(&package.ord_id, &package.version);
            if let Some(vendor) = &package.vendor {
                if !vendor_known(vendor) {
                    issues.push(format!(
                        "package {} references unknown vendor '{vendor}'",
                        package.ord_id
                    ));
                }
            }
            for product in &package.part_of_products {
                if !product_known(product) {
                    issues.push(format!(
                        "package {} references unknown product '{product}'",
                        package.ord_id
                    ));
                }
            }
            issues.check_bumped(
                &package.ord_id,
                &package.version,
                stored_packages
                    .get(package.ord_id.as_str())
                    .map(|p| (p.version.as_str(), p.resource_hash)),
                ctx.resource_hashes,
            );
        }

        for bundle in &bundles {
            issues.check_ord_id(&BUNDLE_ORD_ID, "consumption bundle", &bundle.ord_id);
        }

        let stored_apis: HashMap<&str, &Api> =
            ctx.apis.iter().map(|a| (a.ord_id.as_str(), a)).collect();
        for api in &apis {
            issues.check_ord_id(&API_ORD_ID, "API", &api.ord_id);
            issues.check_version(&api.ord_id, &api.version);
            match api.part_of_package.as_deref() {
                Some(package) if known_packages.contains(package) => {}
                Some(package) => issues.push(format!(
                    "API {} references unknown package '{package}'",
                    api.ord_id
                )),
                None => issues.push(format!("API {} has no partOfPackage", api.ord_id)),
            }
            for product in &api.part_of_products {
                if !product_known(product) {
                    issues.push(format!(
                        "API {} references unknown product '{product}'",
                        api.ord_id
                    ));
                }
            }
            check_bundle_refs(
                &mut issues,
                &api.ord_id,
                &api.part_of_consumption_bundles,
                api.default_consumption_bundle.as_deref(),
                &known_bundles,
            );
            issues.check_bumped(
                &api.ord_id,
                &api.version,
                stored_apis
                    .get(api.ord_id.as_str())
                    .map(|a| (a.version.as_str(), a.resource_hash)),
                ctx.resource_hashes,
            );
        }

        let stored_events: HashMap<&str, &Event> =
            ctx.events.iter().map(|e| (e.ord_id.as_str(), e)).collect();
        for event in &events {
            issues.check_ord_id(&EVENT_ORD_ID, "event", &event.ord_id);
            issues.check_version(&event.ord_id, &event.version);
            match event.part_of_package.as_deref() {
                Some(package) if known_packages.contains(package) => {}
                Some(package) => issues.push(format!(
                    "event {} references unknown package '{package}'",
                    event.ord_id
                )),
                None => issues.push(format!("event {} has no partOfPackage", event.ord_id)),
            }
            for product in &event.part_of_products {
                if !product_known(product) {
                    issues.push(format!(
                        "event {} references unknown product '{product}'",
                        event.ord_id
                    ));
                }
            }
            check_bundle_refs(
                &mut issues,
                &event.ord_id,
                &event.part_of_consumption_bundles,
                event.default_consumption_bundle.as_deref(),
                &known_bundles,
            );
            issues.check_bumped(
                &event.ord_id,
                &event.version,
                stored_events
                    .get(event.ord_id.as_str())
                    .map(|e| (e.version.as_str(), e.resource_hash)),
                ctx.resource_hashes,
            );
        }

        for tombstone in &tombstones {
            issues.check_ord_id(&TOMBSTONE_ORD_ID, "tombstone", &tombstone.ord_id);
        }

        issues.finish()
    }

    fn sanitize(&self, documents: &mut Documents, base_url: &str) -> Result<(), ValidationError> {
        let base = Url::parse(base_url)
            .map_err(|e| ValidationError::single(format!("invalid base URL {base_url}: {e}")))?;
        let mut issues = Issues::default();

        for doc in documents.iter_mut() {
            for api in &mut doc.api_resources {
                for definition in &mut api.resource_definitions {
                    match resolve(&base, &definition.url) {
                        Ok(url) => definition.url = url,
                        Err(issue) => issues.push(issue),
                    }
                }
                for entry_point in &mut api.entry_points {
                    match resolve(&base, entry_point) {
                        Ok(url) => *entry_point = url,
                        Err(issue) => issues.push(issue),
                    }
                }
                api.visibility.get_or_insert_with(|| "public".to_string());
                api.release_status.get_or_insert_with(|| "active".to_string());
            }
            for event in &mut doc.event_resources {
                for definition in &mut event.resource_definitions {
                    match resolve(&base, &definition.url) {
                        Ok(url) => definition.url = url,
                        Err(issue) => issues.push(issue),
                    }
                }
                event.visibility.get_or_insert_with(|| "public".to_string());
                event.release_status.get_or_insert_with(|| "active".to_string());
            }
        }

        issues.finish()
    }
}

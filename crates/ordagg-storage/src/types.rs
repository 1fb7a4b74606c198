use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ownership scope of catalog rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Rows owned by one application.
    Application(String),
    /// Tenant-less rows synchronized from the global registry.
    Global,
}

impl Scope {
    pub fn application(id: impl Into<String>) -> Self {
        Self::Application(id.into())
    }

    pub fn app_id(&self) -> Option<&str> {
        match self {
            Self::Application(id) => Some(id),
            Self::Global => None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application(id) => write!(f, "application/{id}"),
            Self::Global => write!(f, "global"),
        }
    }
}

/// Internal bundle ID mapped to the default target URL used inside that bundle.
pub type TargetUrlPerBundle = BTreeMap<String, Option<String>>;

/// Everything needed to persist an API or event besides its bundle memberships.
#[derive(Debug, Clone)]
pub struct DefinitionWrite<'a, T> {
    pub input: &'a T,
    pub package_id: Option<String>,
    pub default_bundle_id: Option<String>,
    pub resource_hash: u64,
}

/// Bundle memberships of an API/event being updated.
///
/// `all` is the full desired membership after the update. `to_create` and
/// `to_delete` are disjoint; bundles in `all` but not in `to_create` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReferenceDelta {
    pub all: TargetUrlPerBundle,
    pub to_create: TargetUrlPerBundle,
    pub to_delete: BTreeSet<String>,
}

impl BundleReferenceDelta {
    /// Diffs the desired memberships against the bundle IDs currently referenced.
    pub fn compute(desired: TargetUrlPerBundle, current_bundle_ids: &[String]) -> Self {
        let current: BTreeSet<&str> = current_bundle_ids.iter().map(String::as_str).collect();

        let to_create = desired
            .iter()
            .filter(|(bundle_id, _)| !current.contains(bundle_id.as_str()))
            .map(|(bundle_id, url)| (bundle_id.clone(), url.clone()))
            .collect();

        let to_delete = current
            .iter()
            .filter(|bundle_id| !desired.contains_key(**bundle_id))
            .map(|bundle_id| (*bundle_id).to_string())
            .collect();

        Self {
            all: desired,
            to_create,
            to_delete,
        }
    }

    /// Bundles that stay referenced, possibly with a new default target URL.
    pub fn unchanged(&self) -> BTreeSet<&str> {
        self.all
            .keys()
            .filter(|bundle_id| !self.to_create.contains_key(*bundle_id))
            .map(String::as_str)
            .collect()
    }
}

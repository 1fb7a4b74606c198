use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The seven catalog resource kinds reconciled per application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "vendor")]
    Vendor,
    #[serde(rename = "product")]
    Product,
    #[serde(rename = "package")]
    Package,
    #[serde(rename = "consumptionBundle")]
    Bundle,
    #[serde(rename = "apiResource")]
    Api,
    #[serde(rename = "eventResource")]
    Event,
    #[serde(rename = "tombstone")]
    Tombstone,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 7] = [
        ResourceKind::Vendor,
        ResourceKind::Product,
        ResourceKind::Package,
        ResourceKind::Bundle,
        ResourceKind::Api,
        ResourceKind::Event,
        ResourceKind::Tombstone,
    ];

    /// The resource type segment used inside ORD IDs (`<namespace>:<type>:<name>:<version>`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vendor => "vendor",
            ResourceKind::Product => "product",
            ResourceKind::Package => "package",
            ResourceKind::Bundle => "consumptionBundle",
            ResourceKind::Api => "apiResource",
            ResourceKind::Event => "eventResource",
            ResourceKind::Tombstone => "tombstone",
        }
    }

    /// Extracts the kind encoded in the second segment of an ORD ID.
    pub fn from_ord_id(ord_id: &str) -> Option<Self> {
        ord_id.split(':').nth(1).and_then(|segment| segment.parse().ok())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vendor" => Ok(ResourceKind::Vendor),
            "product" => Ok(ResourceKind::Product),
            "package" => Ok(ResourceKind::Package),
            "consumptionBundle" => Ok(ResourceKind::Bundle),
            "apiResource" => Ok(ResourceKind::Api),
            "eventResource" => Ok(ResourceKind::Event),
            "tombstone" => Ok(ResourceKind::Tombstone),
            _ => Err(CoreError::invalid_resource_kind(s)),
        }
    }
}

/// Resource kinds that own specifications and bundle references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefinitionKind {
    Api,
    Event,
}

impl From<DefinitionKind> for ResourceKind {
    fn from(kind: DefinitionKind) -> Self {
        match kind {
            DefinitionKind::Api => ResourceKind::Api,
            DefinitionKind::Event => ResourceKind::Event,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ResourceKind::from(*self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_ord_id_segment() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
    }

    #[test]
    fn kind_is_extracted_from_ord_id() {
        assert_eq!(
            ResourceKind::from_ord_id("sap.foo:apiResource:orders:v1"),
            Some(ResourceKind::Api)
        );
        assert_eq!(
            ResourceKind::from_ord_id("sap.foo:consumptionBundle:b1:v1"),
            Some(ResourceKind::Bundle)
        );
        assert_eq!(ResourceKind::from_ord_id("not-an-ord-id"), None);
        assert_eq!(ResourceKind::from_ord_id("ns:unknown:x:v1"), None);
    }
}

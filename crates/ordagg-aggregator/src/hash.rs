//! Content hashes of catalog resources.
//!
//! Hashes are taken over the canonical JSON form of the *unsanitized* input:
//! object keys sorted at every level, no insignificant whitespace. The first
//! eight bytes of the SHA-256 digest form the stored `u64`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use ordagg_core::{Documents, OrdIdentified};

use crate::error::AggregationError;

/// ORD ID to content hash, for packages, bundles, APIs and events.
pub type ResourceHashes = HashMap<String, u64>;

/// Hashes one resource input.
pub fn hash_resource<T: Serialize + OrdIdentified>(input: &T) -> Result<u64, AggregationError> {
    let value =
        serde_json::to_value(input).map_err(|e| AggregationError::hash(input.ord_id(), e.to_string()))?;

    let bytes = serde_json::to_vec(&canonical(value))
        .map_err(|e| AggregationError::hash(input.ord_id(), e.to_string()))?;

    let digest = Sha256::digest(&bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Ok(u64::from_be_bytes(prefix))
}

/// Hashes every package, bundle, API and event across `documents`.
///
/// Must run before sanitization so defaults filled in by the sanitizer never
/// register as a change.
pub fn compute_resource_hashes(documents: &Documents) -> Result<ResourceHashes, AggregationError> {
    let mut hashes = ResourceHashes::new();
    for doc in documents {
        for package in &doc.packages {
            hashes.insert(package.ord_id.clone(), hash_resource(package)?);
        }
        for bundle in &doc.consumption_bundles {
            hashes.insert(bundle.ord_id.clone(), hash_resource(bundle)?);
        }
        for api in &doc.api_resources {
            hashes.insert(api.ord_id.clone(), hash_resource(api)?);
        }
        for event in &doc.event_resources {
            hashes.insert(event.ord_id.clone(), hash_resource(event)?);
        }
    }
    Ok(hashes)
}

/// Rebuilds every object with its keys in sorted order, so serialization is
/// canonical whether or not `serde_json` preserves insertion order.
fn canonical(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonical(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonical).collect()),
        scalar => scalar,
    }
}

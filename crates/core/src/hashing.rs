// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical JSON rendering and content hashing.
//!
//! Snapshots are content-addressed: the hash of a configuration must be
//! identical across processes of the same runtime version, regardless of
//! the insertion order of any mapping. Canonicalization sorts object keys
//! recursively and preserves array order.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Render a JSON value in canonical form: object keys sorted recursively,
/// array order preserved, no insignificant whitespace.
///
/// JSON numbers use serde_json's default rendering; the runtime never puts
/// NaN/Inf into hashed configuration.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Display on Value::String renders the JSON-escaped, quoted form.
        Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        Value::Object(map) => {
            let mut sorted = BTreeMap::new();
            for (key, val) in map {
                sorted.insert(key, canonical_json(val));
            }
            let rendered: Vec<String> = sorted
                .into_iter()
                .map(|(key, val)| format!("{}:{}", Value::String(key.clone()), val))
                .collect();
            format!("{{{}}}", rendered.join(","))
        }
    }
}

/// SHA-256 of the canonical JSON rendering, as a lowercase hex string.
pub fn content_hash(value: &Value) -> String {
    let digest = Sha256::digest(canonical_json(value).as_bytes());
    format!("{:x}", digest)
}

#[cfg(test)]
#[path = "hashing_tests.rs"]
mod tests;

//! Content hashing for Bassline documents using blake3.
//!
//! The hash covers the canonical JSON encoding of a document with its own
//! `hash` field cleared. Field order is fixed by the struct layout, maps are
//! insertion-ordered `IndexMap`s, and JSON objects inside content values
//! serialize with sorted keys, so equal documents hash equally.

use crate::spec::BasslineSpec;

/// Hex blake3 digest of `spec` with `hash` cleared.
pub fn compute_hash(spec: &BasslineSpec) -> Result<String, serde_json::Error> {
    let unhashed = BasslineSpec {
        hash: None,
        ..spec.clone()
    };
    let bytes = serde_json::to_vec(&unhashed)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Returns `spec` with its `hash` field filled in.
pub fn with_hash(mut spec: BasslineSpec) -> Result<BasslineSpec, serde_json::Error> {
    spec.hash = Some(compute_hash(&spec)?);
    Ok(spec)
}

//! Deterministic content and commit hashing.
//!
//! Every blob and commit in a tract is content-addressed: the id is a
//! digest of a canonical encoding of the object's fields, so two equal
//! objects always hash equal and the id can be recomputed from scratch
//! for verification.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::Serialize;

use crate::error::{TractError, TractResult};

/// Number of bytes in a content/commit hash (256 bits, like a truncated
/// Blake2b-256 digest).
pub const HASH_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

/// Hash the canonical JSON encoding of `value`.
///
/// "Canonical" here means: serde_json's map serialization order, which for
/// the `serde_json::Map` backing our content payloads is insertion order.
/// Callers that need key-order independence should serialize through a
/// `BTreeMap` first; the content model does this for its payload maps.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> TractResult<[u8; HASH_LEN]> {
    let bytes = serde_json::to_vec(value).map_err(|source| TractError::ContentValidation {
        reason: format!("failed to canonicalize content for hashing: {source}"),
    })?;
    Ok(hash_bytes(&bytes))
}

/// Hash raw bytes directly (used for commit hashing, where the fields are
/// assembled into a stable byte string rather than serialized as one JSON
/// document).
pub fn hash_bytes(bytes: &[u8]) -> [u8; HASH_LEN] {
    let mut hasher = Blake2b256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Render a hash as lowercase hex, the wire/storage representation used
/// throughout the store.
pub fn hex_encode(hash: &[u8; HASH_LEN]) -> String {
    hex::encode(hash)
}

/// Parse a lowercase hex hash back into bytes.
pub fn hex_decode(s: &str) -> TractResult<[u8; HASH_LEN]> {
    let bytes = hex::decode(s).map_err(|source| TractError::InvalidHash {
        hash: s.to_string(),
        reason: source.to_string(),
    })?;
    if bytes.len() != HASH_LEN {
        return Err(TractError::InvalidHash {
            hash: s.to_string(),
            reason: format!("expected {HASH_LEN} bytes, got {}", bytes.len()),
        });
    }
    let mut out = [0u8; HASH_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stable_across_reserialization() {
        let a = json!({"content_type": "dialogue", "role": "user", "text": "hi"});
        let b: serde_json::Value = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert_eq!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn distinct_payloads_hash_distinct() {
        let a = json!({"text": "hi"});
        let b = json!({"text": "bye"});
        assert_ne!(hash_value(&a).unwrap(), hash_value(&b).unwrap());
    }

    #[test]
    fn hex_round_trips() {
        let h = hash_bytes(b"hello");
        let s = hex_encode(&h);
        assert_eq!(hex_decode(&s).unwrap(), h);
    }
}

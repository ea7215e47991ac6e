//! Newtype identifiers used throughout the store.
//!
//! Mirrors the `ObjectId`-style pattern of hash-backed ids: a thin wrapper
//! around the raw bytes, with hex conversion and a short-prefix display
//! form for logs and CLI output.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::TractResult;
use crate::hash::{hex_decode, hex_encode, HASH_LEN};

macro_rules! hash_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Build an id from raw hash bytes.
            pub fn from_bytes(bytes: &[u8; HASH_LEN]) -> Self {
                Self(hex_encode(bytes))
            }

            /// Parse an id from its hex representation, validating length.
            pub fn parse(hex: &str) -> TractResult<Self> {
                hex_decode(hex)?;
                Ok(Self(hex.to_ascii_lowercase()))
            }

            /// The full hex string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// A short prefix (12 hex chars) suitable for logs and CLI display.
            pub fn short(&self) -> &str {
                &self.0[..12.min(self.0.len())]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.short())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

hash_id!(
    ContentHash,
    "Content-address of a blob: digest of the canonical JSON payload."
);
hash_id!(
    CommitHash,
    "Content-address of a commit: digest of its canonical fields."
);

/// Identifier of a tract (one independent DAG / conversation) within a
/// store. Many tracts may share one physical database.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TractId(String);

impl TractId {
    /// Wrap an existing identifier (e.g. loaded from storage).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id, hex-encoded like a hash but not
    /// content-derived.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

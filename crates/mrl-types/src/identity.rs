use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Material used to derive a [`PrincipalId`].
///
/// MRL never authenticates anyone. The identity layer in front of the core
/// hands over material it has already verified, and the core only needs a
/// stable, unforgeable identifier to key its registries by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalMaterial {
    /// An ed25519-style public key (32 bytes) presented by the identity layer.
    PublicKey([u8; 32]),
    /// A federated identity: issuer plus the subject claim within it.
    Federated { issuer: String, subject: String },
}

/// Opaque authenticated identity of an actor.
///
/// A `PrincipalId` is derived deterministically from [`PrincipalMaterial`]
/// using BLAKE3. The same material always produces the same identity, and
/// identities for distinct material never collide in practice. The all-zero
/// value is the null principal, which every registry rejects as a party to
/// an operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrincipalId {
    hash: [u8; 32],
}

impl PrincipalId {
    /// Derive a `PrincipalId` from identity material.
    pub fn derive(material: &PrincipalMaterial) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mrl-principal-v1:");
        match material {
            PrincipalMaterial::PublicKey(pk) => {
                hasher.update(b"pubkey:");
                hasher.update(pk);
            }
            PrincipalMaterial::Federated { issuer, subject } => {
                hasher.update(b"federated:");
                hasher.update(issuer.as_bytes());
                hasher.update(b":");
                hasher.update(subject.as_bytes());
            }
        }
        Self {
            hash: *hasher.finalize().as_bytes(),
        }
    }

    /// The null principal (all zeros). Represents "no actor".
    pub const fn null() -> Self {
        Self { hash: [0u8; 32] }
    }

    /// Returns `true` if this is the null principal.
    pub fn is_null(&self) -> bool {
        self.hash == [0u8; 32]
    }

    /// Create an ephemeral (random) principal for tests and demos.
    pub fn ephemeral() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        Self::derive(&PrincipalMaterial::PublicKey(bytes))
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        format!("pr:{}", hex::encode(&self.hash[..4]))
    }

    /// Parse from a hex string (64 hex characters, optional `pr:` prefix).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let s = s.strip_prefix("pr:").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self { hash: arr })
    }

    /// Create from a raw 32-byte hash. Use `derive()` for production code.
    pub fn from_raw(hash: [u8; 32]) -> Self {
        Self { hash }
    }
}

impl fmt::Debug for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrincipalId({})", self.short_id())
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_id())
    }
}

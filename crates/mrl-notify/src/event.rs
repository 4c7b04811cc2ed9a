use std::fmt;

use serde::{Deserialize, Serialize};

use mrl_types::{AccessLevel, PrincipalId, Timestamp};

use crate::hlc::EventAnchor;

/// Unique identifier for a ledger event.
///
/// The id is the event's BLAKE3 integrity hash, making it both
/// content-addressed and stable across redelivery — consumers dedupe
/// at-least-once delivery by this value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub hash: [u8; 32],
}

impl EventId {
    /// Create an `EventId` from a raw hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Short hex representation (first 8 hex chars).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.hash[..4])
    }

    /// Full hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt:{}", self.short_hex())
    }
}

/// The registry a notification originates from. Delivery is in-order within
/// one registry and unordered across registries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Registry {
    Consent,
    Audit,
    Integrity,
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Consent => "consent",
            Self::Audit => "audit",
            Self::Integrity => "integrity",
        };
        write!(f, "{s}")
    }
}

/// Classification of ledger events, one kind per committed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ConsentGranted,
    ConsentRevoked,
    AccessLogged,
    HashStored,
    HashUpdated,
}

impl EventKind {
    /// The registry this kind of event originates from.
    pub fn registry(&self) -> Registry {
        match self {
            Self::ConsentGranted | Self::ConsentRevoked => Registry::Consent,
            Self::AccessLogged => Registry::Audit,
            Self::HashStored | Self::HashUpdated => Registry::Integrity,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConsentGranted => "ConsentGranted",
            Self::ConsentRevoked => "ConsentRevoked",
            Self::AccessLogged => "AccessLogged",
            Self::HashStored => "HashStored",
            Self::HashUpdated => "HashUpdated",
        };
        write!(f, "{s}")
    }
}

/// Payload data carried by a ledger event.
///
/// Each variant carries the full committed fields of its operation, so a
/// subscriber never has to read the registry back to act on a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    ConsentGranted {
        grantor: PrincipalId,
        grantee: PrincipalId,
        access_level: AccessLevel,
        valid_from: Timestamp,
        valid_until: Timestamp,
        purpose: String,
        granted_at: Timestamp,
    },
    ConsentRevoked {
        grantor: PrincipalId,
        grantee: PrincipalId,
    },
    AccessLogged {
        sequence: u64,
        patient: PrincipalId,
        accessor: PrincipalId,
        resource_id: String,
        access_type: String,
        timestamp: Timestamp,
    },
    HashStored {
        content_id: String,
        digest: String,
        content_type: String,
        owner: PrincipalId,
        timestamp: Timestamp,
    },
    /// Carries both digests so tamper monitors can react without a lookup.
    HashUpdated {
        content_id: String,
        old_digest: String,
        new_digest: String,
        content_type: String,
        timestamp: Timestamp,
    },
}

impl EventPayload {
    /// The event kind this payload corresponds to.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConsentGranted { .. } => EventKind::ConsentGranted,
            Self::ConsentRevoked { .. } => EventKind::ConsentRevoked,
            Self::AccessLogged { .. } => EventKind::AccessLogged,
            Self::HashStored { .. } => EventKind::HashStored,
            Self::HashUpdated { .. } => EventKind::HashUpdated,
        }
    }

    /// Returns `true` if the payload names the given principal in any role.
    pub fn mentions(&self, principal: &PrincipalId) -> bool {
        match self {
            Self::ConsentGranted { grantor, grantee, .. }
            | Self::ConsentRevoked { grantor, grantee } => {
                grantor == principal || grantee == principal
            }
            Self::AccessLogged { patient, accessor, .. } => {
                patient == principal || accessor == principal
            }
            Self::HashStored { owner, .. } => owner == principal,
            Self::HashUpdated { .. } => false,
        }
    }
}

/// A single notification flowing out of the ledger.
///
/// Carries a content-addressed id, an HLC stamp, the originating registry,
/// a classification kind, the payload, and a BLAKE3 integrity hash computed
/// over (anchor, kind, payload).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Unique event identifier (content-addressed).
    pub id: EventId,
    /// HLC stamp assigned at emission.
    pub anchor: EventAnchor,
    /// The registry this event originates from.
    pub registry: Registry,
    /// Classification of this event.
    pub kind: EventKind,
    /// Event-specific payload data.
    pub payload: EventPayload,
    /// BLAKE3 integrity hash over (anchor, kind, payload).
    pub integrity_hash: [u8; 32],
}

impl LedgerEvent {
    /// Build a new `LedgerEvent`, computing its integrity hash and id. Kind
    /// and registry are derived from the payload, so they can never
    /// disagree with it.
    pub fn new(anchor: EventAnchor, payload: EventPayload) -> Self {
        let kind = payload.kind();
        let integrity_hash = Self::compute_integrity(&anchor, &kind, &payload);
        Self {
            id: EventId::from_hash(integrity_hash),
            anchor,
            registry: kind.registry(),
            kind,
            payload,
            integrity_hash,
        }
    }

    /// Verify the event's integrity hash matches its content.
    pub fn verify_integrity(&self) -> bool {
        let expected = Self::compute_integrity(&self.anchor, &self.kind, &self.payload);
        self.integrity_hash == expected && self.id == EventId::from_hash(expected)
    }

    fn compute_integrity(
        anchor: &EventAnchor,
        kind: &EventKind,
        payload: &EventPayload,
    ) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"mrl-ledger-event-v1:");

        hasher.update(&anchor.physical_ms.to_le_bytes());
        hasher.update(&anchor.logical.to_le_bytes());
        hasher.update(&anchor.node_id.to_le_bytes());

        if let Ok(kind_bytes) = bincode::serialize(kind) {
            hasher.update(&kind_bytes);
        }
        if let Ok(payload_bytes) = bincode::serialize(payload) {
            hasher.update(&payload_bytes);
        }

        *hasher.finalize().as_bytes()
    }
}

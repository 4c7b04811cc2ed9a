use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mrl_types::{PrincipalId, Timestamp};

use crate::error::RegistryError;

/// Current digest registered for externally stored content.
///
/// Keyed uniquely by content id. Updates replace the digest and content type
/// in place; the owner and original registration instant are preserved for
/// the life of the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityRecord {
    pub content_id: String,
    pub digest: String,
    pub content_type: String,
    pub owner: PrincipalId,
    pub registered_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What a [`IntegrityRegistry::store_or_update`] call did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    /// First store for this content id.
    Stored(IntegrityRecord),
    /// Digest replaced on an existing record; the prior digest rides along
    /// for the "updated" notification.
    Updated {
        record: IntegrityRecord,
        old_digest: String,
    },
}

impl StoreOutcome {
    /// The record as committed, whichever way the call went.
    pub fn record(&self) -> &IntegrityRecord {
        match self {
            Self::Stored(record) => record,
            Self::Updated { record, .. } => record,
        }
    }
}

/// Result shape of a digest verification. Never an error: an unknown content
/// id reports a negative match with empty fields, exactly like a mismatch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub is_valid: bool,
    pub stored_digest: String,
    pub content_type: String,
    pub timestamp: Timestamp,
}

#[derive(Default)]
struct IntegrityState {
    records: HashMap<String, IntegrityRecord>,
    /// Content ids per owner, in registration order.
    by_owner: HashMap<PrincipalId, Vec<String>>,
}

/// Current-value store of content digests, one per content id.
pub struct IntegrityRegistry {
    inner: RwLock<IntegrityState>,
}

impl IntegrityRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(IntegrityState::default()),
        }
    }

    /// Register a digest for a content id, or replace the digest on an
    /// existing record.
    ///
    /// Fails with a validation error if content id, digest, or content type
    /// is empty, or the owner is null. On update the owner and
    /// `registered_at` of the existing record are preserved regardless of
    /// the caller.
    pub fn store_or_update(
        &self,
        content_id: impl Into<String>,
        digest: impl Into<String>,
        content_type: impl Into<String>,
        owner: PrincipalId,
        at: Timestamp,
    ) -> Result<StoreOutcome, RegistryError> {
        let content_id = content_id.into();
        let digest = digest.into();
        let content_type = content_type.into();

        if content_id.is_empty() {
            return Err(RegistryError::EmptyField { field: "content_id" });
        }
        if digest.is_empty() {
            return Err(RegistryError::EmptyField { field: "digest" });
        }
        if content_type.is_empty() {
            return Err(RegistryError::EmptyField {
                field: "content_type",
            });
        }
        if owner.is_null() {
            return Err(RegistryError::NullPrincipal { role: "owner" });
        }

        let mut state = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        match state.records.get_mut(&content_id) {
            Some(existing) => {
                let old_digest = std::mem::replace(&mut existing.digest, digest);
                existing.content_type = content_type;
                existing.updated_at = at;
                let record = existing.clone();

                debug!(content_id = %record.content_id, "digest updated");
                Ok(StoreOutcome::Updated { record, old_digest })
            }
            None => {
                let record = IntegrityRecord {
                    content_id: content_id.clone(),
                    digest,
                    content_type,
                    owner,
                    registered_at: at,
                    updated_at: at,
                };
                state.records.insert(content_id.clone(), record.clone());
                state.by_owner.entry(owner).or_default().push(content_id);

                debug!(content_id = %record.content_id, owner = %owner, "digest stored");
                Ok(StoreOutcome::Stored(record))
            }
        }
    }

    /// Compare a candidate digest against the stored one. Pure read; never
    /// fails. Absence and mismatch are indistinguishable here — callers that
    /// need to tell them apart use [`IntegrityRegistry::details`].
    pub fn verify(&self, content_id: &str, candidate: &str) -> Verification {
        let state = self.inner.read().expect("integrity lock poisoned");
        match state.records.get(content_id) {
            Some(record) => Verification {
                is_valid: record.digest == candidate,
                stored_digest: record.digest.clone(),
                content_type: record.content_type.clone(),
                timestamp: record.updated_at,
            },
            None => Verification::default(),
        }
    }

    /// The full record for a content id, if one exists. Never fails.
    pub fn details(&self, content_id: &str) -> Option<IntegrityRecord> {
        let state = self.inner.read().expect("integrity lock poisoned");
        state.records.get(content_id).cloned()
    }

    /// Number of content ids registered by the owner.
    pub fn count_for_owner(&self, owner: &PrincipalId) -> usize {
        let state = self.inner.read().expect("integrity lock poisoned");
        state.by_owner.get(owner).map_or(0, Vec::len)
    }

    /// The owner's content id at the given position in registration order.
    pub fn id_at(&self, owner: &PrincipalId, index: usize) -> Result<String, RegistryError> {
        let state = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        let ids = state.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[]);
        ids.get(index)
            .cloned()
            .ok_or(RegistryError::IndexOutOfBounds {
                index,
                len: ids.len(),
            })
    }

    /// Re-insert a recorded first-store during crash recovery.
    pub fn restore(&self, record: IntegrityRecord) -> Result<(), RegistryError> {
        let mut state = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let content_id = record.content_id.clone();
        if state.records.insert(content_id.clone(), record.clone()).is_none() {
            state.by_owner.entry(record.owner).or_default().push(content_id);
        }
        Ok(())
    }

    /// Re-apply a recorded update during crash recovery. Returns `false`
    /// (and applies nothing) if the record is missing — its first store may
    /// have been lost to a torn write earlier in the journal.
    pub fn restore_update(
        &self,
        content_id: &str,
        digest: impl Into<String>,
        content_type: impl Into<String>,
        at: Timestamp,
    ) -> Result<bool, RegistryError> {
        let mut state = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        match state.records.get_mut(content_id) {
            Some(record) => {
                record.digest = digest.into();
                record.content_type = content_type.into();
                record.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Default for IntegrityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(seed: u8) -> PrincipalId {
        PrincipalId::from_raw([seed; 32])
    }

    fn ms(n: u64) -> Timestamp {
        Timestamp::from_millis(n)
    }

    #[test]
    fn store_then_verify() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);

        let outcome = registry
            .store_or_update("rec-1", "abc123", "lab_result", owner, ms(100))
            .unwrap();
        assert!(matches!(outcome, StoreOutcome::Stored(_)));

        let check = registry.verify("rec-1", "abc123");
        assert!(check.is_valid);
        assert_eq!(check.stored_digest, "abc123");
        assert_eq!(check.content_type, "lab_result");
        assert_eq!(check.timestamp, ms(100));

        let check = registry.verify("rec-1", "zzz");
        assert!(!check.is_valid);
        assert_eq!(check.stored_digest, "abc123");
    }

    #[test]
    fn verify_unknown_id_is_negative_not_an_error() {
        let registry = IntegrityRegistry::new();
        let check = registry.verify("unknown-id", "abc123");
        assert!(!check.is_valid);
        assert!(check.stored_digest.is_empty());
        assert!(check.content_type.is_empty());
        assert_eq!(check.timestamp, Timestamp::zero());
    }

    #[test]
    fn update_preserves_owner_and_registration_instant() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);
        let other = principal(2);

        registry
            .store_or_update("rec-1", "abc123", "lab_result", owner, ms(100))
            .unwrap();
        let outcome = registry
            .store_or_update("rec-1", "def456", "imaging", other, ms(200))
            .unwrap();

        let StoreOutcome::Updated { record, old_digest } = outcome else {
            panic!("expected update");
        };
        assert_eq!(old_digest, "abc123");
        assert_eq!(record.digest, "def456");
        assert_eq!(record.content_type, "imaging");
        // Identity of the record is preserved across updates.
        assert_eq!(record.owner, owner);
        assert_eq!(record.registered_at, ms(100));
        assert_eq!(record.updated_at, ms(200));

        assert!(!registry.verify("rec-1", "abc123").is_valid);
        assert!(registry.verify("rec-1", "def456").is_valid);
    }

    #[test]
    fn update_does_not_duplicate_owner_index() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);

        registry
            .store_or_update("rec-1", "a", "lab_result", owner, ms(1))
            .unwrap();
        registry
            .store_or_update("rec-1", "b", "lab_result", owner, ms(2))
            .unwrap();

        assert_eq!(registry.count_for_owner(&owner), 1);
    }

    #[test]
    fn rejects_empty_fields_and_null_owner() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);

        let err = registry
            .store_or_update("", "digest", "type", owner, ms(1))
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyField { field: "content_id" });

        let err = registry
            .store_or_update("id", "", "type", owner, ms(1))
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyField { field: "digest" });

        let err = registry
            .store_or_update("id", "digest", "", owner, ms(1))
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyField { field: "content_type" });

        let err = registry
            .store_or_update("id", "digest", "type", PrincipalId::null(), ms(1))
            .unwrap_err();
        assert_eq!(err, RegistryError::NullPrincipal { role: "owner" });

        assert!(registry.details("id").is_none());
    }

    #[test]
    fn details_reports_absence_as_none() {
        let registry = IntegrityRegistry::new();
        assert!(registry.details("nope").is_none());

        registry
            .store_or_update("rec-1", "abc", "lab_result", principal(1), ms(1))
            .unwrap();
        let record = registry.details("rec-1").unwrap();
        assert_eq!(record.digest, "abc");
    }

    #[test]
    fn owner_enumeration_in_registration_order() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);

        for id in ["rec-a", "rec-b", "rec-c"] {
            registry
                .store_or_update(id, "digest", "note", owner, ms(1))
                .unwrap();
        }

        assert_eq!(registry.count_for_owner(&owner), 3);
        assert_eq!(registry.id_at(&owner, 0).unwrap(), "rec-a");
        assert_eq!(registry.id_at(&owner, 2).unwrap(), "rec-c");

        let err = registry.id_at(&owner, 3).unwrap_err();
        assert_eq!(err, RegistryError::IndexOutOfBounds { index: 3, len: 3 });

        assert_eq!(registry.count_for_owner(&principal(9)), 0);
        let err = registry.id_at(&principal(9), 0).unwrap_err();
        assert_eq!(err, RegistryError::IndexOutOfBounds { index: 0, len: 0 });
    }

    #[test]
    fn restore_update_without_record_is_skipped() {
        let registry = IntegrityRegistry::new();
        let applied = registry
            .restore_update("ghost", "digest", "note", ms(1))
            .unwrap();
        assert!(!applied);
        assert!(registry.details("ghost").is_none());
    }

    #[test]
    fn restore_rebuilds_owner_index() {
        let registry = IntegrityRegistry::new();
        let owner = principal(1);
        let record = IntegrityRecord {
            content_id: "rec-1".into(),
            digest: "abc".into(),
            content_type: "lab_result".into(),
            owner,
            registered_at: ms(1),
            updated_at: ms(1),
        };

        registry.restore(record).unwrap();
        assert_eq!(registry.count_for_owner(&owner), 1);
        assert_eq!(registry.id_at(&owner, 0).unwrap(), "rec-1");
        assert!(registry.verify("rec-1", "abc").is_valid);
    }
}

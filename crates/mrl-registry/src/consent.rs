use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mrl_types::{AccessLevel, PrincipalId, Timestamp};

use crate::error::RegistryError;

/// A time-windowed authorization allowing `grantee` to access `grantor`'s
/// records at the given level.
///
/// Keyed uniquely by (grantor, grantee): granting again for the same pair
/// overwrites the prior grant entirely. The record persists past its window —
/// "expired" is never a stored state, only a computed property observable
/// through [`ConsentRegistry::check`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentGrant {
    pub grantor: PrincipalId,
    pub grantee: PrincipalId,
    pub access_level: AccessLevel,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    pub purpose: String,
    /// When the grant was committed. Replaced wholesale on re-grant.
    pub granted_at: Timestamp,
}

impl ConsentGrant {
    /// Returns `true` if the window covers the given instant.
    pub fn covers(&self, at: Timestamp) -> bool {
        self.valid_from <= at && at <= self.valid_until
    }
}

/// Result shape of a consent check. Never an error: an absent pair yields
/// the empty status with `valid = false`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentStatus {
    pub valid: bool,
    pub access_level: Option<AccessLevel>,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    pub purpose: String,
}

impl ConsentStatus {
    fn absent() -> Self {
        Self::default()
    }

    fn from_grant(grant: &ConsentGrant, at: Timestamp) -> Self {
        Self {
            valid: grant.covers(at),
            access_level: Some(grant.access_level),
            valid_from: grant.valid_from,
            valid_until: grant.valid_until,
            purpose: grant.purpose.clone(),
        }
    }
}

/// Current-value store of consent grants, one per (grantor, grantee) pair.
///
/// Mutations take the write lock, so concurrent grants and revocations are
/// serialized into one total order. All validation happens before the state
/// is touched: a rejected call leaves existing grants exactly as they were.
pub struct ConsentRegistry {
    inner: RwLock<HashMap<(PrincipalId, PrincipalId), ConsentGrant>>,
}

impl ConsentRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Record a consent grant, atomically replacing any prior grant for the
    /// pair.
    ///
    /// Fails with a validation error if either principal is null, the window
    /// is not a valid interval, or the window has already closed at `now`.
    pub fn grant(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
        access_level: AccessLevel,
        valid_from: Timestamp,
        valid_until: Timestamp,
        purpose: impl Into<String>,
        now: Timestamp,
    ) -> Result<ConsentGrant, RegistryError> {
        if grantor.is_null() {
            return Err(RegistryError::NullPrincipal { role: "grantor" });
        }
        if grantee.is_null() {
            return Err(RegistryError::NullPrincipal { role: "grantee" });
        }
        if valid_from >= valid_until {
            return Err(RegistryError::InvalidWindow {
                valid_from,
                valid_until,
            });
        }
        if valid_until <= now {
            return Err(RegistryError::WindowAlreadyClosed { valid_until, now });
        }

        let grant = ConsentGrant {
            grantor,
            grantee,
            access_level,
            valid_from,
            valid_until,
            purpose: purpose.into(),
            granted_at: now,
        };

        let mut grants = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        grants.insert((grantor, grantee), grant.clone());

        debug!(
            grantor = %grantor,
            grantee = %grantee,
            level = %access_level,
            "consent granted"
        );
        Ok(grant)
    }

    /// Delete the grant for the pair, returning the removed record.
    ///
    /// Fails with [`RegistryError::GrantNotFound`] if no grant exists; the
    /// registry is left untouched in that case.
    pub fn revoke(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
    ) -> Result<ConsentGrant, RegistryError> {
        let mut grants = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let removed = grants
            .remove(&(grantor, grantee))
            .ok_or(RegistryError::GrantNotFound { grantor, grantee })?;

        debug!(grantor = %grantor, grantee = %grantee, "consent revoked");
        Ok(removed)
    }

    /// Consent status for the pair at the given instant. Pure read; never
    /// fails.
    pub fn check(&self, grantor: PrincipalId, grantee: PrincipalId, at: Timestamp) -> ConsentStatus {
        let grants = self.inner.read().expect("consent lock poisoned");
        match grants.get(&(grantor, grantee)) {
            Some(grant) => ConsentStatus::from_grant(grant, at),
            None => ConsentStatus::absent(),
        }
    }

    /// Boolean shorthand for `check(..).valid`.
    pub fn has_valid_consent(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
        at: Timestamp,
    ) -> bool {
        self.check(grantor, grantee, at).valid
    }

    /// Number of stored grants (valid or expired).
    pub fn grant_count(&self) -> usize {
        self.inner.read().expect("consent lock poisoned").len()
    }

    /// Re-insert a recorded grant during crash recovery.
    ///
    /// Recovery replays committed facts, so no window validation runs here:
    /// a grant whose window has since closed is restored as written (expiry
    /// is a computed property, never a stored state).
    pub fn restore(&self, grant: ConsentGrant) -> Result<(), RegistryError> {
        let mut grants = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        grants.insert((grant.grantor, grant.grantee), grant);
        Ok(())
    }

    /// Re-apply a recorded revocation during crash recovery. Removing an
    /// absent pair is a no-op here; the grant may have been lost to a torn
    /// write earlier in the journal.
    pub fn restore_revocation(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
    ) -> Result<(), RegistryError> {
        let mut grants = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        grants.remove(&(grantor, grantee));
        Ok(())
    }
}

impl Default for ConsentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mrl_types::{PrincipalId, Timestamp};

use crate::error::RegistryError;

/// Immutable record of one access event.
///
/// Sequence numbers are 1-based and strictly increasing across the whole
/// log. Entries are never mutated or deleted once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub sequence: u64,
    pub patient: PrincipalId,
    pub accessor: PrincipalId,
    pub resource_id: String,
    pub access_type: String,
    pub timestamp: Timestamp,
}

/// Arena plus secondary indices. Entries live in `entries` in append order;
/// the index maps hold positions into the arena, so both secondary orderings
/// are views over the primary order, never copies of it.
#[derive(Default)]
struct AuditState {
    entries: Vec<AccessLogEntry>,
    by_patient: HashMap<PrincipalId, Vec<usize>>,
    by_accessor: HashMap<PrincipalId, Vec<usize>>,
}

/// Append-only access audit log.
///
/// Mutations are serialized through the write lock; the append, the
/// sequence-number assignment, and both index updates commit as one
/// indivisible step. Duplicate events are permitted and recorded as
/// distinct entries.
pub struct AuditLog {
    inner: RwLock<AuditState>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(AuditState::default()),
        }
    }

    /// Append an access event with the next sequence number.
    ///
    /// Fails with a validation error if patient or accessor is null, or
    /// resource id / access type is empty. Validation runs before the arena
    /// is touched, so a rejected call changes nothing.
    pub fn log_access(
        &self,
        patient: PrincipalId,
        accessor: PrincipalId,
        resource_id: impl Into<String>,
        access_type: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<AccessLogEntry, RegistryError> {
        let resource_id = resource_id.into();
        let access_type = access_type.into();

        if patient.is_null() {
            return Err(RegistryError::NullPrincipal { role: "patient" });
        }
        if accessor.is_null() {
            return Err(RegistryError::NullPrincipal { role: "accessor" });
        }
        if resource_id.is_empty() {
            return Err(RegistryError::EmptyField { field: "resource_id" });
        }
        if access_type.is_empty() {
            return Err(RegistryError::EmptyField { field: "access_type" });
        }

        let mut state = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let entry = AccessLogEntry {
            sequence: (state.entries.len() + 1) as u64,
            patient,
            accessor,
            resource_id,
            access_type,
            timestamp,
        };

        let position = state.entries.len();
        state.entries.push(entry.clone());
        state.by_patient.entry(patient).or_default().push(position);
        state.by_accessor.entry(accessor).or_default().push(position);

        debug!(
            seq = entry.sequence,
            patient = %patient,
            accessor = %accessor,
            resource = %entry.resource_id,
            "access logged"
        );
        Ok(entry)
    }

    /// Total number of entries in the log.
    pub fn count(&self) -> usize {
        self.inner.read().expect("audit lock poisoned").entries.len()
    }

    /// Entry with the given sequence number, if it exists.
    pub fn entry(&self, sequence: u64) -> Option<AccessLogEntry> {
        if sequence == 0 {
            return None;
        }
        let state = self.inner.read().expect("audit lock poisoned");
        state.entries.get((sequence - 1) as usize).cloned()
    }

    /// Number of entries indexed under the patient.
    pub fn count_for_patient(&self, patient: &PrincipalId) -> usize {
        let state = self.inner.read().expect("audit lock poisoned");
        state.by_patient.get(patient).map_or(0, Vec::len)
    }

    /// The patient's entry at the given position in insertion order.
    pub fn entry_for_patient(
        &self,
        patient: &PrincipalId,
        index: usize,
    ) -> Result<AccessLogEntry, RegistryError> {
        let state = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        let positions = state.by_patient.get(patient).map(Vec::as_slice).unwrap_or(&[]);
        let position = positions
            .get(index)
            .copied()
            .ok_or(RegistryError::IndexOutOfBounds {
                index,
                len: positions.len(),
            })?;
        Ok(state.entries[position].clone())
    }

    /// Up to `max_results` of the patient's entries whose timestamp falls in
    /// `[start, end]`, in original insertion order.
    ///
    /// One forward pass over the patient index with early exit once the cap
    /// is reached: no over-collection, no re-sorting.
    pub fn entries_in_time_range(
        &self,
        patient: &PrincipalId,
        start: Timestamp,
        end: Timestamp,
        max_results: usize,
    ) -> Result<Vec<AccessLogEntry>, RegistryError> {
        if start > end {
            return Err(RegistryError::InvalidTimeRange { start, end });
        }

        let state = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        let positions = state.by_patient.get(patient).map(Vec::as_slice).unwrap_or(&[]);

        let mut matches = Vec::new();
        for &position in positions {
            if matches.len() >= max_results {
                break;
            }
            let entry = &state.entries[position];
            if start <= entry.timestamp && entry.timestamp <= end {
                matches.push(entry.clone());
            }
        }
        Ok(matches)
    }

    /// Up to `max_results` entries recorded for the accessor, in original
    /// insertion order. Same bounded-scan contract as the time-range query.
    pub fn entries_by_accessor(
        &self,
        accessor: &PrincipalId,
        max_results: usize,
    ) -> Vec<AccessLogEntry> {
        let state = self.inner.read().expect("audit lock poisoned");
        let positions = state.by_accessor.get(accessor).map(Vec::as_slice).unwrap_or(&[]);
        positions
            .iter()
            .take(max_results)
            .map(|&position| state.entries[position].clone())
            .collect()
    }

    /// Re-append a recorded entry during crash recovery.
    ///
    /// The entry must carry the next sequence number; recovery replays the
    /// journal in commit order, so a gap means the journal is damaged.
    pub fn restore(&self, entry: AccessLogEntry) -> Result<(), RegistryError> {
        let mut state = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        let expected = (state.entries.len() + 1) as u64;
        if entry.sequence != expected {
            return Err(RegistryError::SequenceMismatch {
                expected,
                found: entry.sequence,
            });
        }

        let position = state.entries.len();
        let patient = entry.patient;
        let accessor = entry.accessor;
        state.entries.push(entry);
        state.by_patient.entry(patient).or_default().push(position);
        state.by_accessor.entry(accessor).or_default().push(position);
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

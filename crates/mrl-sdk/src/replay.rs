use tracing::warn;

use mrl_registry::{
    AccessLogEntry, AuditLog, ConsentGrant, ConsentRegistry, IntegrityRecord, IntegrityRegistry,
    RegistryError,
};
use mrl_notify::{EventPayload, LedgerEvent};

/// Rebuild registry state from recovered journal events.
///
/// Events are committed facts, so they re-apply through the registries'
/// validation-free restore paths, in journal order. An event that no longer
/// fits (its predecessor was lost to a torn write the CRC check skipped) is
/// logged and dropped rather than poisoning the rest of the recovery.
pub(crate) fn apply_events(
    consent: &ConsentRegistry,
    audit: &AuditLog,
    integrity: &IntegrityRegistry,
    events: &[LedgerEvent],
) -> Result<(), RegistryError> {
    for event in events {
        match &event.payload {
            EventPayload::ConsentGranted {
                grantor,
                grantee,
                access_level,
                valid_from,
                valid_until,
                purpose,
                granted_at,
            } => {
                consent.restore(ConsentGrant {
                    grantor: *grantor,
                    grantee: *grantee,
                    access_level: *access_level,
                    valid_from: *valid_from,
                    valid_until: *valid_until,
                    purpose: purpose.clone(),
                    granted_at: *granted_at,
                })?;
            }
            EventPayload::ConsentRevoked { grantor, grantee } => {
                consent.restore_revocation(*grantor, *grantee)?;
            }
            EventPayload::AccessLogged {
                sequence,
                patient,
                accessor,
                resource_id,
                access_type,
                timestamp,
            } => {
                let entry = AccessLogEntry {
                    sequence: *sequence,
                    patient: *patient,
                    accessor: *accessor,
                    resource_id: resource_id.clone(),
                    access_type: access_type.clone(),
                    timestamp: *timestamp,
                };
                match audit.restore(entry) {
                    Ok(()) => {}
                    Err(RegistryError::SequenceMismatch { expected, found }) => {
                        warn!(expected, found, id = %event.id, "audit entry does not fit; dropped");
                    }
                    Err(e) => return Err(e),
                }
            }
            EventPayload::HashStored {
                content_id,
                digest,
                content_type,
                owner,
                timestamp,
            } => {
                integrity.restore(IntegrityRecord {
                    content_id: content_id.clone(),
                    digest: digest.clone(),
                    content_type: content_type.clone(),
                    owner: *owner,
                    registered_at: *timestamp,
                    updated_at: *timestamp,
                })?;
            }
            EventPayload::HashUpdated {
                content_id,
                new_digest,
                content_type,
                timestamp,
                ..
            } => {
                let applied = integrity.restore_update(
                    content_id,
                    new_digest.clone(),
                    content_type.clone(),
                    *timestamp,
                )?;
                if !applied {
                    warn!(content_id = %content_id, id = %event.id, "update without record; dropped");
                }
            }
        }
    }
    Ok(())
}

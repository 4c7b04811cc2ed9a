use std::path::Path;

use tracing::info;

use mrl_notify::{
    EventFilter, EventPayload, EventStream, LedgerEvent, NotificationHub,
};
use mrl_registry::{
    AccessLogEntry, AuditLog, ConsentGrant, ConsentRegistry, ConsentStatus, IntegrityRecord,
    IntegrityRegistry, StoreOutcome, Verification,
};
use mrl_types::{AccessLevel, PrincipalId, Timestamp};

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::replay;

/// Name of the journal file inside a ledger directory.
const JOURNAL_FILE: &str = "ledger.wal";

/// The ledger facade: single atomic-operation boundary over the three
/// registries.
///
/// Every mutating method commits to exactly one registry (serialized by
/// that registry's writer boundary), then emits one notification through
/// the hub — journal write first, subscriber fan-out second, so delivery
/// is at-least-once across crashes. Read methods observe the last
/// committed state and never fail for absent records.
///
/// A `Ledger` is constructed at process start via [`Ledger::open`], held
/// for the process lifetime, and dropped at shutdown. State survives
/// restarts: `open` replays the journal into the registries before
/// returning.
pub struct Ledger {
    consent: ConsentRegistry,
    audit: AuditLog,
    integrity: IntegrityRegistry,
    hub: NotificationHub,
    recovered: Vec<LedgerEvent>,
}

impl Ledger {
    /// Open (or create) the ledger rooted at the given directory.
    pub fn open(dir: impl AsRef<Path>) -> LedgerResult<Self> {
        Self::open_with_config(dir, LedgerConfig::default())
    }

    /// Open with explicit configuration.
    pub fn open_with_config(dir: impl AsRef<Path>, config: LedgerConfig) -> LedgerResult<Self> {
        let journal_path = dir.as_ref().join(JOURNAL_FILE);
        let hub = NotificationHub::new(&journal_path, config.hub_config())?;

        let consent = ConsentRegistry::new();
        let audit = AuditLog::new();
        let integrity = IntegrityRegistry::new();

        let recovered = hub.recover()?;
        replay::apply_events(&consent, &audit, &integrity, &recovered)?;

        info!(
            dir = %dir.as_ref().display(),
            recovered = recovered.len(),
            "ledger opened"
        );

        Ok(Self {
            consent,
            audit,
            integrity,
            hub,
            recovered,
        })
    }

    // ---- Consent operations ----

    /// Record a consent grant from `grantor` to `grantee`, replacing any
    /// prior grant for the pair, and emit `ConsentGranted`.
    pub fn grant_consent(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
        access_level: AccessLevel,
        valid_from: Timestamp,
        valid_until: Timestamp,
        purpose: impl Into<String>,
    ) -> LedgerResult<ConsentGrant> {
        let grant = self.consent.grant(
            grantor,
            grantee,
            access_level,
            valid_from,
            valid_until,
            purpose,
            Timestamp::now(),
        )?;

        self.hub.emit(EventPayload::ConsentGranted {
            grantor: grant.grantor,
            grantee: grant.grantee,
            access_level: grant.access_level,
            valid_from: grant.valid_from,
            valid_until: grant.valid_until,
            purpose: grant.purpose.clone(),
            granted_at: grant.granted_at,
        })?;
        Ok(grant)
    }

    /// Delete the grant for the pair and emit `ConsentRevoked`.
    pub fn revoke_consent(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
    ) -> LedgerResult<ConsentGrant> {
        let removed = self.consent.revoke(grantor, grantee)?;
        self.hub.emit(EventPayload::ConsentRevoked { grantor, grantee })?;
        Ok(removed)
    }

    /// Consent status for the pair right now. Never fails.
    pub fn check_consent(&self, grantor: PrincipalId, grantee: PrincipalId) -> ConsentStatus {
        self.consent.check(grantor, grantee, Timestamp::now())
    }

    /// Consent status at an explicit instant.
    pub fn check_consent_at(
        &self,
        grantor: PrincipalId,
        grantee: PrincipalId,
        at: Timestamp,
    ) -> ConsentStatus {
        self.consent.check(grantor, grantee, at)
    }

    /// Boolean shorthand for `check_consent(..).valid`.
    pub fn has_valid_consent(&self, grantor: PrincipalId, grantee: PrincipalId) -> bool {
        self.consent
            .has_valid_consent(grantor, grantee, Timestamp::now())
    }

    // ---- Audit operations ----

    /// Append an access event and emit `AccessLogged`.
    pub fn log_access(
        &self,
        patient: PrincipalId,
        accessor: PrincipalId,
        resource_id: impl Into<String>,
        access_type: impl Into<String>,
        timestamp: Timestamp,
    ) -> LedgerResult<AccessLogEntry> {
        let entry = self
            .audit
            .log_access(patient, accessor, resource_id, access_type, timestamp)?;

        self.hub.emit(EventPayload::AccessLogged {
            sequence: entry.sequence,
            patient: entry.patient,
            accessor: entry.accessor,
            resource_id: entry.resource_id.clone(),
            access_type: entry.access_type.clone(),
            timestamp: entry.timestamp,
        })?;
        Ok(entry)
    }

    /// Total number of audit entries.
    pub fn access_count(&self) -> usize {
        self.audit.count()
    }

    /// Audit entry with the given sequence number.
    pub fn access_entry(&self, sequence: u64) -> Option<AccessLogEntry> {
        self.audit.entry(sequence)
    }

    /// Number of audit entries for the patient.
    pub fn access_count_for_patient(&self, patient: &PrincipalId) -> usize {
        self.audit.count_for_patient(patient)
    }

    /// The patient's audit entry at the given position in insertion order.
    pub fn access_entry_for_patient(
        &self,
        patient: &PrincipalId,
        index: usize,
    ) -> LedgerResult<AccessLogEntry> {
        Ok(self.audit.entry_for_patient(patient, index)?)
    }

    /// Up to `max_results` of the patient's entries in `[start, end]`, in
    /// insertion order.
    pub fn accesses_in_time_range(
        &self,
        patient: &PrincipalId,
        start: Timestamp,
        end: Timestamp,
        max_results: usize,
    ) -> LedgerResult<Vec<AccessLogEntry>> {
        Ok(self
            .audit
            .entries_in_time_range(patient, start, end, max_results)?)
    }

    /// Up to `max_results` entries recorded for the accessor, in insertion
    /// order.
    pub fn accesses_by_accessor(
        &self,
        accessor: &PrincipalId,
        max_results: usize,
    ) -> Vec<AccessLogEntry> {
        self.audit.entries_by_accessor(accessor, max_results)
    }

    // ---- Integrity operations ----

    /// Register or update the digest for a content id and emit `HashStored`
    /// or `HashUpdated` accordingly.
    pub fn store_digest(
        &self,
        content_id: impl Into<String>,
        digest: impl Into<String>,
        content_type: impl Into<String>,
        owner: PrincipalId,
        timestamp: Timestamp,
    ) -> LedgerResult<StoreOutcome> {
        let outcome = self
            .integrity
            .store_or_update(content_id, digest, content_type, owner, timestamp)?;

        let payload = match &outcome {
            StoreOutcome::Stored(record) => EventPayload::HashStored {
                content_id: record.content_id.clone(),
                digest: record.digest.clone(),
                content_type: record.content_type.clone(),
                owner: record.owner,
                timestamp: record.registered_at,
            },
            StoreOutcome::Updated { record, old_digest } => EventPayload::HashUpdated {
                content_id: record.content_id.clone(),
                old_digest: old_digest.clone(),
                new_digest: record.digest.clone(),
                content_type: record.content_type.clone(),
                timestamp: record.updated_at,
            },
        };
        self.hub.emit(payload)?;
        Ok(outcome)
    }

    /// Compare a candidate digest against the stored one. Never fails.
    pub fn verify_digest(&self, content_id: &str, candidate: &str) -> Verification {
        self.integrity.verify(content_id, candidate)
    }

    /// The full integrity record for a content id, if one exists.
    pub fn digest_details(&self, content_id: &str) -> Option<IntegrityRecord> {
        self.integrity.details(content_id)
    }

    /// Number of content ids registered by the owner.
    pub fn owned_count(&self, owner: &PrincipalId) -> usize {
        self.integrity.count_for_owner(owner)
    }

    /// The owner's content id at the given position in registration order.
    pub fn owned_id_at(&self, owner: &PrincipalId, index: usize) -> LedgerResult<String> {
        Ok(self.integrity.id_at(owner, index)?)
    }

    // ---- Notifications ----

    /// Subscribe to events matching the given filter.
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        self.hub.subscribe(filter)
    }

    /// Events recovered from the journal when this ledger was opened.
    /// Subscribers that need catch-up process these first, deduped by id.
    pub fn recovered_events(&self) -> &[LedgerEvent] {
        &self.recovered
    }

    // ---- Accessors ----

    pub fn consent(&self) -> &ConsentRegistry {
        &self.consent
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn integrity(&self) -> &IntegrityRegistry {
        &self.integrity
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrl_notify::{EventKind, Registry};
    use mrl_registry::RegistryError;
    use crate::error::LedgerError;

    fn principal(seed: u8) -> PrincipalId {
        PrincipalId::from_raw([seed; 32])
    }

    fn ms(n: u64) -> Timestamp {
        Timestamp::from_millis(n)
    }

    fn temp_ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        (dir, ledger)
    }

    /// A window closing 30 days from now, so `Timestamp::now()` checks land
    /// inside it.
    fn open_window() -> (Timestamp, Timestamp) {
        let now = Timestamp::now();
        (now, now.plus_millis(30 * 24 * 60 * 60 * 1000))
    }

    #[test]
    fn grant_check_revoke_scenario() {
        let (_dir, ledger) = temp_ledger();
        let alice = principal(1);
        let dr_bob = principal(2);
        let (from, until) = open_window();

        ledger
            .grant_consent(alice, dr_bob, AccessLevel::Full, from, until, "checkup")
            .unwrap();

        // Inside the window.
        let status = ledger.check_consent_at(alice, dr_bob, from.plus_millis(1000));
        assert!(status.valid);
        assert_eq!(status.access_level, Some(AccessLevel::Full));

        // Past the window: invalid but still present.
        let status = ledger.check_consent_at(alice, dr_bob, until.plus_millis(1));
        assert!(!status.valid);
        assert_eq!(status.access_level, Some(AccessLevel::Full));

        // Revoke, then the empty shape comes back.
        ledger.revoke_consent(alice, dr_bob).unwrap();
        let status = ledger.check_consent(alice, dr_bob);
        assert!(!status.valid);
        assert_eq!(status.access_level, None);
        assert!(status.purpose.is_empty());
    }

    #[test]
    fn store_verify_scenario() {
        let (_dir, ledger) = temp_ledger();
        let owner = principal(1);

        ledger
            .store_digest("rec-1", "abc123", "lab_result", owner, ms(1000))
            .unwrap();

        assert!(ledger.verify_digest("rec-1", "abc123").is_valid);
        assert!(!ledger.verify_digest("rec-1", "zzz").is_valid);
        // Unknown id: negative match, not an error.
        assert!(!ledger.verify_digest("unknown-id", "abc123").is_valid);
    }

    #[test]
    fn rejected_mutation_emits_nothing() {
        let (_dir, ledger) = temp_ledger();
        let mut stream = ledger.subscribe(EventFilter::default());

        let err = ledger
            .log_access(PrincipalId::null(), principal(2), "rec-1", "view", ms(1))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Registry(RegistryError::NullPrincipal { .. })
        ));
        assert!(stream.try_recv().is_err());
        assert_eq!(ledger.access_count(), 0);
    }

    #[test]
    fn each_mutation_emits_one_event() {
        let (_dir, ledger) = temp_ledger();
        let alice = principal(1);
        let dr_bob = principal(2);
        let (from, until) = open_window();

        let mut stream = ledger.subscribe(EventFilter::default());

        ledger
            .grant_consent(alice, dr_bob, AccessLevel::Limited, from, until, "visit")
            .unwrap();
        ledger
            .log_access(alice, dr_bob, "rec-1", "view", ms(1))
            .unwrap();
        ledger
            .store_digest("rec-1", "abc", "lab_result", dr_bob, ms(2))
            .unwrap();
        ledger
            .store_digest("rec-1", "def", "lab_result", dr_bob, ms(3))
            .unwrap();

        let kinds: Vec<EventKind> = (0..4).map(|_| stream.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ConsentGranted,
                EventKind::AccessLogged,
                EventKind::HashStored,
                EventKind::HashUpdated,
            ]
        );
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn hash_updated_carries_both_digests() {
        let (_dir, ledger) = temp_ledger();
        let owner = principal(1);

        let filter = EventFilter {
            kinds: Some(vec![EventKind::HashUpdated]),
            ..Default::default()
        };
        let mut stream = ledger.subscribe(filter);

        ledger
            .store_digest("rec-1", "abc", "lab_result", owner, ms(1))
            .unwrap();
        ledger
            .store_digest("rec-1", "def", "lab_result", owner, ms(2))
            .unwrap();

        let event = stream.try_recv().unwrap();
        let EventPayload::HashUpdated {
            old_digest,
            new_digest,
            ..
        } = event.payload
        else {
            panic!("expected HashUpdated");
        };
        assert_eq!(old_digest, "abc");
        assert_eq!(new_digest, "def");
    }

    #[test]
    fn audit_queries_route_through_facade() {
        let (_dir, ledger) = temp_ledger();
        let alice = principal(1);
        let dr_bob = principal(2);

        for i in 1..=5u64 {
            ledger
                .log_access(alice, dr_bob, format!("rec-{i}"), "view", ms(i * 10))
                .unwrap();
        }

        assert_eq!(ledger.access_count(), 5);
        assert_eq!(ledger.access_count_for_patient(&alice), 5);
        assert_eq!(
            ledger
                .access_entry_for_patient(&alice, 0)
                .unwrap()
                .resource_id,
            "rec-1"
        );

        let hits = ledger
            .accesses_in_time_range(&alice, ms(20), ms(40), 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].timestamp, ms(20));

        let hits = ledger.accesses_by_accessor(&dr_bob, 3);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let alice = principal(1);
        let dr_bob = principal(2);
        let (from, until) = open_window();

        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger
                .grant_consent(alice, dr_bob, AccessLevel::Full, from, until, "checkup")
                .unwrap();
            ledger
                .log_access(alice, dr_bob, "rec-1", "view", ms(1))
                .unwrap();
            ledger
                .store_digest("rec-1", "abc", "lab_result", dr_bob, ms(2))
                .unwrap();
        }

        let ledger = Ledger::open(dir.path()).unwrap();
        assert_eq!(ledger.recovered_events().len(), 3);
        assert!(ledger.has_valid_consent(alice, dr_bob));
        assert_eq!(ledger.access_count(), 1);
        assert!(ledger.verify_digest("rec-1", "abc").is_valid);

        // Appends continue from the recovered sequence.
        let entry = ledger
            .log_access(alice, dr_bob, "rec-2", "download", ms(3))
            .unwrap();
        assert_eq!(entry.sequence, 2);
    }

    #[test]
    fn revocation_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let alice = principal(1);
        let dr_bob = principal(2);
        let (from, until) = open_window();

        {
            let ledger = Ledger::open(dir.path()).unwrap();
            ledger
                .grant_consent(alice, dr_bob, AccessLevel::Full, from, until, "checkup")
                .unwrap();
            ledger.revoke_consent(alice, dr_bob).unwrap();
        }

        let ledger = Ledger::open(dir.path()).unwrap();
        assert!(!ledger.has_valid_consent(alice, dr_bob));
        assert_eq!(ledger.consent().grant_count(), 0);
    }

    #[test]
    fn registry_filter_scopes_subscription() {
        let (_dir, ledger) = temp_ledger();
        let alice = principal(1);
        let dr_bob = principal(2);
        let (from, until) = open_window();

        let filter = EventFilter {
            registries: Some(vec![Registry::Consent]),
            ..Default::default()
        };
        let mut stream = ledger.subscribe(filter);

        ledger
            .log_access(alice, dr_bob, "rec-1", "view", ms(1))
            .unwrap();
        ledger
            .grant_consent(alice, dr_bob, AccessLevel::Full, from, until, "checkup")
            .unwrap();

        let event = stream.try_recv().unwrap();
        assert_eq!(event.registry, Registry::Consent);
        assert!(stream.try_recv().is_err());
    }

    #[test]
    fn owned_enumeration_via_facade() {
        let (_dir, ledger) = temp_ledger();
        let owner = principal(1);

        ledger
            .store_digest("rec-a", "x", "note", owner, ms(1))
            .unwrap();
        ledger
            .store_digest("rec-b", "y", "note", owner, ms(2))
            .unwrap();

        assert_eq!(ledger.owned_count(&owner), 2);
        assert_eq!(ledger.owned_id_at(&owner, 1).unwrap(), "rec-b");
        assert!(ledger.owned_id_at(&owner, 2).is_err());
    }
}

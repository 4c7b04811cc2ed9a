//! Core registries for the MedRecord Ledger (MRL).
//!
//! This crate is the heart of MRL. It provides the three stores behind the
//! ledger facade, each with a single-writer boundary and all-or-nothing
//! mutation semantics:
//!
//! - [`ConsentRegistry`] — at most one active consent grant per
//!   (grantor, grantee) pair, with time-window validation
//! - [`AuditLog`] — append-only access log with per-patient and per-accessor
//!   secondary indices and bounded range queries
//! - [`IntegrityRegistry`] — one current content digest per content id, with
//!   per-owner enumeration in registration order
//!
//! Every mutating operation validates its inputs completely before touching
//! state, so a rejected call leaves the registry exactly as it was. Read
//! operations observe a consistent snapshot of the last committed state and
//! never fail for "record absent" — absence is reported as a negative or
//! empty result.

pub mod audit;
pub mod consent;
pub mod error;
pub mod integrity;

pub use audit::{AccessLogEntry, AuditLog};
pub use consent::{ConsentGrant, ConsentRegistry, ConsentStatus};
pub use error::{ErrorKind, RegistryError};
pub use integrity::{IntegrityRecord, IntegrityRegistry, StoreOutcome, Verification};

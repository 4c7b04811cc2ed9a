//! Notification channel for the MedRecord Ledger.
//!
//! Every committed mutation in the ledger produces exactly one
//! [`LedgerEvent`], persisted to a Write-Ahead Log before fan-out to
//! subscribers. Delivery is at-least-once: a crash between WAL write and
//! fan-out is healed by replaying the WAL, so consumers may see duplicates
//! and must apply events idempotently (dedupe by [`event::EventId`]).
//! Events are stamped by a Hybrid Logical Clock, so delivery within one
//! registry is ordered; ordering across registries is not guaranteed.

pub mod error;
pub mod event;
pub mod hlc;
pub mod hub;
pub mod wal;

pub use error::NotifyError;
pub use event::{EventId, EventKind, EventPayload, LedgerEvent, Registry};
pub use hlc::{EventAnchor, HybridLogicalClock};
pub use hub::{EventFilter, EventStream, HubConfig, NotificationHub};
pub use wal::{SyncMode, WalConfig, WalRetention, WriteAheadLog};

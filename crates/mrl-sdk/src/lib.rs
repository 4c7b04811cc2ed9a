//! High-level facade over the MedRecord Ledger.
//!
//! [`Ledger`] is the single atomic-operation boundary the three registries
//! share: every mutating call commits to exactly one registry, then emits
//! one notification through the hub. The facade owns the registry instances
//! and the hub — there is no ambient or global ledger state; callers hold a
//! `Ledger` handle and pass it around explicitly.

pub mod config;
pub mod error;
pub mod ledger;
mod replay;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;

//! Foundation types for the MedRecord Ledger (MRL).
//!
//! This crate provides the identity, temporal, and access-scope types used
//! throughout the MRL system. Every other MRL crate depends on `mrl-types`.
//!
//! # Key Types
//!
//! - [`PrincipalId`] — Opaque authenticated identity of an actor (patient,
//!   provider, accessor), derived from caller-supplied identity material
//! - [`Timestamp`] — Wall-clock milliseconds with a total order
//! - [`AccessLevel`] — Scope of an authorized access (Full, Limited, Temporary)

pub mod access;
pub mod error;
pub mod identity;
pub mod temporal;

pub use access::AccessLevel;
pub use error::TypeError;
pub use identity::{PrincipalId, PrincipalMaterial};
pub use temporal::Timestamp;

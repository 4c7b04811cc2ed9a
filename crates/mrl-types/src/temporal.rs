use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Wall-clock instant in milliseconds since the UNIX epoch.
///
/// Consent windows, audit entries, and integrity records all carry plain
/// wall-clock timestamps supplied by the caller (or stamped at the facade's
/// serialization point). The core never does calendar arithmetic; it only
/// compares instants, so a thin ordered wrapper over `u64` is all that is
/// needed.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds since the UNIX epoch.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create a timestamp from whole seconds since the UNIX epoch.
    pub const fn from_unix_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(millis)
    }

    /// The zero timestamp (UNIX epoch). Used as the empty/sentinel value.
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Milliseconds since the UNIX epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Returns `true` if this instant is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this instant is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// This instant shifted forward by the given number of milliseconds.
    pub const fn plus_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_millis() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(200);
        assert!(a < b);
        assert!(b.is_after(&a));
        assert!(a.is_before(&b));
    }

    #[test]
    fn equal_instants() {
        let a = Timestamp::from_millis(100);
        let b = Timestamp::from_millis(100);
        assert_eq!(a, b);
        assert!(!a.is_after(&b));
        assert!(!a.is_before(&b));
    }

    #[test]
    fn from_unix_secs_scales() {
        assert_eq!(Timestamp::from_unix_secs(2).as_millis(), 2000);
    }

    #[test]
    fn now_produces_reasonable_timestamp() {
        let now = Timestamp::now();
        // Should be after 2020-01-01 (1577836800000 ms).
        assert!(now.as_millis() > 1_577_836_800_000);
    }

    #[test]
    fn zero_is_smallest() {
        assert!(Timestamp::zero() < Timestamp::from_millis(1));
    }

    #[test]
    fn plus_millis_saturates() {
        let t = Timestamp::from_millis(u64::MAX);
        assert_eq!(t.plus_millis(10), t);
    }

    #[test]
    fn serde_roundtrip() {
        let t = Timestamp::from_millis(1234567890);
        let json = serde_json::to_string(&t).unwrap();
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(t, parsed);
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{}", Timestamp::from_millis(1000)), "1000");
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Scope of an authorized access, interpreted by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessLevel {
    /// Unrestricted access to the subject's records.
    Full,
    /// Access restricted to a caller-defined subset.
    Limited,
    /// Short-lived access for a single episode of care.
    Temporary,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Full => "full",
            Self::Limited => "limited",
            Self::Temporary => "temporary",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AccessLevel {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "limited" => Ok(Self::Limited),
            "temporary" => Ok(Self::Temporary),
            other => Err(TypeError::UnknownAccessLevel(other.to_string())),
        }
    }
}

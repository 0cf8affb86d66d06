//! Stable ID newtypes for network entities.
//!
//! All IDs are distinct newtype wrappers over `String`, providing type safety
//! so that a `ContactId` cannot be accidentally used where a `WireId` is
//! expected. Fresh IDs are random UUIDs; imported topologies may carry any
//! string (including `@`-prefixed attribute ports).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contact identifier. Unique across the whole network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactId(pub String);

/// Wire identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(pub String);

/// Group identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl ContactId {
    /// Generates a fresh random contact ID.
    pub fn generate() -> Self {
        ContactId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl WireId {
    /// Generates a fresh random wire ID.
    pub fn generate() -> Self {
        WireId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl GroupId {
    /// Generates a fresh random group ID.
    pub fn generate() -> Self {
        GroupId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Display implementations -- just print the inner value.

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContactId {
    fn from(s: &str) -> Self {
        ContactId(s.to_string())
    }
}

impl From<&str> for WireId {
    fn from(s: &str) -> Self {
        WireId(s.to_string())
    }
}

impl From<&str> for GroupId {
    fn from(s: &str) -> Self {
        GroupId(s.to_string())
    }
}

//! Storage-layer types.
//!
//! [`NetworkId`] lives here rather than in bassline-core: a network only
//! needs a name once something persists it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name under which a network is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub String);

impl NetworkId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        NetworkId(s.to_string())
    }
}

//! Wires: edges between contacts.
//!
//! A [`Wire`] is owned by a group (usually the nearest common ancestor of its
//! endpoints' groups). [`WireType::Directed`] wires carry values only from
//! `from_id` to `to_id`; [`WireType::Bidirectional`] wires carry them both ways.

use serde::{Deserialize, Serialize};

use crate::id::{ContactId, GroupId, WireId};

/// Directionality of a wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    #[default]
    Bidirectional,
    Directed,
}

/// An edge between two contacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    pub id: WireId,
    pub group_id: GroupId,
    pub from_id: ContactId,
    pub to_id: ContactId,
    #[serde(default, rename = "type")]
    pub wire_type: WireType,
}

impl Wire {
    /// Creates a wire with a fresh ID.
    pub fn new(group_id: GroupId, from_id: ContactId, to_id: ContactId, wire_type: WireType) -> Self {
        Wire {
            id: WireId::generate(),
            group_id,
            from_id,
            to_id,
            wire_type,
        }
    }

    /// Returns `true` if this wire touches `contact`.
    pub fn touches(&self, contact: &ContactId) -> bool {
        &self.from_id == contact || &self.to_id == contact
    }

    /// The endpoint a value leaves towards when it enters the wire at
    /// `source`, honoring directionality. `None` if `source` cannot emit
    /// through this wire.
    pub fn target_from(&self, source: &ContactId) -> Option<&ContactId> {
        if &self.from_id == source {
            Some(&self.to_id)
        } else if &self.to_id == source && self.wire_type == WireType::Bidirectional {
            Some(&self.from_id)
        } else {
            None
        }
    }
}

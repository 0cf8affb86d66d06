//! Contacts: the value cells of a propagation network.
//!
//! A [`Contact`] holds an opaque JSON content value and a [`BlendMode`]
//! deciding how incoming values combine with it. Boundary contacts form the
//! interface of their owning group and carry a [`BoundaryDirection`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{ContactId, GroupId};

/// Per-contact merge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// Incoming value unconditionally replaces the current one.
    #[default]
    AcceptLast,
    /// Incoming and current values are joined through the lattice registry.
    Merge,
}

/// Which side of a group boundary feeds a boundary contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryDirection {
    /// External wires feed the contact.
    Input,
    /// External wires read from the contact.
    Output,
}

/// The last failed merge observed at a contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContradictionRecord {
    pub message: String,
    /// Content held by the contact when the merge failed.
    pub current: Value,
    /// The value that could not be merged.
    pub incoming: Value,
}

/// A named value cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    pub group_id: GroupId,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default)]
    pub is_boundary: bool,
    /// Meaningful only when `is_boundary` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary_direction: Option<BoundaryDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_contradiction: Option<ContradictionRecord>,
}

impl Contact {
    /// Creates an empty accept-last contact with a fresh ID.
    pub fn new(group_id: GroupId) -> Self {
        Contact::with_id(ContactId::generate(), group_id)
    }

    /// Creates an empty accept-last contact with the given ID.
    pub fn with_id(id: ContactId, group_id: GroupId) -> Self {
        Contact {
            id,
            group_id,
            content: Value::Null,
            blend_mode: BlendMode::AcceptLast,
            is_boundary: false,
            boundary_direction: None,
            name: None,
            attributes: IndexMap::new(),
            last_contradiction: None,
        }
    }

    /// Creates a boundary contact with a fresh ID.
    pub fn boundary(group_id: GroupId, direction: BoundaryDirection) -> Self {
        let mut contact = Contact::new(group_id);
        contact.is_boundary = true;
        contact.boundary_direction = Some(direction);
        contact
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The boundary direction, if this is a boundary contact.
    pub fn direction(&self) -> Option<BoundaryDirection> {
        if self.is_boundary {
            self.boundary_direction
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blend_mode_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(BlendMode::AcceptLast).unwrap(),
            json!("accept-last")
        );
        assert_eq!(serde_json::to_value(BlendMode::Merge).unwrap(), json!("merge"));
    }

    #[test]
    fn contact_json_uses_camel_case() {
        let contact = Contact::boundary(GroupId::from("g"), BoundaryDirection::Input);
        let json = serde_json::to_value(&contact).unwrap();
        assert_eq!(json["groupId"], json!("g"));
        assert_eq!(json["isBoundary"], json!(true));
        assert_eq!(json["boundaryDirection"], json!("input"));
        assert!(json.get("lastContradiction").is_none());
    }

    #[test]
    fn direction_ignored_for_non_boundary() {
        let mut contact = Contact::new(GroupId::from("g"));
        contact.boundary_direction = Some(BoundaryDirection::Output);
        assert_eq!(contact.direction(), None);
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let contact: Contact =
            serde_json::from_value(json!({"id": "c", "groupId": "g"})).unwrap();
        assert_eq!(contact.content, Value::Null);
        assert_eq!(contact.blend_mode, BlendMode::AcceptLast);
        assert!(!contact.is_boundary);
    }
}

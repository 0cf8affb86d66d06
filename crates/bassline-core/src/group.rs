//! Groups: namespaces owning contacts, wires and subgroups.
//!
//! [`Group`] is the descriptor (ordered ID lists, parent link, boundary
//! interface); [`GroupState`] pairs it with the owned contact and wire maps.
//! Groups form a tree rooted at the network's root group.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contact::Contact;
use crate::id::{ContactId, GroupId, WireId};
use crate::wire::Wire;

/// A group descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    /// `None` only for the root group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<GroupId>,
    #[serde(default)]
    pub contact_ids: Vec<ContactId>,
    #[serde(default)]
    pub wire_ids: Vec<WireId>,
    #[serde(default)]
    pub subgroup_ids: Vec<GroupId>,
    /// Subset of `contact_ids` exposed to the parent.
    #[serde(default)]
    pub boundary_contact_ids: Vec<ContactId>,
    /// Marks a built-in computed gadget (e.g. `"adder"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primitive: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, Value>,
}

impl Group {
    /// Creates an empty group with a fresh ID.
    pub fn new(name: impl Into<String>, parent_id: Option<GroupId>) -> Self {
        Group::with_id(GroupId::generate(), name, parent_id)
    }

    /// Creates an empty group with the given ID.
    pub fn with_id(id: GroupId, name: impl Into<String>, parent_id: Option<GroupId>) -> Self {
        Group {
            id,
            name: name.into(),
            parent_id,
            contact_ids: Vec::new(),
            wire_ids: Vec::new(),
            subgroup_ids: Vec::new(),
            boundary_contact_ids: Vec::new(),
            primitive: None,
            attributes: IndexMap::new(),
        }
    }

    /// A copy of this descriptor with all ownership lists emptied.
    ///
    /// Used when a group is re-registered into a store that rebuilds the
    /// lists itself.
    pub fn emptied(&self) -> Group {
        Group {
            contact_ids: Vec::new(),
            wire_ids: Vec::new(),
            subgroup_ids: Vec::new(),
            boundary_contact_ids: Vec::new(),
            ..self.clone()
        }
    }
}

/// A group together with the contacts and wires it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    pub group: Group,
    pub contacts: IndexMap<ContactId, Contact>,
    pub wires: IndexMap<WireId, Wire>,
}

impl GroupState {
    pub fn new(group: Group) -> Self {
        GroupState {
            group,
            contacts: IndexMap::new(),
            wires: IndexMap::new(),
        }
    }

    /// Boundary contacts in declaration order.
    pub fn boundary_contacts(&self) -> impl Iterator<Item = &Contact> {
        self.group
            .boundary_contact_ids
            .iter()
            .filter_map(|id| self.contacts.get(id))
    }
}

//! Change records: minimal deltas describing observed mutations.
//!
//! [`Change`] is emitted by propagation and by the scheduler's structural
//! operations; [`RefactoringChange`] is emitted by the refactoring
//! operations. Both can be replayed against a mirror [`NetworkState`] with
//! `apply`, so a remote cache converges without re-sending whole states.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contact::{Contact, ContradictionRecord};
use crate::error::CoreError;
use crate::group::Group;
use crate::id::{ContactId, GroupId, WireId};
use crate::network::NetworkState;
use crate::wire::Wire;

/// One observed mutation of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Change {
    ContactAdded {
        group_id: GroupId,
        contact: Contact,
    },
    /// New content, or a failed merge when `last_contradiction` is set (the
    /// content is then the unchanged current value).
    ContactUpdated {
        group_id: GroupId,
        contact_id: ContactId,
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_contradiction: Option<ContradictionRecord>,
    },
    ContactRemoved {
        group_id: GroupId,
        contact_id: ContactId,
    },
    WireAdded {
        group_id: GroupId,
        wire: Wire,
    },
    WireRemoved {
        group_id: GroupId,
        wire_id: WireId,
    },
    /// The group descriptor carries its parent link; ownership lists are
    /// rebuilt by the receiver as later changes arrive.
    GroupAdded {
        group: Group,
    },
    GroupRemoved {
        group_id: GroupId,
    },
}

impl Change {
    /// The group this change concerns.
    pub fn group_id(&self) -> &GroupId {
        match self {
            Change::ContactAdded { group_id, .. }
            | Change::ContactUpdated { group_id, .. }
            | Change::ContactRemoved { group_id, .. }
            | Change::WireAdded { group_id, .. }
            | Change::WireRemoved { group_id, .. }
            | Change::GroupRemoved { group_id } => group_id,
            Change::GroupAdded { group } => &group.id,
        }
    }

    /// Replays this change against a mirror.
    pub fn apply(&self, state: &mut NetworkState) -> Result<(), CoreError> {
        match self {
            Change::ContactAdded { group_id, contact } => {
                state.add_contact(group_id, contact.clone())?;
            }
            Change::ContactUpdated {
                contact_id,
                content,
                last_contradiction,
                ..
            } => {
                state.set_contact_content(contact_id, content.clone())?;
                state.set_last_contradiction(contact_id, last_contradiction.clone())?;
            }
            Change::ContactRemoved { contact_id, .. } => {
                state.remove_contact(contact_id)?;
            }
            Change::WireAdded { wire, .. } => {
                state.add_wire(wire.clone())?;
            }
            Change::WireRemoved { wire_id, .. } => {
                state.remove_wire(wire_id)?;
            }
            Change::GroupAdded { group } => {
                state.add_group(group.clone())?;
            }
            Change::GroupRemoved { group_id } => {
                state.remove_group(group_id)?;
            }
        }
        Ok(())
    }
}

/// One elementary edit made by a refactoring operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum RefactoringChange {
    GroupCreated {
        group: Group,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        copied_from: Option<GroupId>,
    },
    ContactCreated {
        contact: Contact,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        copied_from: Option<ContactId>,
    },
    ContactMoved {
        contact_id: ContactId,
        from_group_id: GroupId,
        to_group_id: GroupId,
    },
    WireCreated {
        wire: Wire,
    },
    WireMoved {
        wire_id: WireId,
        from_group_id: GroupId,
        to_group_id: GroupId,
    },
    /// The wire's endpoints became `from_id`/`to_id`.
    WireRewired {
        wire_id: WireId,
        from_id: ContactId,
        to_id: ContactId,
    },
}

impl RefactoringChange {
    /// Replays this edit against a mirror.
    pub fn apply(&self, state: &mut NetworkState) -> Result<(), CoreError> {
        match self {
            RefactoringChange::GroupCreated { group, .. } => {
                state.add_group(group.clone())?;
            }
            RefactoringChange::ContactCreated { contact, .. } => {
                state.add_contact(&contact.group_id.clone(), contact.clone())?;
            }
            RefactoringChange::ContactMoved {
                contact_id,
                to_group_id,
                ..
            } => {
                state.move_contact(contact_id, to_group_id)?;
            }
            RefactoringChange::WireCreated { wire } => {
                state.add_wire(wire.clone())?;
            }
            RefactoringChange::WireMoved {
                wire_id,
                to_group_id,
                ..
            } => {
                state.move_wire(wire_id, to_group_id)?;
            }
            RefactoringChange::WireRewired {
                wire_id,
                from_id,
                to_id,
            } => {
                state.rewire(wire_id, from_id.clone(), to_id.clone())?;
            }
        }
        Ok(())
    }
}

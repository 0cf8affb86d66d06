//! Composition of stored records into a [`NetworkState`].
//!
//! Both backends keep the same three layers per network: the last full
//! snapshot, group states saved after it, and contact contents saved after
//! those. [`compose`] applies them in that order, newest wins.

use serde_json::Value;

use bassline_core::network::NetworkSnapshot;
use bassline_core::{ContactId, GroupState, NetworkState};

use crate::error::StorageError;

/// Builds the current network from a snapshot and the later partial saves.
///
/// `groups` and `contents` must be in save order. A group state replaces the
/// snapshot's copy of that group; contacts or wires it owns are taken away
/// from whichever group held them before. A group unknown to the snapshot is
/// attached under its parent. Content for contacts that no longer exist is
/// skipped. Content saves are successful writes, so they clear any
/// contradiction the group state recorded.
pub fn compose(
    base: NetworkState,
    groups: Vec<GroupState>,
    contents: Vec<(ContactId, Value)>,
) -> Result<NetworkState, StorageError> {
    let mut snapshot = NetworkSnapshot::from(base);

    for gs in groups {
        let group_id = gs.group.id.clone();
        for other in snapshot.groups.values_mut() {
            if other.group.id == group_id {
                continue;
            }
            for contact_id in gs.contacts.keys() {
                if other.contacts.shift_remove(contact_id).is_some() {
                    other.group.contact_ids.retain(|c| c != contact_id);
                    other.group.boundary_contact_ids.retain(|c| c != contact_id);
                }
            }
            for wire_id in gs.wires.keys() {
                if other.wires.shift_remove(wire_id).is_some() {
                    other.group.wire_ids.retain(|w| w != wire_id);
                }
            }
        }
        match &gs.group.parent_id {
            Some(parent_id) => {
                let parent = snapshot.groups.get_mut(parent_id).ok_or_else(|| {
                    StorageError::Reconstruction {
                        reason: format!("group {group_id} saved under unknown parent {parent_id}"),
                    }
                })?;
                if !parent.group.subgroup_ids.contains(&group_id) {
                    parent.group.subgroup_ids.push(group_id.clone());
                }
            }
            None if group_id != snapshot.root_group_id => {
                return Err(StorageError::Reconstruction {
                    reason: format!("group {group_id} has no parent and is not the root"),
                });
            }
            None => {}
        }
        snapshot.groups.insert(group_id, gs);
    }

    let mut state = NetworkState::try_from(snapshot)?;
    for (contact_id, content) in contents {
        if state.get_contact(&contact_id).is_none() {
            tracing::debug!(contact = %contact_id, "stored content for missing contact skipped");
            continue;
        }
        state.set_contact_content(&contact_id, content)?;
        state.set_last_contradiction(&contact_id, None)?;
    }
    Ok(state)
}

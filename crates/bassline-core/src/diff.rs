//! Expressing a state replacement as [`Change`]s.
//!
//! Refactorings and imports swap in a whole new [`NetworkState`]. [`diff`]
//! turns the swap into the change log a mirror of `before` can replay to
//! reach `after`: removals first (wires, then contacts, then groups), then
//! additions parents-first (groups, contacts, wires), then content updates.
//! Moved entities are removed and added again; a wire touching a moved
//! contact is re-sent with it.

use std::collections::HashSet;

use crate::change::Change;
use crate::contact::Contact;
use crate::error::CoreError;
use crate::id::{ContactId, GroupId};
use crate::network::NetworkState;

/// Changes taking a mirror of `before` to `after`.
///
/// Both states must share a root group; a mirror cannot replace its root.
pub fn diff(before: &NetworkState, after: &NetworkState) -> Result<Vec<Change>, CoreError> {
    if before.root_group_id() != after.root_group_id() {
        return Err(CoreError::RootMismatch {
            expected: before.root_group_id().clone(),
            found: after.root_group_id().clone(),
        });
    }

    // Groups whose mirror copy cannot stay: gone, reparented, or under such a group.
    let mut displaced_groups: HashSet<GroupId> = HashSet::new();
    for group_id in before.subtree(before.root_group_id()) {
        let Some(gs) = before.get_group(&group_id) else {
            continue;
        };
        let parent_displaced = gs
            .group
            .parent_id
            .as_ref()
            .is_some_and(|p| displaced_groups.contains(p));
        let kept = after
            .get_group(&group_id)
            .is_some_and(|now| now.group.parent_id == gs.group.parent_id);
        if parent_displaced || !kept {
            displaced_groups.insert(group_id);
        }
    }

    let displaced_contacts: HashSet<&ContactId> = before
        .contacts()
        .filter(|c| displaced_groups.contains(&c.group_id) || after.contact_group(&c.id) != Some(&c.group_id))
        .map(|c| &c.id)
        .collect();

    let mut log = Vec::new();
    let mut resent_wires = HashSet::new();
    for wire in before.wires() {
        let unchanged = !displaced_groups.contains(&wire.group_id)
            && !displaced_contacts.contains(&wire.from_id)
            && !displaced_contacts.contains(&wire.to_id)
            && after.get_wire(&wire.id) == Some(wire);
        if !unchanged {
            resent_wires.insert(wire.id.clone());
            log.push(Change::WireRemoved {
                group_id: wire.group_id.clone(),
                wire_id: wire.id.clone(),
            });
        }
    }
    for contact in before.contacts() {
        if displaced_contacts.contains(&contact.id) {
            log.push(Change::ContactRemoved {
                group_id: contact.group_id.clone(),
                contact_id: contact.id.clone(),
            });
        }
    }
    for group_id in before.subtree(before.root_group_id()) {
        if !displaced_groups.contains(&group_id) {
            continue;
        }
        let parent_displaced = before
            .get_group(&group_id)
            .and_then(|gs| gs.group.parent_id.as_ref())
            .is_some_and(|p| displaced_groups.contains(p));
        if !parent_displaced {
            log.push(Change::GroupRemoved { group_id });
        }
    }

    let order = after.subtree(after.root_group_id());
    for group_id in &order {
        let Some(gs) = after.get_group(group_id) else {
            continue;
        };
        if before.get_group(group_id).is_none() || displaced_groups.contains(group_id) {
            log.push(Change::GroupAdded {
                group: gs.group.emptied(),
            });
        }
    }

    let mut updates = Vec::new();
    for group_id in &order {
        let Some(gs) = after.get_group(group_id) else {
            continue;
        };
        for contact in gs.group.contact_ids.iter().filter_map(|id| gs.contacts.get(id)) {
            match before.get_contact(&contact.id) {
                Some(old) if !displaced_contacts.contains(&old.id) => {
                    if let Some(update) = content_update(old, contact) {
                        updates.push(update);
                    }
                }
                _ => log.push(Change::ContactAdded {
                    group_id: group_id.clone(),
                    contact: contact.clone(),
                }),
            }
        }
    }
    for group_id in &order {
        let Some(gs) = after.get_group(group_id) else {
            continue;
        };
        for wire in gs.group.wire_ids.iter().filter_map(|id| gs.wires.get(id)) {
            if before.get_wire(&wire.id).is_none() || resent_wires.contains(&wire.id) {
                log.push(Change::WireAdded {
                    group_id: group_id.clone(),
                    wire: wire.clone(),
                });
            }
        }
    }
    log.extend(updates);
    Ok(log)
}

fn content_update(old: &Contact, new: &Contact) -> Option<Change> {
    if old.content == new.content && old.last_contradiction == new.last_contradiction {
        return None;
    }
    Some(Change::ContactUpdated {
        group_id: new.group_id.clone(),
        contact_id: new.id.clone(),
        content: new.content.clone(),
        last_contradiction: new.last_contradiction.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::BoundaryDirection;
    use crate::group::Group;
    use crate::id::WireId;
    use crate::wire::{Wire, WireType};
    use serde_json::json;

    fn root() -> GroupId {
        GroupId::from("root")
    }

    fn base() -> NetworkState {
        let mut state = NetworkState::with_root(root(), "root");
        state.add_group(Group::with_id(GroupId::from("g"), "g", Some(root()))).unwrap();
        for (id, group) in [("a", "root"), ("b", "root"), ("c", "g")] {
            let group = GroupId::from(group);
            state.add_contact(&group, Contact::with_id(ContactId::from(id), group.clone())).unwrap();
        }
        let mut wire = Wire::new(root(), ContactId::from("a"), ContactId::from("b"), WireType::Directed);
        wire.id = WireId::from("ab");
        state.add_wire(wire).unwrap();
        state
    }

    /// Every contact and wire with its owner, order aside.
    fn placement(state: &NetworkState) -> (Vec<String>, Vec<String>, usize) {
        let mut contacts: Vec<String> = state
            .contacts()
            .map(|c| format!("{}@{}={}:{:?}", c.id, c.group_id, c.content, c.direction()))
            .collect();
        let mut wires: Vec<String> = state
            .wires()
            .map(|w| format!("{}@{}:{}->{}", w.id, w.group_id, w.from_id, w.to_id))
            .collect();
        contacts.sort();
        wires.sort();
        (contacts, wires, state.group_count())
    }

    fn replayed(before: &NetworkState, after: &NetworkState) -> NetworkState {
        let mut mirror = before.clone();
        for change in diff(before, after).unwrap() {
            change.apply(&mut mirror).unwrap();
        }
        mirror
    }

    #[test]
    fn identical_states_differ_by_nothing() {
        let state = base();
        assert!(diff(&state, &state.clone()).unwrap().is_empty());
    }

    #[test]
    fn moves_rewires_and_new_groups_replay() {
        let before = base();
        let mut after = before.clone();
        let inner = after.add_group(Group::with_id(GroupId::from("inner"), "inner", Some(root()))).unwrap();
        after.move_contact(&ContactId::from("b"), &inner).unwrap();
        let port = after
            .add_contact(&inner, Contact::boundary(inner.clone(), BoundaryDirection::Input))
            .unwrap();
        after.rewire(&WireId::from("ab"), ContactId::from("a"), port.clone()).unwrap();
        after
            .add_wire(Wire::new(inner.clone(), port, ContactId::from("b"), WireType::Bidirectional))
            .unwrap();
        after.set_contact_content(&ContactId::from("c"), json!(7)).unwrap();

        let changes = diff(&before, &after).unwrap();
        assert!(changes.iter().any(|c| matches!(c, Change::GroupAdded { group } if group.id == inner)));
        assert!(matches!(changes.last(), Some(Change::ContactUpdated { content, .. }) if content == &json!(7)));
        assert_eq!(placement(&replayed(&before, &after)), placement(&after));
    }

    #[test]
    fn removed_subtrees_replay() {
        let before = base();
        let mut after = before.clone();
        after.remove_group(&GroupId::from("g")).unwrap();
        after.remove_contact(&ContactId::from("a")).unwrap();

        let changes = diff(&before, &after).unwrap();
        assert_eq!(
            changes
                .iter()
                .filter(|c| matches!(c, Change::GroupRemoved { .. }))
                .count(),
            1
        );
        assert_eq!(placement(&replayed(&before, &after)), placement(&after));
    }

    #[test]
    fn different_roots_cannot_be_diffed() {
        let other = NetworkState::with_root(GroupId::from("elsewhere"), "root");
        assert!(matches!(diff(&base(), &other), Err(CoreError::RootMismatch { .. })));
    }
}

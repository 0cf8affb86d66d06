//! Extract-to-group: move a set of contacts into a new child group and give
//! it a boundary interface for the wires that crossed the cut.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{CopyMaps, RefactorResult};
use crate::change::RefactoringChange;
use crate::contact::{BoundaryDirection, Contact};
use crate::error::CoreError;
use crate::group::Group;
use crate::id::{ContactId, GroupId};
use crate::network::NetworkState;
use crate::wire::{Wire, WireType};

/// How a contact inside the cut is reached from outside.
#[derive(Debug, Default)]
struct Crossing {
    incoming: bool,
    outgoing: bool,
    bidirectional: bool,
}

/// Moves `contact_ids` into a new group named `group_name` under
/// `parent_group_id`.
///
/// Wires touching the moved set are classified as internal (both ends
/// moved), incoming (external -> moved) or outgoing (moved -> external).
/// Internal wires move into the new group. Each distinct moved contact on a
/// crossing wire gets one boundary contact: `input` for incoming targets,
/// `output` for outgoing sources, and a single shared `input` boundary when
/// a contact is both. The crossing wires are rewired to end at the boundary
/// contact, which is wired to the moved contact inside the group.
pub fn extract_to_group(
    state: &NetworkState,
    contact_ids: &[ContactId],
    group_name: &str,
    parent_group_id: &GroupId,
) -> Result<RefactorResult, CoreError> {
    if contact_ids.is_empty() {
        return Err(CoreError::InvalidSelection {
            reason: "no contacts to extract".to_string(),
        });
    }
    if state.get_group(parent_group_id).is_none() {
        return Err(CoreError::GroupNotFound {
            id: parent_group_id.clone(),
        });
    }
    let mut selected: Vec<ContactId> = Vec::with_capacity(contact_ids.len());
    for id in contact_ids {
        if state.get_contact(id).is_none() {
            return Err(CoreError::ContactNotFound { id: id.clone() });
        }
        if !selected.contains(id) {
            selected.push(id.clone());
        }
    }
    let moved: HashSet<&ContactId> = selected.iter().collect();

    let mut next = state.clone();
    let mut changes = Vec::new();

    let group = Group::new(group_name, Some(parent_group_id.clone()));
    let group_id = next.add_group(group.clone())?;
    changes.push(RefactoringChange::GroupCreated {
        group,
        copied_from: None,
    });

    for id in &selected {
        let from_group_id = next
            .contact_group(id)
            .cloned()
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        next.move_contact(id, &group_id)?;
        changes.push(RefactoringChange::ContactMoved {
            contact_id: id.clone(),
            from_group_id,
            to_group_id: group_id.clone(),
        });
    }

    let mut internal = Vec::new();
    let mut incoming = Vec::new();
    let mut outgoing = Vec::new();
    let mut crossings: IndexMap<ContactId, Crossing> = IndexMap::new();
    for wire in state.wires() {
        let from_in = moved.contains(&wire.from_id);
        let to_in = moved.contains(&wire.to_id);
        let bidirectional = wire.wire_type == WireType::Bidirectional;
        match (from_in, to_in) {
            (true, true) => internal.push(wire.clone()),
            (false, true) => {
                let crossing = crossings.entry(wire.to_id.clone()).or_default();
                crossing.incoming = true;
                crossing.bidirectional |= bidirectional;
                incoming.push(wire.clone());
            }
            (true, false) => {
                let crossing = crossings.entry(wire.from_id.clone()).or_default();
                crossing.outgoing = true;
                crossing.bidirectional |= bidirectional;
                outgoing.push(wire.clone());
            }
            (false, false) => {}
        }
    }
    // Incoming targets get their boundary before outgoing-only sources.
    crossings.sort_by(|_, a, _, b| b.incoming.cmp(&a.incoming));

    for wire in &internal {
        next.move_wire(&wire.id, &group_id)?;
        changes.push(RefactoringChange::WireMoved {
            wire_id: wire.id.clone(),
            from_group_id: wire.group_id.clone(),
            to_group_id: group_id.clone(),
        });
    }

    let mut boundary_of: IndexMap<ContactId, ContactId> = IndexMap::new();
    for (inner_id, crossing) in &crossings {
        let inner = state
            .get_contact(inner_id)
            .ok_or_else(|| CoreError::ContactNotFound { id: inner_id.clone() })?;
        let direction = if crossing.incoming {
            BoundaryDirection::Input
        } else {
            BoundaryDirection::Output
        };
        let mut boundary = Contact::boundary(group_id.clone(), direction)
            .with_content(inner.content.clone());
        boundary.name = inner.name.clone();
        let boundary_id = next.add_contact(&group_id, boundary.clone())?;
        changes.push(RefactoringChange::ContactCreated {
            contact: boundary,
            copied_from: None,
        });

        let shared = crossing.incoming && crossing.outgoing;
        let wire_type = if shared || crossing.bidirectional {
            WireType::Bidirectional
        } else {
            WireType::Directed
        };
        let link = if crossing.incoming {
            Wire::new(group_id.clone(), boundary_id.clone(), inner_id.clone(), wire_type)
        } else {
            Wire::new(group_id.clone(), inner_id.clone(), boundary_id.clone(), wire_type)
        };
        next.add_wire(link.clone())?;
        changes.push(RefactoringChange::WireCreated { wire: link });
        boundary_of.insert(inner_id.clone(), boundary_id);
    }

    for wire in &incoming {
        let boundary = boundary_of[&wire.to_id].clone();
        next.rewire(&wire.id, wire.from_id.clone(), boundary.clone())?;
        changes.push(RefactoringChange::WireRewired {
            wire_id: wire.id.clone(),
            from_id: wire.from_id.clone(),
            to_id: boundary,
        });
    }
    for wire in &outgoing {
        let boundary = boundary_of[&wire.from_id].clone();
        next.rewire(&wire.id, boundary.clone(), wire.to_id.clone())?;
        changes.push(RefactoringChange::WireRewired {
            wire_id: wire.id.clone(),
            from_id: boundary,
            to_id: wire.to_id.clone(),
        });
    }

    tracing::debug!(
        group = %group_id,
        contacts = selected.len(),
        internal = internal.len(),
        incoming = incoming.len(),
        outgoing = outgoing.len(),
        "extracted contacts to group"
    );

    Ok(RefactorResult {
        state: next,
        changes,
        group_id: Some(group_id),
        maps: CopyMaps::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contact::BlendMode;
    use serde_json::json;

    fn chain() -> NetworkState {
        // A(ext) -> B -> C -> D(ext), all directed
        let mut state = NetworkState::with_root(GroupId::from("root"), "root");
        let root = state.root_group_id().clone();
        for id in ["A", "B", "C", "D"] {
            state
                .add_contact(&root, Contact::with_id(ContactId::from(id), root.clone()))
                .unwrap();
        }
        for (from, to) in [("A", "B"), ("B", "C"), ("C", "D")] {
            state
                .add_wire(Wire::new(
                    root.clone(),
                    ContactId::from(from),
                    ContactId::from(to),
                    WireType::Directed,
                ))
                .unwrap();
        }
        state
    }

    fn ids(names: &[&str]) -> Vec<ContactId> {
        names.iter().map(|n| ContactId::from(*n)).collect()
    }

    fn wire_between<'a>(state: &'a NetworkState, from: &ContactId, to: &ContactId) -> Option<&'a Wire> {
        state.wires().find(|w| &w.from_id == from && &w.to_id == to)
    }

    #[test]
    fn extract_creates_one_input_and_one_output_boundary() {
        let state = chain();
        let root = state.root_group_id().clone();
        let result = extract_to_group(&state, &ids(&["B", "C"]), "middle", &root).unwrap();
        let next = &result.state;
        let group_id = result.group_id.clone().unwrap();
        let gs = next.get_group(&group_id).unwrap();

        assert_eq!(gs.group.parent_id.as_ref(), Some(&root));
        assert_eq!(gs.contacts.len(), 4);
        let boundaries: Vec<&Contact> = gs.boundary_contacts().collect();
        assert_eq!(boundaries.len(), 2);
        let input = boundaries
            .iter()
            .find(|c| c.direction() == Some(BoundaryDirection::Input))
            .unwrap();
        let output = boundaries
            .iter()
            .find(|c| c.direction() == Some(BoundaryDirection::Output))
            .unwrap();

        let (a, b, c, d) = (
            ContactId::from("A"),
            ContactId::from("B"),
            ContactId::from("C"),
            ContactId::from("D"),
        );
        // External wires now end at the boundary contacts.
        assert!(wire_between(next, &a, &input.id).is_some());
        assert!(wire_between(next, &output.id, &d).is_some());
        assert!(wire_between(next, &a, &b).is_none());
        assert!(wire_between(next, &c, &d).is_none());
        // Inside the group: boundary -> B -> C -> boundary.
        let inner_in = wire_between(next, &input.id, &b).unwrap();
        assert_eq!(inner_in.group_id, group_id);
        let inner_out = wire_between(next, &c, &output.id).unwrap();
        assert_eq!(inner_out.group_id, group_id);
        assert_eq!(wire_between(next, &b, &c).unwrap().group_id, group_id);
        // External wires stay owned by the root.
        assert_eq!(wire_between(next, &a, &input.id).unwrap().group_id, root);
        assert_eq!(next.get_group(&root).unwrap().contacts.len(), 2);
    }

    #[test]
    fn input_state_is_untouched() {
        let state = chain();
        let before = state.clone();
        let root = state.root_group_id().clone();
        extract_to_group(&state, &ids(&["B", "C"]), "middle", &root).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn contact_both_fed_and_read_shares_one_boundary() {
        // A -> B -> D with only B extracted.
        let mut state = NetworkState::with_root(GroupId::from("root"), "root");
        let root = state.root_group_id().clone();
        for id in ["A", "B", "D"] {
            state
                .add_contact(&root, Contact::with_id(ContactId::from(id), root.clone()))
                .unwrap();
        }
        for (from, to) in [("A", "B"), ("B", "D")] {
            state
                .add_wire(Wire::new(root.clone(), ContactId::from(from), ContactId::from(to), WireType::Directed))
                .unwrap();
        }

        let result = extract_to_group(&state, &ids(&["B"]), "solo", &root).unwrap();
        let gs = result.state.get_group(result.group_id.as_ref().unwrap()).unwrap();
        assert_eq!(gs.group.boundary_contact_ids.len(), 1);
        let boundary = &gs.group.boundary_contact_ids[0];
        let link = wire_between(&result.state, boundary, &ContactId::from("B")).unwrap();
        assert_eq!(link.wire_type, WireType::Bidirectional);
        assert!(wire_between(&result.state, &ContactId::from("A"), boundary).is_some());
        assert!(wire_between(&result.state, boundary, &ContactId::from("D")).is_some());
    }

    #[test]
    fn boundary_inherits_content() {
        let mut state = chain();
        state
            .set_contact_content(&ContactId::from("B"), json!("seeded"))
            .unwrap();
        let root = state.root_group_id().clone();
        let result = extract_to_group(&state, &ids(&["B", "C"]), "g", &root).unwrap();
        let gs = result.state.get_group(result.group_id.as_ref().unwrap()).unwrap();
        let input = gs
            .boundary_contacts()
            .find(|c| c.direction() == Some(BoundaryDirection::Input))
            .unwrap();
        assert_eq!(input.content, json!("seeded"));
        assert_eq!(input.blend_mode, BlendMode::AcceptLast);
    }

    #[test]
    fn unknown_contact_is_rejected() {
        let state = chain();
        let root = state.root_group_id().clone();
        let err = extract_to_group(&state, &ids(&["B", "nope"]), "g", &root).unwrap_err();
        assert_eq!(err, CoreError::ContactNotFound { id: ContactId::from("nope") });
    }

    #[test]
    fn empty_selection_is_rejected() {
        let state = chain();
        let root = state.root_group_id().clone();
        assert!(matches!(
            extract_to_group(&state, &[], "g", &root),
            Err(CoreError::InvalidSelection { .. })
        ));
    }

    #[test]
    fn change_log_replays_to_same_state() {
        let state = chain();
        let root = state.root_group_id().clone();
        let result = extract_to_group(&state, &ids(&["B", "C"]), "middle", &root).unwrap();
        let mut mirror = state.clone();
        result.replay(&mut mirror).unwrap();
        assert_eq!(mirror, result.state);
    }
}

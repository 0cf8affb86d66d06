//! Copy operations: copy-group, copy-contacts and copy-selection.
//!
//! Copies get fresh IDs throughout. Wires are only recreated when both
//! endpoints were copied; a wire reaching outside the copied material is
//! dropped.

use std::collections::{HashMap, HashSet};

use super::{CopyMaps, RefactorResult};
use crate::change::RefactoringChange;
use crate::contact::Contact;
use crate::error::CoreError;
use crate::group::Group;
use crate::id::{ContactId, GroupId, WireId};
use crate::network::NetworkState;
use crate::wire::Wire;

/// Accumulates the edit while copying into `next`.
struct CopyJob<'a> {
    source: &'a NetworkState,
    next: NetworkState,
    changes: Vec<RefactoringChange>,
    maps: CopyMaps,
}

impl<'a> CopyJob<'a> {
    fn new(source: &'a NetworkState) -> Self {
        CopyJob {
            source,
            next: source.clone(),
            changes: Vec::new(),
            maps: CopyMaps::default(),
        }
    }

    fn finish(self, group_id: Option<GroupId>) -> RefactorResult {
        RefactorResult {
            state: self.next,
            changes: self.changes,
            group_id,
            maps: self.maps,
        }
    }

    /// Copies one contact into `target`, recording the mapping.
    fn copy_contact(
        &mut self,
        original: &Contact,
        target: &GroupId,
        keep_boundary: bool,
    ) -> Result<ContactId, CoreError> {
        let mut copy = original.clone();
        copy.id = ContactId::generate();
        copy.group_id = target.clone();
        copy.last_contradiction = None;
        if !keep_boundary {
            copy.is_boundary = false;
            copy.boundary_direction = None;
        }
        let id = self.next.add_contact(target, copy.clone())?;
        self.changes.push(RefactoringChange::ContactCreated {
            contact: copy,
            copied_from: Some(original.id.clone()),
        });
        self.maps.contacts.insert(original.id.clone(), id.clone());
        Ok(id)
    }

    fn create_wire(&mut self, original: &Wire, owner: &GroupId, from: ContactId, to: ContactId) -> Result<WireId, CoreError> {
        let wire = Wire::new(owner.clone(), from, to, original.wire_type);
        let id = self.next.add_wire(wire.clone())?;
        self.changes.push(RefactoringChange::WireCreated { wire });
        Ok(id)
    }

    /// Recursively copies `group_id` under `parent`.
    ///
    /// Returns the new group's ID and the contact mapping for this group and
    /// every copied descendant, which is what decides which of the group's
    /// own wires survive.
    fn copy_group_into(
        &mut self,
        group_id: &GroupId,
        parent: &GroupId,
        name: Option<&str>,
        deep: bool,
    ) -> Result<(GroupId, HashMap<ContactId, ContactId>), CoreError> {
        let source = self.source;
        let gs = source
            .get_group(group_id)
            .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() })?;

        let mut group = Group::new(name.unwrap_or(&gs.group.name), Some(parent.clone()));
        group.primitive = gs.group.primitive.clone();
        group.attributes = gs.group.attributes.clone();
        let new_id = self.next.add_group(group.clone())?;
        self.changes.push(RefactoringChange::GroupCreated {
            group,
            copied_from: Some(group_id.clone()),
        });
        self.maps.groups.insert(group_id.clone(), new_id.clone());

        let mut level = HashMap::new();
        for contact_id in &gs.group.contact_ids {
            let Some(contact) = gs.contacts.get(contact_id) else {
                continue;
            };
            let copy = self.copy_contact(contact, &new_id, true)?;
            level.insert(contact_id.clone(), copy);
        }

        if deep {
            for sub in &gs.group.subgroup_ids {
                let (_, nested) = self.copy_group_into(sub, &new_id, None, deep)?;
                level.extend(nested);
            }
        }

        for wire_id in &gs.group.wire_ids {
            let Some(wire) = gs.wires.get(wire_id) else {
                continue;
            };
            match (level.get(&wire.from_id), level.get(&wire.to_id)) {
                (Some(from), Some(to)) => {
                    let (from, to) = (from.clone(), to.clone());
                    self.create_wire(wire, &new_id, from, to)?;
                }
                _ => {
                    tracing::debug!(wire = %wire.id, "wire leaves copied group, dropped");
                }
            }
        }

        Ok((new_id, level))
    }
}

fn require_group(state: &NetworkState, id: &GroupId) -> Result<(), CoreError> {
    match state.get_group(id) {
        Some(_) => Ok(()),
        None => Err(CoreError::GroupNotFound { id: id.clone() }),
    }
}

fn check_not_into_self(state: &NetworkState, group_id: &GroupId, target: &GroupId) -> Result<(), CoreError> {
    if state.is_same_or_descendant(target, group_id) {
        return Err(CoreError::CyclicCopy {
            group: group_id.clone(),
            target: target.clone(),
        });
    }
    Ok(())
}

/// Copies a group under `target_parent_id`.
///
/// With `deep`, subgroups are copied recursively. A wire owned by a copied
/// group is kept whenever both of its endpoints were copied, so a wire from
/// the group to a port of one of its subgroups survives a deep copy. A
/// shallow copy keeps only wires with both endpoints in the group itself.
/// Wires with an endpoint outside the copied subtree are dropped either way.
/// Copying a group into itself or one of its descendants fails with
/// [`CoreError::CyclicCopy`].
pub fn copy_group(
    state: &NetworkState,
    group_id: &GroupId,
    target_parent_id: &GroupId,
    new_name: Option<&str>,
    deep: bool,
) -> Result<RefactorResult, CoreError> {
    require_group(state, group_id)?;
    require_group(state, target_parent_id)?;
    check_not_into_self(state, group_id, target_parent_id)?;

    let mut job = CopyJob::new(state);
    let (new_id, _) = job.copy_group_into(group_id, target_parent_id, new_name, deep)?;

    tracing::debug!(
        group = %group_id,
        copy = %new_id,
        contacts = job.maps.contacts.len(),
        "copied group"
    );
    Ok(job.finish(Some(new_id)))
}

/// Copies loose contacts into `target_group_id`.
///
/// Copies are plain contacts: boundary flags are dropped. With
/// `include_wires`, wires whose endpoints were both copied are recreated in
/// the target group.
pub fn copy_contacts(
    state: &NetworkState,
    contact_ids: &[ContactId],
    target_group_id: &GroupId,
    include_wires: bool,
) -> Result<RefactorResult, CoreError> {
    require_group(state, target_group_id)?;
    let mut job = CopyJob::new(state);
    for id in contact_ids {
        if job.maps.contacts.contains_key(id) {
            continue;
        }
        let contact = state
            .get_contact(id)
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        job.copy_contact(contact, target_group_id, false)?;
    }
    if include_wires {
        for wire in state.wires() {
            let from = job.maps.contacts.get(&wire.from_id).cloned();
            let to = job.maps.contacts.get(&wire.to_id).cloned();
            if let (Some(from), Some(to)) = (from, to) {
                job.create_wire(wire, target_group_id, from, to)?;
            }
        }
    }
    Ok(job.finish(None))
}

/// Copies a mixed selection of contacts and groups into `target_group_id`.
///
/// Groups are copied as by [`copy_group`]. Loose contacts already covered by
/// a selected group are not copied twice. With `include_wires`, the resulting
/// network is rescanned for wires whose two endpoints both have copies, and
/// a wire between the copies is created in the target group unless one with
/// the same endpoints already exists.
pub fn copy_selection(
    state: &NetworkState,
    contact_ids: &[ContactId],
    group_ids: &[GroupId],
    target_group_id: &GroupId,
    include_wires: bool,
    deep: bool,
) -> Result<RefactorResult, CoreError> {
    if contact_ids.is_empty() && group_ids.is_empty() {
        return Err(CoreError::InvalidSelection {
            reason: "nothing selected".to_string(),
        });
    }
    require_group(state, target_group_id)?;
    for group_id in group_ids {
        require_group(state, group_id)?;
        check_not_into_self(state, group_id, target_group_id)?;
    }
    for id in contact_ids {
        if state.get_contact(id).is_none() {
            return Err(CoreError::ContactNotFound { id: id.clone() });
        }
    }

    // A deep copy of an ancestor already carries nested selected groups.
    let roots: Vec<&GroupId> = group_ids
        .iter()
        .filter(|g| {
            !deep
                || !group_ids
                    .iter()
                    .any(|other| other != *g && state.is_same_or_descendant(g, other))
        })
        .collect();
    let covered: HashSet<GroupId> = roots
        .iter()
        .flat_map(|g| if deep { state.subtree(g) } else { vec![(*g).clone()] })
        .collect();

    let mut job = CopyJob::new(state);
    for id in contact_ids {
        if job.maps.contacts.contains_key(id) {
            continue;
        }
        let Some(contact) = state.get_contact(id) else {
            continue;
        };
        if covered.contains(&contact.group_id) {
            continue;
        }
        job.copy_contact(contact, target_group_id, false)?;
    }
    let mut copied_groups = HashSet::new();
    for group_id in roots {
        if copied_groups.insert(group_id.clone()) {
            job.copy_group_into(group_id, target_group_id, None, deep)?;
        }
    }

    if include_wires {
        let candidates: Vec<(Wire, ContactId, ContactId)> = job
            .next
            .wires()
            .filter_map(|wire| {
                let from = job.maps.contacts.get(&wire.from_id)?;
                let to = job.maps.contacts.get(&wire.to_id)?;
                Some((wire.clone(), from.clone(), to.clone()))
            })
            .collect();
        for (wire, from, to) in candidates {
            let exists = job
                .next
                .wires()
                .any(|w| w.from_id == from && w.to_id == to);
            if !exists {
                job.create_wire(&wire, target_group_id, from, to)?;
            }
        }
    }

    tracing::debug!(
        contacts = job.maps.contacts.len(),
        groups = job.maps.groups.len(),
        target = %target_group_id,
        "copied selection"
    );
    Ok(job.finish(None))
}

//! The network owned by a scheduler.
//!
//! [`NetworkCore`] holds the one [`NetworkState`] a scheduler instance owns,
//! the lattice registry and the subscriber set. Structural operations here
//! validate before mutating and return the [`Change`]s they made; scheduler
//! policies decide when those changes (and propagation results) are
//! delivered.

use std::sync::Arc;

use serde_json::Value;

use bassline_core::{
    propagate_content, propagate_from, Change, Contact, ContactId, CoreError, Group, GroupId, GroupState,
    MergeRegistry, NetworkState, PropagationResult, Wire, WireId, WireType,
};

use crate::error::SchedulerError;
use crate::subscribers::Subscribers;

/// A content update waiting to be propagated.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Write `content` at `contact_id` and propagate.
    Content { contact_id: ContactId, content: Value },
    /// Deliver `content` to `to_id` as if it came over a wire from `from_id`.
    Propagation {
        from_id: ContactId,
        to_id: ContactId,
        content: Value,
    },
}

impl Update {
    /// The contact the update lands on first.
    pub fn target(&self) -> &ContactId {
        match self {
            Update::Content { contact_id, .. } => contact_id,
            Update::Propagation { to_id, .. } => to_id,
        }
    }
}

#[derive(Debug)]
pub struct NetworkCore {
    state: NetworkState,
    lattices: Arc<MergeRegistry>,
    subscribers: Subscribers,
}

impl NetworkCore {
    pub fn new(state: NetworkState, lattices: Arc<MergeRegistry>) -> Self {
        NetworkCore {
            state,
            lattices,
            subscribers: Subscribers::new(),
        }
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    pub fn lattices(&self) -> &Arc<MergeRegistry> {
        &self.lattices
    }

    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    pub fn notify(&self, changes: &[Change]) {
        self.subscribers.notify(changes);
    }

    /// Swaps in a whole new network.
    pub fn replace_state(&mut self, state: NetworkState) {
        self.state = state;
    }

    // -----------------------------------------------------------------------
    // Structural operations
    // -----------------------------------------------------------------------

    /// Registers a group together with the contacts and wires it owns.
    ///
    /// Subgroups listed in the descriptor are not registered; each one is
    /// registered on its own. Either everything is added or nothing is.
    pub fn register_group(&mut self, group: GroupState) -> Result<(GroupId, Vec<Change>), SchedulerError> {
        let mut next = self.state.clone();
        let descriptor = group.group.emptied();
        let group_id = next.add_group(descriptor.clone())?;
        let descriptor = next
            .get_group(&group_id)
            .map(|gs| gs.group.clone())
            .unwrap_or(descriptor);
        let mut changes = vec![Change::GroupAdded { group: descriptor }];

        for contact in group.contacts.into_values() {
            next.add_contact(&group_id, contact.clone())?;
            changes.push(Change::ContactAdded {
                group_id: group_id.clone(),
                contact: Contact {
                    group_id: group_id.clone(),
                    ..contact
                },
            });
        }
        for wire in group.wires.into_values() {
            let wire = Wire {
                group_id: group_id.clone(),
                ..wire
            };
            next.add_wire(wire.clone())?;
            changes.push(Change::WireAdded {
                group_id: group_id.clone(),
                wire,
            });
        }

        self.state = next;
        tracing::debug!(group = %group_id, changes = changes.len(), "registered group");
        Ok((group_id, changes))
    }

    pub fn add_group(&mut self, group: Group) -> Result<(GroupId, Vec<Change>), SchedulerError> {
        let group_id = self.state.add_group(group)?;
        let descriptor = self
            .state
            .get_group(&group_id)
            .map(|gs| gs.group.clone())
            .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() })?;
        Ok((group_id, vec![Change::GroupAdded { group: descriptor }]))
    }

    pub fn remove_group(&mut self, id: &GroupId) -> Result<Vec<Change>, SchedulerError> {
        Ok(self.state.remove_group(id)?)
    }

    pub fn add_contact(&mut self, group_id: &GroupId, contact: Contact) -> Result<(ContactId, Vec<Change>), SchedulerError> {
        let contact_id = self.state.add_contact(group_id, contact)?;
        let contact = self
            .state
            .get_contact(&contact_id)
            .cloned()
            .ok_or_else(|| CoreError::ContactNotFound { id: contact_id.clone() })?;
        Ok((
            contact_id,
            vec![Change::ContactAdded {
                group_id: group_id.clone(),
                contact,
            }],
        ))
    }

    /// Removes a contact and its incident wires.
    pub fn remove_contact(&mut self, id: &ContactId) -> Result<Vec<Change>, SchedulerError> {
        let (contact, wires) = self.state.remove_contact(id)?;
        let mut changes: Vec<Change> = wires
            .into_iter()
            .map(|wire| Change::WireRemoved {
                group_id: wire.group_id,
                wire_id: wire.id,
            })
            .collect();
        changes.push(Change::ContactRemoved {
            group_id: contact.group_id,
            contact_id: contact.id,
        });
        Ok(changes)
    }

    /// Wires two existing contacts. The wire is owned by the nearest group
    /// containing both endpoints' groups.
    pub fn connect(
        &mut self,
        from: &ContactId,
        to: &ContactId,
        wire_type: WireType,
    ) -> Result<(WireId, Vec<Change>), SchedulerError> {
        let from_group = self
            .state
            .contact_group(from)
            .ok_or_else(|| CoreError::ContactNotFound { id: from.clone() })?;
        let to_group = self
            .state
            .contact_group(to)
            .ok_or_else(|| CoreError::ContactNotFound { id: to.clone() })?;
        let owner = self
            .state
            .common_ancestor(from_group, to_group)
            .unwrap_or_else(|| self.state.root_group_id().clone());

        let wire = Wire::new(owner.clone(), from.clone(), to.clone(), wire_type);
        let wire_id = self.state.add_wire(wire.clone())?;
        Ok((wire_id, vec![Change::WireAdded { group_id: owner, wire }]))
    }

    pub fn disconnect(&mut self, id: &WireId) -> Result<Vec<Change>, SchedulerError> {
        let wire = self.state.remove_wire(id)?;
        Ok(vec![Change::WireRemoved {
            group_id: wire.group_id,
            wire_id: wire.id,
        }])
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Rejects an update whose target contact does not exist.
    pub fn validate(&self, update: &Update) -> Result<(), SchedulerError> {
        let target = update.target();
        if self.state.get_contact(target).is_none() {
            return Err(CoreError::ContactNotFound { id: target.clone() }.into());
        }
        Ok(())
    }

    /// Runs one update through the propagation engine without notifying.
    pub fn propagate(&mut self, update: &Update) -> Result<PropagationResult, SchedulerError> {
        let result = match update {
            Update::Content { contact_id, content } => {
                propagate_content(&mut self.state, &self.lattices, contact_id, content.clone())?
            }
            Update::Propagation {
                from_id,
                to_id,
                content,
            } => propagate_from(&mut self.state, &self.lattices, from_id, to_id, content.clone())?,
        };
        for contradiction in &result.contradictions {
            tracing::warn!(
                contact = %contradiction.contact_id,
                message = %contradiction.message,
                "contradiction during propagation"
            );
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn core() -> NetworkCore {
        let state = NetworkState::with_root(GroupId::from("root"), "root");
        NetworkCore::new(state, Arc::new(MergeRegistry::with_builtins()))
    }

    #[test]
    fn connect_is_owned_by_common_ancestor() {
        let mut core = core();
        let root = GroupId::from("root");
        let (left, _) = core.add_group(Group::with_id(GroupId::from("left"), "left", Some(root.clone()))).unwrap();
        let (right, _) = core.add_group(Group::with_id(GroupId::from("right"), "right", Some(root.clone()))).unwrap();
        let (a, _) = core.add_contact(&left, Contact::new(left.clone())).unwrap();
        let (b, _) = core.add_contact(&right, Contact::new(right.clone())).unwrap();

        let (wire_id, changes) = core.connect(&a, &b, WireType::Bidirectional).unwrap();
        assert_eq!(core.state().wire_group(&wire_id), Some(&root));
        assert!(matches!(&changes[0], Change::WireAdded { group_id, .. } if group_id == &root));
    }

    #[test]
    fn connect_requires_both_endpoints() {
        let mut core = core();
        let root = GroupId::from("root");
        let (a, _) = core.add_contact(&root, Contact::new(root.clone())).unwrap();
        let err = core
            .connect(&a, &ContactId::from("missing"), WireType::Directed)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::Core(CoreError::ContactNotFound { .. })));
        assert_eq!(core.state().wire_count(), 0);
    }

    #[test]
    fn register_group_is_all_or_nothing() {
        let mut core = core();
        let root = GroupId::from("root");
        core.add_contact(&root, Contact::with_id(ContactId::from("taken"), root.clone()))
            .unwrap();

        let mut gs = GroupState::new(Group::with_id(GroupId::from("g"), "g", Some(root.clone())));
        for id in ["fresh", "taken"] {
            gs.contacts
                .insert(ContactId::from(id), Contact::with_id(ContactId::from(id), GroupId::from("g")));
        }
        assert!(core.register_group(gs).is_err());
        assert!(core.state().get_group(&GroupId::from("g")).is_none());
        assert!(core.state().get_contact(&ContactId::from("fresh")).is_none());
    }

    #[test]
    fn register_group_reports_every_addition() {
        let mut core = core();
        let mut gs = GroupState::new(Group::with_id(GroupId::from("g"), "g", None));
        let g = GroupId::from("g");
        for id in ["x", "y"] {
            gs.contacts
                .insert(ContactId::from(id), Contact::with_id(ContactId::from(id), g.clone()));
        }
        let wire = Wire::new(g.clone(), ContactId::from("x"), ContactId::from("y"), WireType::Directed);
        gs.wires.insert(wire.id.clone(), wire);

        let (id, changes) = core.register_group(gs).unwrap();
        assert_eq!(id, g);
        assert_eq!(changes.len(), 4);
        assert_eq!(core.state().get_group(&g).unwrap().group.parent_id, Some(GroupId::from("root")));

        core.propagate(&Update::Content {
            contact_id: ContactId::from("x"),
            content: json!(3),
        })
        .unwrap();
        assert_eq!(core.state().get_contact(&ContactId::from("y")).unwrap().content, json!(3));
    }
}

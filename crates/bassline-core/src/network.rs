//! NetworkState: the authoritative graph store.
//!
//! [`NetworkState`] owns every group (and through them every contact and
//! wire), addressable by ID. Wires are stored per owning group, but the store
//! also keeps a petgraph `StableGraph` over contact IDs so that the wires
//! incident to a contact can be found in O(degree) during propagation.
//!
//! The topology graph tolerates dangling wire endpoints: a wire may name a
//! contact that does not exist (yet), in which case a placeholder node holds
//! its end until the contact appears or the wire is removed.
//!
//! All mutations go through `NetworkState` methods, which keep each group's
//! `contact_ids`/`wire_ids`/`subgroup_ids`/`boundary_contact_ids` lists in
//! sync with the owned maps and with the derived indexes.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::Change;
use crate::contact::{Contact, ContradictionRecord};
use crate::error::CoreError;
use crate::group::{Group, GroupState};
use crate::id::{ContactId, GroupId, WireId};
use crate::wire::Wire;

/// Serialized form of a [`NetworkState`]: the groups plus the two pointers.
/// Derived indexes are rebuilt when converting back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub groups: IndexMap<GroupId, GroupState>,
    pub root_group_id: GroupId,
    pub current_group_id: GroupId,
}

/// The whole addressable network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NetworkSnapshot", into = "NetworkSnapshot")]
pub struct NetworkState {
    groups: IndexMap<GroupId, GroupState>,
    root_group_id: GroupId,
    current_group_id: GroupId,
    /// Contact -> owning group.
    contact_owners: HashMap<ContactId, GroupId>,
    /// Wire -> owning group.
    wire_owners: HashMap<WireId, GroupId>,
    /// Wire adjacency over contact IDs (nodes may be dangling placeholders).
    topology: StableGraph<ContactId, WireId, Directed, u32>,
    contact_nodes: HashMap<ContactId, NodeIndex<u32>>,
    wire_edges: HashMap<WireId, EdgeIndex<u32>>,
}

impl TryFrom<NetworkSnapshot> for NetworkState {
    type Error = CoreError;

    /// Rejects snapshots whose lists, owners or group tree disagree, so
    /// external data never reaches the mutation paths inconsistent.
    fn try_from(snapshot: NetworkSnapshot) -> Result<Self, CoreError> {
        snapshot.check()?;
        let mut state = NetworkState {
            groups: snapshot.groups,
            root_group_id: snapshot.root_group_id,
            current_group_id: snapshot.current_group_id,
            contact_owners: HashMap::new(),
            wire_owners: HashMap::new(),
            topology: StableGraph::new(),
            contact_nodes: HashMap::new(),
            wire_edges: HashMap::new(),
        };
        state.rebuild_indexes();
        Ok(state)
    }
}

impl NetworkSnapshot {
    /// Checks the invariants every [`NetworkState`] mutation relies on.
    pub fn check(&self) -> Result<(), CoreError> {
        let broken = |reason: String| CoreError::InconsistentSnapshot { reason };

        match self.groups.get(&self.root_group_id) {
            Some(root) if root.group.parent_id.is_none() => {}
            Some(_) => return Err(broken(format!("root group {} has a parent", self.root_group_id))),
            None => return Err(broken(format!("root group {} missing", self.root_group_id))),
        }
        if !self.groups.contains_key(&self.current_group_id) {
            return Err(broken(format!("current group {} missing", self.current_group_id)));
        }

        let mut contacts: HashSet<&ContactId> = HashSet::new();
        let mut wires: HashSet<&WireId> = HashSet::new();
        for (group_id, gs) in &self.groups {
            if &gs.group.id != group_id {
                return Err(broken(format!("group {} keyed under {group_id}", gs.group.id)));
            }
            if gs.group.contact_ids.len() != gs.contacts.len() {
                return Err(broken(format!("group {group_id}: contact list out of sync")));
            }
            for (id, contact) in &gs.contacts {
                if !gs.group.contact_ids.contains(id) || &contact.group_id != group_id {
                    return Err(broken(format!("group {group_id}: contact {id} misfiled")));
                }
                if !contacts.insert(id) {
                    return Err(broken(format!("contact {id} owned twice")));
                }
            }
            if gs.group.wire_ids.len() != gs.wires.len() {
                return Err(broken(format!("group {group_id}: wire list out of sync")));
            }
            for (id, wire) in &gs.wires {
                if !gs.group.wire_ids.contains(id) || &wire.group_id != group_id {
                    return Err(broken(format!("group {group_id}: wire {id} misfiled")));
                }
                if !wires.insert(id) {
                    return Err(broken(format!("wire {id} owned twice")));
                }
            }
            if let Some(id) = gs.group.boundary_contact_ids.iter().find(|id| !gs.contacts.contains_key(*id)) {
                return Err(broken(format!("group {group_id}: boundary {id} not owned")));
            }
            for sub in &gs.group.subgroup_ids {
                let child = self.groups.get(sub);
                if !child.is_some_and(|c| c.group.parent_id.as_ref() == Some(group_id)) {
                    return Err(broken(format!("group {group_id}: subgroup {sub} has wrong parent")));
                }
            }
        }

        // Every group reaches the root through listed parents.
        for (group_id, gs) in &self.groups {
            let mut current = gs;
            let mut steps = 0;
            while let Some(parent_id) = &current.group.parent_id {
                let parent = self
                    .groups
                    .get(parent_id)
                    .filter(|p| p.group.subgroup_ids.contains(&current.group.id))
                    .ok_or_else(|| broken(format!("group {group_id}: parent {parent_id} does not list it")))?;
                steps += 1;
                if steps > self.groups.len() {
                    return Err(broken(format!("group {group_id}: parent cycle")));
                }
                current = parent;
            }
            if current.group.id != self.root_group_id {
                return Err(broken(format!("group {group_id} is detached from the root")));
            }
        }
        Ok(())
    }
}

impl From<NetworkState> for NetworkSnapshot {
    fn from(state: NetworkState) -> Self {
        NetworkSnapshot {
            groups: state.groups,
            root_group_id: state.root_group_id,
            current_group_id: state.current_group_id,
        }
    }
}

impl PartialEq for NetworkState {
    fn eq(&self, other: &Self) -> bool {
        self.root_group_id == other.root_group_id
            && self.current_group_id == other.current_group_id
            && self.groups == other.groups
    }
}

impl NetworkState {
    /// Creates a network containing only a root group with a fresh ID.
    pub fn new(root_name: &str) -> Self {
        NetworkState::with_root(GroupId::generate(), root_name)
    }

    /// Creates a network containing only a root group with the given ID.
    pub fn with_root(root_id: GroupId, root_name: &str) -> Self {
        let root = Group::with_id(root_id.clone(), root_name, None);
        let mut groups = IndexMap::new();
        groups.insert(root_id.clone(), GroupState::new(root));
        NetworkState {
            groups,
            root_group_id: root_id.clone(),
            current_group_id: root_id,
            contact_owners: HashMap::new(),
            wire_owners: HashMap::new(),
            topology: StableGraph::new(),
            contact_nodes: HashMap::new(),
            wire_edges: HashMap::new(),
        }
    }

    fn rebuild_indexes(&mut self) {
        self.contact_owners.clear();
        self.wire_owners.clear();
        self.topology.clear();
        self.contact_nodes.clear();
        self.wire_edges.clear();

        let mut contacts = Vec::new();
        let mut wires = Vec::new();
        for (group_id, gs) in &self.groups {
            for id in gs.contacts.keys() {
                contacts.push((id.clone(), group_id.clone()));
            }
            for wire in gs.wires.values() {
                wires.push((wire.clone(), group_id.clone()));
            }
        }
        for (id, group_id) in contacts {
            self.ensure_node(&id);
            self.contact_owners.insert(id, group_id);
        }
        for (wire, group_id) in wires {
            self.index_wire(&wire);
            self.wire_owners.insert(wire.id, group_id);
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn root_group_id(&self) -> &GroupId {
        &self.root_group_id
    }

    pub fn current_group_id(&self) -> &GroupId {
        &self.current_group_id
    }

    /// Points the network's "current group" at `id`.
    pub fn set_current_group(&mut self, id: &GroupId) -> Result<(), CoreError> {
        if !self.groups.contains_key(id) {
            return Err(CoreError::GroupNotFound { id: id.clone() });
        }
        self.current_group_id = id.clone();
        Ok(())
    }

    pub fn get_group(&self, id: &GroupId) -> Option<&GroupState> {
        self.groups.get(id)
    }

    pub fn get_contact(&self, id: &ContactId) -> Option<&Contact> {
        let owner = self.contact_owners.get(id)?;
        self.groups.get(owner)?.contacts.get(id)
    }

    pub fn get_wire(&self, id: &WireId) -> Option<&Wire> {
        let owner = self.wire_owners.get(id)?;
        self.groups.get(owner)?.wires.get(id)
    }

    /// The group owning a contact.
    pub fn contact_group(&self, id: &ContactId) -> Option<&GroupId> {
        self.contact_owners.get(id)
    }

    /// The group owning a wire.
    pub fn wire_group(&self, id: &WireId) -> Option<&GroupId> {
        self.wire_owners.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupState> {
        self.groups.values()
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.groups.values().flat_map(|gs| gs.contacts.values())
    }

    pub fn wires(&self) -> impl Iterator<Item = &Wire> {
        self.groups.values().flat_map(|gs| gs.wires.values())
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_owners.len()
    }

    pub fn wire_count(&self) -> usize {
        self.wire_owners.len()
    }

    /// All wires with `contact` as an endpoint, regardless of direction.
    ///
    /// Includes wires whose other endpoint is dangling.
    pub fn incident_wires(&self, contact: &ContactId) -> Vec<&Wire> {
        let Some(&node) = self.contact_nodes.get(contact) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut wires = Vec::new();
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for edge in self.topology.edges_directed(node, direction) {
                let wire_id = edge.weight();
                if seen.insert(wire_id.clone()) {
                    if let Some(wire) = self.get_wire(wire_id) {
                        wires.push(wire);
                    }
                }
            }
        }
        wires
    }

    /// Groups from `id`'s parent up to the root, nearest first.
    pub fn ancestors(&self, id: &GroupId) -> Vec<GroupId> {
        let mut result = Vec::new();
        let mut current = self.groups.get(id).and_then(|gs| gs.group.parent_id.clone());
        while let Some(group_id) = current {
            // Guard against a malformed (cyclic) parent chain.
            if result.contains(&group_id) {
                break;
            }
            current = self
                .groups
                .get(&group_id)
                .and_then(|gs| gs.group.parent_id.clone());
            result.push(group_id);
        }
        result
    }

    /// Returns `true` if `candidate` is `ancestor` or lies beneath it.
    pub fn is_same_or_descendant(&self, candidate: &GroupId, ancestor: &GroupId) -> bool {
        candidate == ancestor || self.ancestors(candidate).contains(ancestor)
    }

    /// `id` and all groups beneath it, parents before children.
    pub fn subtree(&self, id: &GroupId) -> Vec<GroupId> {
        let mut result = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(group_id) = stack.pop() {
            if let Some(gs) = self.groups.get(&group_id) {
                stack.extend(gs.group.subgroup_ids.iter().rev().cloned());
                result.push(group_id);
            }
        }
        result
    }

    /// The nearest group that is `a` or `b` or an ancestor of both.
    pub fn common_ancestor(&self, a: &GroupId, b: &GroupId) -> Option<GroupId> {
        if !self.groups.contains_key(a) || !self.groups.contains_key(b) {
            return None;
        }
        let mut chain_a = vec![a.clone()];
        chain_a.extend(self.ancestors(a));
        let mut chain_b = vec![b.clone()];
        chain_b.extend(self.ancestors(b));
        chain_a.into_iter().find(|g| chain_b.contains(g))
    }

    // -----------------------------------------------------------------------
    // Group mutations
    // -----------------------------------------------------------------------

    /// Adds a group under `group.parent_id`.
    ///
    /// The ownership lists of the given descriptor are ignored; the new
    /// group starts empty. A group without a parent is attached to the root.
    pub fn add_group(&mut self, group: Group) -> Result<GroupId, CoreError> {
        if self.groups.contains_key(&group.id) {
            return Err(CoreError::DuplicateGroup { id: group.id });
        }
        let mut group = group.emptied();
        let parent_id = group
            .parent_id
            .get_or_insert_with(|| self.root_group_id.clone())
            .clone();
        let parent = self
            .groups
            .get_mut(&parent_id)
            .ok_or(CoreError::GroupNotFound { id: parent_id })?;
        parent.group.subgroup_ids.push(group.id.clone());

        let id = group.id.clone();
        self.groups.insert(id.clone(), GroupState::new(group));

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Removes a group with everything it owns, deepest subgroups first.
    ///
    /// Returns the removal log in application order: for each group, its
    /// wires, then contacts (with any remaining incident wires), then the
    /// group itself.
    pub fn remove_group(&mut self, id: &GroupId) -> Result<Vec<Change>, CoreError> {
        if id == &self.root_group_id {
            return Err(CoreError::RootGroupRemoval);
        }
        if !self.groups.contains_key(id) {
            return Err(CoreError::GroupNotFound { id: id.clone() });
        }

        let mut log = Vec::new();
        for group_id in self.subtree(id).into_iter().rev() {
            let Some(gs) = self.groups.get(&group_id) else {
                continue;
            };
            let wire_ids = gs.group.wire_ids.clone();
            let contact_ids = gs.group.contact_ids.clone();
            for wire_id in wire_ids {
                let wire = self.remove_wire(&wire_id)?;
                log.push(Change::WireRemoved {
                    group_id: wire.group_id,
                    wire_id,
                });
            }
            for contact_id in contact_ids {
                let (contact, wires) = self.remove_contact(&contact_id)?;
                for wire in wires {
                    log.push(Change::WireRemoved {
                        group_id: wire.group_id,
                        wire_id: wire.id,
                    });
                }
                log.push(Change::ContactRemoved {
                    group_id: contact.group_id,
                    contact_id,
                });
            }
            if let Some(removed) = self.groups.shift_remove(&group_id) {
                if let Some(parent_id) = &removed.group.parent_id {
                    if let Some(parent) = self.groups.get_mut(parent_id) {
                        parent.group.subgroup_ids.retain(|g| g != &group_id);
                    }
                }
            }
            if self.current_group_id == group_id {
                self.current_group_id = self.root_group_id.clone();
            }
            log.push(Change::GroupRemoved { group_id });
        }

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(log)
    }

    // -----------------------------------------------------------------------
    // Contact mutations
    // -----------------------------------------------------------------------

    /// Adds a contact to `group_id`. The contact's `group_id` is overwritten.
    pub fn add_contact(&mut self, group_id: &GroupId, mut contact: Contact) -> Result<ContactId, CoreError> {
        if self.contact_owners.contains_key(&contact.id) {
            return Err(CoreError::DuplicateContact { id: contact.id });
        }
        let gs = self
            .groups
            .get_mut(group_id)
            .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() })?;
        contact.group_id = group_id.clone();
        let id = contact.id.clone();
        gs.group.contact_ids.push(id.clone());
        if contact.is_boundary {
            gs.group.boundary_contact_ids.push(id.clone());
        }
        gs.contacts.insert(id.clone(), contact);

        self.contact_owners.insert(id.clone(), group_id.clone());
        self.ensure_node(&id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Removes a contact and every wire incident to it.
    ///
    /// Returns the removed contact and the removed wires.
    pub fn remove_contact(&mut self, id: &ContactId) -> Result<(Contact, Vec<Wire>), CoreError> {
        let owner = self
            .contact_owners
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;

        let incident: Vec<WireId> = self.incident_wires(id).iter().map(|w| w.id.clone()).collect();
        let mut removed_wires = Vec::with_capacity(incident.len());
        for wire_id in incident {
            removed_wires.push(self.remove_wire(&wire_id)?);
        }

        let gs = self
            .groups
            .get_mut(&owner)
            .ok_or(CoreError::GroupNotFound { id: owner })?;
        let contact = gs
            .contacts
            .shift_remove(id)
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        gs.group.contact_ids.retain(|c| c != id);
        gs.group.boundary_contact_ids.retain(|c| c != id);

        self.contact_owners.remove(id);
        self.prune_node(id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok((contact, removed_wires))
    }

    /// Replaces a contact's content.
    pub fn set_contact_content(&mut self, id: &ContactId, content: Value) -> Result<(), CoreError> {
        self.contact_mut(id)?.content = content;
        Ok(())
    }

    /// Attaches (or clears) a contact's last contradiction.
    pub fn set_last_contradiction(
        &mut self,
        id: &ContactId,
        record: Option<ContradictionRecord>,
    ) -> Result<(), CoreError> {
        self.contact_mut(id)?.last_contradiction = record;
        Ok(())
    }

    fn contact_mut(&mut self, id: &ContactId) -> Result<&mut Contact, CoreError> {
        let owner = self
            .contact_owners
            .get(id)
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        self.groups
            .get_mut(owner)
            .and_then(|gs| gs.contacts.get_mut(id))
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })
    }

    /// Moves a contact into another group, keeping its ID and wires.
    pub fn move_contact(&mut self, id: &ContactId, to: &GroupId) -> Result<(), CoreError> {
        let from = self
            .contact_owners
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        if !self.groups.contains_key(to) {
            return Err(CoreError::GroupNotFound { id: to.clone() });
        }
        if &from == to {
            return Ok(());
        }

        let source = self
            .groups
            .get_mut(&from)
            .ok_or_else(|| CoreError::GroupNotFound { id: from.clone() })?;
        let mut contact = source
            .contacts
            .shift_remove(id)
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        source.group.contact_ids.retain(|c| c != id);
        source.group.boundary_contact_ids.retain(|c| c != id);

        contact.group_id = to.clone();
        let target = self
            .groups
            .get_mut(to)
            .ok_or_else(|| CoreError::GroupNotFound { id: to.clone() })?;
        target.group.contact_ids.push(id.clone());
        if contact.is_boundary {
            target.group.boundary_contact_ids.push(id.clone());
        }
        target.contacts.insert(id.clone(), contact);
        self.contact_owners.insert(id.clone(), to.clone());

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Wire mutations
    // -----------------------------------------------------------------------

    /// Adds a wire to `wire.group_id`.
    ///
    /// Endpoints that do not name an existing contact are tolerated: the
    /// wire is stored and a warning is logged.
    pub fn add_wire(&mut self, wire: Wire) -> Result<WireId, CoreError> {
        if self.wire_owners.contains_key(&wire.id) {
            return Err(CoreError::DuplicateWire { id: wire.id });
        }
        let group_id = wire.group_id.clone();
        let gs = self
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() })?;
        for endpoint in [&wire.from_id, &wire.to_id] {
            if !self.contact_owners.contains_key(endpoint) {
                tracing::warn!(wire = %wire.id, contact = %endpoint, "wire endpoint does not exist");
            }
        }
        let id = wire.id.clone();
        gs.group.wire_ids.push(id.clone());
        gs.wires.insert(id.clone(), wire.clone());
        self.wire_owners.insert(id.clone(), group_id);
        self.index_wire(&wire);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Removes a wire.
    pub fn remove_wire(&mut self, id: &WireId) -> Result<Wire, CoreError> {
        let owner = self
            .wire_owners
            .remove(id)
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        let gs = self
            .groups
            .get_mut(&owner)
            .ok_or(CoreError::GroupNotFound { id: owner })?;
        let wire = gs
            .wires
            .shift_remove(id)
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        gs.group.wire_ids.retain(|w| w != id);

        if let Some(edge) = self.wire_edges.remove(id) {
            self.topology.remove_edge(edge);
        }
        self.prune_node(&wire.from_id);
        self.prune_node(&wire.to_id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(wire)
    }

    /// Moves a wire into another owning group.
    pub fn move_wire(&mut self, id: &WireId, to: &GroupId) -> Result<(), CoreError> {
        let from = self
            .wire_owners
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        if !self.groups.contains_key(to) {
            return Err(CoreError::GroupNotFound { id: to.clone() });
        }
        if &from == to {
            return Ok(());
        }
        let source = self
            .groups
            .get_mut(&from)
            .ok_or_else(|| CoreError::GroupNotFound { id: from.clone() })?;
        let mut wire = source
            .wires
            .shift_remove(id)
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        source.group.wire_ids.retain(|w| w != id);

        wire.group_id = to.clone();
        let target = self
            .groups
            .get_mut(to)
            .ok_or_else(|| CoreError::GroupNotFound { id: to.clone() })?;
        target.group.wire_ids.push(id.clone());
        target.wires.insert(id.clone(), wire);
        self.wire_owners.insert(id.clone(), to.clone());

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Changes a wire's endpoints in place.
    pub fn rewire(&mut self, id: &WireId, from_id: ContactId, to_id: ContactId) -> Result<(), CoreError> {
        let owner = self
            .wire_owners
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        let wire = self
            .groups
            .get_mut(&owner)
            .and_then(|gs| gs.wires.get_mut(id))
            .ok_or_else(|| CoreError::WireNotFound { id: id.clone() })?;
        let old_from = std::mem::replace(&mut wire.from_id, from_id);
        let old_to = std::mem::replace(&mut wire.to_id, to_id);
        let updated = wire.clone();

        if let Some(edge) = self.wire_edges.remove(id) {
            self.topology.remove_edge(edge);
        }
        self.index_wire(&updated);
        self.prune_node(&old_from);
        self.prune_node(&old_to);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Topology index helpers
    // -----------------------------------------------------------------------

    fn ensure_node(&mut self, id: &ContactId) -> NodeIndex<u32> {
        if let Some(&idx) = self.contact_nodes.get(id) {
            return idx;
        }
        let idx = self.topology.add_node(id.clone());
        self.contact_nodes.insert(id.clone(), idx);
        idx
    }

    fn index_wire(&mut self, wire: &Wire) {
        let from = self.ensure_node(&wire.from_id);
        let to = self.ensure_node(&wire.to_id);
        let edge = self.topology.add_edge(from, to, wire.id.clone());
        self.wire_edges.insert(wire.id.clone(), edge);
    }

    /// Drops a topology node once it has neither a contact nor any wire.
    fn prune_node(&mut self, id: &ContactId) {
        if self.contact_owners.contains_key(id) {
            return;
        }
        let Some(&idx) = self.contact_nodes.get(id) else {
            return;
        };
        let has_edges = self
            .topology
            .edges_directed(idx, Direction::Outgoing)
            .next()
            .is_some()
            || self
                .topology
                .edges_directed(idx, Direction::Incoming)
                .next()
                .is_some();
        if !has_edges {
            self.topology.remove_node(idx);
            self.contact_nodes.remove(id);
        }
    }

    // -----------------------------------------------------------------------
    // Debug consistency
    // -----------------------------------------------------------------------

    /// Verifies group ownership lists, boundary subsets and derived indexes.
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for (group_id, gs) in &self.groups {
            assert_eq!(&gs.group.id, group_id, "group keyed under wrong id");
            assert_eq!(
                gs.group.contact_ids.len(),
                gs.contacts.len(),
                "group {group_id}: contact_ids out of sync"
            );
            for (id, contact) in &gs.contacts {
                assert!(gs.group.contact_ids.contains(id), "group {group_id}: {id} not listed");
                assert_eq!(&contact.group_id, group_id, "contact {id}: wrong group_id");
                assert_eq!(self.contact_owners.get(id), Some(group_id), "contact {id}: owner index");
            }
            assert_eq!(
                gs.group.wire_ids.len(),
                gs.wires.len(),
                "group {group_id}: wire_ids out of sync"
            );
            for (id, wire) in &gs.wires {
                assert!(gs.group.wire_ids.contains(id), "group {group_id}: {id} not listed");
                assert_eq!(&wire.group_id, group_id, "wire {id}: wrong group_id");
                assert!(self.wire_edges.contains_key(id), "wire {id}: not indexed");
            }
            for id in &gs.group.boundary_contact_ids {
                assert!(gs.contacts.contains_key(id), "group {group_id}: boundary {id} not owned");
            }
            for sub in &gs.group.subgroup_ids {
                let child = self.groups.get(sub);
                assert!(
                    child.is_some_and(|c| c.group.parent_id.as_ref() == Some(group_id)),
                    "group {group_id}: subgroup {sub} has wrong parent"
                );
            }
        }
        assert_eq!(self.contact_owners.len(), self.groups.values().map(|g| g.contacts.len()).sum::<usize>());
        assert_eq!(self.wire_owners.len(), self.wire_edges.len());
    }
}

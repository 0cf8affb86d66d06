//! In-memory implementation of [`NetworkStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and hosts that do
//! not need durability. It keeps the same three record layers as the SQLite
//! backend and composes them the same way on load.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;

use bassline_core::{ContactId, GroupId, GroupState, NetworkState};

use crate::convert::compose;
use crate::error::StorageError;
use crate::traits::NetworkStore;
use crate::types::NetworkId;

/// Records kept for a single network.
#[derive(Debug, Clone, Default)]
struct StoredNetwork {
    snapshot: Option<NetworkState>,
    /// Group states in save order.
    groups: IndexMap<GroupId, GroupState>,
    /// Contact contents in save order, with the group they were saved under.
    contents: IndexMap<ContactId, (GroupId, Value)>,
}

impl StoredNetwork {
    fn put_group(&mut self, state: &GroupState) {
        // The group state already carries the newer contents.
        for contact_id in state.contacts.keys() {
            self.contents.shift_remove(contact_id);
        }
        self.groups.shift_remove(&state.group.id);
        self.groups.insert(state.group.id.clone(), state.clone());
    }

    fn put_content(&mut self, group: &GroupId, contact: &ContactId, content: &Value) {
        self.contents.shift_remove(contact);
        self.contents
            .insert(contact.clone(), (group.clone(), content.clone()));
    }
}

/// In-memory storage backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    networks: BTreeMap<NetworkId, StoredNetwork>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    fn stored(&self, network: &NetworkId) -> Option<&StoredNetwork> {
        self.networks.get(network)
    }

    fn stored_mut(&mut self, network: &NetworkId) -> &mut StoredNetwork {
        self.networks.entry(network.clone()).or_default()
    }
}

impl NetworkStore for InMemoryStore {
    fn save_contact_content(
        &mut self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
        content: &Value,
    ) -> Result<(), StorageError> {
        self.stored_mut(network).put_content(group, contact, content);
        Ok(())
    }

    fn load_contact_content(
        &self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
    ) -> Result<Option<Value>, StorageError> {
        let Some(stored) = self.stored(network) else {
            return Ok(None);
        };
        if let Some((_, content)) = stored.contents.get(contact) {
            return Ok(Some(content.clone()));
        }
        if let Some(contact) = stored
            .groups
            .values()
            .rev()
            .find_map(|gs| gs.contacts.get(contact))
        {
            return Ok(Some(contact.content.clone()));
        }
        Ok(stored
            .snapshot
            .as_ref()
            .and_then(|s| s.get_group(group))
            .and_then(|gs| gs.contacts.get(contact))
            .map(|c| c.content.clone()))
    }

    fn save_group_state(&mut self, network: &NetworkId, state: &GroupState) -> Result<(), StorageError> {
        self.stored_mut(network).put_group(state);
        Ok(())
    }

    fn load_group_state(&self, network: &NetworkId, group: &GroupId) -> Result<Option<GroupState>, StorageError> {
        let Some(stored) = self.stored(network) else {
            return Ok(None);
        };
        let mut state = match stored.groups.get(group) {
            Some(gs) => gs.clone(),
            None => match stored.snapshot.as_ref().and_then(|s| s.get_group(group)) {
                Some(gs) => gs.clone(),
                None => return Ok(None),
            },
        };
        for (contact_id, (_, content)) in &stored.contents {
            if let Some(contact) = state.contacts.get_mut(contact_id) {
                contact.content = content.clone();
            }
        }
        Ok(Some(state))
    }

    fn save_network_state(&mut self, network: &NetworkId, state: &NetworkState) -> Result<(), StorageError> {
        let stored = self.stored_mut(network);
        stored.snapshot = Some(state.clone());
        stored.groups.clear();
        stored.contents.clear();
        Ok(())
    }

    fn load_network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StorageError> {
        let Some(stored) = self.stored(network) else {
            return Ok(None);
        };
        let Some(base) = stored.snapshot.clone() else {
            return Ok(None);
        };
        let groups = stored.groups.values().cloned().collect();
        let contents = stored
            .contents
            .iter()
            .map(|(id, (_, content))| (id.clone(), content.clone()))
            .collect();
        compose(base, groups, contents).map(Some)
    }

    fn list_networks(&self) -> Result<Vec<NetworkId>, StorageError> {
        Ok(self.networks.keys().cloned().collect())
    }

    fn delete_network(&mut self, network: &NetworkId) -> Result<(), StorageError> {
        self.networks
            .remove(network)
            .map(|_| ())
            .ok_or_else(|| StorageError::NetworkNotFound(network.to_string()))
    }
}

//! Mapping a batch of [`Change`]s onto [`NetworkStore`] calls.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use bassline_core::{Change, ContactId, GroupId, NetworkState};

use crate::error::StorageError;
use crate::traits::NetworkStore;
use crate::types::NetworkId;

/// What a batch of changes was persisted as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistSummary {
    pub snapshots: usize,
    pub group_states: usize,
    pub contents: usize,
}

/// Persists `changes`, already applied to `state`, through `store`.
///
/// Group additions or removals save a full snapshot. Other structural
/// changes save the whole state of each touched group. Content updates in
/// groups not otherwise saved become single content saves, last value per
/// contact. A recorded contradiction saves its group, since content saves
/// carry no contradiction. The first store error aborts and is returned.
pub fn persist_changes(
    store: &mut dyn NetworkStore,
    network: &NetworkId,
    state: &NetworkState,
    changes: &[Change],
) -> Result<PersistSummary, StorageError> {
    let mut summary = PersistSummary::default();
    if changes.is_empty() {
        return Ok(summary);
    }

    let needs_snapshot = changes
        .iter()
        .any(|c| matches!(c, Change::GroupAdded { .. } | Change::GroupRemoved { .. }));
    if needs_snapshot {
        store.save_network_state(network, state)?;
        summary.snapshots = 1;
        return Ok(summary);
    }

    let mut touched: Vec<&GroupId> = Vec::new();
    let mut contents: IndexMap<&ContactId, (&GroupId, &Value)> = IndexMap::new();
    for change in changes {
        match change {
            Change::ContactUpdated {
                group_id,
                contact_id,
                content,
                last_contradiction: None,
            } => {
                contents.shift_remove(contact_id);
                contents.insert(contact_id, (group_id, content));
            }
            other => {
                let group_id = other.group_id();
                if !touched.contains(&group_id) {
                    touched.push(group_id);
                }
            }
        }
    }

    let mut saved: HashSet<&GroupId> = HashSet::new();
    for group_id in touched {
        // A group removed by a later batch has nothing left to save.
        if let Some(gs) = state.get_group(group_id) {
            store.save_group_state(network, gs)?;
            saved.insert(group_id);
            summary.group_states += 1;
        }
    }
    for (contact_id, (group_id, content)) in contents {
        if saved.contains(group_id) {
            continue;
        }
        store.save_contact_content(network, group_id, contact_id, content)?;
        summary.contents += 1;
    }

    tracing::debug!(
        network = %network,
        snapshots = summary.snapshots,
        group_states = summary.group_states,
        contents = summary.contents,
        "persisted change batch"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use bassline_core::{Contact, ContradictionRecord, Group};
    use serde_json::json;

    fn state() -> NetworkState {
        let mut state = NetworkState::with_root(GroupId::from("root"), "root");
        let root = GroupId::from("root");
        state
            .add_contact(&root, Contact::with_id(ContactId::from("a"), root.clone()))
            .unwrap();
        state
    }

    #[test]
    fn content_updates_keep_last_value() {
        let mut store = InMemoryStore::new();
        let network = NetworkId::from("n");
        let mut state = state();
        store.save_network_state(&network, &state).unwrap();
        state
            .set_contact_content(&ContactId::from("a"), json!(2))
            .unwrap();

        let update = |v| Change::ContactUpdated {
            group_id: GroupId::from("root"),
            contact_id: ContactId::from("a"),
            content: v,
            last_contradiction: None,
        };
        let summary = persist_changes(&mut store, &network, &state, &[update(json!(1)), update(json!(2))]).unwrap();
        assert_eq!(summary.contents, 1);
        let loaded = store.load_network_state(&network).unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn group_changes_save_snapshot() {
        let mut store = InMemoryStore::new();
        let network = NetworkId::from("n");
        let mut state = state();
        let group = Group::with_id(GroupId::from("g"), "g", Some(GroupId::from("root")));
        state.add_group(group.clone()).unwrap();

        let summary = persist_changes(&mut store, &network, &state, &[Change::GroupAdded { group }]).unwrap();
        assert_eq!(summary.snapshots, 1);
        assert_eq!(store.load_network_state(&network).unwrap().unwrap(), state);
    }

    #[test]
    fn structural_changes_save_group_state() {
        let mut store = InMemoryStore::new();
        let network = NetworkId::from("n");
        let mut state = state();
        store.save_network_state(&network, &state).unwrap();

        let root = GroupId::from("root");
        let contact = Contact::with_id(ContactId::from("b"), root.clone()).with_content(json!("b"));
        state.add_contact(&root, contact.clone()).unwrap();
        let changes = [
            Change::ContactAdded {
                group_id: root.clone(),
                contact,
            },
            Change::ContactUpdated {
                group_id: root.clone(),
                contact_id: ContactId::from("b"),
                content: json!("b"),
                last_contradiction: None,
            },
        ];
        let summary = persist_changes(&mut store, &network, &state, &changes).unwrap();
        assert_eq!(summary.group_states, 1);
        assert_eq!(summary.contents, 0);
        assert_eq!(store.load_network_state(&network).unwrap().unwrap(), state);
    }

    #[test]
    fn contradictions_persist_until_a_later_write() {
        let mut store = InMemoryStore::new();
        let network = NetworkId::from("n");
        let mut state = state();
        store.save_network_state(&network, &state).unwrap();

        let a = ContactId::from("a");
        let record = ContradictionRecord {
            message: "Values cannot be merged".to_string(),
            current: Value::Null,
            incoming: json!(2),
        };
        state.set_last_contradiction(&a, Some(record.clone())).unwrap();
        let failed = Change::ContactUpdated {
            group_id: GroupId::from("root"),
            contact_id: a.clone(),
            content: Value::Null,
            last_contradiction: Some(record.clone()),
        };
        let summary = persist_changes(&mut store, &network, &state, &[failed]).unwrap();
        assert_eq!(summary.group_states, 1);
        let loaded = store.load_network_state(&network).unwrap().unwrap();
        assert_eq!(loaded.get_contact(&a).unwrap().last_contradiction.as_ref(), Some(&record));

        state.set_contact_content(&a, json!(3)).unwrap();
        state.set_last_contradiction(&a, None).unwrap();
        let written = Change::ContactUpdated {
            group_id: GroupId::from("root"),
            contact_id: a.clone(),
            content: json!(3),
            last_contradiction: None,
        };
        persist_changes(&mut store, &network, &state, &[written]).unwrap();
        assert_eq!(store.load_network_state(&network).unwrap().unwrap(), state);
    }
}

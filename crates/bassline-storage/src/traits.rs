//! The [`NetworkStore`] trait defining the persistence contract.
//!
//! The core never calls a store. A host subscribes to a scheduler and
//! decides which of these calls a batch of changes becomes (see
//! [`crate::persist::persist_changes`]).
//!
//! The trait is synchronous; async hosts run it on the task that owns the
//! store and await the returned `Result` before acknowledging a change.

use serde_json::Value;

use bassline_core::{ContactId, GroupId, GroupState, NetworkState};

use crate::error::StorageError;
use crate::types::NetworkId;

pub trait NetworkStore: Send {
    // -------------------------------------------------------------------
    // Contact content
    // -------------------------------------------------------------------

    /// Saves the content of one contact.
    fn save_contact_content(
        &mut self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
        content: &Value,
    ) -> Result<(), StorageError>;

    /// Loads the latest content of one contact, if any record of it exists.
    fn load_contact_content(
        &self,
        network: &NetworkId,
        group: &GroupId,
        contact: &ContactId,
    ) -> Result<Option<Value>, StorageError>;

    // -------------------------------------------------------------------
    // Group state
    // -------------------------------------------------------------------

    /// Saves a whole group (descriptor, contacts and wires).
    fn save_group_state(&mut self, network: &NetworkId, state: &GroupState) -> Result<(), StorageError>;

    /// Loads the latest state of a group.
    fn load_group_state(&self, network: &NetworkId, group: &GroupId) -> Result<Option<GroupState>, StorageError>;

    // -------------------------------------------------------------------
    // Network state
    // -------------------------------------------------------------------

    /// Saves a full snapshot, superseding all earlier partial saves.
    fn save_network_state(&mut self, network: &NetworkId, state: &NetworkState) -> Result<(), StorageError>;

    /// Loads the network: last snapshot composed with later partial saves.
    ///
    /// Returns `None` when no snapshot was ever saved.
    fn load_network_state(&self, network: &NetworkId) -> Result<Option<NetworkState>, StorageError>;

    // -------------------------------------------------------------------
    // Administration
    // -------------------------------------------------------------------

    /// Lists stored networks in ID order.
    fn list_networks(&self) -> Result<Vec<NetworkId>, StorageError>;

    /// Deletes a network and all its records.
    fn delete_network(&mut self, network: &NetworkId) -> Result<(), StorageError>;
}

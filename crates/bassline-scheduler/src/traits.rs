//! The [`Scheduler`] trait: the contract every scheduling policy shares.
//!
//! A policy only decides *when* propagation runs. It implements the four
//! hooks (`enqueue`, `flush`, `pending`, `discard_pending`) plus access to
//! its [`NetworkCore`]; everything else is provided here in terms of those.
//! Structural operations flush queued updates first, so updates and edits
//! are applied in the order they were submitted.

use serde_json::Value;

use bassline_core::refactor::{copy_group, copy_selection, extract_to_group};
use bassline_core::{
    diff, Contact, ContactId, CopyMaps, CoreError, Group, GroupId, GroupState, NetworkState, PropagationResult,
    RefactorResult, RefactoringChange, Wire, WireId, WireType,
};

use crate::config::SchedulerPolicy;
use crate::error::SchedulerError;
use crate::network::{NetworkCore, Update};
use crate::subscribers::{SubscriberFn, Subscription};

/// What a committed refactoring did. The new state is already in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Refactored {
    pub changes: Vec<RefactoringChange>,
    pub group_id: Option<GroupId>,
    pub maps: CopyMaps,
}

/// Swaps in the refactored state and sends subscribers the equivalent
/// change log.
fn commit(core: &mut NetworkCore, result: RefactorResult) -> Result<Refactored, SchedulerError> {
    let RefactorResult {
        state,
        changes,
        group_id,
        maps,
    } = result;
    let log = diff(core.state(), &state)?;
    core.replace_state(state);
    core.notify(&log);
    Ok(Refactored {
        changes,
        group_id,
        maps,
    })
}

pub trait Scheduler: Send {
    // -------------------------------------------------------------------
    // Policy hooks
    // -------------------------------------------------------------------

    fn policy(&self) -> SchedulerPolicy;

    fn core(&self) -> &NetworkCore;

    fn core_mut(&mut self) -> &mut NetworkCore;

    /// Accepts an update whose target is known to exist.
    fn enqueue(&mut self, update: Update) -> Result<(), SchedulerError>;

    /// Applies every queued update in order and notifies subscribers once.
    fn flush(&mut self) -> Result<PropagationResult, SchedulerError>;

    /// Number of queued updates.
    fn pending(&self) -> usize;

    /// Drops queued updates without applying them.
    fn discard_pending(&mut self);

    // -------------------------------------------------------------------
    // Structure
    // -------------------------------------------------------------------

    /// Registers a group with the contacts and wires it already owns.
    fn register_group(&mut self, group: GroupState) -> Result<GroupId, SchedulerError> {
        self.flush()?;
        let (id, changes) = self.core_mut().register_group(group)?;
        self.core().notify(&changes);
        Ok(id)
    }

    fn add_group(&mut self, group: Group) -> Result<GroupId, SchedulerError> {
        self.flush()?;
        let (id, changes) = self.core_mut().add_group(group)?;
        self.core().notify(&changes);
        Ok(id)
    }

    fn remove_group(&mut self, id: &GroupId) -> Result<(), SchedulerError> {
        self.flush()?;
        let changes = self.core_mut().remove_group(id)?;
        self.core().notify(&changes);
        Ok(())
    }

    fn add_contact(&mut self, group_id: &GroupId, contact: Contact) -> Result<ContactId, SchedulerError> {
        self.flush()?;
        let (id, changes) = self.core_mut().add_contact(group_id, contact)?;
        self.core().notify(&changes);
        Ok(id)
    }

    fn remove_contact(&mut self, id: &ContactId) -> Result<(), SchedulerError> {
        self.flush()?;
        let changes = self.core_mut().remove_contact(id)?;
        self.core().notify(&changes);
        Ok(())
    }

    fn connect(&mut self, from: &ContactId, to: &ContactId, wire_type: WireType) -> Result<WireId, SchedulerError> {
        self.flush()?;
        let (id, changes) = self.core_mut().connect(from, to, wire_type)?;
        self.core().notify(&changes);
        Ok(id)
    }

    fn disconnect(&mut self, id: &WireId) -> Result<(), SchedulerError> {
        self.flush()?;
        let changes = self.core_mut().disconnect(id)?;
        self.core().notify(&changes);
        Ok(())
    }

    // -------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------

    fn schedule_update(&mut self, contact_id: &ContactId, content: Value) -> Result<(), SchedulerError> {
        let update = Update::Content {
            contact_id: contact_id.clone(),
            content,
        };
        self.core().validate(&update)?;
        self.enqueue(update)
    }

    /// Delivers `content` to `to` as if it arrived over a wire from `from`.
    fn schedule_propagation(&mut self, from: &ContactId, to: &ContactId, content: Value) -> Result<(), SchedulerError> {
        let update = Update::Propagation {
            from_id: from.clone(),
            to_id: to.clone(),
            content,
        };
        self.core().validate(&update)?;
        self.enqueue(update)
    }

    // -------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------

    fn network(&self) -> &NetworkState {
        self.core().state()
    }

    fn get_state(&self, group_id: &GroupId) -> Result<GroupState, SchedulerError> {
        self.network()
            .get_group(group_id)
            .cloned()
            .ok_or_else(|| CoreError::GroupNotFound { id: group_id.clone() }.into())
    }

    fn get_contact(&self, id: &ContactId) -> Option<Contact> {
        self.network().get_contact(id).cloned()
    }

    fn get_wire(&self, id: &WireId) -> Option<Wire> {
        self.network().get_wire(id).cloned()
    }

    fn subscribe(&self, callback: SubscriberFn) -> Subscription {
        self.core().subscribers().subscribe(callback)
    }

    // -------------------------------------------------------------------
    // Whole-state transfer
    // -------------------------------------------------------------------

    /// Flushes, then returns a copy of the whole network.
    fn export_state(&mut self) -> Result<NetworkState, SchedulerError> {
        self.flush()?;
        Ok(self.network().clone())
    }

    /// Replaces the network. Queued updates belong to the old network and
    /// are discarded. Subscribers receive the changes from the old network
    /// to the new one, unless the root group differs.
    fn import_state(&mut self, state: NetworkState) {
        let discarded = self.pending();
        self.discard_pending();
        let log = match diff(self.network(), &state) {
            Ok(log) => log,
            Err(err) => {
                tracing::warn!(%err, "imported network not expressible as changes");
                Vec::new()
            }
        };
        tracing::info!(
            policy = %self.policy(),
            groups = state.group_count(),
            contacts = state.contact_count(),
            discarded,
            "imported network state"
        );
        self.core_mut().replace_state(state);
        self.core().notify(&log);
    }

    // -------------------------------------------------------------------
    // Refactoring
    // -------------------------------------------------------------------

    fn extract_to_group(
        &mut self,
        contact_ids: &[ContactId],
        group_name: &str,
        parent_group_id: &GroupId,
    ) -> Result<Refactored, SchedulerError> {
        self.flush()?;
        let result = extract_to_group(self.network(), contact_ids, group_name, parent_group_id)?;
        commit(self.core_mut(), result)
    }

    fn copy_group(
        &mut self,
        group_id: &GroupId,
        target_parent_id: &GroupId,
        new_name: Option<&str>,
        deep: bool,
    ) -> Result<Refactored, SchedulerError> {
        self.flush()?;
        let result = copy_group(self.network(), group_id, target_parent_id, new_name, deep)?;
        commit(self.core_mut(), result)
    }

    fn copy_selection(
        &mut self,
        contact_ids: &[ContactId],
        group_ids: &[GroupId],
        target_group_id: &GroupId,
        include_wires: bool,
        deep: bool,
    ) -> Result<Refactored, SchedulerError> {
        self.flush()?;
        let result = copy_selection(
            self.network(),
            contact_ids,
            group_ids,
            target_group_id,
            include_wires,
            deep,
        )?;
        commit(self.core_mut(), result)
    }
}

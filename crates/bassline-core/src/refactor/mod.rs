//! Structural refactoring operations.
//!
//! Every operation takes the current [`NetworkState`] by reference, computes
//! the edit against a private clone and returns a [`RefactorResult`] holding
//! the new state and the ordered [`RefactoringChange`] log. The input state
//! is never mutated, so a caller may keep reading it while deciding whether
//! to swap the result in.

mod copy;
mod extract;

use std::collections::HashMap;

use crate::change::RefactoringChange;
use crate::id::{ContactId, GroupId};
use crate::network::NetworkState;

pub use copy::{copy_contacts, copy_group, copy_selection};
pub use extract::extract_to_group;

/// Old -> new ID mappings recorded by copy operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyMaps {
    pub contacts: HashMap<ContactId, ContactId>,
    pub groups: HashMap<GroupId, GroupId>,
}

/// Outcome of a refactoring operation.
#[derive(Debug, Clone)]
pub struct RefactorResult {
    /// The edited network, independent of the input.
    pub state: NetworkState,
    /// Elementary edits in application order.
    pub changes: Vec<RefactoringChange>,
    /// The group created by `extract_to_group` or `copy_group`.
    pub group_id: Option<GroupId>,
    /// ID mappings (copy operations only).
    pub maps: CopyMaps,
}

impl RefactorResult {
    /// Replays the change log against `mirror`.
    pub fn replay(&self, mirror: &mut NetworkState) -> Result<(), crate::error::CoreError> {
        for change in &self.changes {
            change.apply(mirror)?;
        }
        Ok(())
    }
}

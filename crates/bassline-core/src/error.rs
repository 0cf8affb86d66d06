//! Core error types for bassline-core.
//!
//! Uses `thiserror` for structured, matchable error variants. These are the
//! structural failures: a referenced entity is missing, an ID collides, or a
//! topology edit would break the group tree. Merge contradictions are not
//! errors; they are reported as values by the propagation engine.

use crate::id::{ContactId, GroupId, WireId};
use thiserror::Error;

/// Structural errors produced by the graph store, propagation engine and
/// refactoring operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A contact ID was not found in the network.
    #[error("contact not found: {id}")]
    ContactNotFound { id: ContactId },

    /// A wire ID was not found in the network.
    #[error("wire not found: {id}")]
    WireNotFound { id: WireId },

    /// A group ID was not found in the network.
    #[error("group not found: {id}")]
    GroupNotFound { id: GroupId },

    /// A contact with this ID already exists.
    #[error("duplicate contact id: {id}")]
    DuplicateContact { id: ContactId },

    /// A wire with this ID already exists.
    #[error("duplicate wire id: {id}")]
    DuplicateWire { id: WireId },

    /// A group with this ID already exists.
    #[error("duplicate group id: {id}")]
    DuplicateGroup { id: GroupId },

    /// Copying a group into itself or one of its descendants.
    #[error("cannot copy group {group} into {target}: target is the group or one of its descendants")]
    CyclicCopy { group: GroupId, target: GroupId },

    /// The root group cannot be removed or moved.
    #[error("the root group cannot be removed")]
    RootGroupRemoval,

    /// Two networks with different root groups cannot be diffed.
    #[error("root group mismatch: expected {expected}, found {found}")]
    RootMismatch { expected: GroupId, found: GroupId },

    /// A deserialized network breaks an ownership or tree invariant.
    #[error("inconsistent network snapshot: {reason}")]
    InconsistentSnapshot { reason: String },

    /// A refactoring selection is unusable (e.g. empty).
    #[error("invalid selection: {reason}")]
    InvalidSelection { reason: String },
}

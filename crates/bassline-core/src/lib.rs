//! Propagation-network core for Bassline.
//!
//! A network is a tree of [`Group`]s owning [`Contact`]s (value cells) and
//! [`Wire`]s (edges between contacts). Writing a value to a contact
//! propagates it along wires, blending it into each reached contact according
//! to that contact's [`BlendMode`], until nothing changes.
//!
//! # Modules
//!
//! - [`id`]: stable string ID newtypes
//! - [`error`]: structural errors
//! - [`contact`], [`wire`], [`group`]: the data model
//! - [`lattice`]: merge policies and the lattice registry
//! - [`network`]: the graph store ([`NetworkState`])
//! - [`change`]: the change taxonomy and mirror replay
//! - [`diff`]: state replacements as change logs
//! - [`propagation`]: the propagation engine
//! - [`refactor`]: extract-to-group, copy-group, copy-selection

pub mod change;
pub mod contact;
pub mod diff;
pub mod error;
pub mod group;
pub mod id;
pub mod lattice;
pub mod network;
pub mod propagation;
pub mod refactor;
pub mod wire;

// Re-export commonly used types
pub use change::{Change, RefactoringChange};
pub use contact::{BlendMode, BoundaryDirection, Contact, ContradictionRecord};
pub use diff::diff;
pub use error::CoreError;
pub use group::{Group, GroupState};
pub use id::{ContactId, GroupId, WireId};
pub use lattice::{BlendOutcome, Lattice, MergeRegistry};
pub use network::NetworkState;
pub use propagation::{propagate_content, propagate_from, Contradiction, PropagationResult};
pub use refactor::{CopyMaps, RefactorResult};
pub use wire::{Wire, WireType};

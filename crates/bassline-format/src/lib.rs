//! The Bassline declarative format.
//!
//! A [`BasslineSpec`] is a portable JSON description of a group subtree:
//! contacts, wires, a boundary interface, nested gadgets and seed values.
//! [`import_bassline`] instantiates one against a scheduler;
//! [`export_group_as_bassline`] is its inverse.
//!
//! # Modules
//!
//! - [`error`]: FormatError and ValidationError
//! - [`spec`]: the document types
//! - [`validate`]: structural checks
//! - [`hash`]: blake3 content hash
//! - [`import`]: document to network
//! - [`export`]: network to document

pub mod error;
pub mod export;
pub mod hash;
pub mod import;
pub mod spec;
pub mod validate;

pub use error::{FormatError, ValidationError};
pub use export::export_group_as_bassline;
pub use hash::{compute_hash, with_hash};
pub use import::{import_bassline, ImportResult};
pub use spec::{BasslineSpec, Build, ContactSpec, GadgetSpec, Interface, Topology, WireSpec};
pub use validate::validate;

//! Persistence drivers for Bassline networks.
//!
//! Provides the [`NetworkStore`] trait, the save/load contract a host uses to
//! persist what a scheduler reports, plus [`InMemoryStore`] and
//! [`SqliteStore`] as first-class backends.
//!
//! # Storage model
//!
//! A network is stored as its last full snapshot plus the partial saves made
//! since: whole group states and single contact contents. Loading composes
//! them newest-wins (see [`convert::compose`]). Saving a full snapshot
//! discards the partial saves it supersedes.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum
//! - [`types`]: NetworkId
//! - [`traits`]: NetworkStore trait definition
//! - [`convert`]: snapshot/overlay composition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: versioned table layout of network databases
//! - [`sqlite`]: SqliteStore implementation
//! - [`persist`]: mapping a change batch to store calls

pub mod convert;
pub mod error;
pub mod memory;
pub mod persist;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::InMemoryStore;
pub use persist::persist_changes;
pub use sqlite::SqliteStore;
pub use traits::NetworkStore;
pub use types::NetworkId;

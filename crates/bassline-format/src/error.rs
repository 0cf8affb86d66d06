//! Format error types.

use thiserror::Error;

use bassline_core::CoreError;
use bassline_scheduler::SchedulerError;

/// A document that cannot be instantiated as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bassline name is empty")]
    EmptyName,

    #[error("bassline {name} builds nothing")]
    EmptyBuild { name: String },

    #[error("bassline {name} declares contact {id} more than once")]
    DuplicateContact { name: String, id: String },

    #[error("bassline {name} declares gadget {id} more than once")]
    DuplicateGadget { name: String, id: String },

    /// An interface entry, wire endpoint or seed names no contact.
    #[error("bassline {name}: {context} refers to unknown contact {id}")]
    UnknownContact { name: String, context: String, id: String },

    #[error("bassline {name}: hash {expected} does not match content hash {actual}")]
    HashMismatch {
        name: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("invalid bassline: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

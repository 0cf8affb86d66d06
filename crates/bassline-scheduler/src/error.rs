//! Scheduler error types.

use thiserror::Error;

use bassline_core::CoreError;
use bassline_storage::StorageError;

/// Errors produced by schedulers and the network worker.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A structural precondition failed (unknown ID, duplicate, cycle).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The persistence driver failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A request could not be decoded into a command.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The worker task has stopped.
    #[error("network worker is not running")]
    WorkerClosed,

    /// The worker answered a request with an error response.
    #[error("request {id} failed: {message}")]
    Remote { id: String, message: String },
}

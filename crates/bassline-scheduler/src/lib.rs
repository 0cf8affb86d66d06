//! Scheduling, subscription and hosting for Bassline networks.
//!
//! A [`Scheduler`] owns one network and decides when content updates are
//! propagated: immediately, in submission-order batches, or by priority.
//! Structural edits, queries, state transfer and refactorings are shared by
//! every policy. Subscribers receive the [`bassline_core::Change`]s each
//! operation produced.
//!
//! [`NetworkWorker`] runs a scheduler on its own task behind a
//! request/response [`protocol`], persisting changes through a
//! [`bassline_storage::NetworkStore`] before broadcasting them.
//!
//! # Modules
//!
//! - [`error`]: SchedulerError enum
//! - [`config`]: policy selection and environment settings
//! - [`network`]: the owned network and its structural operations
//! - [`subscribers`]: change callbacks
//! - [`traits`]: the Scheduler trait
//! - [`immediate`], [`batch`], [`priority`]: the policies
//! - [`flusher`]: interval and frame flush triggers
//! - [`protocol`]: requests, responses and notifications
//! - [`worker`]: the hosted network task

pub mod batch;
pub mod config;
pub mod error;
pub mod flusher;
pub mod immediate;
pub mod network;
pub mod priority;
pub mod protocol;
pub mod subscribers;
pub mod traits;
pub mod worker;

pub use batch::BatchScheduler;
pub use config::{build_scheduler, open_store, SchedulerConfig, SchedulerPolicy};
pub use error::SchedulerError;
pub use flusher::{spawn_flusher, FlushTrigger, SharedScheduler};
pub use immediate::ImmediateScheduler;
pub use network::{NetworkCore, Update};
pub use priority::{Priority, PriorityScheduler};
pub use protocol::{Command, Notification, Request, Response, ResponseStatus};
pub use subscribers::{SubscriberFn, Subscribers, Subscription};
pub use traits::{Refactored, Scheduler};
pub use worker::{NetworkWorker, WorkerHandle};

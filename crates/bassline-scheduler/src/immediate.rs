//! Immediate policy: propagate inside `schedule_update`.

use std::sync::Arc;

use bassline_core::{MergeRegistry, NetworkState, PropagationResult};

use crate::config::SchedulerPolicy;
use crate::error::SchedulerError;
use crate::network::{NetworkCore, Update};
use crate::traits::Scheduler;

/// Runs every update to completion and notifies subscribers before
/// `schedule_update` returns.
#[derive(Debug)]
pub struct ImmediateScheduler {
    core: NetworkCore,
}

impl ImmediateScheduler {
    pub fn new(state: NetworkState, lattices: Arc<MergeRegistry>) -> Self {
        ImmediateScheduler {
            core: NetworkCore::new(state, lattices),
        }
    }
}

impl Scheduler for ImmediateScheduler {
    fn policy(&self) -> SchedulerPolicy {
        SchedulerPolicy::Immediate
    }

    fn core(&self) -> &NetworkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NetworkCore {
        &mut self.core
    }

    fn enqueue(&mut self, update: Update) -> Result<(), SchedulerError> {
        let result = self.core.propagate(&update)?;
        self.core.notify(&result.changes);
        Ok(())
    }

    fn flush(&mut self) -> Result<PropagationResult, SchedulerError> {
        Ok(PropagationResult::default())
    }

    fn pending(&self) -> usize {
        0
    }

    fn discard_pending(&mut self) {}
}

//! Batch policy: queue updates, apply them in submission order on flush.

use std::collections::VecDeque;
use std::sync::Arc;

use bassline_core::{MergeRegistry, NetworkState, PropagationResult};

use crate::config::SchedulerPolicy;
use crate::error::SchedulerError;
use crate::network::{NetworkCore, Update};
use crate::traits::Scheduler;

/// Coalesces updates until [`Scheduler::flush`] is called, either by the
/// host or by a flush trigger.
///
/// All updates queued before a flush are applied in the order received and
/// subscribers see their combined changes in a single notification. Two
/// updates to the same accept-last contact therefore leave the later value.
#[derive(Debug)]
pub struct BatchScheduler {
    core: NetworkCore,
    queue: VecDeque<Update>,
}

impl BatchScheduler {
    pub fn new(state: NetworkState, lattices: Arc<MergeRegistry>) -> Self {
        BatchScheduler {
            core: NetworkCore::new(state, lattices),
            queue: VecDeque::new(),
        }
    }
}

/// Applies `updates` in order, folding their results.
///
/// An update whose target vanished since it was queued is skipped.
pub(crate) fn apply_all(core: &mut NetworkCore, updates: impl IntoIterator<Item = Update>) -> PropagationResult {
    let mut total = PropagationResult::default();
    for update in updates {
        match core.propagate(&update) {
            Ok(result) => total.absorb(result),
            Err(err) => {
                tracing::warn!(%err, contact = %update.target(), "dropping queued update");
                total.warnings.push(err.to_string());
            }
        }
    }
    tracing::debug!(
        changes = total.changes.len(),
        contradictions = total.contradictions.len(),
        "flushed queued updates"
    );
    core.notify(&total.changes);
    total
}

impl Scheduler for BatchScheduler {
    fn policy(&self) -> SchedulerPolicy {
        SchedulerPolicy::Batch
    }

    fn core(&self) -> &NetworkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NetworkCore {
        &mut self.core
    }

    fn enqueue(&mut self, update: Update) -> Result<(), SchedulerError> {
        self.queue.push_back(update);
        Ok(())
    }

    fn flush(&mut self) -> Result<PropagationResult, SchedulerError> {
        if self.queue.is_empty() {
            return Ok(PropagationResult::default());
        }
        let updates = std::mem::take(&mut self.queue);
        Ok(apply_all(&mut self.core, updates))
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }

    fn discard_pending(&mut self) {
        self.queue.clear();
    }
}

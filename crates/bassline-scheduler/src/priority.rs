//! Priority policy: queue updates, apply higher priorities first on flush.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bassline_core::{ContactId, MergeRegistry, NetworkState, PropagationResult};

use crate::batch::apply_all;
use crate::config::SchedulerPolicy;
use crate::error::SchedulerError;
use crate::network::{NetworkCore, Update};
use crate::traits::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug)]
struct Queued {
    priority: Priority,
    seq: u64,
    update: Update,
}

impl Queued {
    fn key(&self) -> (Priority, Reverse<u64>) {
        (self.priority, Reverse(self.seq))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Like [`crate::batch::BatchScheduler`], but a flush applies queued updates
/// highest priority first, FIFO within one priority. Updates scheduled
/// through the common contract get [`Priority::Normal`].
#[derive(Debug)]
pub struct PriorityScheduler {
    core: NetworkCore,
    heap: BinaryHeap<Queued>,
    next_seq: u64,
}

impl PriorityScheduler {
    pub fn new(state: NetworkState, lattices: Arc<MergeRegistry>) -> Self {
        PriorityScheduler {
            core: NetworkCore::new(state, lattices),
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    pub fn schedule_update_with_priority(
        &mut self,
        contact_id: &ContactId,
        content: Value,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        let update = Update::Content {
            contact_id: contact_id.clone(),
            content,
        };
        self.core.validate(&update)?;
        self.push(update, priority);
        Ok(())
    }

    pub fn schedule_propagation_with_priority(
        &mut self,
        from: &ContactId,
        to: &ContactId,
        content: Value,
        priority: Priority,
    ) -> Result<(), SchedulerError> {
        let update = Update::Propagation {
            from_id: from.clone(),
            to_id: to.clone(),
            content,
        };
        self.core.validate(&update)?;
        self.push(update, priority);
        Ok(())
    }

    fn push(&mut self, update: Update, priority: Priority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Queued { priority, seq, update });
    }
}

impl Scheduler for PriorityScheduler {
    fn policy(&self) -> SchedulerPolicy {
        SchedulerPolicy::Priority
    }

    fn core(&self) -> &NetworkCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NetworkCore {
        &mut self.core
    }

    fn enqueue(&mut self, update: Update) -> Result<(), SchedulerError> {
        self.push(update, Priority::Normal);
        Ok(())
    }

    fn flush(&mut self) -> Result<PropagationResult, SchedulerError> {
        if self.heap.is_empty() {
            return Ok(PropagationResult::default());
        }
        let heap = std::mem::take(&mut self.heap);
        let ordered = heap.into_sorted_vec().into_iter().rev().map(|q| q.update);
        Ok(apply_all(&mut self.core, ordered))
    }

    fn pending(&self) -> usize {
        self.heap.len()
    }

    fn discard_pending(&mut self) {
        self.heap.clear();
    }
}

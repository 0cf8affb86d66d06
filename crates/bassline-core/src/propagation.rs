//! The propagation engine.
//!
//! [`propagate_content`] writes a value to a seed contact and forwards the
//! same value breadth-first along wires. Every reached contact blends the
//! value into its own content through the [`MergeRegistry`]:
//!
//! - a change marks the contact visited, records a [`Change`], and continues
//!   outward through its wires;
//! - no change is a dead end for that edge only;
//! - a contradiction is recorded on the contact and in the result, and is
//!   also a dead end.
//!
//! Each contact is merged and forwarded at most once per call, which bounds
//! the work by the contact count even when wires form cycles. The first path
//! to reach a contact wins.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::change::Change;
use crate::error::CoreError;
use crate::id::{ContactId, GroupId};
use crate::lattice::{BlendOutcome, MergeRegistry};
use crate::network::NetworkState;

/// A failed merge observed during one propagation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contradiction {
    pub contact_id: ContactId,
    pub group_id: GroupId,
    pub message: String,
    pub current: Value,
    pub incoming: Value,
}

/// Everything one propagation call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationResult {
    /// Content changes in the order they were applied.
    pub changes: Vec<Change>,
    pub contradictions: Vec<Contradiction>,
    /// Recoverable oddities, e.g. wires pointing at missing contacts.
    pub warnings: Vec<String>,
    /// Wall-clock time of the call. Informational only.
    pub duration: Duration,
}

impl PropagationResult {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty() && self.contradictions.is_empty()
    }

    /// Folds another result into this one, keeping order.
    pub fn absorb(&mut self, other: PropagationResult) {
        self.changes.extend(other.changes);
        self.contradictions.extend(other.contradictions);
        self.warnings.extend(other.warnings);
        self.duration += other.duration;
    }
}

/// Writes `value` to `seed` and propagates it through the network.
///
/// Returns [`CoreError::ContactNotFound`] if the seed does not exist; every
/// other failure (contradictions, dangling wires) is reported in the result.
pub fn propagate_content(
    state: &mut NetworkState,
    lattices: &MergeRegistry,
    seed: &ContactId,
    value: Value,
) -> Result<PropagationResult, CoreError> {
    Pass::new(state, lattices, value).run(seed, None)
}

/// Propagates `value` as if it arrived at `to` over a wire from `from`.
///
/// `from` is treated as already visited, so the value does not echo back to
/// its sender. `from` need not exist.
pub fn propagate_from(
    state: &mut NetworkState,
    lattices: &MergeRegistry,
    from: &ContactId,
    to: &ContactId,
    value: Value,
) -> Result<PropagationResult, CoreError> {
    Pass::new(state, lattices, value).run(to, Some(from))
}

/// State of a single propagation call.
struct Pass<'a> {
    state: &'a mut NetworkState,
    lattices: &'a MergeRegistry,
    value: Value,
    visited: HashSet<ContactId>,
    contradicted: HashSet<ContactId>,
    result: PropagationResult,
}

impl<'a> Pass<'a> {
    fn new(state: &'a mut NetworkState, lattices: &'a MergeRegistry, value: Value) -> Self {
        Pass {
            state,
            lattices,
            value,
            visited: HashSet::new(),
            contradicted: HashSet::new(),
            result: PropagationResult::default(),
        }
    }

    fn run(mut self, seed: &ContactId, sender: Option<&ContactId>) -> Result<PropagationResult, CoreError> {
        let started = Instant::now();
        if self.state.get_contact(seed).is_none() {
            return Err(CoreError::ContactNotFound { id: seed.clone() });
        }
        if let Some(sender) = sender {
            self.visited.insert(sender.clone());
        }

        let mut frontier = VecDeque::new();
        if self.visit(seed)? {
            frontier.push_back(seed.clone());
        }

        while let Some(source) = frontier.pop_front() {
            let targets: Vec<ContactId> = self
                .state
                .incident_wires(&source)
                .into_iter()
                .filter_map(|wire| wire.target_from(&source).cloned())
                .collect();
            for target in targets {
                if self.visited.contains(&target) {
                    continue;
                }
                if self.state.get_contact(&target).is_none() {
                    tracing::warn!(from = %source, to = %target, "skipping dangling wire endpoint");
                    self.result
                        .warnings
                        .push(format!("wire from {source} points at missing contact {target}"));
                    continue;
                }
                if self.visit(&target)? {
                    frontier.push_back(target);
                }
            }
        }

        self.result.duration = started.elapsed();
        tracing::debug!(
            seed = %seed,
            changes = self.result.changes.len(),
            contradictions = self.result.contradictions.len(),
            "propagation finished"
        );
        Ok(self.result)
    }

    /// Blends the propagated value into `id`. Returns `true` if the contact
    /// changed and should forward the value.
    fn visit(&mut self, id: &ContactId) -> Result<bool, CoreError> {
        let contact = self
            .state
            .get_contact(id)
            .ok_or_else(|| CoreError::ContactNotFound { id: id.clone() })?;
        let group_id = contact.group_id.clone();
        let had_contradiction = contact.last_contradiction.is_some();

        match self
            .lattices
            .blend(contact.blend_mode, &contact.content, &self.value)
        {
            BlendOutcome::Unchanged => Ok(false),
            BlendOutcome::Changed(content) => {
                self.state.set_contact_content(id, content.clone())?;
                if had_contradiction {
                    self.state.set_last_contradiction(id, None)?;
                }
                self.visited.insert(id.clone());
                self.result.changes.push(Change::ContactUpdated {
                    group_id,
                    contact_id: id.clone(),
                    content,
                    last_contradiction: None,
                });
                Ok(true)
            }
            BlendOutcome::Contradiction(record) => {
                if self.contradicted.insert(id.clone()) {
                    tracing::warn!(contact = %id, "{}", record.message);
                    self.result.contradictions.push(Contradiction {
                        contact_id: id.clone(),
                        group_id: group_id.clone(),
                        message: record.message.clone(),
                        current: record.current.clone(),
                        incoming: record.incoming.clone(),
                    });
                    self.result.changes.push(Change::ContactUpdated {
                        group_id,
                        contact_id: id.clone(),
                        content: record.current.clone(),
                        last_contradiction: Some(record.clone()),
                    });
                    self.state.set_last_contradiction(id, Some(record))?;
                }
                Ok(false)
            }
        }
    }
}

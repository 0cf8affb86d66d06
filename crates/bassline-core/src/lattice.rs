//! Merge policies: blend modes and the lattice registry.
//!
//! Mergeable content is a tagged JSON value `{"lattice": "<tag>", "value": ...}`.
//! The [`MergeRegistry`] maps tags to [`Lattice`] implementations so new
//! lattice types can be added without touching the propagation engine.
//!
//! [`MergeRegistry::blend`] is the single entry point used by propagation:
//! it applies a contact's [`BlendMode`] and reports whether the content
//! changed, stayed the same, or contradicted.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::contact::{BlendMode, ContradictionRecord};

/// Message attached to every failed merge.
pub const CONTRADICTION_MESSAGE: &str = "Values cannot be merged";

/// Field holding the lattice tag in a tagged value.
pub const TAG_FIELD: &str = "lattice";
/// Field holding the lattice payload in a tagged value.
pub const PAYLOAD_FIELD: &str = "value";

/// A join-semilattice over JSON payloads.
///
/// `join` must be commutative, associative and idempotent up to the payload
/// equality the lattice defines; the engine relies on idempotence to stop
/// propagation when a value is re-delivered.
pub trait Lattice: Send + Sync + fmt::Debug {
    /// The tag this lattice is registered under.
    fn tag(&self) -> &str;

    /// Joins two payloads. Returns `None` if either payload is malformed for
    /// this lattice.
    fn join(&self, current: &Value, incoming: &Value) -> Option<Value>;
}

/// Outcome of blending an incoming value into a contact.
#[derive(Debug, Clone, PartialEq)]
pub enum BlendOutcome {
    /// The computed content equals the current content.
    Unchanged,
    /// The contact's content becomes this value.
    Changed(Value),
    /// The merge failed; the content stays as it was.
    Contradiction(ContradictionRecord),
}

/// Builds a tagged mergeable value.
pub fn tagged(tag: &str, payload: Value) -> Value {
    json!({ TAG_FIELD: tag, PAYLOAD_FIELD: payload })
}

/// Builds a grow-only set value from its members.
pub fn grow_set<I, T>(items: I) -> Value
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    let members: Vec<Value> = items.into_iter().map(Into::into).collect();
    tagged(GrowSet::TAG, Value::Array(members))
}

/// Splits a tagged value into `(tag, payload)`.
pub fn split_tagged(value: &Value) -> Option<(&str, &Value)> {
    let obj = value.as_object()?;
    let tag = obj.get(TAG_FIELD)?.as_str()?;
    let payload = obj.get(PAYLOAD_FIELD)?;
    Some((tag, payload))
}

// ---------------------------------------------------------------------------
// Built-in lattices
// ---------------------------------------------------------------------------

/// Grow-only set: join is union. Members keep first-seen order so that
/// re-merging a permutation of the current members yields identical content.
#[derive(Debug, Clone)]
pub struct GrowSet {
    tag: String,
}

impl GrowSet {
    pub const TAG: &'static str = "grow-set";

    pub fn new() -> Self {
        GrowSet::named(Self::TAG)
    }

    /// A grow-set registered under another tag (e.g. `"set-union"`).
    pub fn named(tag: &str) -> Self {
        GrowSet {
            tag: tag.to_string(),
        }
    }
}

impl Default for GrowSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Lattice for GrowSet {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn join(&self, current: &Value, incoming: &Value) -> Option<Value> {
        let current = current.as_array()?;
        let incoming = incoming.as_array()?;
        let mut members: Vec<Value> = Vec::with_capacity(current.len() + incoming.len());
        for item in current.iter().chain(incoming.iter()) {
            if !members.contains(item) {
                members.push(item.clone());
            }
        }
        Some(Value::Array(members))
    }
}

/// Numeric maximum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxNumber;

impl MaxNumber {
    pub const TAG: &'static str = "max-number";
}

impl Lattice for MaxNumber {
    fn tag(&self) -> &str {
        Self::TAG
    }

    fn join(&self, current: &Value, incoming: &Value) -> Option<Value> {
        let (a, b) = (current.as_f64()?, incoming.as_f64()?);
        Some(if b > a { incoming.clone() } else { current.clone() })
    }
}

/// Numeric minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinNumber;

impl MinNumber {
    pub const TAG: &'static str = "min-number";
}

impl Lattice for MinNumber {
    fn tag(&self) -> &str {
        Self::TAG
    }

    fn join(&self, current: &Value, incoming: &Value) -> Option<Value> {
        let (a, b) = (current.as_f64()?, incoming.as_f64()?);
        Some(if b < a { incoming.clone() } else { current.clone() })
    }
}

/// Last-write-wins register. Payload is `{"timestamp": n, "value": v}`; the
/// higher timestamp wins and ties keep the current value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWrite;

impl LastWrite {
    pub const TAG: &'static str = "last-write";

    /// Builds a tagged last-write value.
    pub fn value(timestamp: u64, value: Value) -> Value {
        tagged(Self::TAG, json!({ "timestamp": timestamp, "value": value }))
    }
}

impl Lattice for LastWrite {
    fn tag(&self) -> &str {
        Self::TAG
    }

    fn join(&self, current: &Value, incoming: &Value) -> Option<Value> {
        let ts = |v: &Value| -> Option<u64> {
            let obj: &Map<String, Value> = v.as_object()?;
            obj.get(PAYLOAD_FIELD)?;
            obj.get("timestamp")?.as_u64()
        };
        let (a, b) = (ts(current)?, ts(incoming)?);
        Some(if b > a { incoming.clone() } else { current.clone() })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lattices keyed by tag.
///
/// Passed explicitly to the engine and schedulers, so independent networks
/// in one process can carry different registries.
#[derive(Debug, Clone, Default)]
pub struct MergeRegistry {
    lattices: HashMap<String, Arc<dyn Lattice>>,
}

impl MergeRegistry {
    /// An empty registry: every `merge` against non-null content contradicts.
    pub fn new() -> Self {
        MergeRegistry {
            lattices: HashMap::new(),
        }
    }

    /// A registry with `grow-set`, `set-union`, `max-number`, `min-number`
    /// and `last-write`.
    pub fn with_builtins() -> Self {
        let mut registry = MergeRegistry::new();
        registry.register(GrowSet::new());
        registry.register(GrowSet::named("set-union"));
        registry.register(MaxNumber);
        registry.register(MinNumber);
        registry.register(LastWrite);
        registry
    }

    /// Registers a lattice under its tag, replacing any previous entry.
    pub fn register<L: Lattice + 'static>(&mut self, lattice: L) {
        self.lattices
            .insert(lattice.tag().to_string(), Arc::new(lattice));
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Lattice>> {
        self.lattices.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.lattices.contains_key(tag)
    }

    /// Joins two tagged values. Fails if either is untagged, the tags
    /// differ, the tag is unknown, or the lattice rejects the payloads.
    pub fn merge(&self, current: &Value, incoming: &Value) -> Result<Value, &'static str> {
        let (Some((tag_a, a)), Some((tag_b, b))) = (split_tagged(current), split_tagged(incoming))
        else {
            return Err(CONTRADICTION_MESSAGE);
        };
        if tag_a != tag_b {
            return Err(CONTRADICTION_MESSAGE);
        }
        let lattice = self.get(tag_a).ok_or(CONTRADICTION_MESSAGE)?;
        let joined = lattice.join(a, b).ok_or(CONTRADICTION_MESSAGE)?;
        Ok(tagged(tag_a, joined))
    }

    /// Applies `mode` to combine `incoming` with `current`.
    ///
    /// Under `merge`, an empty (`null`) contact adopts the incoming value.
    pub fn blend(&self, mode: BlendMode, current: &Value, incoming: &Value) -> BlendOutcome {
        if current == incoming {
            return BlendOutcome::Unchanged;
        }
        match mode {
            BlendMode::AcceptLast => BlendOutcome::Changed(incoming.clone()),
            BlendMode::Merge => {
                if current.is_null() {
                    return BlendOutcome::Changed(incoming.clone());
                }
                match self.merge(current, incoming) {
                    Ok(merged) if &merged == current => BlendOutcome::Unchanged,
                    Ok(merged) => BlendOutcome::Changed(merged),
                    Err(message) => BlendOutcome::Contradiction(ContradictionRecord {
                        message: message.to_string(),
                        current: current.clone(),
                        incoming: incoming.clone(),
                    }),
                }
            }
        }
    }
}

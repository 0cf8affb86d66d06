//! Scheduler configuration.
//!
//! Read from environment variables by [`SchedulerConfig::from_env`]:
//! - `BASSLINE_SCHEDULER`: `immediate` (default), `batch` or `priority`
//! - `BASSLINE_BATCH_INTERVAL_MS`: flush period for queued policies (default: 16)
//! - `BASSLINE_DB_PATH`: SQLite database path; unset means no persistence
//! - `BASSLINE_CHANNEL_CAPACITY`: worker request/notification capacity (default: 64)
//!
//! Absent or unparsable values fall back to the defaults.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bassline_core::{MergeRegistry, NetworkState};
use bassline_storage::{NetworkStore, SqliteStore};

use crate::batch::BatchScheduler;
use crate::error::SchedulerError;
use crate::immediate::ImmediateScheduler;
use crate::priority::PriorityScheduler;
use crate::traits::Scheduler;

pub const ENV_SCHEDULER: &str = "BASSLINE_SCHEDULER";
pub const ENV_BATCH_INTERVAL_MS: &str = "BASSLINE_BATCH_INTERVAL_MS";
pub const ENV_DB_PATH: &str = "BASSLINE_DB_PATH";
pub const ENV_CHANNEL_CAPACITY: &str = "BASSLINE_CHANNEL_CAPACITY";

/// When propagation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerPolicy {
    /// Propagate synchronously inside `schedule_update`.
    #[default]
    Immediate,
    /// Queue updates, apply them in order on flush.
    Batch,
    /// Queue updates, apply higher priorities first on flush.
    Priority,
}

impl SchedulerPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerPolicy::Immediate => "immediate",
            SchedulerPolicy::Batch => "batch",
            SchedulerPolicy::Priority => "priority",
        }
    }

    /// Whether updates wait for a flush.
    pub fn is_queued(&self) -> bool {
        !matches!(self, SchedulerPolicy::Immediate)
    }
}

impl fmt::Display for SchedulerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(SchedulerPolicy::Immediate),
            "batch" => Ok(SchedulerPolicy::Batch),
            "priority" => Ok(SchedulerPolicy::Priority),
            other => Err(format!("unknown scheduler policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub policy: SchedulerPolicy,
    pub batch_interval: Duration,
    pub db_path: Option<String>,
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            policy: SchedulerPolicy::Immediate,
            batch_interval: Duration::from_millis(16),
            db_path: None,
            channel_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        SchedulerConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = SchedulerConfig::default();

        let policy = match lookup(ENV_SCHEDULER) {
            Some(raw) => raw.parse().unwrap_or_else(|err: String| {
                tracing::warn!(%err, "falling back to {}", defaults.policy);
                defaults.policy
            }),
            None => defaults.policy,
        };
        let batch_interval = parse_or(&lookup, ENV_BATCH_INTERVAL_MS)
            .map(Duration::from_millis)
            .unwrap_or(defaults.batch_interval);
        let channel_capacity = parse_or(&lookup, ENV_CHANNEL_CAPACITY)
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.channel_capacity);
        let db_path = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty());

        SchedulerConfig {
            policy,
            batch_interval,
            db_path,
            channel_capacity,
        }
    }

    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

/// Constructs the configured scheduler around `state`.
pub fn build_scheduler(
    config: &SchedulerConfig,
    lattices: Arc<MergeRegistry>,
    state: NetworkState,
) -> Box<dyn Scheduler> {
    match config.policy {
        SchedulerPolicy::Immediate => Box::new(ImmediateScheduler::new(state, lattices)),
        SchedulerPolicy::Batch => Box::new(BatchScheduler::new(state, lattices)),
        SchedulerPolicy::Priority => Box::new(PriorityScheduler::new(state, lattices)),
    }
}

/// Opens the configured store, if any.
pub fn open_store(config: &SchedulerConfig) -> Result<Option<Box<dyn NetworkStore>>, SchedulerError> {
    match &config.db_path {
        Some(path) => Ok(Some(Box::new(SqliteStore::new(path)?))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SchedulerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn reads_all_settings() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            (ENV_SCHEDULER, "Batch"),
            (ENV_BATCH_INTERVAL_MS, "40"),
            (ENV_DB_PATH, "/tmp/net.db"),
            (ENV_CHANNEL_CAPACITY, "8"),
        ]));
        assert_eq!(config.policy, SchedulerPolicy::Batch);
        assert_eq!(config.batch_interval, Duration::from_millis(40));
        assert_eq!(config.db_path.as_deref(), Some("/tmp/net.db"));
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = SchedulerConfig::from_lookup(lookup(&[
            (ENV_SCHEDULER, "eventually"),
            (ENV_BATCH_INTERVAL_MS, "soon"),
            (ENV_CHANNEL_CAPACITY, "0"),
        ]));
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn build_honours_policy() {
        let lattices = Arc::new(MergeRegistry::with_builtins());
        for policy in [SchedulerPolicy::Immediate, SchedulerPolicy::Batch, SchedulerPolicy::Priority] {
            let config = SchedulerConfig::default().with_policy(policy);
            let scheduler = build_scheduler(&config, Arc::clone(&lattices), NetworkState::new("root"));
            assert_eq!(scheduler.policy(), policy);
        }
    }

    #[test]
    fn store_only_with_a_path() {
        assert!(open_store(&SchedulerConfig::default()).unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("networks.db");
        let config = SchedulerConfig {
            db_path: Some(path.to_string_lossy().into_owned()),
            ..SchedulerConfig::default()
        };
        let store = open_store(&config).unwrap().unwrap();
        assert!(store.list_networks().unwrap().is_empty());
    }
}

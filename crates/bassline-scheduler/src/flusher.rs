//! Flush triggers for queued policies.
//!
//! The scheduling primitive is the host's: a fixed interval or a stream of
//! frame signals. [`spawn_flusher`] runs a background task that flushes a
//! shared scheduler on every tick. The task holds only a weak reference and
//! exits once the scheduler is dropped (or the frame channel closes).

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::traits::Scheduler;

/// A scheduler shared between tasks.
pub type SharedScheduler = Arc<Mutex<Box<dyn Scheduler>>>;

pub fn shared(scheduler: Box<dyn Scheduler>) -> SharedScheduler {
    Arc::new(Mutex::new(scheduler))
}

#[derive(Debug)]
pub enum FlushTrigger {
    /// Flush on a fixed period.
    Interval(Duration),
    /// Flush once per received frame signal.
    Frames(mpsc::Receiver<()>),
}

pub fn spawn_flusher(scheduler: &SharedScheduler, trigger: FlushTrigger) -> JoinHandle<()> {
    let scheduler = Arc::downgrade(scheduler);
    tokio::spawn(async move {
        match trigger {
            FlushTrigger::Interval(period) => {
                let mut tick = tokio::time::interval(period);
                tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tick.tick().await;
                    if !flush_once(&scheduler).await {
                        break;
                    }
                }
            }
            FlushTrigger::Frames(mut frames) => {
                while frames.recv().await.is_some() {
                    if !flush_once(&scheduler).await {
                        break;
                    }
                }
            }
        }
        tracing::debug!("flusher stopped");
    })
}

/// Returns `false` once the scheduler is gone.
async fn flush_once(scheduler: &Weak<Mutex<Box<dyn Scheduler>>>) -> bool {
    let Some(scheduler) = scheduler.upgrade() else {
        return false;
    };
    let mut guard = scheduler.lock().await;
    if guard.pending() == 0 {
        return true;
    }
    if let Err(err) = guard.flush() {
        tracing::warn!(%err, "scheduled flush failed");
    }
    true
}

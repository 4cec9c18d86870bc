//! Expiry scheduler.
//!
//! One background task sweeps every key on a fixed period. Instead of a timer
//! per key it keeps a min-heap of `(due, key, generation)` and always waits for
//! whichever key is due next, so the task count stays at one no matter how many
//! keys exist.
//!
//! Schedule entries are never removed from the heap directly. When a key is
//! evicted (or recreated under a new generation) its old entry is dropped the
//! next time it surfaces.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use rollsum_core::{Clock, WINDOW};

use super::store::{AggregateStore, NewKey};
use crate::obs::EngineMetrics;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpiryConfig {
    pub(crate) interval: Duration,
    pub(crate) idle_grace: Option<Duration>,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Due {
    at: Instant,
    key: String,
    generation: u64,
}

/// Registration side of the scheduler, held by the worker.
#[derive(Clone)]
pub(crate) struct ExpiryHandle {
    tx: mpsc::UnboundedSender<NewKey>,
}

impl ExpiryHandle {
    pub(crate) fn register(&self, key: NewKey) {
        if self.tx.send(key).is_err() {
            tracing::warn!("expiry scheduler stopped; new key will not be swept");
        }
    }
}

struct ExpiryScheduler {
    heap: BinaryHeap<Reverse<Due>>,
    cfg: ExpiryConfig,
    store: Arc<AggregateStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
}

/// Spawn the scheduler task. It runs until `stop` flips to `true` (or its
/// sender is dropped).
pub(crate) fn spawn(
    cfg: ExpiryConfig,
    store: Arc<AggregateStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
    stop: watch::Receiver<bool>,
) -> (ExpiryHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = ExpiryScheduler {
        heap: BinaryHeap::new(),
        cfg,
        store,
        clock,
        metrics,
    };
    let task = tokio::spawn(scheduler.run(rx, stop));
    (ExpiryHandle { tx }, task)
}

impl ExpiryScheduler {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<NewKey>, mut stop: watch::Receiver<bool>) {
        let mut registrations_open = true;

        loop {
            let next_due = self.heap.peek().map(|Reverse(d)| d.at);
            // Placeholder deadline for the disabled timer branch.
            let wake_at = next_due.unwrap_or_else(|| Instant::now() + self.cfg.interval);

            tokio::select! {
                biased;

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }

                reg = rx.recv(), if registrations_open => match reg {
                    Some(new_key) => self.schedule(new_key),
                    // Worker is gone; keep sweeping what we have until stopped.
                    None => registrations_open = false,
                },

                _ = tokio::time::sleep_until(wake_at), if next_due.is_some() => {
                    self.fire_due();
                }
            }
        }

        tracing::info!(keys = self.heap.len(), "expiry scheduler stopped");
    }

    fn schedule(&mut self, new_key: NewKey) {
        self.heap.push(Reverse(Due {
            at: Instant::now() + self.cfg.interval,
            key: new_key.key,
            generation: new_key.generation,
        }));
    }

    /// Sweep every entry whose deadline has passed, then reschedule it.
    fn fire_due(&mut self) {
        let now_instant = Instant::now();

        while let Some(Reverse(due)) = self.heap.peek() {
            if due.at > now_instant {
                break;
            }
            let Some(Reverse(due)) = self.heap.pop() else {
                break;
            };

            if !self.sweep(&due.key, due.generation) {
                continue;
            }

            let mut next = due.at + self.cfg.interval;
            if next <= now_instant {
                // Fell behind by more than a period; skip the missed firings.
                next = now_instant + self.cfg.interval;
            }
            self.heap.push(Reverse(Due { at: next, ..due }));
        }
    }

    /// Returns whether the key should stay scheduled.
    fn sweep(&self, key: &str, generation: u64) -> bool {
        let started = std::time::Instant::now();
        let now = self.clock.now();

        let Some(out) = self.store.sweep_generation(key, generation, now, WINDOW) else {
            // Evicted or replaced by a newer incarnation.
            return false;
        };

        self.metrics.sweep_duration.observe(started.elapsed());
        self.metrics.sweeps.inc(&[]);
        if out.evicted > 0 {
            self.metrics.events_evicted.add(&[], out.evicted as u64);
            tracing::debug!(
                key,
                evicted = out.evicted,
                evicted_sum = out.evicted_sum,
                remaining = out.remaining,
                "swept expired events"
            );
        }

        if let Some(grace) = self.cfg.idle_grace {
            if self.store.evict_if_idle(key, generation, now, grace) {
                self.metrics.keys_evicted.inc(&[]);
                self.metrics.keys_active.dec();
                tracing::debug!(key, generation, "evicted idle key");
                return false;
            }
        }

        true
    }
}

//! Aggregation engine.
//!
//! ```text
//! submit ──► ingestion queue ──► worker ──► AggregateStore ◄── query_sum
//!                                  │              ▲
//!                                  └─ register ─► expiry scheduler (sweeps)
//! ```
//!
//! [`Engine`] is a cheap cloneable handle. It owns the sending side of the
//! bounded ingestion queue and the lifecycle of the two background tasks.
//!
//! Lifecycle policy:
//! - `shutdown` is idempotent; later calls return `Ok(())` immediately.
//! - submissions after shutdown fail with [`RollsumError::ShutDown`].
//! - the store stays readable after shutdown.

mod expiry;
mod store;
mod worker;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use rollsum_core::error::{Result, RollsumError};
use rollsum_core::{Clock, MetricEvent, SweepOutcome, SystemClock, WINDOW};

pub use store::{AggregateStore, NewKey, SharedAggregate};

use crate::config::EngineSection;
use crate::obs::EngineMetrics;
use expiry::ExpiryConfig;
use worker::{Ingress, Worker};

#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    cfg: EngineSection,
    clock: Arc<dyn Clock>,
    store: Arc<AggregateStore>,
    metrics: Arc<EngineMetrics>,
    /// `None` once shutdown has closed the queue.
    ingress: RwLock<Option<mpsc::Sender<Ingress>>>,
    tasks: Mutex<Option<Tasks>>,
}

struct Tasks {
    worker: JoinHandle<()>,
    expiry: JoinHandle<()>,
    stop_expiry: watch::Sender<bool>,
}

impl Engine {
    /// Start an engine on the system clock.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(cfg: EngineSection) -> Result<Self> {
        Self::start_with_clock(cfg, Arc::new(SystemClock))
    }

    /// Start an engine with an injected clock.
    pub fn start_with_clock(cfg: EngineSection, clock: Arc<dyn Clock>) -> Result<Self> {
        cfg.validate()?;

        let store = Arc::new(AggregateStore::new());
        let metrics = Arc::new(EngineMetrics::default());

        let (stop_expiry, stop_rx) = watch::channel(false);
        let (expiry_handle, expiry) = expiry::spawn(
            ExpiryConfig {
                interval: cfg.sweep_interval(),
                idle_grace: cfg.key_idle_grace(),
            },
            Arc::clone(&store),
            Arc::clone(&clock),
            Arc::clone(&metrics),
            stop_rx,
        );

        let (tx, rx) = mpsc::channel(cfg.queue_capacity);
        let worker = tokio::spawn(
            Worker {
                rx,
                store: Arc::clone(&store),
                expiry: expiry_handle,
                clock: Arc::clone(&clock),
                metrics: Arc::clone(&metrics),
            }
            .run(),
        );

        tracing::info!(
            queue_capacity = cfg.queue_capacity,
            sweep_interval_ms = cfg.sweep_interval_ms,
            key_idle_grace_ms = ?cfg.key_idle_grace_ms,
            "aggregation engine started"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                cfg,
                clock,
                store,
                metrics,
                ingress: RwLock::new(Some(tx)),
                tasks: Mutex::new(Some(Tasks {
                    worker,
                    expiry,
                    stop_expiry,
                })),
            }),
        })
    }

    /// Record `value` under `key`, stamped with the engine clock at call time.
    ///
    /// Waits for space when the ingestion queue is full.
    pub async fn submit(&self, key: &str, value: i64) -> Result<()> {
        let event = self.stamp(key, value)?;
        let tx = self.sender()?;
        if tx.send(Ingress::Event(event)).await.is_err() {
            return Err(self.rejected(RollsumError::ShutDown));
        }
        self.inner.metrics.submissions.inc(&[("outcome", "accepted")]);
        Ok(())
    }

    /// Like [`submit`](Self::submit) but fails with a retryable
    /// [`RollsumError::Backpressure`] instead of waiting on a full queue.
    pub fn try_submit(&self, key: &str, value: i64) -> Result<()> {
        let event = self.stamp(key, value)?;
        let tx = self.sender()?;
        match tx.try_send(Ingress::Event(event)) {
            Ok(()) => {
                self.inner.metrics.submissions.inc(&[("outcome", "accepted")]);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(self.rejected(RollsumError::Backpressure)),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(self.rejected(RollsumError::ShutDown)),
        }
    }

    /// Current windowed sum for `key`; 0 for keys never seen.
    pub fn query_sum(&self, key: &str) -> i64 {
        self.inner.store.sum(key)
    }

    /// Snapshot of a key's events in arrival order.
    pub fn events(&self, key: &str) -> Vec<MetricEvent> {
        self.inner.store.events(key)
    }

    pub fn key_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Run one sweep on `key` right now, outside the schedule.
    pub fn sweep_now(&self, key: &str) -> Option<SweepOutcome> {
        let out = self.inner.store.sweep(key, self.inner.clock.now(), WINDOW)?;
        self.inner.metrics.sweeps.inc(&[]);
        self.inner.metrics.events_evicted.add(&[], out.evicted as u64);
        Some(out)
    }

    /// Resolves once every event submitted before this call has been applied.
    pub async fn flush(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        let tx = self.sender()?;
        tx.send(Ingress::Flush(reply))
            .await
            .map_err(|_| RollsumError::ShutDown)?;
        done.await.map_err(|_| RollsumError::ShutDown)
    }

    /// Close the queue, let the worker drain it, then stop the scheduler.
    pub async fn shutdown(&self) -> Result<()> {
        let mut tasks = self.inner.tasks.lock().await;
        let Some(Tasks {
            worker,
            expiry,
            stop_expiry,
        }) = tasks.take()
        else {
            return Ok(());
        };

        self.inner.metrics.set_draining();
        tracing::info!(queued = self.queue_depth(), "shutting down, draining ingestion queue");

        // In-flight `submit` calls hold their own sender clones; the worker
        // sees the queue closed once those have delivered.
        drop(
            self.inner
                .ingress
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );

        let worker_res = worker.await;
        let _ = stop_expiry.send(true);
        let expiry_res = expiry.await;

        worker_res.map_err(|e| RollsumError::Internal(format!("aggregation worker failed: {e}")))?;
        expiry_res.map_err(|e| RollsumError::Internal(format!("expiry scheduler failed: {e}")))?;

        tracing::info!(keys = self.key_count(), "aggregation engine stopped");
        Ok(())
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner
            .ingress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Events waiting in the ingestion queue.
    pub fn queue_depth(&self) -> usize {
        self.inner
            .ingress
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0)
    }

    pub fn config(&self) -> &EngineSection {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    pub fn store(&self) -> &AggregateStore {
        &self.inner.store
    }

    fn stamp(&self, key: &str, value: i64) -> Result<MetricEvent> {
        MetricEvent::new(key, value, self.inner.clock.now()).map_err(|e| self.rejected(e))
    }

    fn sender(&self) -> Result<mpsc::Sender<Ingress>> {
        let guard = self
            .inner
            .ingress
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => Ok(tx.clone()),
            None => {
                drop(guard);
                Err(self.rejected(RollsumError::ShutDown))
            }
        }
    }

    fn rejected(&self, err: RollsumError) -> RollsumError {
        let outcome = match &err {
            RollsumError::InvalidInput(_) => "invalid",
            RollsumError::Backpressure => "backpressure",
            RollsumError::ShutDown => "shut_down",
            _ => "error",
        };
        self.inner.metrics.submissions.inc(&[("outcome", outcome)]);
        if matches!(err, RollsumError::Backpressure) {
            tracing::debug!("ingestion queue full, submission rejected");
        } else {
            tracing::warn!(error = %err, "submission rejected");
        }
        err
    }
}

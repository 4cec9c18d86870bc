//! Aggregation worker.
//!
//! The worker exclusively owns the receiving end of the ingestion queue and is
//! the only code path that appends to an aggregate. Messages are applied one at
//! a time in FIFO order; the loop ends once the queue is closed and drained.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use rollsum_core::{Clock, MetricEvent};

use super::expiry::ExpiryHandle;
use super::store::AggregateStore;
use crate::obs::EngineMetrics;

/// Messages carried by the ingestion queue.
pub(crate) enum Ingress {
    /// Apply one event.
    Event(MetricEvent),
    /// Reply once every message queued before this one has been applied.
    Flush(oneshot::Sender<()>),
}

pub(crate) struct Worker {
    pub(crate) rx: mpsc::Receiver<Ingress>,
    pub(crate) store: Arc<AggregateStore>,
    pub(crate) expiry: ExpiryHandle,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Arc<EngineMetrics>,
}

impl Worker {
    pub(crate) async fn run(mut self) {
        let mut applied: u64 = 0;

        while let Some(msg) = self.rx.recv().await {
            match msg {
                Ingress::Event(event) => {
                    self.apply(event);
                    applied += 1;
                }
                // The caller may have given up waiting; nothing to do then.
                Ingress::Flush(reply) => {
                    let _ = reply.send(());
                }
            }
        }

        tracing::info!(applied, "ingestion queue drained, worker stopped");
    }

    fn apply(&self, event: MetricEvent) {
        let now = self.clock.now();
        if let Some(new_key) = self.store.append(event, now) {
            tracing::debug!(key = %new_key.key, generation = new_key.generation, "tracking new key");
            self.metrics.keys_created.inc(&[]);
            self.metrics.keys_active.inc();
            self.expiry.register(new_key);
        }
        self.metrics.events_applied.inc(&[]);
    }
}

//! Shared application state for the HTTP adapter.

use std::sync::Arc;

use crate::config::RollsumConfig;
use crate::engine::Engine;
use crate::obs::EngineMetrics;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<RollsumConfig>,
    engine: Engine,
}

impl AppState {
    pub fn new(cfg: RollsumConfig, engine: Engine) -> Self {
        Self {
            cfg: Arc::new(cfg),
            engine,
        }
    }

    pub fn cfg(&self) -> &RollsumConfig {
        &self.cfg
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn metrics(&self) -> &EngineMetrics {
        self.engine.metrics()
    }

    pub fn is_draining(&self) -> bool {
        self.engine.metrics().is_draining()
    }

    /// Point-in-time values rendered next to the registry on `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![
            ("rollsum_queue_depth", self.engine.queue_depth() as u64),
            ("rollsum_keys_stored", self.engine.key_count() as u64),
        ]
    }
}

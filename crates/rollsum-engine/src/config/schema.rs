use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use rollsum_core::error::{Result, RollsumError};
use rollsum_core::WINDOW;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RollsumConfig {
    pub version: u32,

    #[serde(default)]
    pub engine: EngineSection,

    #[serde(default)]
    pub server: ServerSection,
}

impl Default for RollsumConfig {
    fn default() -> Self {
        Self {
            version: 1,
            engine: EngineSection::default(),
            server: ServerSection::default(),
        }
    }
}

impl RollsumConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RollsumError::InvalidConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.engine.validate()?;
        self.server.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSection {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Remove keys that stay empty this long. Unset keeps every key forever.
    #[serde(default)]
    pub key_idle_grace_ms: Option<u64>,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            sweep_interval_ms: default_sweep_interval_ms(),
            key_idle_grace_ms: None,
        }
    }
}

impl EngineSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.queue_capacity) {
            return Err(RollsumError::InvalidConfig(
                "engine.queue_capacity must be between 1 and 1000000".into(),
            ));
        }
        if !(1..=default_sweep_interval_ms()).contains(&self.sweep_interval_ms) {
            return Err(RollsumError::InvalidConfig(
                "engine.sweep_interval_ms must be between 1 and 3600000".into(),
            ));
        }
        if let Some(grace) = self.key_idle_grace_ms {
            if grace < self.sweep_interval_ms {
                return Err(RollsumError::InvalidConfig(
                    "engine.key_idle_grace_ms must not be shorter than sweep_interval_ms".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn key_idle_grace(&self) -> Option<Duration> {
        self.key_idle_grace_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            RollsumError::InvalidConfig(format!("server.listen must be a socket address: {e}"))
        })
    }
}

fn default_queue_capacity() -> usize {
    100
}
fn default_sweep_interval_ms() -> u64 {
    WINDOW.as_millis() as u64
}
fn default_listen() -> String {
    "127.0.0.1:9093".into()
}

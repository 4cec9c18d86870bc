//! Engine config loader (strict parsing).

pub mod schema;

use std::fs;

use rollsum_core::error::{Result, RollsumError};

pub use schema::{EngineSection, RollsumConfig, ServerSection};

pub fn load_from_file(path: &str) -> Result<RollsumConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RollsumError::InvalidConfig(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<RollsumConfig> {
    let cfg: RollsumConfig = serde_yaml::from_str(s)
        .map_err(|e| RollsumError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

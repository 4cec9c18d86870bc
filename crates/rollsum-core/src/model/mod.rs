//! Windowed aggregate model.
//!
//! - [`MetricEvent`]: one immutable, engine-stamped observation.
//! - [`KeyAggregate`]: the ordered events of one key plus their running sum.

use std::time::Duration;

pub mod aggregate;
pub mod event;

pub use aggregate::{KeyAggregate, SweepOutcome};
pub use event::MetricEvent;

/// Rolling window over which a key's values are summed.
pub const WINDOW: Duration = Duration::from_secs(60 * 60);

//! rollsum core: the windowed aggregate model, clock abstraction, and error types.
//!
//! This crate defines the data model shared by the engine and its adapters. It
//! carries no runtime or transport dependencies: everything here is plain,
//! synchronous state that callers guard with their own locks.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `RollsumError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod error;
pub mod model;

/// Shared result type.
pub use error::{Result, RollsumError};

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use model::{KeyAggregate, MetricEvent, SweepOutcome, WINDOW};

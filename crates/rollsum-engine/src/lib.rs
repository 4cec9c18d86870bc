//! rollsum engine library entry.
//!
//! This crate wires the ingestion queue, aggregation worker, aggregate store,
//! and expiry scheduler into an [`engine::Engine`], and exposes a thin HTTP
//! adapter over it. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod engine;
pub mod obs;
pub mod ops;
pub mod router;
pub mod transport;

pub use engine::Engine;

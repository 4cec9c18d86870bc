//! Top-level facade crate for rollsum.
//!
//! Re-exports the core model and the engine so users can depend on a single crate.

pub mod core {
    pub use rollsum_core::*;
}

pub mod engine {
    pub use rollsum_engine::*;
}

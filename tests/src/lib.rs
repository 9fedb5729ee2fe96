//! # AgentMesh Test Suite
//!
//! Unified test crate for cross-crate behavior of the message bus.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scheduling.rs     # Priority ordering, claim recovery, broadcast
//!     ├── failure_paths.rs  # Retry tiers and the DLQ boundary
//!     └── audit_trail.rs    # Non-blocking audit, batching, gaps
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p bus-tests
//! cargo test -p bus-tests integration::scheduling::
//! ```

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;

/// Opt-in log output for debugging a failing test:
/// `RUST_LOG=debug cargo test -p bus-tests -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

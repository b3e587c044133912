//! Castline Common Utilities
//!
//! Shared infrastructure for all Castline crates:
//! - Error types and result aliases
//! - Cancellable periodic tasks for compositing and keepalive loops
//! - Tracing/logging initialization
//! - Configuration file helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod task;

pub use config::*;
pub use error::*;
pub use task::PeriodicTask;

//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger (plain or JSON)
//! - HTTP transport, selected by capability probing
//!
//! All initialization functions return proper error types for error handling.

mod logger;
mod transport;

// Re-export public API
pub use logger::init_logger_with;
pub use transport::{build_transport, probe_transport};

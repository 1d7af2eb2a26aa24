//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (timeouts, limits, etc.)
//! - Library and fetch-layer configuration types
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{
    Config, ConfigValidationError, FetchConfig, LogFormat, LogLevel, Opt, TransportPreference,
};

//! Shared infrastructure for the telecare call-establishment core.
//!
//! Currently this is limited to logging setup; the relay binary and the
//! integration tests both initialize tracing through [`logging::setup_logging`].

pub mod logging;

pub use logging::{parse_log_level, setup_logging, LoggingConfig};

use thiserror::Error;

/// Infrastructure-level errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

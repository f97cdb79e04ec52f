//! Logging configuration and setup
//!
//! Thin wrapper over `tracing-subscriber` so the relay binary, demos and
//! integration tests all initialize logging the same way. `RUST_LOG` always
//! wins over the configured default level.

use crate::{Error, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set
    pub level: Level,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Application name reported in the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            app_name: "telecare".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a configuration with the given default level and app name
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `TELECARE_LOG_LEVEL` / `TELECARE_LOG_JSON`
    pub fn from_env(app_name: impl Into<String>) -> Result<Self> {
        let mut config = LoggingConfig {
            app_name: app_name.into(),
            ..Default::default()
        };
        if let Ok(level) = std::env::var("TELECARE_LOG_LEVEL") {
            config.level = parse_log_level(&level)?;
        }
        if let Ok(json) = std::env::var("TELECARE_LOG_JSON") {
            config.json = json == "1" || json.eq_ignore_ascii_case("true");
        }
        Ok(config)
    }

    /// Emit JSON lines instead of human-readable output
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Include file and line information in log output
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Install the global tracing subscriber for this configuration.
///
/// Fails if a subscriber is already installed; tests that share a process
/// should call this once from a `Once` guard or ignore the error.
pub fn setup_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| Error::Config(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!(
        app = %config.app_name,
        version = env!("CARGO_PKG_VERSION"),
        "Logging initialized"
    );
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level).map_err(|_| Error::Config(format!("Invalid log level: {}", level)))
}

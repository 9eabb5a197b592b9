//! Logging and tracing setup for fsxport
//!
//! Console output goes through a `tracing-subscriber` fmt layer. An export
//! can additionally mirror its log into a plain-text file next to the
//! generated model.

use std::fs::File;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Whether tracing has been initialized
static TRACING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default log level filter (e.g., "info", "debug", "warn")
    pub default_level: String,
    /// Show the target (module path) in log output
    pub show_target: bool,
    /// Show thread IDs in log output
    pub show_thread_ids: bool,
    /// Show source file in log output
    pub show_file: bool,
    /// Show line number in log output
    pub show_line_number: bool,
    /// Mirror all events into this file without ANSI colors
    pub log_file: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: "warn,fsxport=info".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            log_file: None,
        }
    }
}

impl TracingConfig {
    /// Filter string for a `-v` count: 0 warn, 1 info, 2 debug, 3+ trace
    pub fn level_for_verbosity(verbosity: u8) -> &'static str {
        match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Config with the level chosen by a `-v` count
    pub fn from_verbosity(verbosity: u8) -> Self {
        Self {
            default_level: Self::level_for_verbosity(verbosity).to_string(),
            show_target: verbosity > 1,
            ..Self::default()
        }
    }

    /// Attach a log file
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }
}

/// Initialize the default tracing subscriber
///
/// Multiple calls are safe and will be ignored.
pub fn init_default() -> Result<bool> {
    init_with_config(&TracingConfig::default())
}

/// Initialize tracing with a custom configuration
///
/// Returns `false` when a subscriber was already installed by an earlier
/// call. `RUST_LOG` overrides the configured level.
pub fn init_with_config(config: &TracingConfig) -> Result<bool> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if TRACING_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
        .is_err()
    {
        return Ok(false);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let fmt_layer = fmt::layer()
        .with_target(config.show_target)
        .with_thread_ids(config.show_thread_ids)
        .with_file(config.show_file)
        .with_line_number(config.show_line_number);

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::internal(format!("failed to install tracing subscriber: {e}")))?;

    Ok(true)
}

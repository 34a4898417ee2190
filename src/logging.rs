//! Tracing subscriber setup.
//!
//! Structured logging via `tracing-subscriber` with:
//! - Environment-based filtering (`RUST_LOG` wins over the configured level)
//! - Pretty, compact or JSON output
//! - Idempotent initialization, safe to call from tests
//!
//! # Example
//! ```no_run
//! use pmd401::logging::{self, LogFormat, TracingConfig};
//! use tracing::Level;
//!
//! # fn main() -> Result<(), pmd401::logging::LoggingError> {
//! logging::init(TracingConfig::new(Level::DEBUG).with_format(LogFormat::Json))?;
//! tracing::info!(port = 4001, "emulator listening");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Output format for tracing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed format with colors (for development)
    #[default]
    Pretty,
    /// Single-line format without colors
    Compact,
    /// JSON format for log aggregation
    Json,
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid log level '{0}', must be one of: trace, debug, info, warn, error")]
    InvalidLevel(String),
    #[error("failed to initialize tracing: {0}")]
    Init(String),
}

/// `[logging]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

/// Tracing configuration options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Emit span NEW/CLOSE events
    pub with_span_events: bool,
    pub with_file_and_line: bool,
    pub with_thread_names: bool,
    /// ANSI colors, pretty format only
    pub with_ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file_and_line: false,
            with_thread_names: false,
            with_ansi: true,
        }
    }
}

impl TracingConfig {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn from_logging_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        Ok(Self::new(parse_log_level(&config.level)?).with_format(config.format))
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Install the global subscriber.
///
/// Returns `Ok(())` if a subscriber is already installed.
pub fn init(config: TracingConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(config.with_ansi)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_span_events(span_events)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_ansi(false)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_file(config.with_file_and_line)
            .with_line_number(config.with_file_and_line)
            .with_thread_names(config.with_thread_names)
            .with_filter(env_filter)
            .boxed(),
    };

    match tracing_subscriber::registry().with(layer).try_init() {
        Ok(()) => Ok(()),
        // tests and embedding applications may have installed one already
        Err(e) if e.to_string().contains("already been set") => Ok(()),
        Err(e) => Err(LoggingError::Init(e.to_string())),
    }
}

/// Parse a case-insensitive level name.
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_lowercase().as_str())
}

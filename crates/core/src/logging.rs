//! Logging setup on top of the tracing ecosystem.
//!
//! # Environment Variables
//!
//! - `PANTRY_LOG`: Filter directive (like `RUST_LOG`), e.g., `pantry_store=debug`
//! - `PANTRY_LOG_FORMAT`: Output format for stderr: `pretty`, `json`, `compact`
//! - `PANTRY_LOG_DIR`: Directory for file logs (default `~/.pantry/logs`)
//!
//! # Example
//!
//! ```no_run
//! use pantry_core::logging::{self, LogSettings};
//!
//! let _guard = logging::init_logging(Some(LogSettings::new().with_level("info")))?;
//! # Ok::<(), pantry_core::Error>(())
//! ```

use crate::Error;
use crate::config::{FileLoggingConfig, LoggingConfig};
use std::env;
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format for stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Pretty, human-readable output with colors (default for TTY)
    #[default]
    Pretty,
    /// JSON output (one line per event)
    Json,
    /// Compact, single-line output
    Compact,
}

impl LogFormat {
    pub const VALUES: &[LogFormat] = &[LogFormat::Pretty, LogFormat::Json, LogFormat::Compact];

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

/// Runtime logging settings resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Default filter directive for stderr output.
    pub level: String,
    /// Output format for stderr; `None` picks by TTY detection.
    pub format: Option<LogFormat>,
    /// File logging configuration (optional).
    pub file: Option<FileLoggingConfig>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "warn".to_string(), format: None, file: None }
    }
}

impl From<LoggingConfig> for LogSettings {
    fn from(config: LoggingConfig) -> Self {
        Self {
            level: config.level,
            format: LogFormat::parse_str(&config.format),
            file: if config.file.enabled { Some(config.file) } else { None },
        }
    }
}

impl LogSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_file_logging(mut self, config: FileLoggingConfig) -> Self {
        self.file = Some(config);
        self
    }

    /// `PANTRY_LOG`, then `RUST_LOG`, then the configured level.
    fn stderr_directive(&self) -> String {
        env::var("PANTRY_LOG")
            .ok()
            .or_else(|| env::var("RUST_LOG").ok())
            .unwrap_or_else(|| self.level.clone())
    }

    fn is_tty() -> bool {
        atty::is(atty::Stream::Stderr)
    }

    fn detect_format(&self) -> LogFormat {
        if let Ok(fmt_str) = env::var("PANTRY_LOG_FORMAT")
            && let Some(fmt) = LogFormat::parse_str(&fmt_str)
        {
            return fmt;
        }

        if let Some(format) = self.format {
            return format;
        }

        if Self::is_tty() { LogFormat::Pretty } else { LogFormat::Compact }
    }

    fn log_dir() -> Result<PathBuf, Error> {
        if let Ok(custom_dir) = env::var("PANTRY_LOG_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }

        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;

        Ok(PathBuf::from(home).join(".pantry").join("logs"))
    }
}

fn parse_filter(directive: &str) -> Result<EnvFilter, Error> {
    EnvFilter::try_new(directive).map_err(|e| Error::Config(format!("invalid log filter '{}': {}", directive, e)))
}

/// Keeps the background file writer alive; drop it on shutdown to flush.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global tracing subscriber.
///
/// Stderr output is filtered by `PANTRY_LOG`/`RUST_LOG` or the configured
/// level; file output (when enabled) is always JSON, rotated daily, and has its
/// own filter.
pub fn init_logging(settings: Option<LogSettings>) -> Result<LogGuard, Error> {
    let settings = settings.unwrap_or_default();
    let stderr_filter = parse_filter(&settings.stderr_directive())?;

    let stderr_layer = match settings.detect_format() {
        LogFormat::Pretty => fmt::layer().pretty().with_writer(io::stderr).with_ansi(true).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(io::stderr).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(io::stderr).boxed(),
    }
    .with_filter(stderr_filter);

    let (file_layer, guard) = match &settings.file {
        Some(file_config) => {
            let log_dir = LogSettings::log_dir()?;
            std::fs::create_dir_all(&log_dir)
                .map_err(|e| Error::Config(format!("Failed to create log directory: {}", e)))?;

            let file_appender = tracing_appender::rolling::daily(log_dir, "pantry.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(parse_filter(&file_config.level)?);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    Registry::default()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))?;

    Ok(LogGuard { _file: guard })
}

//! Logging configuration.
//!
//! [`LogConfig`] is built either through its chained setters or from the
//! plain `log_level` / `log_format` strings found in a filebridge
//! configuration file via [`LogConfig::from_settings`].

use std::io;
use std::str::FromStr;
use thiserror::Error;

/// Crates whose chatter is capped at `warn` unless explicitly asked for
pub const NOISY_DEPENDENCIES: [&str; 5] = [
    "aws_config",
    "aws_smithy_runtime",
    "hyper",
    "hyper_util",
    "reqwest",
];

/// Errors that can occur during logging configuration
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Expected one of: pretty, compact, json")]
    InvalidLogFormat(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Output format for logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human-readable output
    #[default]
    Pretty,

    /// Compact single-line format
    Compact,

    /// JSON format for machine-readable logs
    Json,
}

impl FromStr for LogFormat {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(LogError::InvalidLogFormat(s.to_string())),
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// Write to standard error
    #[default]
    Stderr,

    /// Write to standard output
    Stdout,
}

/// Configuration for logging
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format for logs
    pub format: LogFormat,

    /// Filter directive (e.g. "info", "filebridge_storage=debug").
    /// If None, `RUST_LOG` is consulted, then "info".
    pub level: Option<String>,

    /// Whether to use ANSI colors
    pub use_color: bool,

    /// Whether to include timestamps in output
    pub use_timestamps: bool,

    /// Whether to include thread IDs in output
    pub include_thread_ids: bool,

    /// Whether to include target module names
    pub include_targets: bool,

    /// Emit an event when an instrumented span (upload, download) closes
    pub span_close_events: bool,

    /// Cap SDK and HTTP client crates at `warn`
    pub quiet_dependencies: bool,

    /// Output destination
    pub output: LogOutput,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Pretty,
            level: None,
            use_color: true,
            use_timestamps: true,
            include_thread_ids: false,
            include_targets: true,
            span_close_events: false,
            quiet_dependencies: true,
            output: LogOutput::Stderr,
        }
    }
}

impl LogConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `log_level` / `log_format` pair of a configuration file
    ///
    /// JSON output disables colors, since it is meant for log shippers.
    pub fn from_settings(level: &str, format: &str) -> Result<Self, LogError> {
        let format: LogFormat = format.parse()?;
        let level = parse_level(level)?;

        Ok(LogConfig::new()
            .with_format(format)
            .with_level(level)
            .with_color(format != LogFormat::Json))
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log level or filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Enable or disable color output
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Enable or disable timestamps
    pub fn with_timestamps(mut self, use_timestamps: bool) -> Self {
        self.use_timestamps = use_timestamps;
        self
    }

    /// Enable or disable thread IDs
    pub fn with_thread_ids(mut self, include_thread_ids: bool) -> Self {
        self.include_thread_ids = include_thread_ids;
        self
    }

    /// Enable or disable target module names
    pub fn with_targets(mut self, include_targets: bool) -> Self {
        self.include_targets = include_targets;
        self
    }

    /// Enable or disable span close events
    pub fn with_span_close_events(mut self, enabled: bool) -> Self {
        self.span_close_events = enabled;
        self
    }

    /// Enable or disable capping of dependency crates
    pub fn with_quiet_dependencies(mut self, quiet: bool) -> Self {
        self.quiet_dependencies = quiet;
        self
    }

    /// Set the output destination
    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    /// Get the effective log level from config or environment
    pub fn get_effective_level(&self) -> String {
        self.level
            .clone()
            .or_else(|| std::env::var("RUST_LOG").ok())
            .unwrap_or_else(|| "info".to_string())
    }

    /// Full filter directive, including dependency caps
    pub fn filter_directive(&self) -> String {
        let level = self.get_effective_level();
        if !self.quiet_dependencies {
            return level;
        }

        let mut directive = level;
        for krate in NOISY_DEPENDENCIES {
            // An explicit directive for the crate wins
            if !directive.contains(krate) {
                directive.push_str(&format!(",{}=warn", krate));
            }
        }
        directive
    }
}

fn parse_level(level: &str) -> Result<String, LogError> {
    let normalized = level.trim().to_lowercase();
    match normalized.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(normalized),
        _ => Err(LogError::InvalidLogLevel(level.to_string())),
    }
}

// Filebridge - Unified File Storage
// Copyright (C) 2025 Filebridge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Logging initialization and setup.
//!
//! Installs a global `tracing` subscriber: an [`EnvFilter`] built from the
//! configured level plus one formatting layer for the chosen format.

use crate::config::{LogConfig, LogError, LogFormat, LogOutput};
use std::io;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Applies the settings shared by every format, then boxes the layer
macro_rules! finish_layer {
    ($layer:expr, $config:expr) => {{
        let layer = $layer
            .with_writer(get_writer($config.output))
            .with_ansi($config.use_color)
            .with_target($config.include_targets)
            .with_thread_ids($config.include_thread_ids)
            .with_span_events(span_events($config));
        if $config.use_timestamps {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

/// Initialize tracing with the specified format and optional log level.
///
/// # Arguments
///
/// * `format` - The output format for logs
/// * `level` - Optional log level (e.g., "info", "debug"). If None, uses RUST_LOG env var
///
/// # Errors
///
/// Fails if the level is not a valid filter directive or a global
/// subscriber has already been installed.
///
/// # Example
///
/// ```no_run
/// use filebridge_observability::{init_tracing, LogFormat};
///
/// init_tracing(LogFormat::Compact, Some("debug")).unwrap();
/// tracing::info!("storage service starting");
/// ```
pub fn init_tracing(format: LogFormat, level: Option<&str>) -> Result<(), LogError> {
    let mut config = LogConfig::new().with_format(format);
    if let Some(level) = level {
        config = config.with_level(level);
    }
    init_tracing_with_config(config)
}

/// Initialize tracing with a detailed configuration.
///
/// # Example
///
/// ```no_run
/// use filebridge_observability::{init_tracing_with_config, LogConfig};
///
/// let config = LogConfig::from_settings("info", "json").unwrap();
/// init_tracing_with_config(config).unwrap();
/// ```
pub fn init_tracing_with_config(config: LogConfig) -> Result<(), LogError> {
    let env_filter = build_env_filter(&config)?;

    tracing_subscriber::registry()
        .with(build_layer(&config))
        .with(env_filter)
        .try_init()
        .map_err(|_| LogError::AlreadyInitialized)
}

fn build_layer(config: &LogConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Pretty => finish_layer!(fmt::layer().pretty(), config),
        LogFormat::Compact => finish_layer!(fmt::layer().compact(), config),
        LogFormat::Json => finish_layer!(fmt::layer().json(), config),
    }
}

fn span_events(config: &LogConfig) -> FmtSpan {
    if config.span_close_events {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Get the writer for the specified output
fn get_writer(output: LogOutput) -> fn() -> Box<dyn io::Write + Send> {
    match output {
        LogOutput::Stderr => || Box::new(io::stderr()),
        LogOutput::Stdout => || Box::new(io::stdout()),
    }
}

/// Build an environment filter for the given configuration
fn build_env_filter(config: &LogConfig) -> Result<EnvFilter, LogError> {
    let directive = config.filter_directive();

    EnvFilter::try_new(&directive).map_err(|e| {
        LogError::ConfigError(format!("Failed to parse log filter '{}': {}", directive, e))
    })
}

//! Filebridge observability
//!
//! Structured logging setup shared by every filebridge crate.
//!
//! # Features
//!
//! - **Multiple Output Formats**: Pretty, JSON, and compact output formats
//! - **Environment-based Filtering**: Dynamic log level control via `RUST_LOG`
//! - **Config bridging**: [`LogConfig::from_settings`] accepts the
//!   `log_level` / `log_format` strings of a configuration file
//! - **Quiet dependencies**: AWS SDK and HTTP client crates capped at `warn`
//!
//! # Example
//!
//! ```no_run
//! use filebridge_observability::{init_tracing, LogFormat};
//!
//! init_tracing(LogFormat::Pretty, None).unwrap();
//! tracing::info!("ready");
//! ```

pub mod config;
pub mod initialization;

pub use config::{LogConfig, LogError, LogFormat, LogOutput, NOISY_DEPENDENCIES};
pub use initialization::{init_tracing, init_tracing_with_config};

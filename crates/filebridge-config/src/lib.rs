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
//! Configuration management for Filebridge
//!
//! Describes which storage platforms exist, how each is reached, and which
//! one receives uploads by default. Files may be TOML, YAML or JSON, and a
//! handful of settings can be overridden through `FILEBRIDGE_*` environment
//! variables.
//!
//! # Features
//!
//! - Multi-format configuration support (TOML, YAML, JSON)
//! - Environment variable overrides with `FILEBRIDGE_` prefix
//! - Validation with field-level error messages
//! - Any number of local disk, S3-compatible and in-memory platforms
//! - Merging of several files (platform lists append)
//!
//! # Example
//!
//! ```no_run
//! use filebridge_config::ConfigLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ConfigLoader::new();
//!     let config = loader.load_with_overrides("filebridge.toml").await?;
//!
//!     println!("Default platform: {}", config.default_platform);
//!     println!("Enabled platforms: {:?}", config.enabled_platforms());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

// Re-export commonly used items
pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigFormat, ConfigLoader, ENV_PREFIX};
pub use schema::*;
pub use validation::Validator;

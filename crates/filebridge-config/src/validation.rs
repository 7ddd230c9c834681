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
use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Validator for configuration settings
pub trait Validator {
    /// Check the settings, returning the first problem found
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        if self.thumbnail_suffix.is_empty() {
            return Err(ConfigError::MissingRequired("thumbnail_suffix".to_string()));
        }

        for local in &self.local {
            local.validate()?;
        }
        for s3 in &self.s3 {
            s3.validate()?;
        }
        for memory in &self.memory {
            memory.validate()?;
        }
        self.observability.validate()?;

        if self.default_platform.is_empty() {
            return Err(ConfigError::MissingRequired("default_platform".to_string()));
        }
        if !self.has_platform(&self.default_platform) {
            return Err(ConfigError::UnknownDefaultPlatform(
                self.default_platform.clone(),
            ));
        }

        Ok(())
    }
}

impl Validator for LocalPlatformConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_common("local", &self.platform, &self.base_path)?;

        if self.storage_path.is_empty() {
            return Err(ConfigError::MissingRequired(format!(
                "local[{}].storage_path",
                self.platform
            )));
        }

        Ok(())
    }
}

impl Validator for S3PlatformConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_common("s3", &self.platform, &self.base_path)?;

        if self.bucket_name.is_empty() {
            return Err(ConfigError::MissingRequired(format!(
                "s3[{}].bucket_name",
                self.platform
            )));
        }

        if self.region.is_empty() {
            return Err(ConfigError::MissingRequired(format!(
                "s3[{}].region",
                self.platform
            )));
        }

        // Credentials come as a pair or not at all
        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(ConfigError::ValidationError(format!(
                "s3[{}] requires both access_key and secret_key, or neither",
                self.platform
            )));
        }

        if self.multipart_part_size < MIN_MULTIPART_PART_SIZE {
            return Err(ConfigError::invalid_value(
                format!("s3[{}].multipart_part_size", self.platform),
                format!(
                    "must be at least {} bytes, got {}",
                    MIN_MULTIPART_PART_SIZE, self.multipart_part_size
                ),
            ));
        }

        if self.multipart_threshold == 0 {
            return Err(ConfigError::invalid_value(
                format!("s3[{}].multipart_threshold", self.platform),
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Validator for MemoryPlatformConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_common("memory", &self.platform, &self.base_path)
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !VALID_LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", VALID_LOG_FORMATS.join(", ")),
            ));
        }

        Ok(())
    }
}

fn validate_common(kind: &str, platform: &str, base_path: &str) -> ConfigResult<()> {
    if platform.trim().is_empty() {
        return Err(ConfigError::MissingRequired(format!("{}.platform", kind)));
    }

    if !is_valid_base_path(base_path) {
        return Err(ConfigError::invalid_value(
            format!("{}[{}].base_path", kind, platform),
            format!("must be empty or end with '/', got '{}'", base_path),
        ));
    }

    Ok(())
}

/// A base path is either empty or a directory-style prefix
fn is_valid_base_path(base_path: &str) -> bool {
    base_path.is_empty() || (base_path.ends_with('/') && !base_path.contains(".."))
}

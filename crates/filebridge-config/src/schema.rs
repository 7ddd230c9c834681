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
use serde::{Deserialize, Serialize};

/// Default identifier of the platform uploads go to
pub const DEFAULT_PLATFORM: &str = "local-1";

/// Default suffix appended to thumbnail filenames
pub const DEFAULT_THUMBNAIL_SUFFIX: &str = ".min.jpg";

/// Default S3 multipart threshold (64 MiB)
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Default S3 multipart part size (16 MiB)
pub const DEFAULT_MULTIPART_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Smallest part size S3 accepts for non-final parts (5 MiB)
pub const MIN_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Platform used when an upload names none
    pub default_platform: String,

    /// Suffix appended to generated thumbnail filenames
    pub thumbnail_suffix: String,

    /// Local disk platforms
    pub local: Vec<LocalPlatformConfig>,

    /// S3-compatible platforms
    pub s3: Vec<S3PlatformConfig>,

    /// In-memory platforms
    pub memory: Vec<MemoryPlatformConfig>,

    /// Observability settings
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_platform: DEFAULT_PLATFORM.to_string(),
            thumbnail_suffix: DEFAULT_THUMBNAIL_SUFFIX.to_string(),
            local: vec![LocalPlatformConfig::default()],
            s3: Vec::new(),
            memory: Vec::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Identifiers of every enabled platform, in declaration order
    pub fn enabled_platforms(&self) -> Vec<&str> {
        let local = self
            .local
            .iter()
            .filter(|p| p.enable_storage)
            .map(|p| p.platform.as_str());
        let s3 = self
            .s3
            .iter()
            .filter(|p| p.enable_storage)
            .map(|p| p.platform.as_str());
        let memory = self
            .memory
            .iter()
            .filter(|p| p.enable_storage)
            .map(|p| p.platform.as_str());
        local.chain(s3).chain(memory).collect()
    }

    /// Whether an enabled platform carries this identifier
    pub fn has_platform(&self, platform: &str) -> bool {
        self.enabled_platforms().contains(&platform)
    }

    /// Serialize to pretty TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Local disk platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LocalPlatformConfig {
    /// Platform identifier
    pub platform: String,

    /// Whether the platform is registered
    pub enable_storage: bool,

    /// Public URL prefix for stored objects
    pub domain: String,

    /// Key prefix applied to every object (empty or ending with '/')
    pub base_path: String,

    /// Directory objects are written under
    pub storage_path: String,
}

impl Default for LocalPlatformConfig {
    fn default() -> Self {
        LocalPlatformConfig {
            platform: DEFAULT_PLATFORM.to_string(),
            enable_storage: true,
            domain: String::new(),
            base_path: String::new(),
            storage_path: "./filebridge-data".to_string(),
        }
    }
}

/// S3-compatible platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct S3PlatformConfig {
    /// Platform identifier
    pub platform: String,

    /// Whether the platform is registered
    pub enable_storage: bool,

    /// Access key ID (falls back to the AWS default chain when unset)
    pub access_key: Option<String>,

    /// Secret access key
    pub secret_key: Option<String>,

    /// AWS region
    pub region: String,

    /// Custom endpoint (MinIO, Spaces, ...)
    pub endpoint: Option<String>,

    /// Bucket name
    pub bucket_name: String,

    /// Public URL prefix for stored objects
    pub domain: String,

    /// Key prefix applied to every object (empty or ending with '/')
    pub base_path: String,

    /// ACL applied when an upload specifies none
    pub default_acl: Option<String>,

    /// Use path-style addressing
    pub force_path_style: bool,

    /// Payloads at or above this size use multipart upload
    pub multipart_threshold: u64,

    /// Size of each multipart chunk
    pub multipart_part_size: u64,
}

impl Default for S3PlatformConfig {
    fn default() -> Self {
        S3PlatformConfig {
            platform: "s3-1".to_string(),
            enable_storage: true,
            access_key: None,
            secret_key: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            bucket_name: String::new(),
            domain: String::new(),
            base_path: String::new(),
            default_acl: None,
            force_path_style: false,
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            multipart_part_size: DEFAULT_MULTIPART_PART_SIZE,
        }
    }
}

/// In-memory platform
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryPlatformConfig {
    /// Platform identifier
    pub platform: String,

    /// Whether the platform is registered
    pub enable_storage: bool,

    /// Public URL prefix for stored objects
    pub domain: String,

    /// Key prefix applied to every object (empty or ending with '/')
    pub base_path: String,

    /// ACL applied when an upload specifies none
    pub default_acl: Option<String>,

    /// Secret used to sign presigned URLs
    pub signing_secret: String,
}

impl Default for MemoryPlatformConfig {
    fn default() -> Self {
        MemoryPlatformConfig {
            platform: "memory-1".to_string(),
            enable_storage: true,
            domain: "memory://".to_string(),
            base_path: String::new(),
            default_acl: None,
            signing_secret: "filebridge".to_string(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Log format (pretty, compact, json)
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.default_platform, "local-1");
        assert_eq!(config.thumbnail_suffix, ".min.jpg");
        assert_eq!(config.local.len(), 1);
        assert!(config.s3.is_empty());
        assert!(config.has_platform("local-1"));
    }

    #[test]
    fn test_enabled_platforms_skip_disabled() {
        let mut config = Config::default();
        config.s3.push(S3PlatformConfig {
            enable_storage: false,
            ..Default::default()
        });
        config.memory.push(MemoryPlatformConfig::default());

        assert_eq!(config.enabled_platforms(), vec!["local-1", "memory-1"]);
        assert!(!config.has_platform("s3-1"));
    }

    #[test]
    fn test_s3_defaults() {
        let s3 = S3PlatformConfig::default();
        assert_eq!(s3.region, "us-east-1");
        assert_eq!(s3.multipart_threshold, 64 * 1024 * 1024);
        assert_eq!(s3.multipart_part_size, 16 * 1024 * 1024);
        assert!(!s3.force_path_style);
    }

    #[test]
    fn test_toml_roundtrip_keeps_platform_lists() {
        let mut config = Config::default();
        config.memory.push(MemoryPlatformConfig::default());
        let text = config.to_toml_string().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}

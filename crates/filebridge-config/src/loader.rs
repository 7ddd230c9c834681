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
use crate::schema::Config;
use crate::validation::Validator;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "FILEBRIDGE_";

/// Configuration format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML document
    Toml,
    /// YAML document
    Yaml,
    /// JSON document
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::InvalidPath(path.to_path_buf())),
        }
    }

    /// Get format name as string
    pub fn name(&self) -> &'static str {
        match self {
            ConfigFormat::Toml => "TOML",
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Json => "JSON",
        }
    }
}

/// Configuration loader
#[derive(Debug)]
pub struct ConfigLoader {
    validate: bool,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        ConfigLoader { validate: true }
    }

    /// Create a loader without validation
    pub fn without_validation() -> Self {
        ConfigLoader { validate: false }
    }

    /// Load configuration from a file
    pub async fn load_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let (content, format) = self.read_file(path.as_ref()).await?;
        self.load_from_string(&content, format)
    }

    /// Load configuration from a string
    pub fn load_from_string(&self, content: &str, format: ConfigFormat) -> ConfigResult<Config> {
        let config = parse(content, format)?;
        debug!("Configuration loaded from {}", format.name());

        if self.validate {
            config.validate()?;
            info!("Configuration validated successfully");
        }

        Ok(config)
    }

    /// Load configuration with `FILEBRIDGE_*` environment variable overrides
    ///
    /// Overrides are applied before validation, so an override that points
    /// the default platform at an unknown identifier is rejected.
    pub async fn load_with_overrides<P: AsRef<Path>>(&self, path: P) -> ConfigResult<Config> {
        let (content, format) = self.read_file(path.as_ref()).await?;
        let mut config = parse(&content, format)?;
        self.apply_env_overrides(&mut config)?;

        if self.validate {
            config.validate()?;
        }

        Ok(config)
    }

    /// Merge multiple configuration files
    ///
    /// Scalar settings from later files win; platform lists are appended in
    /// file order, so a later entry with a duplicate identifier replaces the
    /// earlier one once registered.
    pub async fn load_and_merge<P: AsRef<Path>>(&self, paths: &[P]) -> ConfigResult<Config> {
        let Some((first, rest)) = paths.split_first() else {
            return Err(ConfigError::ValidationError(
                "at least one configuration file must be provided".to_string(),
            ));
        };

        let (content, format) = self.read_file(first.as_ref()).await?;
        let mut merged = parse(&content, format)?;

        for path in rest {
            let (content, format) = self.read_file(path.as_ref()).await?;
            let overlay = parse(&content, format)?;
            merge_configs(&mut merged, overlay);
        }

        if self.validate {
            merged.validate()?;
        }

        Ok(merged)
    }

    /// Apply environment variable overrides from the process environment
    pub fn apply_env_overrides(&self, config: &mut Config) -> ConfigResult<()> {
        self.apply_overrides_from(config, |name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn apply_overrides_from<F>(&self, config: &mut Config, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{}{}", ENV_PREFIX, suffix));

        if let Some(value) = var("DEFAULT_PLATFORM") {
            config.default_platform = value;
        }
        if let Some(value) = var("THUMBNAIL_SUFFIX") {
            config.thumbnail_suffix = value;
        }
        if let Some(value) = var("LOG_LEVEL") {
            config.observability.log_level = value;
        }
        if let Some(value) = var("LOG_FORMAT") {
            config.observability.log_format = value;
        }
        if let Some(value) = var("LOCAL_STORAGE_ENABLED") {
            let enabled = parse_bool(&format!("{}LOCAL_STORAGE_ENABLED", ENV_PREFIX), &value)?;
            for local in &mut config.local {
                local.enable_storage = enabled;
            }
        }

        Ok(())
    }

    async fn read_file(&self, path: &Path) -> ConfigResult<(String, ConfigFormat)> {
        debug!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).await?;

        info!(
            "Loaded {} configuration file: {}",
            format.name(),
            path.display()
        );

        Ok((content, format))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse(content: &str, format: ConfigFormat) -> ConfigResult<Config> {
    let config = match format {
        ConfigFormat::Toml => toml::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Json => serde_json::from_str(content)?,
    };
    Ok(config)
}

/// Merge overlay into base (overlay takes precedence)
fn merge_configs(base: &mut Config, overlay: Config) {
    let defaults = Config::default();

    if overlay.default_platform != defaults.default_platform {
        base.default_platform = overlay.default_platform;
    }
    if overlay.thumbnail_suffix != defaults.thumbnail_suffix {
        base.thumbnail_suffix = overlay.thumbnail_suffix;
    }
    if overlay.observability != defaults.observability {
        base.observability = overlay.observability;
    }

    // An overlay that never mentions local storage still deserializes the
    // default local entry; skip it so it is not registered twice.
    if overlay.local != defaults.local {
        base.local.extend(overlay.local);
    }
    base.s3.extend(overlay.s3);
    base.memory.extend(overlay.memory);
}

/// Parse boolean from string (accepts: true, false, yes, no, 1, 0, on, off)
fn parse_bool(variable_name: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        _ => Err(ConfigError::env_var_parsing_error(
            variable_name,
            value,
            "expected 'true', 'false', 'yes', 'no', '1', '0', 'on', or 'off'",
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::from_path("config.toml").unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path("config.yaml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.yml").unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path("config.json").unwrap(), ConfigFormat::Json);
    }

    #[test]
    fn test_format_detection_error() {
        assert!(ConfigFormat::from_path("config.xml").is_err());
        assert!(ConfigFormat::from_path("config").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "true").unwrap());
        assert!(parse_bool("X", "YES").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(parse_bool("X", "on").unwrap());
        assert!(!parse_bool("X", "false").unwrap());
        assert!(!parse_bool("X", "no").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(matches!(
            parse_bool("X", "maybe"),
            Err(ConfigError::EnvVarParsingError { .. })
        ));
    }

    #[test]
    fn test_parse_toml() {
        let loader = ConfigLoader::new();
        let toml = r#"
        default_platform = "s3-1"

        [[s3]]
        platform = "s3-1"
        bucket_name = "uploads"
        base_path = "avatars/"
        default_acl = "public-read"
        "#;
        let config = loader.load_from_string(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(config.s3.len(), 1);
        assert_eq!(config.s3[0].default_acl.as_deref(), Some("public-read"));
        assert_eq!(config.s3[0].region, "us-east-1");
    }

    #[test]
    fn test_parse_yaml() {
        let loader = ConfigLoader::new();
        let yaml = r#"default_platform: mem
memory:
  - platform: mem
    base_path: "tmp/"
observability:
  log_level: debug
  log_format: json"#;
        let config = loader.load_from_string(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.memory[0].platform, "mem");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_parse_json() {
        let loader = ConfigLoader::new();
        let json = r#"{"thumbnail_suffix": ".th.png", "local": [{"platform": "disk", "storage_path": "/tmp/fb"}], "default_platform": "disk"}"#;
        let config = loader.load_from_string(json, ConfigFormat::Json).unwrap();
        assert_eq!(config.thumbnail_suffix, ".th.png");
        assert_eq!(config.local[0].storage_path, "/tmp/fb");
    }

    #[test]
    fn test_validation_runs_by_default() {
        let json = r#"{"default_platform": "nowhere"}"#;
        assert!(ConfigLoader::new()
            .load_from_string(json, ConfigFormat::Json)
            .is_err());
        assert!(ConfigLoader::without_validation()
            .load_from_string(json, ConfigFormat::Json)
            .is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("FILEBRIDGE_DEFAULT_PLATFORM", "memory-1"),
            ("FILEBRIDGE_THUMBNAIL_SUFFIX", ".small.png"),
            ("FILEBRIDGE_LOG_LEVEL", "debug"),
            ("FILEBRIDGE_LOCAL_STORAGE_ENABLED", "off"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        ConfigLoader::new()
            .apply_overrides_from(&mut config, |name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.default_platform, "memory-1");
        assert_eq!(config.thumbnail_suffix, ".small.png");
        assert_eq!(config.observability.log_level, "debug");
        assert!(!config.local[0].enable_storage);
    }

    #[test]
    fn test_invalid_bool_override() {
        let mut config = Config::default();
        let result = ConfigLoader::new().apply_overrides_from(&mut config, |name| {
            (name == "FILEBRIDGE_LOCAL_STORAGE_ENABLED").then(|| "sometimes".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::EnvVarParsingError { ref variable_name, .. })
                if variable_name == "FILEBRIDGE_LOCAL_STORAGE_ENABLED"
        ));
    }

    #[test]
    fn test_merge_appends_platform_lists() {
        let mut base = Config::default();
        let overlay = Config {
            default_platform: "memory-1".to_string(),
            memory: vec![Default::default()],
            ..Default::default()
        };
        merge_configs(&mut base, overlay);

        assert_eq!(base.default_platform, "memory-1");
        assert_eq!(base.local.len(), 1);
        assert_eq!(base.memory.len(), 1);
        assert!(base.validate().is_ok());
    }
}

//! `forge.toml` configuration: where artifacts land and how strict the
//! build is about warnings. Every field has a default, so an absent or
//! partial config file is always valid.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("could not parse {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

/// Raw, partially-specified form of [`ForgeConfig`] as it appears on disk.
/// Every field is optional so a `forge.toml` only needs to mention what it
/// wants to override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    output_dir: Option<PathBuf>,
    artifact_filename: Option<String>,
    schema_filename: Option<String>,
    sdk_filename: Option<String>,
    warnings_as_errors: Option<bool>,
}

/// Fully-resolved build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeConfig {
    pub output_dir: PathBuf,
    pub artifact_filename: String,
    pub schema_filename: String,
    pub sdk_filename: String,
    pub warnings_as_errors: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("dist"),
            artifact_filename: "artifact.json".to_string(),
            schema_filename: "schema.sql".to_string(),
            sdk_filename: "sdk.ts".to_string(),
            warnings_as_errors: false,
        }
    }
}

impl ForgeConfig {
    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            output_dir: raw.output_dir.unwrap_or(defaults.output_dir),
            artifact_filename: raw.artifact_filename.unwrap_or(defaults.artifact_filename),
            schema_filename: raw.schema_filename.unwrap_or(defaults.schema_filename),
            sdk_filename: raw.sdk_filename.unwrap_or(defaults.sdk_filename),
            warnings_as_errors: raw.warnings_as_errors.unwrap_or(defaults.warnings_as_errors),
        }
    }

    /// Load config from `path` if it exists, falling back to all defaults
    /// if it doesn't. A present-but-malformed file is still an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let raw: RawConfig = toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        Ok(Self::from_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ForgeConfig::load(Path::new("/nonexistent/forge.toml")).unwrap();
        assert_eq!(config, ForgeConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let raw: RawConfig = toml::from_str("warnings_as_errors = true\n").unwrap();
        let config = ForgeConfig::from_raw(raw);
        assert!(config.warnings_as_errors);
        assert_eq!(config.output_dir, PathBuf::from("dist"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result: Result<RawConfig, _> = toml::from_str("bogus = 1\n");
        assert!(result.is_err());
    }
}

//! Configuration file parsing
//!
//! Reads plsql2pg.toml configuration files.

use crate::diagnostics::DiagnosticKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub transpile: TranspileConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranspileConfig {
    /// Schema assumed for unqualified object references when the caller does
    /// not pass one explicitly.
    #[serde(default = "default_schema")]
    pub default_schema: String,

    /// Diagnostic kinds (kebab-case) that may recover by emitting a
    /// `RAISE EXCEPTION` stub instead of failing the unit. Recovery is
    /// strictly opt-in per kind.
    #[serde(default)]
    pub recover: Vec<String>,

    /// Package/type bodies larger than this many bytes are segmented into
    /// member slices instead of being parsed whole.
    #[serde(default = "default_segmentation_threshold")]
    pub segmentation_threshold: usize,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            default_schema: default_schema(),
            recover: vec![],
            segmentation_threshold: default_segmentation_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Diagnostic rendering on the CLI: "text" or "json".
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_segmentation_threshold() -> usize {
    256 * 1024
}

fn default_format() -> String {
    "text".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for kind in &self.transpile.recover {
            if DiagnosticKind::from_str(kind).is_err() {
                return Err(ConfigError::Validation(format!(
                    "unknown diagnostic kind in recover list: '{kind}'"
                )));
            }
        }
        if !matches!(self.output.format.as_str(), "text" | "json") {
            return Err(ConfigError::Validation(format!(
                "unknown output format: '{}'",
                self.output.format
            )));
        }
        Ok(())
    }

    /// True when the given kind is allowed to degrade to a runtime stub.
    pub fn can_recover(&self, kind: DiagnosticKind) -> bool {
        let name: &'static str = kind.into();
        self.transpile.recover.iter().any(|k| k == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_on_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.transpile.default_schema, "public");
        assert!(config.transpile.recover.is_empty());
        assert_eq!(config.output.format, "text");
    }

    #[test]
    fn recover_list_gates_by_kind() {
        let config: Config = toml::from_str(
            r#"
            [transpile]
            default_schema = "hr"
            recover = ["unsupported-returning"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert!(config.can_recover(DiagnosticKind::UnsupportedReturning));
        assert!(!config.can_recover(DiagnosticKind::UnsupportedFeature));
    }

    #[test]
    fn unknown_recover_kind_fails_validation() {
        let config: Config = toml::from_str(
            r#"
            [transpile]
            recover = ["no-such-kind"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn reads_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plsql2pg.toml");
        std::fs::write(
            &path,
            "[transpile]\ndefault_schema = \"hr\"\n\n[output]\nformat = \"json\"\n",
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.transpile.default_schema, "hr");
        assert_eq!(config.output.format, "json");
    }
}

//! Configuration management for raie.

pub mod resolution;

pub use resolution::{ConfigLevel, ConfigLoader, ConfigSource, InheritanceChain};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RaieError, Result};
use crate::llm::MistralConfig;
use crate::r#loop::DEFAULT_MAX_ATTEMPTS;
use crate::sandbox::SandboxConfig;

/// Largest attempt budget accepted from configuration.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Resolved settings for a run.
///
/// Every field has a default, so any subset may appear in a settings file:
///
/// ```json
/// {
///   "max_attempts": 3,
///   "sandbox": { "timeout_secs": 5 },
///   "generator": { "model": "mistral-small-latest" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaieConfig {
    pub max_attempts: u32,
    /// Surface the learning context between attempts.
    pub show_learning: bool,
    pub sandbox: SandboxConfig,
    pub generator: MistralConfig,
}

impl Default for RaieConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            show_learning: true,
            sandbox: SandboxConfig::default(),
            generator: MistralConfig::default(),
        }
    }
}

impl RaieConfig {
    /// Load the layered configuration for a project directory.
    ///
    /// # Errors
    ///
    /// Returns [`RaieError::Config`] if a settings file exists but cannot be
    /// read or parsed.
    pub fn load(project_dir: &Path) -> Result<Self> {
        ConfigLoader::new().load(project_dir)
    }

    /// Get the settings.json path for a project
    pub fn settings_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".raie").join("settings.json")
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RaieError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(RaieError::invalid_config(
                "max_attempts",
                format!(
                    "must be between 1 and {}, got {}",
                    MAX_ATTEMPTS_LIMIT, self.max_attempts
                ),
            ));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(RaieError::invalid_config(
                "sandbox.timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.generator.timeout_secs == 0 {
            return Err(RaieError::invalid_config(
                "generator.timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(RaieError::invalid_config(
                "sandbox.interpreter",
                "must not be empty",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_show_learning(mut self, show: bool) -> Self {
        self.show_learning = show;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RaieConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert!(config.show_learning);
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.sandbox.timeout_secs, 15);
        assert_eq!(config.generator.timeout_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RaieConfig =
            serde_json::from_str(r#"{"sandbox": {"timeout_secs": 5}}"#).unwrap();
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_validate_rejects_out_of_range_attempts() {
        for bad in [0, 11, 100] {
            let err = RaieConfig::default()
                .with_max_attempts(bad)
                .validate()
                .unwrap_err();
            assert!(matches!(err, RaieError::InvalidConfig { ref field, .. } if field == "max_attempts"));
        }
        assert!(RaieConfig::default().with_max_attempts(1).validate().is_ok());
        assert!(RaieConfig::default().with_max_attempts(10).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = RaieConfig::default();
        config.sandbox.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RaieConfig::default();
        config.generator.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_path() {
        let dir = TempDir::new().unwrap();
        assert!(RaieConfig::settings_path(dir.path()).ends_with(".raie/settings.json"));
    }
}

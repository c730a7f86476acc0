//! Layered configuration resolution.
//!
//! Settings are loaded from up to two files on top of the built-in defaults,
//! with increasing priority:
//!
//! 1. **User** - `~/.config/raie/settings.json` (platform config dir)
//! 2. **Project** - `<project>/.raie/settings.json`
//!
//! Objects are merged key by key; any other value in a higher layer replaces
//! the lower one outright.
//!
//! # Example
//!
//! ```rust,ignore
//! use raie::config::ConfigLoader;
//! use std::path::Path;
//!
//! let (config, chain) = ConfigLoader::new().load_with_chain(Path::new("."))?;
//! println!("{}", chain.describe());
//! ```

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RaieConfig;
use crate::error::{RaieError, Result};

// ============================================================================
// Configuration Level
// ============================================================================

/// Configuration level in the inheritance hierarchy.
///
/// ```rust
/// use raie::config::ConfigLevel;
///
/// assert!(ConfigLevel::User < ConfigLevel::Project);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLevel {
    User,
    /// Highest priority.
    Project,
}

impl std::fmt::Display for ConfigLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Project => write!(f, "project"),
        }
    }
}

// ============================================================================
// Inheritance Chain
// ============================================================================

/// A file that was (or could have been) loaded during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub level: ConfigLevel,
    pub path: PathBuf,
    /// `false` when the file does not exist.
    pub loaded: bool,
}

/// The files consulted while resolving a configuration, lowest priority first.
#[derive(Debug, Clone, Default)]
pub struct InheritanceChain {
    pub sources: Vec<ConfigSource>,
}

impl InheritanceChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_source(&mut self, level: ConfigLevel, path: PathBuf, loaded: bool) {
        self.sources.push(ConfigSource {
            level,
            path,
            loaded,
        });
    }

    /// Number of files actually loaded.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.sources.iter().filter(|s| s.loaded).count()
    }

    /// Human-readable description, one line per source.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::from("Configuration sources:\n");
        for source in &self.sources {
            let status = if source.loaded { "loaded" } else { "not found" };
            out.push_str(&format!(
                "  [{}] {} ({})\n",
                source.level,
                source.path.display(),
                status
            ));
        }
        out
    }
}

// ============================================================================
// Config Loader
// ============================================================================

/// Loads and merges configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader using the platform user config location.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_config_path: Self::default_user_path(),
        }
    }

    /// Platform default user settings path, if a config dir exists.
    #[must_use]
    pub fn default_user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("raie").join("settings.json"))
    }

    /// Set a custom user config path.
    #[must_use]
    pub fn with_user_config_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Skip the user layer entirely.
    #[must_use]
    pub fn without_user_config(mut self) -> Self {
        self.user_config_path = None;
        self
    }

    #[must_use]
    pub fn user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    /// Load the merged configuration for `project_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but is unreadable or not
    /// valid JSON for [`RaieConfig`]. Missing files are skipped.
    pub fn load(&self, project_dir: &Path) -> Result<RaieConfig> {
        let (config, chain) = self.load_with_chain(project_dir)?;
        debug!(loaded = chain.loaded_count(), "Configuration resolved");
        Ok(config)
    }

    /// Load the merged configuration and report which files contributed.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn load_with_chain(&self, project_dir: &Path) -> Result<(RaieConfig, InheritanceChain)> {
        let mut chain = InheritanceChain::new();
        let mut merged = serde_json::to_value(RaieConfig::default())?;

        if let Some(user_path) = &self.user_config_path {
            let loaded = load_and_merge(&mut merged, user_path)?;
            chain.add_source(ConfigLevel::User, user_path.clone(), loaded);
        }

        let project_path = RaieConfig::settings_path(project_dir);
        let loaded = load_and_merge(&mut merged, &project_path)?;
        chain.add_source(ConfigLevel::Project, project_path.clone(), loaded);

        let config: RaieConfig = serde_json::from_value(merged).map_err(|e| {
            RaieError::config(format!("merged settings are not valid: {}", e))
        })?;

        Ok((config, chain))
    }
}

/// Merge the file at `path` into `accumulated`. Returns false if it doesn't
/// exist.
fn load_and_merge(accumulated: &mut Value, path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        RaieError::config_with_path(format!("cannot read {}: {}", path.display(), e), path.into())
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        RaieError::config_with_path(
            format!("cannot parse {}: {}", path.display(), e),
            path.into(),
        )
    })?;

    debug!(path = %path.display(), "Merging settings file");
    deep_merge(accumulated, value);
    Ok(true)
}

/// Deep merge two JSON values, with child overriding parent.
pub(crate) fn deep_merge(parent: &mut Value, child: Value) {
    match (parent, child) {
        (Value::Object(parent_map), Value::Object(child_map)) => {
            for (key, child_value) in child_map {
                match parent_map.get_mut(&key) {
                    Some(parent_value) => deep_merge(parent_value, child_value),
                    None => {
                        parent_map.insert(key, child_value);
                    }
                }
            }
        }
        (parent, child) => *parent = child,
    }
}

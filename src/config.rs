//! Engine Configuration
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`DEFERBIND_DISABLE`, `DEFERBIND_NO_WARN`)
//! 2. Config file (TOML)
//! 3. Defaults (engine enabled, warnings on)
//!
//! ```toml
//! disable = false
//! no_warn = true
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DeferError, Result};

/// Disables the engine; any non-empty value counts as set
pub const ENV_DISABLE: &str = "DEFERBIND_DISABLE";
/// Silences the one-time "falling back to eager binding" warning
pub const ENV_NO_WARN: &str = "DEFERBIND_NO_WARN";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Bind everything eagerly (activations become no-op blocks)
    pub disable: bool,

    /// Do not warn when an activation degrades to eager binding
    pub no_warn: bool,
}

impl EngineConfig {
    /// Parse TOML content
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| DeferError::ConfigError {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Load configuration from file
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error if the file exists but is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| DeferError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        Self::from_toml_str(&content)
    }

    /// Write configuration to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DeferError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path.as_ref(), content).map_err(|e| DeferError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// A set, non-empty variable turns the flag on; an unset or empty one
    /// keeps the file value.
    pub fn with_env(mut self) -> Self {
        if env_flag(ENV_DISABLE) {
            self.disable = true;
        }
        if env_flag(ENV_NO_WARN) {
            self.no_warn = true;
        }
        self
    }

    /// Defaults merged with the environment
    pub fn from_env() -> Self {
        Self::default().with_env()
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|value| !value.is_empty())
}

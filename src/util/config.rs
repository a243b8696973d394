//! Configuration layering for Berth.
//!
//! Settings come from three places, highest precedence first:
//! - Command line flags and environment variables (`--python`, `PYTHON_VERSION`)
//! - The workspace manifest (`Berth.toml`)
//! - The global config file (`~/.berth/config.toml`)
//!
//! Anything left unset falls back to the built-in defaults below.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::fs::read_to_string;

/// Interpreter version used when nothing else is configured.
pub const DEFAULT_PYTHON_VERSION: &str = "3.12";

/// External package manager invoked for lock and install steps.
pub const DEFAULT_PACKAGE_MANAGER: &str = "uv";

/// Berth configuration shared by the global config and the workspace manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Workspace-wide default interpreter version
    pub default_python: Option<String>,

    /// Package manager settings
    pub package_manager: PackageManagerConfig,

    /// Interpreter selection settings
    pub interpreter: InterpreterConfig,
}

/// How the external package manager is invoked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct PackageManagerConfig {
    /// Program name (looked up on PATH) or absolute path
    pub program: Option<PathBuf>,

    /// Extra arguments appended to every lock invocation. An explicit empty
    /// list clears arguments set at a lower level.
    pub lock_args: Option<Vec<String>>,

    /// Extra arguments appended to every install invocation
    pub sync_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct InterpreterConfig {
    /// Treat an unresolvable `.python-version` pin as fatal instead of
    /// falling back to the workspace default
    pub strict_pins: Option<bool>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = read_to_string(path)?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file doesn't exist
    /// or can't be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.default_python.is_some() {
            self.default_python = other.default_python;
        }
        if other.package_manager.program.is_some() {
            self.package_manager.program = other.package_manager.program;
        }
        if other.package_manager.lock_args.is_some() {
            self.package_manager.lock_args = other.package_manager.lock_args;
        }
        if other.package_manager.sync_args.is_some() {
            self.package_manager.sync_args = other.package_manager.sync_args;
        }
        if other.interpreter.strict_pins.is_some() {
            self.interpreter.strict_pins = other.interpreter.strict_pins;
        }
    }

    /// The effective default interpreter version.
    pub fn default_python(&self) -> &str {
        self.default_python
            .as_deref()
            .unwrap_or(DEFAULT_PYTHON_VERSION)
    }

    /// The effective package manager program.
    pub fn package_manager_program(&self) -> PathBuf {
        self.package_manager
            .program
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PACKAGE_MANAGER))
    }

    /// Extra lock arguments in effect.
    pub fn lock_args(&self) -> &[String] {
        self.package_manager.lock_args.as_deref().unwrap_or_default()
    }

    /// Extra install arguments in effect.
    pub fn sync_args(&self) -> &[String] {
        self.package_manager.sync_args.as_deref().unwrap_or_default()
    }

    pub fn strict_pins(&self) -> bool {
        self.interpreter.strict_pins.unwrap_or(false)
    }
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}

/// Get the global config path (~/.berth/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

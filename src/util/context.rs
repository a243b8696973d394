//! Global context for Berth operations.
//!
//! Provides centralized access to the working directory, the global config
//! and command line overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::workspace::MANIFEST_NAME;
use crate::util::config::{global_config_path, Config};
use crate::util::error::BerthError;

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Explicit manifest path from `--manifest-path`
    manifest_path: Option<PathBuf>,

    /// Interpreter version from `--python` / `PYTHON_VERSION`
    python_override: Option<String>,

    /// Global configuration (~/.berth/config.toml)
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext from the current directory and global config.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let config = global_config_path()
            .map(|path| Config::load_or_default(&path))
            .unwrap_or_default();

        Ok(GlobalContext {
            cwd,
            manifest_path: None,
            python_override: None,
            config,
        })
    }

    /// Create a GlobalContext with a specific working directory and no
    /// global config.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            manifest_path: None,
            python_override: None,
            config: Config::default(),
        }
    }

    pub fn with_manifest_path(mut self, path: Option<PathBuf>) -> Self {
        self.manifest_path = path;
        self
    }

    pub fn with_python(mut self, version: Option<String>) -> Self {
        self.python_override = version.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Global configuration, before workspace settings are layered on top.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Interpreter version given on the command line or in the environment.
    pub fn python_override(&self) -> Option<&str> {
        self.python_override.as_deref()
    }

    /// Find the workspace manifest.
    ///
    /// Uses `--manifest-path` when given, otherwise searches from cwd upward.
    pub fn find_manifest(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.manifest_path {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                self.cwd.join(path)
            };
            if !path.is_file() {
                return Err(BerthError::config(&path, "workspace manifest not found").into());
            }
            return Ok(path);
        }

        let mut current = self.cwd.clone();
        loop {
            let candidate = current.join(MANIFEST_NAME);
            if candidate.is_file() {
                return Ok(candidate);
            }
            if !current.pop() {
                return Err(BerthError::config(
                    self.cwd.join(MANIFEST_NAME),
                    format!(
                        "could not find `{}` in `{}` or any parent directory",
                        MANIFEST_NAME,
                        self.cwd.display()
                    ),
                )
                .into());
            }
        }
    }
}

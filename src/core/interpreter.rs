//! Interpreter selection.
//!
//! Each project may pin its interpreter in a `.python-version` file. A pin
//! that resolves to an installed binary wins; otherwise the workspace default
//! version is used. The resolved interpreter is returned as a value and
//! passed explicitly to every step that needs it.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Serialize;

use crate::core::project::Project;
use crate::util::config::Config;
use crate::util::error::BerthError;
use crate::util::process::{find_executable, find_executable_in};

static VERSION_PIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:cpython-|cpython|python)?(\d+(?:\.\d+){0,2})$").expect("valid pin regex")
});

/// Where an interpreter request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpreterSource {
    /// The project's own `.python-version`
    Pinned,
    /// The workspace-wide default version
    Default,
}

impl fmt::Display for InterpreterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterpreterSource::Pinned => f.write_str("pinned"),
            InterpreterSource::Default => f.write_str("default"),
        }
    }
}

/// A resolved interpreter for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterpreterSpec {
    /// The request as written (`3.12`, `pypy3.10`, a path)
    pub version: String,
    pub source: InterpreterSource,
    /// Located interpreter binary
    pub path: PathBuf,
}

impl fmt::Display for InterpreterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.version,
            self.source,
            self.path.display()
        )
    }
}

/// A parsed interpreter request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterRequest {
    /// A version number such as `3.12` or `3.12.4`
    Version(String),
    /// An executable name such as `pypy3.10`
    Executable(String),
    /// An explicit path to a binary
    Path(PathBuf),
}

impl InterpreterRequest {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(caps) = VERSION_PIN.captures(raw) {
            return InterpreterRequest::Version(caps[1].to_string());
        }
        if raw.contains('/') || raw.contains('\\') {
            return InterpreterRequest::Path(PathBuf::from(raw));
        }
        InterpreterRequest::Executable(raw.to_string())
    }

    /// Executable names to search for, most specific first.
    fn candidate_names(&self) -> Vec<String> {
        match self {
            InterpreterRequest::Version(version) => {
                let mut names = vec![format!("python{}", version)];
                let parts: Vec<&str> = version.split('.').collect();
                if parts.len() == 3 {
                    names.push(format!("python{}.{}", parts[0], parts[1]));
                }
                names
            }
            InterpreterRequest::Executable(name) => vec![name.clone()],
            InterpreterRequest::Path(_) => Vec::new(),
        }
    }
}

/// Read the project's pin, if any.
///
/// The first line that is neither blank nor a `#` comment is the pin.
pub fn read_pin(project: &Project) -> Option<String> {
    let path = project.pin_file_path();
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!("ignoring unreadable pin file {}: {}", path.display(), e);
            return None;
        }
    };

    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

/// Resolves the interpreter each project runs with.
#[derive(Debug, Clone)]
pub struct InterpreterSelector {
    default_version: String,
    strict_pins: bool,
    /// Overrides PATH for lookups
    search_path: Option<OsString>,
}

impl InterpreterSelector {
    pub fn new(default_version: impl Into<String>) -> Self {
        InterpreterSelector {
            default_version: default_version.into(),
            strict_pins: false,
            search_path: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_python()).with_strict_pins(config.strict_pins())
    }

    pub fn with_strict_pins(mut self, strict: bool) -> Self {
        self.strict_pins = strict;
        self
    }

    pub fn with_search_path(mut self, paths: impl Into<OsString>) -> Self {
        self.search_path = Some(paths.into());
        self
    }

    /// Resolve the interpreter for a project.
    ///
    /// A pin whose binary cannot be found falls back to the default, unless
    /// strict pins are enabled.
    pub fn resolve(&self, project: &Project) -> Result<InterpreterSpec> {
        let pin = read_pin(project);
        if let Some(ref pin) = pin {
            let request = InterpreterRequest::parse(pin);
            if let Some(path) = self.locate(&request, project.root()) {
                tracing::debug!(
                    "project `{}` uses pinned interpreter {}",
                    project.id(),
                    path.display()
                );
                return Ok(InterpreterSpec {
                    version: pin.clone(),
                    source: InterpreterSource::Pinned,
                    path,
                });
            }

            if self.strict_pins {
                return Err(BerthError::InterpreterNotFound {
                    project: project.id().to_string(),
                    requested: format!("pinned {}", pin),
                }
                .into());
            }

            tracing::warn!(
                "pinned interpreter `{}` for project `{}` not found, falling back to default {}",
                pin,
                project.id(),
                self.default_version
            );
        }

        let request = InterpreterRequest::parse(&self.default_version);
        match self.locate(&request, project.root()) {
            Some(path) => Ok(InterpreterSpec {
                version: self.default_version.clone(),
                source: InterpreterSource::Default,
                path,
            }),
            None => {
                let requested = match pin {
                    Some(pin) => format!("pinned {} or default {}", pin, self.default_version),
                    None => format!("default {}", self.default_version),
                };
                Err(BerthError::InterpreterNotFound {
                    project: project.id().to_string(),
                    requested,
                }
                .into())
            }
        }
    }

    fn locate(&self, request: &InterpreterRequest, base: &Path) -> Option<PathBuf> {
        if let InterpreterRequest::Path(path) = request {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                base.join(path)
            };
            return path.is_file().then_some(path);
        }

        request
            .candidate_names()
            .iter()
            .find_map(|name| self.find(name))
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        match &self.search_path {
            Some(paths) => find_executable_in(name, paths),
            None => find_executable(name),
        }
    }
}

//! Recursive removal of cache, test, environment, build and lock artifacts.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use walkdir::WalkDir;

use crate::util::fs::{relative_path, remove_dir_all_if_exists, remove_file_if_exists};

/// Directories the walk never enters.
const NEVER_ENTER: &[&str] = &[".git", ".hg", ".svn"];

/// Category of artifact a pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Interpreter bytecode caches and editor backups
    InterpreterCache,
    /// Test runner and coverage output
    Test,
    /// Isolated environments
    Environment,
    /// Build and distribution output
    Build,
    /// Lock artifacts
    Lock,
}

/// Which artifacts a purge removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanScope {
    /// Interpreter cache files only
    Pyc,
    /// Test and coverage artifacts only
    Test,
    /// Interpreter cache plus test artifacts
    Cache,
    /// Everything: caches, environments, build output and lock artifacts
    All,
}

impl CleanScope {
    pub fn includes(&self, kind: ArtifactKind) -> bool {
        match self {
            CleanScope::Pyc => kind == ArtifactKind::InterpreterCache,
            CleanScope::Test => kind == ArtifactKind::Test,
            CleanScope::Cache => {
                matches!(kind, ArtifactKind::InterpreterCache | ArtifactKind::Test)
            }
            CleanScope::All => true,
        }
    }
}

impl fmt::Display for CleanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CleanScope::Pyc => "interpreter caches",
            CleanScope::Test => "test artifacts",
            CleanScope::Cache => "caches and test artifacts",
            CleanScope::All => "all generated artifacts",
        };
        f.write_str(name)
    }
}

/// A named filename pattern.
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    pub kind: ArtifactKind,
    pattern: Pattern,
}

impl ArtifactPattern {
    pub fn new(kind: ArtifactKind, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .with_context(|| format!("invalid artifact pattern: {}", pattern))?;
        Ok(ArtifactPattern { kind, pattern })
    }

    /// Match against a single file or directory name.
    pub fn matches(&self, name: &str) -> bool {
        self.pattern.matches(name)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// The set of patterns a purge is matched against.
#[derive(Debug, Clone)]
pub struct ArtifactSet {
    patterns: Vec<ArtifactPattern>,
}

impl ArtifactSet {
    pub fn new(patterns: Vec<ArtifactPattern>) -> Self {
        ArtifactSet { patterns }
    }

    /// The standard Python workspace artifacts.
    pub fn python() -> Result<Self> {
        use ArtifactKind::*;

        let table: &[(ArtifactKind, &str)] = &[
            (InterpreterCache, "__pycache__"),
            (InterpreterCache, "*.pyc"),
            (InterpreterCache, "*.pyo"),
            (InterpreterCache, "*~"),
            (Test, ".pytest_cache"),
            (Test, ".coverage"),
            (Test, ".coverage.*"),
            (Test, "htmlcov"),
            (Test, "coverage.xml"),
            (Test, ".tox"),
            (Test, ".mypy_cache"),
            (Test, ".ruff_cache"),
            (Environment, ".venv"),
            (Build, "build"),
            (Build, "dist"),
            (Build, "*.egg-info"),
            (Lock, "uv.lock"),
        ];

        let patterns = table
            .iter()
            .map(|(kind, pattern)| ArtifactPattern::new(*kind, pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(ArtifactSet::new(patterns))
    }

    /// First pattern in scope matching `name`.
    pub fn find(&self, name: &str, scope: CleanScope) -> Option<&ArtifactPattern> {
        self.patterns
            .iter()
            .filter(|p| scope.includes(p.kind))
            .find(|p| p.matches(name))
    }
}

/// A removed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedArtifact {
    /// Path relative to the purge root
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub is_dir: bool,
}

/// Result of a purge.
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub removed: Vec<RemovedArtifact>,
}

impl PurgeReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Remove every artifact under `root` matched by `artifacts` within `scope`.
///
/// Matched directories are removed whole and not descended into. Missing
/// artifacts are not an error, so purging twice is the same as purging once.
pub fn purge(root: &Path, artifacts: &ArtifactSet, scope: CleanScope) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();
    let mut matched: Vec<(PathBuf, ArtifactKind, bool)> = Vec::new();

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // Vanished or unreadable entries have nothing left for us to remove.
                tracing::debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_dir();

        if is_dir && NEVER_ENTER.contains(&name.as_ref()) {
            walker.skip_current_dir();
            continue;
        }

        if let Some(pattern) = artifacts.find(&name, scope) {
            tracing::debug!("matched {} by `{}`", entry.path().display(), pattern.as_str());
            matched.push((entry.path().to_path_buf(), pattern.kind, is_dir));
            if is_dir {
                walker.skip_current_dir();
            }
        }
    }

    for (path, kind, is_dir) in matched {
        let removed = if is_dir {
            remove_dir_all_if_exists(&path)?
        } else {
            remove_file_if_exists(&path)?
        };
        if removed {
            report.removed.push(RemovedArtifact {
                path: relative_path(root, &path),
                kind,
                is_dir,
            });
        }
    }

    tracing::info!("removed {} artifact(s) ({})", report.removed.len(), scope);
    Ok(report)
}

//! A single project of the workspace.

use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the per-project lock artifact.
pub const LOCKFILE_NAME: &str = "uv.lock";

/// Name of the per-project isolated environment directory.
pub const ENV_DIR_NAME: &str = ".venv";

/// Name of the per-project interpreter pin file.
pub const PIN_FILE_NAME: &str = ".python-version";

/// Identifier used for the root project.
pub const ROOT_ID: &str = ".";

/// A project to lock and install.
///
/// Projects are created by the workspace registry and never change during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Path relative to the workspace root, `.` for the root project
    id: String,

    /// Absolute project directory
    root: PathBuf,

    /// Position in processing order (root is 0)
    index: usize,
}

impl Project {
    pub(crate) fn new(id: impl Into<String>, root: PathBuf, index: usize) -> Self {
        Project {
            id: id.into(),
            root,
            index,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_root(&self) -> bool {
        self.index == 0
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.root.join(LOCKFILE_NAME)
    }

    pub fn env_dir(&self) -> PathBuf {
        self.root.join(ENV_DIR_NAME)
    }

    pub fn pin_file_path(&self) -> PathBuf {
        self.root.join(PIN_FILE_NAME)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "{} (root)", self.id)
        } else {
            f.write_str(&self.id)
        }
    }
}

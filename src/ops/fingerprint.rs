//! Environment fingerprints.
//!
//! After a successful install the project's environment records which lock
//! artifact, interpreter and install command line it was synchronized with. A
//! later run compares that record with the current state and skips installs
//! that would change nothing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::interpreter::InterpreterSpec;
use crate::core::project::Project;
use crate::util::fs::{remove_file_if_exists, write_string};
use crate::util::hash::sha256_file;

/// Fingerprint file name inside the environment directory.
pub const FINGERPRINT_FILE: &str = ".berth-fingerprint.json";

/// State an environment was last synchronized against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvFingerprint {
    /// SHA-256 of the lock artifact
    pub lock_hash: String,
    /// Interpreter binary the environment was built with
    pub interpreter: PathBuf,
    /// Interpreter request (`3.12`, ...)
    pub interpreter_version: String,
    /// Install command line, including configured extra arguments
    pub install_command: String,
}

impl EnvFingerprint {
    /// Compute the fingerprint the environment should have right now.
    ///
    /// Returns `None` if the project has no lock artifact.
    pub fn compute(
        project: &Project,
        interpreter: &InterpreterSpec,
        install_command: &str,
    ) -> Result<Option<Self>> {
        let lockfile = project.lockfile_path();
        if !lockfile.is_file() {
            return Ok(None);
        }

        Ok(Some(EnvFingerprint {
            lock_hash: sha256_file(&lockfile)?,
            interpreter: interpreter.path.clone(),
            interpreter_version: interpreter.version.clone(),
            install_command: install_command.to_string(),
        }))
    }

    /// Load the stored fingerprint. Missing or unreadable records are `None`.
    pub fn load(project: &Project) -> Option<Self> {
        let path = fingerprint_path(project);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(fp) => Some(fp),
            Err(e) => {
                tracing::debug!("discarding corrupt fingerprint {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn save(&self, project: &Project) -> Result<()> {
        let contents =
            serde_json::to_string_pretty(self).context("failed to serialize fingerprint")?;
        write_string(&fingerprint_path(project), &contents)
    }
}

fn fingerprint_path(project: &Project) -> PathBuf {
    project.env_dir().join(FINGERPRINT_FILE)
}

/// Whether the project's environment already matches its lock artifact,
/// interpreter and install command.
pub fn is_environment_fresh(
    project: &Project,
    interpreter: &InterpreterSpec,
    install_command: &str,
) -> Result<bool> {
    if !project.env_dir().is_dir() {
        return Ok(false);
    }

    let Some(current) = EnvFingerprint::compute(project, interpreter, install_command)? else {
        return Ok(false);
    };

    Ok(EnvFingerprint::load(project).as_ref() == Some(&current))
}

/// Forget the stored fingerprint, so an interrupted install is never
/// mistaken for a fresh one.
pub fn invalidate(project: &Project) -> Result<()> {
    remove_file_if_exists(&fingerprint_path(project))?;
    Ok(())
}

/// Record that the environment now matches the lock artifact.
pub fn record(
    project: &Project,
    interpreter: &InterpreterSpec,
    install_command: &str,
) -> Result<()> {
    match EnvFingerprint::compute(project, interpreter, install_command)? {
        Some(fp) => fp.save(project),
        None => {
            tracing::debug!(
                "project `{}` has no lock artifact after install; not fingerprinting",
                project.id()
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interpreter::InterpreterSource;
    use tempfile::TempDir;

    const SYNC: &str = "uv sync --locked";

    fn setup() -> (TempDir, Project, InterpreterSpec) {
        let tmp = TempDir::new().unwrap();
        let project = Project::new(".", tmp.path().to_path_buf(), 0);
        let interpreter = InterpreterSpec {
            version: "3.12".into(),
            source: InterpreterSource::Default,
            path: PathBuf::from("/usr/bin/python3.12"),
        };
        (tmp, project, interpreter)
    }

    #[test]
    fn test_fresh_after_record() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();

        assert!(!is_environment_fresh(&project, &interpreter, SYNC).unwrap());
        record(&project, &interpreter, SYNC).unwrap();
        assert!(is_environment_fresh(&project, &interpreter, SYNC).unwrap());
    }

    #[test]
    fn test_lock_change_makes_stale() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();
        record(&project, &interpreter, SYNC).unwrap();

        std::fs::write(project.lockfile_path(), "version = 2\n").unwrap();
        assert!(!is_environment_fresh(&project, &interpreter, SYNC).unwrap());
    }

    #[test]
    fn test_interpreter_change_makes_stale() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();
        record(&project, &interpreter, SYNC).unwrap();

        let other = InterpreterSpec {
            path: PathBuf::from("/usr/bin/python3.11"),
            version: "3.11".into(),
            ..interpreter
        };
        assert!(!is_environment_fresh(&project, &other, SYNC).unwrap());
    }

    #[test]
    fn test_invalidate_and_corrupt_record() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();
        record(&project, &interpreter, SYNC).unwrap();

        invalidate(&project).unwrap();
        invalidate(&project).unwrap();
        assert!(!is_environment_fresh(&project, &interpreter, SYNC).unwrap());

        std::fs::write(project.env_dir().join(FINGERPRINT_FILE), "{not json").unwrap();
        assert!(EnvFingerprint::load(&project).is_none());
    }

    #[test]
    fn test_missing_env_dir_is_stale() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        assert!(!is_environment_fresh(&project, &interpreter, SYNC).unwrap());
    }

    #[test]
    fn test_install_command_change_makes_stale() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();
        record(&project, &interpreter, SYNC).unwrap();

        let with_extras = "uv sync --locked --all-extras";
        assert!(!is_environment_fresh(&project, &interpreter, with_extras).unwrap());
        assert!(is_environment_fresh(&project, &interpreter, SYNC).unwrap());
    }

    #[test]
    fn test_record_without_install_command_is_stale() {
        let (_tmp, project, interpreter) = setup();
        std::fs::write(project.lockfile_path(), "version = 1\n").unwrap();
        std::fs::create_dir_all(project.env_dir()).unwrap();
        let lock_hash = sha256_file(&project.lockfile_path()).unwrap();
        std::fs::write(
            project.env_dir().join(FINGERPRINT_FILE),
            format!(
                r#"{{"lock_hash": "{}", "interpreter": "/usr/bin/python3.12", "interpreter_version": "3.12"}}"#,
                lock_hash
            ),
        )
        .unwrap();

        assert!(!is_environment_fresh(&project, &interpreter, SYNC).unwrap());
    }
}

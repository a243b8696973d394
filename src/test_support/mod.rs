//! Test utilities and fakes for Berth unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use berth::test_support::{FakePackageManager, WorkspaceFixture};
//!
//! #[test]
//! fn test_example() {
//!     let fixture = WorkspaceFixture::new().member("packages/a").write();
//!     let pm = FakePackageManager::new().fail_on("packages/a", Step::Lock, 2);
//!     // Drive a run against `fixture.manifest_path()` with `pm`...
//! }
//! ```

pub mod fixtures;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;

use crate::core::interpreter::InterpreterSpec;
use crate::core::project::Project;
use crate::ops::lock_sync::{OperationResult, PackageManager};
use crate::util::error::Step;

pub use fixtures::*;

/// One call made to a [`FakePackageManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub project: String,
    pub step: Step,
    pub upgrade: bool,
    pub interpreter: PathBuf,
}

/// In-process package manager that records calls instead of spawning.
///
/// A successful lock writes a deterministic `uv.lock` into the project root;
/// a successful sync creates the project's environment directory.
#[derive(Debug, Default)]
pub struct FakePackageManager {
    failures: HashMap<(String, Step), i32>,
    sync_args: Vec<String>,
    calls: Mutex<Vec<Call>>,
}

impl FakePackageManager {
    pub fn new() -> Self {
        FakePackageManager::default()
    }

    /// Make `step` exit with `code` for the given project.
    pub fn fail_on(mut self, project: &str, step: Step, code: i32) -> Self {
        self.failures.insert((project.to_string(), step), code);
        self
    }

    /// Extra install arguments, reflected in the described install command.
    pub fn with_sync_args(mut self, args: &[&str]) -> Self {
        self.sync_args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Project ids touched by `step`, in order.
    pub fn projects_for(&self, step: Step) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.step == step)
            .map(|c| c.project)
            .collect()
    }

    fn record(&self, project: &Project, interpreter: &InterpreterSpec, step: Step, upgrade: bool) {
        self.calls.lock().unwrap().push(Call {
            project: project.id().to_string(),
            step,
            upgrade,
            interpreter: interpreter.path.clone(),
        });
    }

    fn outcome(&self, project: &Project, step: Step) -> OperationResult {
        let code = self
            .failures
            .get(&(project.id().to_string(), step))
            .copied()
            .unwrap_or(0);
        let output = if code == 0 {
            String::new()
        } else {
            format!("error: fake {} failure for {}\n", step, project.id())
        };
        OperationResult {
            project: project.id().to_string(),
            step,
            status: Some(code),
            output,
        }
    }
}

impl PackageManager for FakePackageManager {
    fn lock(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        upgrade: bool,
    ) -> Result<OperationResult> {
        self.record(project, interpreter, Step::Lock, upgrade);
        let result = self.outcome(project, Step::Lock);
        if result.success() {
            std::fs::write(project.lockfile_path(), fake_lock_contents(project))?;
        }
        Ok(result)
    }

    fn sync(&self, project: &Project, interpreter: &InterpreterSpec) -> Result<OperationResult> {
        self.record(project, interpreter, Step::Install, false);
        let result = self.outcome(project, Step::Install);
        if result.success() {
            std::fs::create_dir_all(project.env_dir())?;
        }
        Ok(result)
    }

    fn describe(&self, step: Step, upgrade: bool) -> String {
        match (step, upgrade) {
            (Step::Lock, true) => "fake lock --upgrade".to_string(),
            (Step::Lock, false) => "fake lock".to_string(),
            (Step::Install, _) => std::iter::once("fake sync")
                .chain(self.sync_args.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Lock contents the fake writes; identical across runs for the same project.
pub fn fake_lock_contents(project: &Project) -> String {
    format!("version = 1\n\n[[package]]\nname = \"{}\"\n", project.id())
}

/// Create an executable stub named `name` inside `dir`.
#[cfg(unix)]
pub fn fake_executable(dir: &Path, name: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interpreter::InterpreterSource;
    use tempfile::TempDir;

    #[test]
    fn test_fake_records_and_fails() {
        let tmp = TempDir::new().unwrap();
        let project = Project::new("a", tmp.path().to_path_buf(), 1);
        let interpreter = InterpreterSpec {
            version: "3.12".into(),
            source: InterpreterSource::Default,
            path: PathBuf::from("/usr/bin/python3.12"),
        };

        let pm = FakePackageManager::new().fail_on("a", Step::Install, 4);
        assert!(pm.lock(&project, &interpreter, true).unwrap().success());
        assert_eq!(pm.sync(&project, &interpreter).unwrap().status, Some(4));

        assert_eq!(pm.projects_for(Step::Lock), vec!["a"]);
        assert!(pm.calls()[0].upgrade);
        assert!(project.lockfile_path().exists());
        assert!(!project.env_dir().exists());
    }
}

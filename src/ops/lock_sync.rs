//! Per-project lock regeneration and synchronized install.
//!
//! Each project moves through `Pending → Locking → Installing → Done`. A
//! failing external step moves it to `Failed` and the error is returned to
//! the caller, which stops the run. Nothing already done is rolled back.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;

use crate::core::interpreter::InterpreterSpec;
use crate::core::project::Project;
use crate::ops::events::{EventSink, ProvisionEvent};
use crate::ops::fingerprint;
use crate::util::config::Config;
use crate::util::error::{BerthError, Step};
use crate::util::process::{combined_output, ProcessBuilder};

/// Exit code reported when the package manager cannot be started at all.
const SPAWN_FAILURE_CODE: i32 = 127;

/// How a project's lock artifact is regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Lock within current constraints, keeping existing pins, then install.
    NoUpdate,
    /// Lock allowing every dependency to move to its newest allowed version,
    /// then install.
    Update,
    /// Lock within current constraints without installing.
    LockOnly,
}

impl SyncMode {
    /// Whether the lock step may advance already-pinned versions.
    pub fn upgrades(&self) -> bool {
        matches!(self, SyncMode::Update)
    }

    /// Whether the install step runs after locking.
    pub fn installs(&self) -> bool {
        !matches!(self, SyncMode::LockOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::NoUpdate => "no-update",
            SyncMode::Update => "update",
            SyncMode::LockOnly => "lock-only",
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one project within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Locking,
    Installing,
    Done,
    Failed,
}

/// Outcome of one external step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub project: String,
    pub step: Step,
    /// Exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    /// Captured stdout and stderr
    pub output: String,
}

impl OperationResult {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn into_error(self) -> BerthError {
        BerthError::ExternalCommandFailure {
            project: self.project,
            step: self.step,
            code: self.status,
            output: self.output,
        }
    }
}

/// The external package manager doing the actual locking and installing.
///
/// The interpreter is always passed in; implementations must not rely on any
/// ambient "active" interpreter or environment.
pub trait PackageManager {
    /// Regenerate the project's lock artifact.
    fn lock(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        upgrade: bool,
    ) -> Result<OperationResult>;

    /// Make the project's environment exactly match its lock artifact.
    fn sync(&self, project: &Project, interpreter: &InterpreterSpec) -> Result<OperationResult>;

    /// Human-readable command line for a step, used in progress output.
    fn describe(&self, step: Step, upgrade: bool) -> String;
}

/// `uv`-backed package manager.
#[derive(Debug, Clone)]
pub struct UvPackageManager {
    program: PathBuf,
    lock_args: Vec<String>,
    sync_args: Vec<String>,
}

impl UvPackageManager {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        UvPackageManager {
            program: program.into(),
            lock_args: Vec::new(),
            sync_args: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        UvPackageManager {
            program: config.package_manager_program(),
            lock_args: config.lock_args().to_vec(),
            sync_args: config.sync_args().to_vec(),
        }
    }

    fn lock_argv(&self, upgrade: bool) -> Vec<String> {
        let mut argv = vec!["lock".to_string()];
        if upgrade {
            argv.push("--upgrade".to_string());
        }
        argv.extend(self.lock_args.iter().cloned());
        argv
    }

    fn sync_argv(&self) -> Vec<String> {
        let mut argv = vec!["sync".to_string(), "--locked".to_string()];
        argv.extend(self.sync_args.iter().cloned());
        argv
    }

    /// Build a command bound to one project and interpreter.
    fn command(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        argv: Vec<String>,
    ) -> ProcessBuilder {
        ProcessBuilder::new(&self.program)
            .args(argv)
            .arg("--python")
            .arg(&interpreter.path)
            .cwd(project.root())
            .env("UV_NO_PROGRESS", "1")
            .env_remove("VIRTUAL_ENV")
            .env_remove("UV_PROJECT_ENVIRONMENT")
            .env_remove("UV_PYTHON")
    }

    fn run(&self, project: &Project, step: Step, cmd: ProcessBuilder) -> Result<OperationResult> {
        let output = cmd.exec()?;
        Ok(OperationResult {
            project: project.id().to_string(),
            step,
            status: output.status.code(),
            output: combined_output(&output),
        })
    }
}

impl PackageManager for UvPackageManager {
    fn lock(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        upgrade: bool,
    ) -> Result<OperationResult> {
        let cmd = self.command(project, interpreter, self.lock_argv(upgrade));
        self.run(project, Step::Lock, cmd)
    }

    fn sync(&self, project: &Project, interpreter: &InterpreterSpec) -> Result<OperationResult> {
        let cmd = self.command(project, interpreter, self.sync_argv());
        self.run(project, Step::Install, cmd)
    }

    fn describe(&self, step: Step, upgrade: bool) -> String {
        let argv = match step {
            Step::Lock => self.lock_argv(upgrade),
            Step::Install => self.sync_argv(),
        };
        format!("{} {}", self.program.display(), argv.join(" "))
    }
}

/// What happened to one project.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub project: String,
    pub mode: SyncMode,
    pub state: SyncState,
    /// Results of every external step that ran, in order
    pub results: Vec<OperationResult>,
    /// The install was skipped because the environment was already current
    pub install_fresh: bool,
}

/// Drives the lock and install steps for one project at a time.
pub struct LockSynchronizer<'a> {
    package_manager: &'a dyn PackageManager,
    /// Ignore environment fingerprints and always install
    force: bool,
}

impl<'a> LockSynchronizer<'a> {
    pub fn new(package_manager: &'a dyn PackageManager) -> Self {
        LockSynchronizer {
            package_manager,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Lock and (depending on `mode`) install one project.
    ///
    /// Returns [`BerthError::ExternalCommandFailure`] for the first failing
    /// step.
    pub fn sync(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        mode: SyncMode,
        sink: &mut dyn EventSink,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            project: project.id().to_string(),
            mode,
            state: SyncState::Pending,
            results: Vec::new(),
            install_fresh: false,
        };

        self.transition(&mut report, SyncState::Locking);
        let lock = self.run_step(project, interpreter, Step::Lock, mode.upgrades(), sink);
        self.check(&mut report, lock, sink)?;

        if mode.installs() {
            self.transition(&mut report, SyncState::Installing);
            let install_command = self.package_manager.describe(Step::Install, false);

            let fresh = !self.force
                && self.or_fail(
                    &mut report,
                    fingerprint::is_environment_fresh(project, interpreter, &install_command),
                    sink,
                )?;

            if fresh {
                tracing::info!("environment for `{}` is already up to date", project.id());
                report.install_fresh = true;
                sink.event(&ProvisionEvent::InstallFresh {
                    project: project.id().to_string(),
                });
            } else {
                self.or_fail(&mut report, fingerprint::invalidate(project), sink)?;
                let install = self.run_step(project, interpreter, Step::Install, false, sink);
                self.check(&mut report, install, sink)?;
                self.or_fail(
                    &mut report,
                    fingerprint::record(project, interpreter, &install_command),
                    sink,
                )?;
            }
        }

        self.transition(&mut report, SyncState::Done);
        sink.event(&ProvisionEvent::ProjectFinished {
            project: project.id().to_string(),
            state: SyncState::Done,
        });
        Ok(report)
    }

    fn run_step(
        &self,
        project: &Project,
        interpreter: &InterpreterSpec,
        step: Step,
        upgrade: bool,
        sink: &mut dyn EventSink,
    ) -> OperationResult {
        sink.event(&ProvisionEvent::StepStarted {
            project: project.id().to_string(),
            step,
            command: self.package_manager.describe(step, upgrade),
        });

        let start = Instant::now();
        let outcome = match step {
            Step::Lock => self.package_manager.lock(project, interpreter, upgrade),
            Step::Install => self.package_manager.sync(project, interpreter),
        };

        let result = outcome.unwrap_or_else(|e| OperationResult {
            project: project.id().to_string(),
            step,
            status: Some(SPAWN_FAILURE_CODE),
            output: format!("{:#}", e),
        });

        sink.event(&ProvisionEvent::StepFinished {
            project: project.id().to_string(),
            step,
            success: result.success(),
            code: result.status,
            duration_ms: start.elapsed().as_millis() as u64,
            output: result.output.clone(),
        });

        result
    }

    /// Record a step result, failing the project if the step failed.
    fn check(
        &self,
        report: &mut SyncReport,
        result: OperationResult,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let success = result.success();
        report.results.push(result.clone());
        if success {
            return Ok(());
        }

        tracing::debug!(
            "project `{}` failed during {} step with {:?}",
            report.project,
            result.step,
            result.status
        );
        self.fail(report, sink);
        Err(result.into_error().into())
    }

    /// Fail the project if bookkeeping around a step went wrong.
    fn or_fail<T>(
        &self,
        report: &mut SyncReport,
        outcome: Result<T>,
        sink: &mut dyn EventSink,
    ) -> Result<T> {
        outcome.map_err(|e| {
            self.fail(report, sink);
            e
        })
    }

    fn fail(&self, report: &mut SyncReport, sink: &mut dyn EventSink) {
        self.transition(report, SyncState::Failed);
        sink.event(&ProvisionEvent::ProjectFinished {
            project: report.project.clone(),
            state: SyncState::Failed,
        });
    }

    fn transition(&self, report: &mut SyncReport, next: SyncState) {
        tracing::debug!("project `{}`: {:?} -> {:?}", report.project, report.state, next);
        report.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::interpreter::InterpreterSource;
    use crate::ops::events::CollectingSink;
    use crate::test_support::{Call, FakePackageManager};
    use tempfile::TempDir;

    fn interpreter() -> InterpreterSpec {
        InterpreterSpec {
            version: "3.12".into(),
            source: InterpreterSource::Default,
            path: PathBuf::from("/usr/bin/python3.12"),
        }
    }

    fn project(tmp: &TempDir) -> Project {
        Project::new(".", tmp.path().to_path_buf(), 0)
    }

    fn steps(calls: &[Call]) -> Vec<(Step, bool)> {
        calls.iter().map(|c| (c.step, c.upgrade)).collect()
    }

    #[test]
    fn test_mode_flags() {
        assert!(SyncMode::NoUpdate.installs() && !SyncMode::NoUpdate.upgrades());
        assert!(SyncMode::Update.installs() && SyncMode::Update.upgrades());
        assert!(!SyncMode::LockOnly.installs() && !SyncMode::LockOnly.upgrades());
    }

    #[test]
    fn test_no_update_locks_then_installs() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new();
        let mut sink = CollectingSink::default();

        let report = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut sink)
            .unwrap();

        assert_eq!(report.state, SyncState::Done);
        assert_eq!(
            steps(&pm.calls()),
            vec![(Step::Lock, false), (Step::Install, false)]
        );
        assert_eq!(report.results.len(), 2);
        assert!(tmp.path().join(".venv").is_dir());
    }

    #[test]
    fn test_update_mode_upgrades() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new();

        LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::Update, &mut CollectingSink::default())
            .unwrap();

        assert_eq!(
            steps(&pm.calls()),
            vec![(Step::Lock, true), (Step::Install, false)]
        );
    }

    #[test]
    fn test_lock_only_skips_install() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new();

        let report = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::LockOnly, &mut CollectingSink::default())
            .unwrap();

        assert_eq!(report.state, SyncState::Done);
        assert_eq!(steps(&pm.calls()), vec![(Step::Lock, false)]);
        assert!(tmp.path().join("uv.lock").exists());
        assert!(!tmp.path().join(".venv").exists());
    }

    #[test]
    fn test_lock_failure_stops_before_install() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new().fail_on(".", Step::Lock, 3);
        let mut sink = CollectingSink::default();

        let err = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut sink)
            .unwrap_err();

        match err.downcast_ref::<BerthError>() {
            Some(BerthError::ExternalCommandFailure { project, step, code, .. }) => {
                assert_eq!(project, ".");
                assert_eq!(*step, Step::Lock);
                assert_eq!(*code, Some(3));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(steps(&pm.calls()), vec![(Step::Lock, false)]);
        assert!(sink.events.iter().any(|e| matches!(
            e,
            ProvisionEvent::ProjectFinished { state: SyncState::Failed, .. }
        )));
    }

    #[test]
    fn test_install_failure_is_reported_for_install_step() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new().fail_on(".", Step::Install, 1);

        let err = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BerthError>(),
            Some(BerthError::ExternalCommandFailure { step: Step::Install, .. })
        ));
        assert!(fingerprint::EnvFingerprint::load(&project(&tmp)).is_none());
    }

    #[test]
    fn test_fresh_environment_skips_install() {
        let tmp = TempDir::new().unwrap();
        let pm = FakePackageManager::new();
        let sync = LockSynchronizer::new(&pm);

        sync.sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();
        let lock_before = std::fs::read(tmp.path().join("uv.lock")).unwrap();

        let report = sync
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();

        assert!(report.install_fresh);
        assert_eq!(
            steps(&pm.calls()),
            vec![(Step::Lock, false), (Step::Install, false), (Step::Lock, false)]
        );
        assert_eq!(std::fs::read(tmp.path().join("uv.lock")).unwrap(), lock_before);

        let forced = LockSynchronizer::new(&pm).with_force(true);
        let report = forced
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();
        assert!(!report.install_fresh);
    }

    #[test]
    fn test_changed_install_args_reinstall() {
        let tmp = TempDir::new().unwrap();
        let plain = FakePackageManager::new();
        LockSynchronizer::new(&plain)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();

        let extras = FakePackageManager::new().with_sync_args(&["--all-extras"]);
        let report = LockSynchronizer::new(&extras)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();

        assert!(!report.install_fresh);
        assert_eq!(
            steps(&extras.calls()),
            vec![(Step::Lock, false), (Step::Install, false)]
        );

        let report = LockSynchronizer::new(&extras)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap();
        assert!(report.install_fresh);
    }

    #[test]
    fn test_fingerprint_error_fails_project() {
        let tmp = TempDir::new().unwrap();
        // A directory where the fingerprint file belongs cannot be removed as a file.
        std::fs::create_dir_all(tmp.path().join(".venv").join(fingerprint::FINGERPRINT_FILE))
            .unwrap();
        let pm = FakePackageManager::new();
        let mut sink = CollectingSink::default();

        let err = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut sink)
            .unwrap_err();

        assert!(err.downcast_ref::<BerthError>().is_none());
        assert_eq!(steps(&pm.calls()), vec![(Step::Lock, false)]);
        assert!(matches!(
            sink.events.last(),
            Some(ProvisionEvent::ProjectFinished { state: SyncState::Failed, .. })
        ));
    }

    #[test]
    fn test_spawn_failure_becomes_step_failure() {
        let tmp = TempDir::new().unwrap();
        let pm = UvPackageManager::new("definitely-not-a-real-program-berth");

        let err = LockSynchronizer::new(&pm)
            .sync(&project(&tmp), &interpreter(), SyncMode::NoUpdate, &mut CollectingSink::default())
            .unwrap_err();

        match err.downcast_ref::<BerthError>() {
            Some(BerthError::ExternalCommandFailure { step, code, .. }) => {
                assert_eq!(*step, Step::Lock);
                assert_eq!(*code, Some(SPAWN_FAILURE_CODE));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_uv_command_lines() {
        let pm = UvPackageManager {
            program: PathBuf::from("uv"),
            lock_args: vec!["--offline".into()],
            sync_args: vec!["--all-extras".into()],
        };

        assert_eq!(pm.describe(Step::Lock, false), "uv lock --offline");
        assert_eq!(pm.describe(Step::Lock, true), "uv lock --upgrade --offline");
        assert_eq!(pm.describe(Step::Install, false), "uv sync --locked --all-extras");

        let project = Project::new("a", PathBuf::from("/ws/a"), 1);
        let cmd = pm.command(&project, &interpreter(), pm.sync_argv());
        assert_eq!(
            cmd.display_command(),
            "uv sync --locked --all-extras --python /usr/bin/python3.12"
        );
    }
}

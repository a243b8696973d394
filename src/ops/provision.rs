//! Workspace-wide provisioning: `install-full`, `update-lock` and `update`.
//!
//! Projects are visited strictly in registry order, one at a time. The first
//! failure stops the run; projects already provisioned stay as they are.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::core::interpreter::InterpreterSelector;
use crate::core::workspace::Workspace;
use crate::ops::clean::{purge, ArtifactSet, CleanScope, PurgeReport};
use crate::ops::events::{EventSink, ProvisionEvent};
use crate::ops::lock_sync::{LockSynchronizer, PackageManager, SyncMode, SyncReport, SyncState};
use crate::util::error::BerthError;

/// Options for a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    pub mode: SyncMode,

    /// Purge every generated artifact before provisioning
    pub clean_first: bool,

    /// Install even when the environment fingerprint is current
    pub force: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        ProvisionOptions {
            mode: SyncMode::NoUpdate,
            clean_first: false,
            force: false,
        }
    }
}

impl ProvisionOptions {
    /// `install-full`: clean everything, then lock and install.
    pub fn install_full() -> Self {
        ProvisionOptions {
            clean_first: true,
            ..Default::default()
        }
    }

    /// `update-lock`: lock without version bumps, optionally without install.
    pub fn update_lock(lock_only: bool) -> Self {
        ProvisionOptions {
            mode: if lock_only {
                SyncMode::LockOnly
            } else {
                SyncMode::NoUpdate
            },
            ..Default::default()
        }
    }

    /// `update`: lock allowing version bumps, then install.
    pub fn update() -> Self {
        ProvisionOptions {
            mode: SyncMode::Update,
            ..Default::default()
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: SyncMode,
    /// Artifacts removed before provisioning, if the run cleaned first
    pub purged: Option<PurgeReport>,
    pub projects: Vec<SyncReport>,
    pub duration: Duration,
}

impl RunReport {
    /// Number of projects whose install was skipped as already current.
    pub fn fresh_count(&self) -> usize {
        self.projects.iter().filter(|p| p.install_fresh).count()
    }
}

/// Provision every project of the workspace.
///
/// Returns the first error encountered: [`BerthError::InterpreterNotFound`]
/// or [`BerthError::ExternalCommandFailure`].
pub fn provision(
    ws: &Workspace,
    selector: &InterpreterSelector,
    package_manager: &dyn PackageManager,
    opts: ProvisionOptions,
    sink: &mut dyn EventSink,
) -> Result<RunReport> {
    let start = Instant::now();

    let purged = if opts.clean_first {
        let report = purge(ws.root(), &ArtifactSet::python()?, CleanScope::All)?;
        sink.event(&ProvisionEvent::Purged {
            removed: report.removed.len(),
        });
        Some(report)
    } else {
        None
    };

    let projects = ws.projects();
    tracing::info!(
        "provisioning {} project(s) in {} mode",
        projects.len(),
        opts.mode
    );
    sink.event(&ProvisionEvent::RunStarted {
        mode: opts.mode,
        projects: projects.len(),
    });

    let synchronizer = LockSynchronizer::new(package_manager).with_force(opts.force);
    let mut reports = Vec::with_capacity(projects.len());

    for (position, project) in projects.iter().enumerate() {
        sink.event(&ProvisionEvent::ProjectStarted {
            project: project.id().to_string(),
            position: position + 1,
            total: projects.len(),
        });

        let outcome = selector.resolve(project).and_then(|interpreter| {
            sink.event(&ProvisionEvent::InterpreterResolved {
                project: project.id().to_string(),
                interpreter: interpreter.clone(),
            });
            synchronizer.sync(project, &interpreter, opts.mode, sink)
        });

        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                // The synchronizer already reported the project as failed.
                if is_interpreter_error(&e) {
                    sink.event(&ProvisionEvent::ProjectFinished {
                        project: project.id().to_string(),
                        state: SyncState::Failed,
                    });
                }
                tracing::info!(
                    "stopping after project `{}`; {} of {} completed",
                    project.id(),
                    reports.len(),
                    projects.len()
                );
                sink.event(&ProvisionEvent::RunFinished {
                    success: false,
                    completed: reports.len(),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
                return Err(e);
            }
        }
    }

    let duration = start.elapsed();
    sink.event(&ProvisionEvent::RunFinished {
        success: true,
        completed: reports.len(),
        duration_ms: duration.as_millis() as u64,
    });

    Ok(RunReport {
        mode: opts.mode,
        purged,
        projects: reports,
        duration,
    })
}

fn is_interpreter_error(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<BerthError>(),
        Some(BerthError::InterpreterNotFound { .. })
    )
}

//! Renders provisioning events through the shell.

use std::sync::Arc;

use berth::ops::events::{EventSink, ProvisionEvent};
use berth::util::shell::{Spinner, Status};
use berth::util::{Shell, Step};

/// Event sink for the terminal: status lines and a spinner in human mode,
/// one JSON object per event in JSON mode.
pub struct ShellReporter {
    shell: Arc<Shell>,
    spinner: Option<Spinner>,
}

impl ShellReporter {
    pub fn new(shell: Arc<Shell>) -> Self {
        ShellReporter {
            shell,
            spinner: None,
        }
    }

    fn human(&mut self, event: &ProvisionEvent) {
        let shell = &self.shell;
        match event {
            ProvisionEvent::RunStarted { mode, projects } => {
                if shell.is_verbose() {
                    shell.note(format!("{} project(s), {} mode", projects, mode));
                }
            }
            ProvisionEvent::Purged { removed } => {
                if *removed > 0 {
                    shell.status(Status::Removed, format!("{} artifact(s)", removed));
                }
            }
            ProvisionEvent::ProjectStarted { .. } | ProvisionEvent::RunFinished { .. } => {}
            ProvisionEvent::InterpreterResolved {
                project,
                interpreter,
            } => {
                if shell.is_verbose() {
                    shell.status(Status::Resolving, format!("{}: python {}", project, interpreter));
                }
            }
            ProvisionEvent::StepStarted {
                project,
                step,
                command,
            } => {
                if shell.is_verbose() {
                    shell.note(format!("running `{}` in {}", command, project));
                }
                let status = match step {
                    Step::Lock => Status::Locking,
                    Step::Install => Status::Installing,
                };
                self.spinner = Some(shell.spinner(status, project));
            }
            ProvisionEvent::StepFinished {
                project,
                step,
                success,
                output,
                ..
            } => {
                let spinner = self.spinner.take();
                if *success {
                    drop(spinner);
                    let status = match step {
                        Step::Lock => Status::Locked,
                        Step::Install => Status::Installed,
                    };
                    shell.status(status, project);
                } else if let Some(spinner) = spinner {
                    spinner.finish();
                }
                shell.verbose_output(output);
            }
            ProvisionEvent::InstallFresh { project } => {
                shell.status(Status::Fresh, format!("{} (environment up to date)", project));
            }
            ProvisionEvent::ProjectFinished { .. } => {}
        }
    }
}

impl EventSink for ShellReporter {
    fn event(&mut self, event: &ProvisionEvent) {
        if self.shell.is_json() {
            match serde_json::to_value(event) {
                Ok(value) => self.shell.json_event(&value),
                Err(e) => tracing::debug!("failed to serialize event: {}", e),
            }
            return;
        }
        self.human(event);
    }
}

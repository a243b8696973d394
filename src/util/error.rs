//! Error taxonomy for workspace provisioning.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// A step of the per-project pipeline that runs an external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Regenerating the lock artifact.
    Lock,
    /// Synchronizing the environment with the lock artifact.
    Install,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Lock => "lock",
            Step::Install => "install",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum BerthError {
    #[error("invalid workspace configuration `{}`: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("no interpreter found for project `{project}` (requested {requested})")]
    InterpreterNotFound { project: String, requested: String },

    #[error("{step} step failed for project `{project}` ({})", describe_code(*code))]
    ExternalCommandFailure {
        project: String,
        step: Step,
        code: Option<i32>,
        output: String,
    },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl BerthError {
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        BerthError::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// External failures forward the child's own code; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BerthError::ExternalCommandFailure {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Convert to a user-facing diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BerthError::Config { path, message } => Diagnostic::error(message.clone())
                .with_location(path.clone())
                .with_suggestion(suggestions::FIX_MANIFEST),

            BerthError::InterpreterNotFound { project, requested } => {
                Diagnostic::error(format!("no interpreter found for project `{}`", project))
                    .with_context(format!("requested: {}", requested))
                    .with_suggestion(suggestions::INSTALL_INTERPRETER)
            }

            BerthError::ExternalCommandFailure {
                project,
                step,
                code,
                output,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "{} step failed for project `{}` ({})",
                    step,
                    project,
                    describe_code(*code)
                ));
                for line in tail_lines(output, 20) {
                    diag = diag.with_context(line.to_string());
                }
                diag.with_suggestion(match step {
                    Step::Lock => suggestions::LOCK_FAILED,
                    Step::Install => suggestions::INSTALL_FAILED,
                })
            }
        }
    }
}

fn tail_lines(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}

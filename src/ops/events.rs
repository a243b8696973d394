//! Provisioning events.
//!
//! The provisioning pipeline reports what it is doing through an
//! [`EventSink`]. The CLI renders events as status lines, or serializes them
//! one JSON object per line with `--message-format json`.
//!
//! # Stability
//!
//! The JSON schema should remain backwards compatible: new fields may be
//! added, existing fields should not be removed or renamed.

use serde::Serialize;

use crate::core::interpreter::InterpreterSpec;
use crate::ops::lock_sync::{SyncMode, SyncState};
use crate::util::error::Step;

/// An event emitted while provisioning a workspace.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum ProvisionEvent {
    /// A run over the workspace started.
    #[serde(rename = "run-started")]
    RunStarted {
        mode: SyncMode,
        /// Number of projects that will be visited
        projects: usize,
    },

    /// Generated artifacts were purged before provisioning.
    #[serde(rename = "purged")]
    Purged {
        /// Number of files and directories removed
        removed: usize,
    },

    /// Processing of a project started.
    #[serde(rename = "project-started")]
    ProjectStarted {
        project: String,
        /// 1-based position in processing order
        position: usize,
        total: usize,
    },

    /// The project's interpreter was resolved.
    #[serde(rename = "interpreter-resolved")]
    InterpreterResolved {
        project: String,
        interpreter: InterpreterSpec,
    },

    /// An external step started.
    #[serde(rename = "step-started")]
    StepStarted {
        project: String,
        step: Step,
        command: String,
    },

    /// An external step finished, successfully or not.
    #[serde(rename = "step-finished")]
    StepFinished {
        project: String,
        step: Step,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        duration_ms: u64,
        /// Captured output (stdout followed by stderr)
        #[serde(skip_serializing_if = "String::is_empty")]
        output: String,
    },

    /// The environment already matched the lock artifact; install skipped.
    #[serde(rename = "install-fresh")]
    InstallFresh { project: String },

    /// Processing of a project ended.
    #[serde(rename = "project-finished")]
    ProjectFinished { project: String, state: SyncState },

    /// The run ended.
    #[serde(rename = "run-finished")]
    RunFinished {
        success: bool,
        /// Projects that reached `done`
        completed: usize,
        duration_ms: u64,
    },
}

/// Receiver for provisioning events.
pub trait EventSink {
    fn event(&mut self, event: &ProvisionEvent);
}

/// Sink that keeps every event, for inspection after a run.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<ProvisionEvent>,
}

impl EventSink for CollectingSink {
    fn event(&mut self, event: &ProvisionEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ProvisionEvent::StepFinished {
            project: "packages/a".into(),
            step: Step::Lock,
            success: false,
            code: Some(2),
            duration_ms: 12,
            output: "boom".into(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["reason"], "step-finished");
        assert_eq!(json["step"], "lock");
        assert_eq!(json["code"], 2);
        assert_eq!(json["output"], "boom");
    }

    #[test]
    fn test_optional_fields_skipped() {
        let event = ProvisionEvent::StepFinished {
            project: ".".into(),
            step: Step::Install,
            success: true,
            code: Some(0),
            duration_ms: 5,
            output: String::new(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("output").is_none());
    }

    #[test]
    fn test_state_and_mode_names() {
        let event = ProvisionEvent::ProjectFinished {
            project: ".".into(),
            state: SyncState::Done,
        };
        assert_eq!(serde_json::to_value(&event).unwrap()["state"], "done");

        let event = ProvisionEvent::RunStarted {
            mode: SyncMode::LockOnly,
            projects: 3,
        };
        assert_eq!(serde_json::to_value(&event).unwrap()["mode"], "lock-only");
    }
}

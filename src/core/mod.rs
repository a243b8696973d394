//! Core data structures for Berth.
//!
//! - Projects and the ordered workspace registry
//! - Interpreter selection

pub mod interpreter;
pub mod project;
pub mod workspace;

pub use interpreter::{InterpreterSelector, InterpreterSource, InterpreterSpec};
pub use project::Project;
pub use workspace::{Workspace, MANIFEST_NAME};

//! Berth - lock and install every project of a Python workspace, in order.
//!
//! This crate provides the library behind the `berth` binary: the project
//! registry, interpreter selection, per-project lock/install and the
//! artifact cleanup.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and fakes for Berth unit tests.
///
/// Only compiled for tests. Provides a recording package manager and
/// on-disk workspace fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{InterpreterSelector, InterpreterSpec, Project, Workspace};
pub use util::context::GlobalContext;
pub use util::error::BerthError;

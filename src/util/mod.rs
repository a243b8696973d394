//! Shared utilities

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod error;
pub mod fs;
pub mod hash;
pub mod process;
pub mod shell;

pub use config::Config;
pub use context::GlobalContext;
pub use diagnostic::Diagnostic;
pub use error::{BerthError, Step};
pub use shell::{Shell, Status};

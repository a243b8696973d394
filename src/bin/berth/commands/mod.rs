//! Command implementations

pub mod clean;
pub mod install;
pub mod list;
pub mod update;

use anyhow::Result;

use berth::core::{InterpreterSelector, Workspace};
use berth::ops::{provision, ProvisionOptions, RunReport, UvPackageManager};
use berth::util::Status;

use crate::reporter::ShellReporter;
use crate::GlobalOptions;

/// Find and load the workspace for this invocation.
pub fn load_workspace(opts: &GlobalOptions) -> Result<Workspace> {
    let ctx = opts.context()?;
    let manifest_path = ctx.find_manifest()?;
    let ws = Workspace::new(&manifest_path, &ctx)?;
    tracing::debug!("using manifest {}", ws.manifest_path().display());
    Ok(ws)
}

/// Run a provisioning pass over the whole workspace and report it.
pub fn run_provision(opts: &GlobalOptions, provision_opts: ProvisionOptions) -> Result<RunReport> {
    let shell = &opts.shell;
    let ws = load_workspace(opts)?;

    let selector = InterpreterSelector::from_config(ws.config());
    let package_manager = UvPackageManager::from_config(ws.config());
    let mut reporter = ShellReporter::new(shell.clone());

    let span = shell.span(format!("{} mode", provision_opts.mode));
    let report = provision(
        &ws,
        &selector,
        &package_manager,
        provision_opts,
        &mut reporter,
    )?;

    let fresh = report.fresh_count();
    if fresh > 0 {
        shell.status(
            Status::Info,
            format!("{} of {} environment(s) already up to date", fresh, report.projects.len()),
        );
    }
    span.finish();

    Ok(report)
}

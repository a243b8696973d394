//! `berth install-full` command

use anyhow::Result;

use berth::ops::ProvisionOptions;

use crate::cli::ProvisionArgs;
use crate::commands::run_provision;
use crate::GlobalOptions;

pub fn execute(args: ProvisionArgs, opts: &GlobalOptions) -> Result<()> {
    run_provision(opts, ProvisionOptions::install_full().with_force(args.force))?;
    Ok(())
}

//! `berth update-lock` and `berth update` commands

use anyhow::Result;

use berth::ops::ProvisionOptions;

use crate::cli::{ProvisionArgs, UpdateLockArgs};
use crate::commands::run_provision;
use crate::GlobalOptions;

/// Regenerate lock files within current constraints.
pub fn execute_lock(args: UpdateLockArgs, opts: &GlobalOptions) -> Result<()> {
    let provision_opts =
        ProvisionOptions::update_lock(args.lock_only).with_force(args.provision.force);
    run_provision(opts, provision_opts)?;
    Ok(())
}

/// Regenerate lock files allowing every dependency to move forward.
pub fn execute(args: ProvisionArgs, opts: &GlobalOptions) -> Result<()> {
    run_provision(opts, ProvisionOptions::update().with_force(args.force))?;
    Ok(())
}

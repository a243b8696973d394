//! `berth clean`, `clean-pyc`, `clean-test` and `clean-all` commands

use anyhow::Result;
use serde_json::json;

use berth::ops::clean::{purge, ArtifactSet, CleanScope};
use berth::util::Status;

use crate::GlobalOptions;

pub fn execute(scope: CleanScope, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;

    // Cleaning never needs a valid manifest, only the workspace root it sits in.
    let ctx = opts.context()?;
    let manifest_path = ctx.find_manifest()?;
    let root = manifest_path.parent().unwrap_or(ctx.cwd()).to_path_buf();

    shell.status(Status::Cleaning, format!("{} in {}", scope, root.display()));
    let report = purge(&root, &ArtifactSet::python()?, scope)?;

    if shell.is_json() {
        let removed: Vec<String> = report
            .removed
            .iter()
            .map(|r| r.path.display().to_string())
            .collect();
        shell.json_event(&json!({
            "reason": "clean-finished",
            "scope": scope.to_string(),
            "removed": removed,
        }));
        return Ok(());
    }

    if shell.is_verbose() {
        for artifact in &report.removed {
            shell.status(Status::Removed, artifact.path.display());
        }
    }

    if report.is_empty() {
        shell.note("nothing to remove");
    } else {
        shell.status(
            Status::Removed,
            format!("{} artifact(s)", report.removed.len()),
        );
    }

    Ok(())
}

//! `berth list` command

use anyhow::Result;
use serde_json::json;

use berth::core::InterpreterSelector;

use crate::commands::load_workspace;
use crate::GlobalOptions;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ws = load_workspace(opts)?;
    let selector = InterpreterSelector::from_config(ws.config());

    for project in ws.projects() {
        let interpreter = selector.resolve(project)?;

        if shell.is_json() {
            shell.json_event(&json!({
                "reason": "project",
                "project": project.id(),
                "position": project.index() + 1,
                "root": project.root(),
                "interpreter": interpreter,
            }));
        } else {
            println!(
                "{:>3}. {:<30} python {} [{}] {}",
                project.index() + 1,
                project.to_string(),
                interpreter.version,
                interpreter.source,
                interpreter.path.display()
            );
        }
    }

    Ok(())
}

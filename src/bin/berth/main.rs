//! Berth CLI - lock and install every project of a Python workspace

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod reporter;

use berth::ops::CleanScope;
use berth::util::diagnostic::{emit, Diagnostic};
use berth::util::{BerthError, GlobalContext, Shell};
use cli::{Cli, Commands, MessageFormat};

/// Options shared by every command.
pub struct GlobalOptions {
    pub shell: Arc<Shell>,
    pub manifest_path: Option<PathBuf>,
    pub python: Option<String>,
}

impl GlobalOptions {
    /// Context for this invocation: current directory, global config and
    /// command line overrides.
    pub fn context(&self) -> Result<GlobalContext> {
        Ok(GlobalContext::new()?
            .with_manifest_path(self.manifest_path.clone())
            .with_python(self.python.clone()))
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("berth=debug")
        } else {
            EnvFilter::new("berth=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    ));

    let opts = GlobalOptions {
        shell: Arc::clone(&shell),
        manifest_path: cli.manifest_path,
        python: cli.python,
    };

    if let Err(e) = run(cli.command, &opts) {
        let code = report_error(&e, &shell);
        std::process::exit(code);
    }
}

fn run(command: Commands, opts: &GlobalOptions) -> Result<()> {
    match command {
        Commands::Clean => commands::clean::execute(CleanScope::Cache, opts),
        Commands::CleanPyc => commands::clean::execute(CleanScope::Pyc, opts),
        Commands::CleanTest => commands::clean::execute(CleanScope::Test, opts),
        Commands::CleanAll => commands::clean::execute(CleanScope::All, opts),
        Commands::InstallFull(args) => commands::install::execute(args, opts),
        Commands::UpdateLock(args) => commands::update::execute_lock(args, opts),
        Commands::Update(args) => commands::update::execute(args, opts),
        Commands::List => commands::list::execute(opts),
    }
}

/// Print the error and pick the process exit code.
fn report_error(err: &anyhow::Error, shell: &Shell) -> i32 {
    match err.downcast_ref::<BerthError>() {
        Some(berth) => {
            emit(&berth.to_diagnostic(), shell.use_color());
            berth.exit_code()
        }
        None => {
            let mut diag = Diagnostic::error(err.to_string());
            for cause in err.chain().skip(1) {
                diag = diag.with_context(cause.to_string());
            }
            emit(&diag, shell.use_color());
            1
        }
    }
}

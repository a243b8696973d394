//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use berth::util::shell::ColorChoice;

/// Berth - lock and install every project of a Python workspace, in order
#[derive(Parser)]
#[command(name = "berth")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Berth.toml (defaults to searching upward from the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Default interpreter version for projects without a usable pin
    #[arg(long, global = true, env = "PYTHON_VERSION", value_name = "VERSION")]
    pub python: Option<String>,

    /// Show command lines and captured output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    /// Status lines on stderr
    Human,
    /// One JSON event per line on stdout
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Remove interpreter caches and test artifacts
    Clean,

    /// Remove interpreter cache files only
    CleanPyc,

    /// Remove test and coverage artifacts only
    CleanTest,

    /// Remove environments, build output and lock files, plus all caches
    CleanAll,

    /// Clean everything, then lock and install every project
    InstallFull(ProvisionArgs),

    /// Regenerate lock files without version bumps, then install
    UpdateLock(UpdateLockArgs),

    /// Regenerate lock files allowing version bumps, then install
    Update(ProvisionArgs),

    /// List projects in processing order with their interpreters
    List,
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// Install even if an environment already matches its lock file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct UpdateLockArgs {
    /// Only regenerate lock files; do not install
    #[arg(long)]
    pub lock_only: bool,

    #[command(flatten)]
    pub provision: ProvisionArgs,
}

use crate::libs::preflight::CheckKind;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Defines the command-line interface (CLI) for 'devbox-provision'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
///
/// With no subcommand the `run` arguments apply directly, so a bare
/// `devbox-provision` provisions the default profile.
#[derive(Parser)]
#[command(name = "devbox-provision", version)]
#[command(about = "Staged, idempotent provisioning of a development machine")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enables detailed debug output for troubleshooting, including every executed command.
    #[arg(short, long, global = true)]
    pub(crate) debug: bool,

    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    #[command(flatten)]
    pub(crate) run: RunArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Runs preflight, backup, every stage and verification (the default).
    Run(RunArgs),
    /// Prints the resolved stages and expected artifacts without touching anything.
    Plan(PlanArgs),
    /// Only re-probes the expected artifacts of a plan.
    Verify(VerifyArgs),
    /// Show the current Version of the tool.
    Version,
}

/// Which plan to use and for which machine.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Built-in profile [possible values: shell, docker, browser].
    #[arg(long, env = "DEVBOX_PROVISION_PROFILE", default_value = "shell")]
    pub profile: String,
    /// Path to a custom YAML plan file. Takes precedence over --profile.
    #[arg(long, env = "DEVBOX_PROVISION_PLAN")]
    pub plan: Option<PathBuf>,
    /// Installation root; `~` in plans expands to it. Defaults to the home directory.
    #[arg(long, env = "DEVBOX_PROVISION_ROOT")]
    pub root: Option<PathBuf>,
    /// Skip detection and use this package manager [brew, apt, dnf, pacman].
    #[arg(long)]
    pub package_manager: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub plan: PlanArgs,
    /// Base directory for backup snapshots. Defaults to <root>/.devbox-provision/backups.
    #[arg(long, env = "DEVBOX_PROVISION_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,
    /// Exit 0 even when verification finds missing artifacts.
    #[arg(long, env = "DEVBOX_PROVISION_LENIENT_VERIFY")]
    pub lenient_verify: bool,
    /// Comma separated preflight checks to skip [privilege, connectivity, disk].
    #[arg(long, env = "DEVBOX_PROVISION_SKIP_PREFLIGHT", value_delimiter = ',')]
    pub skip_preflight: Vec<CheckKind>,
    /// Print the final run summary as JSON on stdout.
    #[arg(long)]
    pub json: bool,
    /// Probe every stage and show what would be applied. No backup, no changes.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub plan: PlanArgs,
    /// Exit 0 even when artifacts are missing.
    #[arg(long, env = "DEVBOX_PROVISION_LENIENT_VERIFY")]
    pub lenient_verify: bool,
    /// Print the verification report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

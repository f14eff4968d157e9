//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// prepkit - Get a project's requirements ready to run.
#[derive(Debug, Parser)]
#[command(name = "prepkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub directory: Option<PathBuf>,

    /// Show provider logs
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set up the project's requirements
    Prepare(PrepareArgs),

    /// Report which requirements are missing without changing anything
    Check(CheckArgs),

    /// Undo what prepare set up
    Unprepare(UnprepareArgs),

    /// Undo prepare and delete generated directories
    Clean(CleanArgs),

    /// Prepare, then run a project command
    Run(RunArgs),

    /// Store values for project variables
    SetVariable(SetVariableArgs),

    /// Forget stored values for project variables
    UnsetVariable(UnsetVariableArgs),

    /// Remove packages from a project environment
    RemovePackages(RemovePackagesArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `prepare` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PrepareArgs {
    /// How to provide requirements: check, unattended or interactive
    /// (interactive when attached to a terminal, unattended otherwise)
    #[arg(long)]
    pub mode: Option<String>,

    /// Env spec to prepare
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,

    /// Prepare for this command
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,

    /// Ask again after a failed stage instead of stopping
    #[arg(long)]
    pub keep_going: bool,
}

/// Arguments for the `check` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CheckArgs {
    /// Env spec to check
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,

    /// Check for this command
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,
}

/// Arguments for the `unprepare` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct UnprepareArgs {
    /// Only clean up these variables or requirement kinds (repeatable)
    #[arg(long = "var", value_name = "NAME")]
    pub vars: Vec<String>,

    /// Env spec to clean up
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,
}

/// Arguments for the `clean` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CleanArgs {
    /// Env spec to clean up
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Command to run (defaults to the project's default command)
    #[arg(long, value_name = "NAME")]
    pub command: Option<String>,

    /// Env spec to run in
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,

    /// Use defaults, no prompts
    #[arg(long)]
    pub non_interactive: bool,

    /// Extra arguments appended to the command line
    #[arg(last = true)]
    pub extra_args: Vec<String>,
}

/// Arguments for the `set-variable` command.
#[derive(Debug, Clone, clap::Args)]
pub struct SetVariableArgs {
    /// Assignments in NAME=VALUE form
    #[arg(required = true, value_parser = parse_assignment, value_name = "NAME=VALUE")]
    pub assignments: Vec<(String, String)>,
}

/// Arguments for the `unset-variable` command.
#[derive(Debug, Clone, clap::Args)]
pub struct UnsetVariableArgs {
    /// Variable names
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

/// Arguments for the `remove-packages` command.
#[derive(Debug, Clone, clap::Args)]
pub struct RemovePackagesArgs {
    /// Env spec whose environment to change
    #[arg(long, value_name = "NAME")]
    pub env_spec: Option<String>,

    /// Packages to remove
    #[arg(required = true)]
    pub packages: Vec<String>,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("'{}' should be in NAME=VALUE form", s)),
    }
}

//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, reporting through `ui`.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }

    /// Success or a failure with exit code 1.
    pub fn from_success(success: bool) -> Self {
        if success {
            Self::success()
        } else {
            Self::failure(1)
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    project_root: PathBuf,
}

impl CommandDispatcher {
    pub fn new(project_root: PathBuf) -> Self {
        Self { project_root }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Route the CLI subcommand to its implementation and execute it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let root = &self.project_root;
        match &cli.command {
            Commands::Prepare(args) => {
                super::prepare::PrepareCommand::new(root, args.clone()).execute(ui)
            }
            Commands::Check(args) => super::check::CheckCommand::new(root, args.clone()).execute(ui),
            Commands::Unprepare(args) => {
                super::unprepare::UnprepareCommand::new(root, args.clone()).execute(ui)
            }
            Commands::Clean(args) => super::clean::CleanCommand::new(root, args.clone()).execute(ui),
            Commands::Run(args) => super::run::RunCommand::new(root, args.clone()).execute(ui),
            Commands::SetVariable(args) => {
                super::variables::SetVariableCommand::new(root, args.clone()).execute(ui)
            }
            Commands::UnsetVariable(args) => {
                super::variables::UnsetVariableCommand::new(root, args.clone()).execute(ui)
            }
            Commands::RemovePackages(args) => {
                super::packages::RemovePackagesCommand::new(root, args.clone()).execute(ui)
            }
            Commands::Completions(args) => {
                super::completions::CompletionsCommand::new(args.clone()).execute(ui)
            }
        }
    }
}

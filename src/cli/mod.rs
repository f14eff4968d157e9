//! Command-line interface for prepkit.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{
    CheckArgs, CleanArgs, Cli, Commands, CompletionsArgs, PrepareArgs, RemovePackagesArgs,
    RunArgs, SetVariableArgs, UnprepareArgs, UnsetVariableArgs,
};
pub use commands::{Command, CommandDispatcher, CommandResult, Workspace};

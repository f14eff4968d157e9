//! Clean command implementation.
//!
//! The `prepkit clean` command unprepares the project and deletes the
//! directories prepare generated.

use std::path::{Path, PathBuf};

use crate::cli::args::CleanArgs;
use crate::error::Result;
use crate::ops;
use crate::providers::ProvideMode;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The clean command implementation.
pub struct CleanCommand {
    project_root: PathBuf,
    args: CleanArgs,
}

impl CleanCommand {
    pub fn new(project_root: &Path, args: CleanArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }
}

impl Command for CleanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::open(&self.project_root)?;
        let project = &workspace.project;

        let options = workspace.options(ProvideMode::Check, self.args.env_spec.as_deref());
        let current = workspace.engine.check(project, options)?;
        let status = ops::clean(&workspace.engine, project, &current);

        Ok(CommandResult::from_success(display::show_status(ui, &status)))
    }
}

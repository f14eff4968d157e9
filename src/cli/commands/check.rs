//! Check command implementation.
//!
//! The `prepkit check` command reports missing requirements without
//! changing anything.

use std::path::{Path, PathBuf};

use crate::cli::args::CheckArgs;
use crate::error::Result;
use crate::providers::ProvideMode;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The check command implementation.
pub struct CheckCommand {
    project_root: PathBuf,
    args: CheckArgs,
}

impl CheckCommand {
    pub fn new(project_root: &Path, args: CheckArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }
}

impl Command for CheckCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::open(&self.project_root)?;
        let project = &workspace.project;

        let mut options = workspace.options(ProvideMode::Check, self.args.env_spec.as_deref());
        if let Some(command) = &self.args.command {
            options = options.with_command_name(command);
        }

        ui.show_header(&format!("Checking {}", project.name()));
        let result = workspace.engine.check(project, options)?;
        display::show_requirement_statuses(ui, result.statuses());

        let masker = display::masker_for(project, &result);
        Ok(CommandResult::from_success(display::show_prepare_result(
            ui, &masker, &result,
        )))
    }
}

//! Unprepare command implementation.
//!
//! The `prepkit unprepare` command undoes what prepare set up, such as
//! stopping services and deleting the project environment.

use std::path::{Path, PathBuf};

use crate::cli::args::UnprepareArgs;
use crate::error::Result;
use crate::providers::ProvideMode;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The unprepare command implementation.
pub struct UnprepareCommand {
    project_root: PathBuf,
    args: UnprepareArgs,
}

impl UnprepareCommand {
    pub fn new(project_root: &Path, args: UnprepareArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    fn whitelist(&self) -> Option<&[String]> {
        if self.args.vars.is_empty() {
            None
        } else {
            Some(&self.args.vars)
        }
    }
}

impl Command for UnprepareCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::open(&self.project_root)?;
        let project = &workspace.project;

        // What's satisfied now is what a previous prepare left behind.
        let options = workspace.options(ProvideMode::Check, self.args.env_spec.as_deref());
        let current = workspace.engine.check(project, options)?;

        let mut spinner = ui.start_spinner(&format!("Cleaning up {}", project.name()));
        let status = workspace
            .engine
            .unprepare(project, &current, self.whitelist());
        if status.success {
            spinner.finish_success(&status.description);
        } else {
            spinner.finish_error(&status.description);
        }
        drop(spinner);

        Ok(CommandResult::from_success(display::show_status(ui, &status)))
    }
}

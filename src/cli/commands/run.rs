//! Run command implementation.
//!
//! The `prepkit run` command prepares the project for a command and then
//! runs that command in the prepared environment.

use std::path::{Path, PathBuf};

use crate::cli::args::RunArgs;
use crate::error::Result;
use crate::prepare::PrepareResult;
use crate::project::Project;
use crate::providers::ProvideMode;
use crate::ui::{UiInputSource, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The run command implementation.
pub struct RunCommand {
    project_root: PathBuf,
    args: RunArgs,
}

impl RunCommand {
    pub fn new(project_root: &Path, args: RunArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// The command to run, if the project has one by that name.
    fn command_name<'p>(&'p self, project: &'p Project) -> Option<&'p str> {
        match &self.args.command {
            Some(name) => Some(name.as_str()),
            None => project.default_command().map(|c| c.name.as_str()),
        }
    }

    fn prepare(
        &self,
        workspace: &Workspace,
        command: &str,
        ui: &mut dyn UserInterface,
    ) -> Result<PrepareResult> {
        let interactive = ui.is_interactive() && !self.args.non_interactive;
        let mode = if interactive {
            ProvideMode::Interactive
        } else {
            ProvideMode::Unattended
        };
        let options = workspace
            .options(mode, self.args.env_spec.as_deref())
            .with_command_name(command)
            .with_extra_args(self.args.extra_args.clone());

        if interactive {
            let mut input = UiInputSource::new(ui);
            workspace
                .engine
                .prepare_interactively(&workspace.project, options, &mut input)
        } else {
            workspace
                .engine
                .prepare_without_interaction(&workspace.project, options)
        }
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::open(&self.project_root)?;
        let project = &workspace.project;

        let Some(command) = self.command_name(project) else {
            ui.error(&format!(
                "No commands found in {}.",
                project.file_path().display()
            ));
            return Ok(CommandResult::failure(2));
        };

        let result = self.prepare(&workspace, command, ui)?;
        let masker = display::masker_for(project, &result);
        if !display::show_prepare_result(ui, &masker, &result) {
            return Ok(CommandResult::failure(1));
        }

        let Some(exec_info) = result.command_exec_info() else {
            ui.error(&format!("Nothing to run for command '{}'.", command));
            return Ok(CommandResult::failure(1));
        };
        tracing::debug!("Running {:?} in {}", exec_info.args, exec_info.cwd.display());

        let status = exec_info.to_command().status()?;
        match status.code() {
            Some(0) => Ok(CommandResult::success()),
            Some(code) => Ok(CommandResult::failure(code)),
            None => {
                ui.error(&format!("Command '{}' was terminated by a signal.", command));
                Ok(CommandResult::failure(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn project_without_commands_fails() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();

        let result = RunCommand::new(temp.path(), RunArgs::default())
            .execute(&mut ui)
            .unwrap();

        assert_eq!(result.exit_code, 2);
        assert!(ui.has_error("No commands found in"));
    }

    #[test]
    fn command_name_defaults_to_project_default() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("project.yml"),
            "commands:\n  serve:\n    unix: python -m http.server\n",
        )
        .unwrap();
        let workspace = Workspace::open(temp.path()).unwrap();

        let cmd = RunCommand::new(temp.path(), RunArgs::default());
        assert_eq!(cmd.command_name(&workspace.project), Some("serve"));

        let cmd = RunCommand::new(
            temp.path(),
            RunArgs {
                command: Some("other".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(cmd.command_name(&workspace.project), Some("other"));
    }
}

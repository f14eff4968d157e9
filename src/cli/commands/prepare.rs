//! Prepare command implementation.
//!
//! The `prepkit prepare` command sets up every requirement of the project.
//! On a terminal it asks for choices between stages; elsewhere it uses
//! defaults.

use std::path::{Path, PathBuf};

use crate::cli::args::PrepareArgs;
use crate::error::Result;
use crate::providers::ProvideMode;
use crate::ui::{UiInputSource, UserInterface};

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The prepare command implementation.
pub struct PrepareCommand {
    project_root: PathBuf,
    args: PrepareArgs,
}

impl PrepareCommand {
    pub fn new(project_root: &Path, args: PrepareArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }

    /// The mode asked for, or the best one for this UI.
    fn mode(&self, ui: &dyn UserInterface) -> Result<ProvideMode> {
        match &self.args.mode {
            Some(mode) => mode.parse(),
            None if ui.is_interactive() => Ok(ProvideMode::Interactive),
            None => Ok(ProvideMode::Unattended),
        }
    }
}

impl Command for PrepareCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let mode = self.mode(ui)?;
        let workspace = Workspace::open(&self.project_root)?;
        let project = &workspace.project;

        let mut options = workspace
            .options(mode, self.args.env_spec.as_deref())
            .keep_going(self.args.keep_going);
        if let Some(command) = &self.args.command {
            options = options.with_command_name(command);
        }

        ui.show_header(&format!("Preparing {}", project.name()));
        tracing::debug!("Preparing {} in {} mode", project.directory().display(), mode);

        let result = match mode {
            ProvideMode::Interactive => {
                let mut input = UiInputSource::new(ui);
                workspace
                    .engine
                    .prepare_interactively(project, options, &mut input)?
            }
            ProvideMode::Check => workspace.engine.check(project, options)?,
            ProvideMode::Unattended => workspace
                .engine
                .prepare_without_interaction(project, options)?,
        };

        if mode == ProvideMode::Check {
            display::show_requirement_statuses(ui, result.statuses());
        }
        let masker = display::masker_for(project, &result);
        Ok(CommandResult::from_success(display::show_prepare_result(
            ui, &masker, &result,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use tempfile::TempDir;

    #[test]
    fn unknown_mode_is_an_error() {
        let temp = TempDir::new().unwrap();
        let cmd = PrepareCommand::new(
            temp.path(),
            PrepareArgs {
                mode: Some("bogus".to_string()),
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();

        let err = cmd.execute(&mut ui).err().unwrap();
        assert_eq!(err.to_string(), "invalid provide mode bogus");
    }

    #[test]
    fn mode_defaults_follow_interactivity() {
        let cmd = PrepareCommand::new(Path::new("."), PrepareArgs::default());
        let mut ui = MockUI::new();
        assert_eq!(cmd.mode(&ui).unwrap(), ProvideMode::Unattended);
        ui.set_interactive(true);
        assert_eq!(cmd.mode(&ui).unwrap(), ProvideMode::Interactive);
    }

    #[test]
    fn check_mode_reports_unknown_command() {
        let temp = TempDir::new().unwrap();
        let cmd = PrepareCommand::new(
            temp.path(),
            PrepareArgs {
                mode: Some("check".to_string()),
                command: Some("nope".to_string()),
                ..Default::default()
            },
        );
        let mut ui = MockUI::new();

        let result = cmd.execute(&mut ui).unwrap();

        assert_eq!(result.exit_code, 1);
        assert!(ui.has_error("Command name 'nope' is not in"));
    }
}

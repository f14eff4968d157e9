//! Remove-packages command implementation.

use std::path::{Path, PathBuf};

use crate::cli::args::RemovePackagesArgs;
use crate::error::Result;
use crate::ops;
use crate::providers::CondaManager;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The remove-packages command implementation.
pub struct RemovePackagesCommand {
    project_root: PathBuf,
    args: RemovePackagesArgs,
}

impl RemovePackagesCommand {
    pub fn new(project_root: &Path, args: RemovePackagesArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
        }
    }
}

impl Command for RemovePackagesCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::open(&self.project_root)?;
        let status = ops::remove_packages(
            &workspace.project,
            &CondaManager::new(),
            self.args.env_spec.as_deref(),
            &self.args.packages,
        );
        Ok(CommandResult::from_success(display::show_status(ui, &status)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUI;
    use tempfile::TempDir;

    #[test]
    fn missing_environment_has_nothing_to_remove() {
        let temp = TempDir::new().unwrap();
        let mut ui = MockUI::new();
        let args = RemovePackagesArgs {
            env_spec: None,
            packages: vec!["numpy".to_string()],
        };

        let result = RemovePackagesCommand::new(temp.path(), args)
            .execute(&mut ui)
            .unwrap();

        assert!(result.success);
        assert!(ui.has_success("there is nothing to remove"));
    }
}

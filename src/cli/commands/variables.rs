//! Variable commands.
//!
//! `prepkit set-variable` and `prepkit unset-variable` store and forget
//! values that later prepare runs pick up.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::cli::args::{SetVariableArgs, UnsetVariableArgs};
use crate::error::Result;
use crate::ops;
use crate::secrets::{KeyringSecretStore, SecretStore};
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult};
use super::{display, Workspace};

/// The set-variable command implementation.
///
/// Encrypted variables go to the OS keychain, everything else to the
/// project's local state.
pub struct SetVariableCommand {
    project_root: PathBuf,
    args: SetVariableArgs,
    secrets: Rc<dyn SecretStore>,
}

impl SetVariableCommand {
    pub fn new(project_root: &Path, args: SetVariableArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
            secrets: Rc::new(KeyringSecretStore::new()),
        }
    }

    /// Keep encrypted values in `secrets` instead of the keychain.
    pub fn with_secret_store(mut self, secrets: Rc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }
}

impl Command for SetVariableCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::with_secrets(&self.project_root, Rc::clone(&self.secrets))?;
        let status = ops::set_variables(
            &workspace.project,
            workspace.engine.secrets(),
            &self.args.assignments,
        );
        Ok(CommandResult::from_success(display::show_status(ui, &status)))
    }
}

/// The unset-variable command implementation.
pub struct UnsetVariableCommand {
    project_root: PathBuf,
    args: UnsetVariableArgs,
    secrets: Rc<dyn SecretStore>,
}

impl UnsetVariableCommand {
    pub fn new(project_root: &Path, args: UnsetVariableArgs) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            args,
            secrets: Rc::new(KeyringSecretStore::new()),
        }
    }

    /// Forget encrypted values in `secrets` instead of the keychain.
    pub fn with_secret_store(mut self, secrets: Rc<dyn SecretStore>) -> Self {
        self.secrets = secrets;
        self
    }
}

impl Command for UnsetVariableCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let workspace = Workspace::with_secrets(&self.project_root, Rc::clone(&self.secrets))?;
        let status = ops::unset_variables(
            &workspace.project,
            workspace.engine.secrets(),
            &self.args.names,
        );
        Ok(CommandResult::from_success(display::show_status(ui, &status)))
    }
}

//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. Every project command opens a
//! [`Workspace`]: the project loaded from disk plus an engine with the
//! built-in providers.

pub mod check;
pub mod clean;
pub mod completions;
pub mod dispatcher;
pub mod display;
pub mod packages;
pub mod prepare;
pub mod run;
pub mod unprepare;
pub mod variables;

use std::path::Path;
use std::rc::Rc;

use crate::environ;
use crate::error::Result;
use crate::prepare::{PrepareEngine, PrepareOptions};
use crate::project::{self, Project};
use crate::providers::{ProvideMode, ProviderRegistry};
use crate::secrets::{KeyringSecretStore, SecretStore};

pub use dispatcher::{Command, CommandDispatcher, CommandResult};

/// A loaded project and the engine that prepares it.
pub struct Workspace {
    pub engine: PrepareEngine,
    pub project: Project,
}

impl Workspace {
    /// Load the project in `root` with the default providers, keeping
    /// encrypted values in the OS keychain.
    pub fn open(root: &Path) -> Result<Self> {
        Self::with_secrets(root, Rc::new(KeyringSecretStore::new()))
    }

    /// Load the project in `root` with the default providers.
    pub fn with_secrets(root: &Path, secrets: Rc<dyn SecretStore>) -> Result<Self> {
        Ok(Self::with_parts(root, ProviderRegistry::with_conda()?, secrets))
    }

    pub fn with_parts(root: &Path, registry: ProviderRegistry, secrets: Rc<dyn SecretStore>) -> Self {
        let project = project::load(root, &registry);
        tracing::debug!(
            "Loaded project '{}' with {} requirements",
            project.name(),
            project.requirements().len()
        );
        let engine = PrepareEngine::new(Rc::new(registry), secrets);
        Self { engine, project }
    }

    /// Options shared by every command that runs the engine.
    ///
    /// Preparation starts from the process environment.
    pub fn options(&self, mode: ProvideMode, env_spec: Option<&str>) -> PrepareOptions {
        let options = PrepareOptions::new(mode).with_environ(environ::from_process());
        match env_spec {
            Some(name) => options.with_env_spec(name),
            None => options,
        }
    }
}

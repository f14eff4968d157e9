//! Project descriptions.
//!
//! A [`Project`] is what the engine prepares: its requirements, env specs,
//! commands, and any configuration problems found while loading it. A
//! project with problems can't be prepared.
//!
//! # Modules
//!
//! - [`command`] - Runnable commands and their launch info
//! - [`loader`] - Reading `project.yml`

pub mod command;
pub mod loader;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::requirements::{EnvSpec, Requirement};

pub use command::{CommandExecInfo, CommandLine, ProjectCommand};
pub use loader::{load, PROJECT_FILENAME};

/// A loaded project.
#[derive(Debug, Clone)]
pub struct Project {
    directory: PathBuf,
    name: String,
    description: Option<String>,
    requirements: Vec<Requirement>,
    env_specs: Vec<EnvSpec>,
    commands: BTreeMap<String, ProjectCommand>,
    problems: Vec<String>,
}

impl Project {
    /// An empty project in `directory` with a single empty `default` env spec.
    ///
    /// A relative `directory` is resolved against the current directory, so
    /// every path derived from the project is absolute.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let directory = std::path::absolute(&directory).unwrap_or(directory);
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        Self {
            directory,
            name,
            description: None,
            requirements: Vec::new(),
            env_specs: vec![EnvSpec::named("default")],
            commands: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    /// Add a requirement (variables, downloads, services).
    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Replace the env specs. The first one is the default.
    pub fn with_env_specs(mut self, env_specs: Vec<EnvSpec>) -> Self {
        if !env_specs.is_empty() {
            self.env_specs = env_specs;
        }
        self
    }

    /// Add a command.
    pub fn with_command(mut self, command: ProjectCommand) -> Self {
        self.commands.insert(command.name.clone(), command);
        self
    }

    /// Record a configuration problem.
    pub fn with_problem(mut self, problem: impl Into<String>) -> Self {
        self.problems.push(problem.into());
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the project file.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(PROJECT_FILENAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Configuration problems; empty when the project is usable.
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Non-env-spec requirements in declaration order.
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// A requirement by its variable.
    pub fn find_requirement(&self, env_var: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.env_var == env_var)
    }

    /// Env specs in declaration order.
    pub fn env_specs(&self) -> &[EnvSpec] {
        &self.env_specs
    }

    /// Name of the env spec used when nothing else selects one.
    pub fn default_env_spec_name(&self) -> &str {
        self.env_specs
            .first()
            .map(|s| s.name.as_str())
            .unwrap_or("default")
    }

    pub fn env_spec(&self, name: &str) -> Option<&EnvSpec> {
        self.env_specs.iter().find(|s| s.name == name)
    }

    /// All requirements for a run in `env_spec`: the env spec requirement
    /// first, then the rest in declaration order.
    pub fn requirements_for(&self, env_spec: &EnvSpec) -> Vec<Requirement> {
        let mut requirements = vec![Requirement::env_spec(env_spec.clone())];
        requirements.extend(self.requirements.iter().cloned());
        requirements
    }

    pub fn commands(&self) -> &BTreeMap<String, ProjectCommand> {
        &self.commands
    }

    pub fn command(&self, name: &str) -> Option<&ProjectCommand> {
        self.commands.get(name)
    }

    /// The `default` command, else the first command by name.
    pub fn default_command(&self) -> Option<&ProjectCommand> {
        self.commands
            .get("default")
            .or_else(|| self.commands.values().next())
    }
}

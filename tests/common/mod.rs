//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use prepkit::prepare::PrepareEngine;
use prepkit::project::{self, Project};
use prepkit::providers::{EnvironmentDeviations, EnvironmentManager, ProviderRegistry};
use prepkit::requirements::EnvSpec;
use prepkit::secrets::MemorySecretStore;
use tempfile::TempDir;

/// Creates an empty environment instead of calling a package manager.
pub struct CreatingManager;

impl EnvironmentManager for CreatingManager {
    fn find_environment_deviations(
        &self,
        _prefix: &Path,
        _spec: &EnvSpec,
    ) -> anyhow::Result<EnvironmentDeviations> {
        Ok(EnvironmentDeviations::default())
    }

    fn fix_environment_deviations(
        &self,
        prefix: &Path,
        _spec: &EnvSpec,
        _deviations: &EnvironmentDeviations,
    ) -> anyhow::Result<()> {
        fs::create_dir_all(prefix.join("bin"))?;
        Ok(())
    }

    fn remove_packages(&self, _prefix: &Path, _packages: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A project directory with the given `project.yml`.
pub fn project_dir(project_yml: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("project.yml"), project_yml).unwrap();
    temp
}

/// A project directory under the current directory, and its path relative
/// to it.
pub fn relative_project_dir(project_yml: &str) -> (TempDir, PathBuf) {
    let temp = tempfile::Builder::new()
        .prefix("relative-project-")
        .tempdir_in(".")
        .unwrap();
    fs::write(temp.path().join("project.yml"), project_yml).unwrap();
    let relative = PathBuf::from(temp.path().file_name().unwrap());
    (temp, relative)
}

/// Load the project in `dir` and build an engine around the same registry.
pub fn load(dir: &Path) -> (Project, PrepareEngine) {
    let registry = ProviderRegistry::new(Box::new(CreatingManager)).unwrap();
    let project = project::load(dir, &registry);
    let engine = PrepareEngine::new(Rc::new(registry), Rc::new(MemorySecretStore::new()));
    (project, engine)
}

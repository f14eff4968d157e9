//! Provider for the project's package environment.
//!
//! The environment lives at `<project>/envs/<name>` unless the session
//! chose to inherit the caller's already-active environment. Package
//! management itself is delegated to an [`EnvironmentManager`].

use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{ConfigChoice, ProvideContext, Provider, StatusContext, UnprovideContext};
use crate::environ::{self, Environ, ENV_NAME_VAR, ENV_PREFIX_VAR};
use crate::requirements::{
    package_name, EnvSpec, Requirement, RequirementKind, RequirementStatus, Status,
};

/// How an existing environment differs from its spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentDeviations {
    /// One-line description; empty when nothing deviates.
    pub summary: String,
    pub missing_packages: Vec<String>,
}

impl EnvironmentDeviations {
    /// Deviations listing missing packages.
    pub fn missing(packages: Vec<String>) -> Self {
        let summary = if packages.is_empty() {
            String::new()
        } else {
            format!(
                "Conda environment is missing packages: {}",
                packages.join(", ")
            )
        };
        Self {
            summary,
            missing_packages: packages,
        }
    }

    /// Whether the environment matches its spec.
    pub fn ok(&self) -> bool {
        self.missing_packages.is_empty()
    }
}

/// Package manager operations the engine needs.
pub trait EnvironmentManager {
    /// Compare the environment at `prefix` with `spec`.
    fn find_environment_deviations(
        &self,
        prefix: &Path,
        spec: &EnvSpec,
    ) -> anyhow::Result<EnvironmentDeviations>;

    /// Create the environment or install what it is missing.
    fn fix_environment_deviations(
        &self,
        prefix: &Path,
        spec: &EnvSpec,
        deviations: &EnvironmentDeviations,
    ) -> anyhow::Result<()>;

    /// Remove packages from the environment.
    fn remove_packages(&self, prefix: &Path, packages: &[String]) -> anyhow::Result<()>;
}

#[derive(Debug, Deserialize)]
struct InstalledPackage {
    name: String,
}

/// [`EnvironmentManager`] backed by the `conda` command line.
#[derive(Debug, Clone)]
pub struct CondaManager {
    executable: String,
}

impl CondaManager {
    /// Use `$CONDA_EXE` when set, else `conda` from `PATH`.
    pub fn new() -> Self {
        let executable = std::env::var("CONDA_EXE").unwrap_or_else(|_| "conda".to_string());
        Self { executable }
    }

    /// Use a specific executable.
    pub fn with_executable(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn run(&self, args: &[String]) -> anyhow::Result<String> {
        tracing::debug!("Running {} {}", self.executable, args.join(" "));
        let output = Command::new(&self.executable)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}", self.executable))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} {} failed: {}",
                self.executable,
                args.first().map(String::as_str).unwrap_or(""),
                stderr.trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn channel_args(spec: &EnvSpec) -> Vec<String> {
        spec.channels
            .iter()
            .flat_map(|c| ["--channel".to_string(), c.clone()])
            .collect()
    }
}

impl Default for CondaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentManager for CondaManager {
    fn find_environment_deviations(
        &self,
        prefix: &Path,
        spec: &EnvSpec,
    ) -> anyhow::Result<EnvironmentDeviations> {
        if !prefix.join("conda-meta").is_dir() {
            return Ok(EnvironmentDeviations::missing(spec.package_names()));
        }

        let stdout = self.run(&[
            "list".to_string(),
            "--prefix".to_string(),
            prefix.to_string_lossy().to_string(),
            "--json".to_string(),
        ])?;
        let installed: Vec<InstalledPackage> =
            serde_json::from_str(&stdout).context("Unexpected output from conda list")?;

        let missing = spec
            .package_names()
            .into_iter()
            .filter(|name| !installed.iter().any(|p| &p.name == name))
            .collect();
        Ok(EnvironmentDeviations::missing(missing))
    }

    fn fix_environment_deviations(
        &self,
        prefix: &Path,
        spec: &EnvSpec,
        deviations: &EnvironmentDeviations,
    ) -> anyhow::Result<()> {
        let exists = prefix.join("conda-meta").is_dir();
        if exists && deviations.ok() {
            return Ok(());
        }
        let packages: Vec<String> = if exists {
            spec.packages
                .iter()
                .filter(|p| {
                    deviations
                        .missing_packages
                        .iter()
                        .any(|m| m == package_name(p))
                })
                .cloned()
                .collect()
        } else {
            spec.packages.clone()
        };

        let action = if exists { "install" } else { "create" };
        let mut args: Vec<String> = [action, "--yes", "--quiet", "--prefix"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(prefix.to_string_lossy().to_string());
        args.extend(Self::channel_args(spec));
        args.extend(packages);
        self.run(&args)?;
        Ok(())
    }

    fn remove_packages(&self, prefix: &Path, packages: &[String]) -> anyhow::Result<()> {
        if packages.is_empty() || !prefix.join("conda-meta").is_dir() {
            return Ok(());
        }
        let mut args = vec!["remove".to_string()];
        args.extend(["--yes", "--quiet", "--prefix"].map(String::from));
        args.push(prefix.to_string_lossy().to_string());
        args.extend(packages.iter().cloned());
        self.run(&args)?;
        Ok(())
    }
}

/// Readies the environment for the project's env spec.
pub struct EnvSpecProvider {
    manager: Box<dyn EnvironmentManager>,
}

/// Where the environment for a check or provide lives.
struct Target {
    prefix: PathBuf,
    inherited: bool,
}

impl EnvSpecProvider {
    pub fn new(manager: Box<dyn EnvironmentManager>) -> Self {
        Self { manager }
    }

    fn spec<'r>(requirement: &'r Requirement) -> Option<&'r EnvSpec> {
        match &requirement.kind {
            RequirementKind::EnvSpec(spec) => Some(spec),
            _ => None,
        }
    }

    fn target(spec: &EnvSpec, ctx: &StatusContext<'_>) -> Target {
        if let Some(prefix) = &ctx.overrides.inherited_env {
            return Target {
                prefix: PathBuf::from(prefix),
                inherited: true,
            };
        }
        if ctx.overrides.option_for(ENV_PREFIX_VAR) == Some("inherited") {
            if let Some(prefix) = ctx.environ.get(ENV_PREFIX_VAR).filter(|p| !p.is_empty()) {
                return Target {
                    prefix: PathBuf::from(prefix),
                    inherited: true,
                };
            }
        }
        Target {
            prefix: spec.path(ctx.project_dir),
            inherited: false,
        }
    }

    fn activate(environ: &mut Environ, prefix: &Path, name: &str) {
        environ.insert(
            ENV_PREFIX_VAR.to_string(),
            prefix.to_string_lossy().to_string(),
        );
        environ.insert(ENV_NAME_VAR.to_string(), name.to_string());
        environ::prepend_path(environ, &prefix.join("bin"));
    }
}

impl Provider for EnvSpecProvider {
    fn kind(&self) -> &str {
        "env_spec"
    }

    fn check_status(
        &self,
        requirement: &Requirement,
        ctx: &StatusContext<'_>,
    ) -> RequirementStatus {
        let Some(spec) = Self::spec(requirement) else {
            return RequirementStatus::unsatisfied(requirement, "Not an env spec requirement.");
        };
        let target = Self::target(spec, ctx);
        let analysis = json!({
            "prefix": target.prefix.to_string_lossy(),
            "inherited": target.inherited,
            "can_inherit": ctx.environ.get(ENV_PREFIX_VAR).is_some_and(|p| !p.is_empty()),
        });

        if !target.prefix.exists() {
            let description = if target.inherited {
                format!("Inherited environment {} doesn't exist.", target.prefix.display())
            } else {
                format!("Conda environment {} doesn't exist yet.", target.prefix.display())
            };
            return RequirementStatus::unsatisfied(requirement, description)
                .with_analysis(analysis);
        }

        let status = match self
            .manager
            .find_environment_deviations(&target.prefix, spec)
        {
            Ok(deviations) if deviations.ok() => RequirementStatus::satisfied(
                requirement,
                format!("Using Conda environment {}.", target.prefix.display()),
            ),
            Ok(deviations) => RequirementStatus::unsatisfied(requirement, deviations.summary),
            Err(e) => RequirementStatus::unsatisfied(
                requirement,
                format!("Could not inspect Conda environment {}.", target.prefix.display()),
            )
            .with_errors(vec![e.to_string()]),
        };
        status.with_analysis(analysis)
    }

    fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice> {
        let can_inherit = status.analysis["can_inherit"].as_bool().unwrap_or(false);
        let inherited = status.analysis["inherited"].as_bool().unwrap_or(false);

        let mut choices = vec![ConfigChoice::new(
            "project",
            "Use a dedicated environment inside the project directory",
        )
        .default_selected(!inherited)];
        if can_inherit {
            choices.push(
                ConfigChoice::new("inherited", "Use the currently active environment")
                    .default_selected(inherited),
            );
        }
        choices
    }

    fn provide(
        &self,
        ctx: &mut ProvideContext<'_>,
        status: &RequirementStatus,
    ) -> RequirementStatus {
        let requirement = &status.requirement;
        let Some(spec) = Self::spec(requirement) else {
            return status.clone();
        };
        let target = Self::target(spec, &ctx.status_context());
        let mut errors = Vec::new();
        let mut logs = Vec::new();

        // Check mode reports what's missing but never builds the environment.
        if !target.inherited && ctx.mode.provides() {
            let deviations = if target.prefix.exists() {
                self.manager
                    .find_environment_deviations(&target.prefix, spec)
            } else {
                Ok(EnvironmentDeviations::missing(spec.package_names()))
            };
            let fixed = deviations.and_then(|deviations| {
                if target.prefix.exists() && deviations.ok() {
                    return Ok(());
                }
                tracing::info!("Preparing environment {}", target.prefix.display());
                logs.push(format!(
                    "Preparing Conda environment {}.",
                    target.prefix.display()
                ));
                self.manager
                    .fix_environment_deviations(&target.prefix, spec, &deviations)
            });
            if let Err(e) = fixed {
                tracing::warn!("Failed to prepare {}: {}", target.prefix.display(), e);
                errors.push(e.to_string());
            }
        }

        // An inherited environment that is already active needs no changes.
        let prefix_str = target.prefix.to_string_lossy();
        let already_active =
            ctx.environ.get(ENV_PREFIX_VAR).map(String::as_str) == Some(&*prefix_str);
        if target.prefix.exists() && !(target.inherited && already_active) {
            let name = if target.inherited {
                target.prefix.to_string_lossy().to_string()
            } else {
                spec.name.clone()
            };
            Self::activate(ctx.environ, &target.prefix, &name);
        }

        self.check_status(requirement, &ctx.status_context())
            .with_errors(errors)
            .with_logs(logs)
    }

    fn unprovide(&self, ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status {
        let prefix = match status.analysis["prefix"].as_str() {
            Some(prefix) => PathBuf::from(prefix),
            None => match Self::spec(&status.requirement) {
                Some(spec) => spec.path(ctx.project_dir),
                None => return Status::success("Nothing to clean up."),
            },
        };

        if !prefix.starts_with(ctx.project_dir) {
            let message = format!(
                "Current environment is not in {}, no need to delete it.",
                ctx.project_dir.display()
            );
            return Status::success(message.clone()).with_logs(vec![message]);
        }

        if !prefix.exists() {
            let message = format!(
                "No need to remove {} which doesn't exist.",
                prefix.display()
            );
            return Status::success(message.clone()).with_logs(vec![message]);
        }

        match fs::remove_dir_all(&prefix) {
            Ok(()) => {
                let message = format!("Deleted environment files in {}.", prefix.display());
                Status::success(message.clone()).with_logs(vec![message])
            }
            Err(e) => {
                let message = format!("Failed to remove {}: {}.", prefix.display(), e);
                Status::failure(message.clone()).with_errors(vec![message])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProvideMode;
    use crate::requirements::UserConfigOverrides;
    use crate::secrets::MemorySecretStore;
    use crate::state::LocalStateFile;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Creates the prefix directory and records calls.
    #[derive(Default)]
    struct FakeManager {
        missing: Vec<String>,
        fail_fix: bool,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl EnvironmentManager for FakeManager {
        fn find_environment_deviations(
            &self,
            prefix: &Path,
            _spec: &EnvSpec,
        ) -> anyhow::Result<EnvironmentDeviations> {
            if prefix.join("ready").exists() {
                Ok(EnvironmentDeviations::default())
            } else {
                Ok(EnvironmentDeviations::missing(self.missing.clone()))
            }
        }

        fn fix_environment_deviations(
            &self,
            prefix: &Path,
            _spec: &EnvSpec,
            _deviations: &EnvironmentDeviations,
        ) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("fix".to_string());
            if self.fail_fix {
                bail!("solver exploded");
            }
            fs::create_dir_all(prefix.join("bin"))?;
            fs::write(prefix.join("ready"), "")?;
            Ok(())
        }

        fn remove_packages(&self, _prefix: &Path, packages: &[String]) -> anyhow::Result<()> {
            self.calls
                .borrow_mut()
                .push(format!("remove {}", packages.join(",")));
            Ok(())
        }
    }

    fn requirement() -> Requirement {
        let mut spec = EnvSpec::named("default");
        spec.packages = vec!["python".to_string()];
        Requirement::env_spec(spec)
    }

    fn provide_with(
        manager: FakeManager,
        dir: &Path,
        environ: &mut Environ,
        overrides: &UserConfigOverrides,
    ) -> RequirementStatus {
        provide_in_mode(manager, dir, environ, overrides, ProvideMode::Unattended)
    }

    fn provide_in_mode(
        manager: FakeManager,
        dir: &Path,
        environ: &mut Environ,
        overrides: &UserConfigOverrides,
        mode: ProvideMode,
    ) -> RequirementStatus {
        let provider = EnvSpecProvider::new(Box::new(manager));
        let mut local_state = LocalStateFile::new(dir);
        let secrets = MemorySecretStore::new();
        let status = provider.check_status(
            &requirement(),
            &StatusContext {
                environ: &*environ,
                local_state: &local_state,
                secrets: &secrets,
                overrides,
                project_dir: dir,
            },
        );
        let mut ctx = ProvideContext {
            environ,
            local_state: &mut local_state,
            secrets: &secrets,
            overrides,
            project_dir: dir,
            mode,
        };
        provider.provide(&mut ctx, &status)
    }

    #[test]
    fn missing_prefix_is_unsatisfied() {
        let temp = TempDir::new().unwrap();
        let provider = EnvSpecProvider::new(Box::new(FakeManager::default()));
        let local_state = LocalStateFile::new(temp.path());
        let status = provider.check_status(
            &requirement(),
            &StatusContext {
                environ: &Environ::new(),
                local_state: &local_state,
                secrets: &MemorySecretStore::new(),
                overrides: &UserConfigOverrides::new(),
                project_dir: temp.path(),
            },
        );
        assert!(!status.is_satisfied());
        assert!(status.status_description.contains("doesn't exist yet"));
    }

    #[test]
    fn provide_creates_and_activates() {
        let temp = TempDir::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let manager = FakeManager {
            calls: Rc::clone(&calls),
            ..Default::default()
        };
        let mut environ = Environ::new();
        environ.insert("PATH".to_string(), "/usr/bin".to_string());

        let status = provide_with(manager, temp.path(), &mut environ, &UserConfigOverrides::new());

        assert!(status.is_satisfied(), "{:?}", status.errors);
        let prefix = temp.path().join("envs").join("default");
        assert_eq!(environ[ENV_PREFIX_VAR], prefix.to_string_lossy());
        assert_eq!(environ[ENV_NAME_VAR], "default");
        assert!(environ["PATH"].starts_with(&*prefix.join("bin").to_string_lossy()));
        assert_eq!(*calls.borrow(), vec!["fix".to_string()]);
    }

    #[test]
    fn check_mode_never_builds_environment() {
        let temp = TempDir::new().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let manager = FakeManager {
            calls: Rc::clone(&calls),
            ..Default::default()
        };
        let mut environ = Environ::new();

        let status = provide_in_mode(
            manager,
            temp.path(),
            &mut environ,
            &UserConfigOverrides::new(),
            ProvideMode::Check,
        );

        assert!(!status.is_satisfied());
        assert!(calls.borrow().is_empty());
        assert!(!temp.path().join("envs").exists());
        assert!(!environ.contains_key(ENV_PREFIX_VAR));
    }

    #[test]
    fn provide_twice_is_harmless() {
        let temp = TempDir::new().unwrap();
        let mut environ = Environ::new();
        environ.insert("PATH".to_string(), "/usr/bin".to_string());
        provide_with(FakeManager::default(), temp.path(), &mut environ, &UserConfigOverrides::new());
        let path_after_first = environ["PATH"].clone();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let manager = FakeManager {
            calls: Rc::clone(&calls),
            ..Default::default()
        };
        let status = provide_with(manager, temp.path(), &mut environ, &UserConfigOverrides::new());

        assert!(status.is_satisfied());
        assert_eq!(environ["PATH"], path_after_first);
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn fix_failure_is_captured() {
        let temp = TempDir::new().unwrap();
        let manager = FakeManager {
            fail_fix: true,
            ..Default::default()
        };
        let mut environ = Environ::new();
        let status = provide_with(manager, temp.path(), &mut environ, &UserConfigOverrides::new());

        assert!(!status.is_satisfied());
        assert!(status.errors.iter().any(|e| e.contains("solver exploded")));
        assert!(!environ.contains_key(ENV_PREFIX_VAR));
    }

    #[test]
    fn inherited_environment_is_not_modified() {
        let project = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("ready"), "").unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let manager = FakeManager {
            calls: Rc::clone(&calls),
            ..Default::default()
        };
        let overrides =
            UserConfigOverrides::with_inherited_env(outside.path().to_string_lossy().to_string());
        let mut environ = Environ::new();

        let status = provide_with(manager, project.path(), &mut environ, &overrides);

        assert!(status.is_satisfied());
        assert!(calls.borrow().is_empty());
        assert_eq!(environ[ENV_PREFIX_VAR], outside.path().to_string_lossy());
        assert_eq!(status.analysis["inherited"], true);
    }

    #[test]
    fn choices_offer_inherit_when_active() {
        let temp = TempDir::new().unwrap();
        let provider = EnvSpecProvider::new(Box::new(FakeManager::default()));
        let mut environ = Environ::new();
        environ.insert(ENV_PREFIX_VAR.to_string(), "/opt/conda".to_string());
        let local_state = LocalStateFile::new(temp.path());
        let status = provider.check_status(
            &requirement(),
            &StatusContext {
                environ: &environ,
                local_state: &local_state,
                secrets: &MemorySecretStore::new(),
                overrides: &UserConfigOverrides::new(),
                project_dir: temp.path(),
            },
        );
        let ids: Vec<String> = provider
            .configuration_choices(&status)
            .into_iter()
            .map(|c| c.option_id)
            .collect();
        assert_eq!(ids, vec!["project".to_string(), "inherited".to_string()]);
    }

    #[test]
    fn unprovide_outside_project_keeps_environment() {
        let project = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let status = RequirementStatus::satisfied(&requirement(), "ok").with_analysis(json!({
            "prefix": outside.path().to_string_lossy(),
            "inherited": true,
        }));
        let mut local_state = LocalStateFile::new(project.path());
        let provider = EnvSpecProvider::new(Box::new(FakeManager::default()));
        let mut ctx = UnprovideContext {
            environ: &Environ::new(),
            local_state: &mut local_state,
            secrets: &MemorySecretStore::new(),
            project_dir: project.path(),
        };

        let outcome = provider.unprovide(&mut ctx, &status);

        assert!(outcome.is_success());
        assert_eq!(
            outcome.logs,
            vec![format!(
                "Current environment is not in {}, no need to delete it.",
                project.path().display()
            )]
        );
        assert!(outside.path().exists());
    }

    #[test]
    fn unprovide_deletes_project_environment() {
        let project = TempDir::new().unwrap();
        let prefix = project.path().join("envs").join("default");
        fs::create_dir_all(prefix.join("bin")).unwrap();
        let status = RequirementStatus::satisfied(&requirement(), "ok")
            .with_analysis(json!({ "prefix": prefix.to_string_lossy() }));
        let mut local_state = LocalStateFile::new(project.path());
        let provider = EnvSpecProvider::new(Box::new(FakeManager::default()));
        let mut ctx = UnprovideContext {
            environ: &Environ::new(),
            local_state: &mut local_state,
            secrets: &MemorySecretStore::new(),
            project_dir: project.path(),
        };

        let outcome = provider.unprovide(&mut ctx, &status);

        assert!(outcome.is_success());
        assert!(!prefix.exists());
    }

    #[test]
    fn deviation_summary_lists_packages() {
        let deviations = EnvironmentDeviations::missing(vec!["numpy".into(), "pandas".into()]);
        assert!(!deviations.ok());
        assert_eq!(
            deviations.summary,
            "Conda environment is missing packages: numpy, pandas"
        );
    }
}

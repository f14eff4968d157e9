//! Entry points for preparing and unpreparing a project.

use std::rc::Rc;

use super::interactive::{self, InputSource, InteractiveSession};
use super::result::PrepareResult;
use super::stage::{after_stage_success, PrepareStage, StageContext};
use crate::environ::{self, Environ, PROJECT_DIR_VAR};
use crate::error::{PrepkitError, Result};
use crate::project::{Project, ProjectCommand};
use crate::providers::{ProvideMode, ProviderRegistry, UnprovideContext};
use crate::requirements::{EnvSpec, RequirementStatus, SharedOverrides, Status, UserConfigOverrides};
use crate::secrets::SecretStore;
use crate::state::LocalStateFile;

/// Last problem reported when a project can't be loaded.
pub const UNABLE_TO_LOAD: &str = "Unable to load the project.";

/// How to run a prepare.
#[derive(Clone)]
pub struct PrepareOptions {
    pub mode: ProvideMode,
    /// Environment to start from; the process environment when `None`.
    pub environ: Option<Environ>,
    /// Only provide requirements whose variable or kind name is listed.
    pub provide_whitelist: Option<Vec<String>>,
    /// Command to prepare for, looked up by name.
    pub command_name: Option<String>,
    /// Command to prepare for, given directly.
    pub command: Option<ProjectCommand>,
    /// Arguments appended to the command line.
    pub extra_command_args: Vec<String>,
    pub env_spec_name: Option<String>,
    /// Start over after a failed stage instead of finishing.
    pub keep_going_until_success: bool,
    /// Choices to start from; shared with the caller.
    pub overrides: Option<SharedOverrides>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            mode: ProvideMode::Unattended,
            environ: None,
            provide_whitelist: None,
            command_name: None,
            command: None,
            extra_command_args: Vec::new(),
            env_spec_name: None,
            keep_going_until_success: false,
            overrides: None,
        }
    }
}

impl PrepareOptions {
    pub fn new(mode: ProvideMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_environ(mut self, environ: Environ) -> Self {
        self.environ = Some(environ);
        self
    }

    pub fn with_whitelist(mut self, names: Vec<String>) -> Self {
        self.provide_whitelist = Some(names);
        self
    }

    pub fn with_command_name(mut self, name: &str) -> Self {
        self.command_name = Some(name.to_string());
        self
    }

    pub fn with_command(mut self, command: ProjectCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_command_args = args;
        self
    }

    pub fn with_env_spec(mut self, name: &str) -> Self {
        self.env_spec_name = Some(name.to_string());
        self
    }

    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going_until_success = keep_going;
        self
    }

    pub fn with_overrides(mut self, overrides: SharedOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Prepares projects with a fixed set of providers and a secret store.
pub struct PrepareEngine {
    registry: Rc<ProviderRegistry>,
    secrets: Rc<dyn SecretStore>,
}

impl PrepareEngine {
    pub fn new(registry: Rc<ProviderRegistry>, secrets: Rc<dyn SecretStore>) -> Self {
        Self { registry, secrets }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn secrets(&self) -> &dyn SecretStore {
        &*self.secrets
    }

    /// The first stage of a prepare run.
    ///
    /// Never fails: a project with problems, an unknown command, or an
    /// unknown env spec gives a stage that finishes with those errors.
    pub fn prepare_in_stages(&self, project: &Project, options: PrepareOptions) -> PrepareStage {
        let mut environ = options.environ.unwrap_or_else(environ::from_process);
        environ.insert(
            PROJECT_DIR_VAR.to_string(),
            project.directory().to_string_lossy().to_string(),
        );
        let overrides = options
            .overrides
            .unwrap_or_else(|| UserConfigOverrides::new().shared());
        let file = project.file_path().display().to_string();

        let mut refusal = Vec::new();
        if !project.problems().is_empty() {
            refusal.extend(project.problems().iter().cloned());
            refusal.push(UNABLE_TO_LOAD.to_string());
        }

        let command = match (options.command, &options.command_name) {
            (Some(command), _) => Some(command),
            (None, Some(name)) => {
                let found = project.command(name).cloned();
                if found.is_none() && refusal.is_empty() {
                    refusal.push(format!("Command name '{}' is not in {}.", name, file));
                }
                found
            }
            (None, None) => project.default_command().cloned(),
        };

        let requested_env_spec = options.env_spec_name.clone();
        let env_spec_name = requested_env_spec
            .or_else(|| overrides.borrow().env_spec_name.clone())
            .or_else(|| command.as_ref().and_then(|c| c.env_spec.clone()))
            .unwrap_or_else(|| project.default_env_spec_name().to_string());
        let env_spec = match project.env_spec(&env_spec_name) {
            Some(spec) => spec.clone(),
            None => {
                if refusal.is_empty() {
                    refusal.push(format!(
                        "Environment spec name '{}' is not in {}.",
                        env_spec_name, file
                    ));
                }
                EnvSpec::named(&env_spec_name)
            }
        };
        overrides.borrow_mut().env_spec_name = Some(env_spec_name);

        tracing::debug!(
            "Preparing {} in {} mode with env spec '{}'",
            project.name(),
            options.mode,
            env_spec.name
        );

        let context = Rc::new(StageContext {
            project_dir: project.directory().to_path_buf(),
            env_spec,
            requirements: project.requirements().to_vec(),
            registry: Rc::clone(&self.registry),
            secrets: Rc::clone(&self.secrets),
            mode: options.mode,
            provide_whitelist: options.provide_whitelist,
            keep_going: options.keep_going_until_success,
            environ,
        });

        if !refusal.is_empty() {
            return PrepareStage::refused(context, overrides, refusal);
        }

        let stage = PrepareStage::new(context, overrides);
        match command {
            Some(command) => {
                let project_dir = project.directory().to_path_buf();
                let extra_args = options.extra_command_args;
                after_stage_success(stage, move |result: &mut PrepareResult| {
                    let info = command.exec_info(&project_dir, result.environ(), &extra_args);
                    match info {
                        Ok(info) => {
                            if let PrepareResult::Success(success) = result {
                                success.command_exec_info = Some(info);
                            }
                        }
                        Err(e) => result.fail_with(e),
                    }
                })
            }
            None => stage,
        }
    }

    /// Prepare in a single pass with no user input.
    ///
    /// Never retries; `keep_going_until_success` is ignored.
    pub fn prepare_without_interaction(
        &self,
        project: &Project,
        options: PrepareOptions,
    ) -> Result<PrepareResult> {
        let options = options.keep_going(false);
        run_stages(self.prepare_in_stages(project, options))
    }

    /// Check what's missing without changing anything.
    pub fn check(&self, project: &Project, options: PrepareOptions) -> Result<PrepareResult> {
        let options = PrepareOptions {
            mode: ProvideMode::Check,
            ..options
        };
        self.prepare_without_interaction(project, options)
    }

    /// Start an interactive session.
    pub fn interactive_session(
        &self,
        project: &Project,
        options: PrepareOptions,
    ) -> Result<InteractiveSession> {
        let options = PrepareOptions {
            mode: ProvideMode::Interactive,
            ..options
        };
        InteractiveSession::new(self.prepare_in_stages(project, options))
    }

    /// Prepare, asking `input` whenever a stage needs choices.
    pub fn prepare_interactively(
        &self,
        project: &Project,
        options: PrepareOptions,
        input: &mut dyn InputSource,
    ) -> Result<PrepareResult> {
        let options = PrepareOptions {
            mode: ProvideMode::Interactive,
            ..options
        };
        interactive::prepare_interactively(self.prepare_in_stages(project, options), input)
    }

    /// Undo what a prepare run set up.
    ///
    /// Only satisfied requirements are cleaned up, other requirements first
    /// and the env spec last. With a whitelist, only requirements whose
    /// variable or kind name is listed are touched.
    pub fn unprepare(
        &self,
        project: &Project,
        result: &PrepareResult,
        whitelist: Option<&[String]>,
    ) -> Status {
        if !project.problems().is_empty() {
            return Status::failure(UNABLE_TO_LOAD).with_errors(project.problems().to_vec());
        }

        let listed = |status: &RequirementStatus| {
            whitelist.map_or(true, |names| {
                names
                    .iter()
                    .any(|n| n == status.env_var() || n == status.kind_name())
            })
        };
        let statuses = result.statuses();
        let targets: Vec<&RequirementStatus> = statuses
            .iter()
            .filter(|s| !s.requirement.is_env_spec())
            .chain(statuses.iter().filter(|s| s.requirement.is_env_spec()))
            .filter(|s| s.satisfied && listed(s))
            .collect();
        if targets.is_empty() {
            return Status::success("Nothing to clean up.");
        }

        let mut local_state = match LocalStateFile::load_for_directory(project.directory()) {
            Ok(state) => state,
            Err(e) => return Status::failure(e.to_string()).with_errors(vec![e.to_string()]),
        };
        let loaded = local_state.clone();

        let mut logs = Vec::new();
        let mut failures = Vec::new();
        for status in targets {
            let outcome = match self.registry.provider_for(&status.requirement) {
                Some(provider) => {
                    let mut ctx = UnprovideContext {
                        environ: result.environ(),
                        local_state: &mut local_state,
                        secrets: &*self.secrets,
                        project_dir: project.directory(),
                    };
                    provider.unprovide(&mut ctx, status)
                }
                None => Status::failure(format!(
                    "No provider registered for requirement kind '{}'.",
                    status.kind_name()
                )),
            };
            tracing::debug!("Unprovided {}: {}", status.env_var(), outcome.description);
            logs.extend(outcome.logs.iter().cloned());
            if !outcome.success {
                tracing::warn!("Failed to clean up {}: {}", status.env_var(), outcome.description);
                failures.push((status.env_var().to_string(), outcome));
            }
        }

        if local_state != loaded {
            if let Err(e) = local_state.save() {
                tracing::warn!("Failed to save {}: {}", local_state.path().display(), e);
            }
        }

        match failures.len() {
            0 => Status::success("Success.").with_logs(logs),
            1 => {
                let (_, outcome) = failures.remove(0);
                let mut errors = outcome.errors;
                if errors.is_empty() {
                    errors.push(outcome.description.clone());
                }
                Status::failure(outcome.description)
                    .with_logs(logs)
                    .with_errors(errors)
            }
            _ => {
                let names: Vec<&str> = failures.iter().map(|(name, _)| name.as_str()).collect();
                let description = format!("Failed to clean up {}.", names.join(", "));
                let errors = failures
                    .iter()
                    .map(|(_, outcome)| outcome.description.clone())
                    .collect();
                Status::failure(description).with_logs(logs).with_errors(errors)
            }
        }
    }
}

/// Execute stages until one finishes the run.
fn run_stages(mut stage: PrepareStage) -> Result<PrepareResult> {
    loop {
        match stage.execute()? {
            Some(next) => stage = next,
            None => {
                return stage
                    .result()?
                    .cloned()
                    .ok_or_else(|| PrepkitError::InvalidState {
                        message: "the last stage finished without a result".to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::{ENV_NAME_VAR, ENV_PREFIX_VAR};
    use crate::prepare::test_support::{registry_with_probe, FakeManager};
    use crate::providers::{ConfigChoice, ProvideContext, Provider, StatusContext};
    use crate::requirements::Requirement;
    use crate::secrets::MemorySecretStore;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn engine_with(registry: ProviderRegistry) -> PrepareEngine {
        PrepareEngine::new(Rc::new(registry), Rc::new(MemorySecretStore::new()))
    }

    fn engine() -> PrepareEngine {
        engine_with(ProviderRegistry::new(Box::new(FakeManager::default())).unwrap())
    }

    fn unattended() -> PrepareOptions {
        PrepareOptions::new(ProvideMode::Unattended).with_environ(Environ::new())
    }

    /// Always satisfied; cleaning up always fails.
    struct StickyProvider;

    impl Provider for StickyProvider {
        fn kind(&self) -> &str {
            "sticky"
        }

        fn check_status(
            &self,
            requirement: &Requirement,
            _ctx: &StatusContext<'_>,
        ) -> RequirementStatus {
            RequirementStatus::satisfied(requirement, "stuck")
        }

        fn configuration_choices(&self, _status: &RequirementStatus) -> Vec<ConfigChoice> {
            Vec::new()
        }

        fn provide(
            &self,
            _ctx: &mut ProvideContext<'_>,
            status: &RequirementStatus,
        ) -> RequirementStatus {
            status.clone()
        }

        fn unprovide(&self, _ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status {
            let message = format!("Could not remove {}.", status.env_var());
            Status::failure(message.clone()).with_errors(vec![message])
        }
    }

    #[test]
    fn empty_project_with_active_environment_only_adds_project_dir() {
        let project_dir = TempDir::new().unwrap();
        let active = TempDir::new().unwrap();
        let prefix = active.path().to_string_lossy().to_string();
        let mut caller = Environ::new();
        caller.insert(ENV_PREFIX_VAR.to_string(), prefix.clone());
        caller.insert("FOO".to_string(), "bar".to_string());
        let project = Project::new(project_dir.path());
        let options = PrepareOptions::new(ProvideMode::Unattended)
            .with_environ(caller.clone())
            .with_overrides(UserConfigOverrides::with_inherited_env(prefix).shared());

        let result = engine()
            .prepare_without_interaction(&project, options)
            .unwrap();

        assert!(!result.failed(), "{:?}", result.errors());
        let mut expected = caller;
        expected.insert(
            PROJECT_DIR_VAR.to_string(),
            project_dir.path().to_string_lossy().to_string(),
        );
        assert_eq!(result.environ(), &expected);
    }

    #[test]
    fn project_environment_is_created_and_activated() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path());

        let result = engine()
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        assert!(!result.failed(), "{:?}", result.errors());
        let prefix = project_dir.path().join("envs").join("default");
        assert!(prefix.join("bin").exists());
        assert_eq!(result.environ()[ENV_PREFIX_VAR], prefix.to_string_lossy());
        assert_eq!(result.environ()[ENV_NAME_VAR], "default");
        assert!(result.environ()["PATH"].starts_with(&*prefix.join("bin").to_string_lossy()));
        assert_eq!(result.env_spec_name(), "default");
    }

    #[test]
    fn failed_environment_only_checks_the_rest() {
        let project_dir = TempDir::new().unwrap();
        let (registry, calls) = registry_with_probe(true, true);
        let project =
            Project::new(project_dir.path()).with_requirement(Requirement::custom("probe", "PROBE"));

        let result = engine_with(registry)
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        assert!(result.failed());
        assert_eq!(*calls.borrow(), vec!["check PROBE".to_string()]);
        assert_eq!(result.statuses().len(), 2);
        assert_eq!(
            result.errors(),
            &[
                "package solver failed".to_string(),
                "missing requirement to run this project: A Conda environment for env spec 'default'."
                    .to_string(),
                "missing requirement to run this project: PROBE must be provided by the probe provider."
                    .to_string(),
            ]
        );
    }

    #[test]
    fn check_mode_changes_nothing() {
        let project_dir = TempDir::new().unwrap();
        let (registry, calls) = registry_with_probe(false, true);
        let project =
            Project::new(project_dir.path()).with_requirement(Requirement::custom("probe", "PROBE"));

        let result = engine_with(registry)
            .check(&project, unattended())
            .unwrap();

        assert!(result.failed());
        assert!(!project_dir.path().join("envs").exists());
        assert!(calls.borrow().iter().all(|c| c.starts_with("check")));
    }

    #[test]
    fn project_problems_refuse_to_prepare() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path()).with_problem("bad project");

        let result = engine()
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        assert!(result.failed());
        assert!(result.statuses().is_empty());
        assert_eq!(
            result.errors(),
            &["bad project".to_string(), UNABLE_TO_LOAD.to_string()]
        );
        assert!(!project_dir.path().join("envs").exists());
    }

    #[test]
    fn unknown_command_name_fails() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path());

        let result = engine()
            .prepare_without_interaction(&project, unattended().with_command_name("nope"))
            .unwrap();

        assert_eq!(
            result.errors(),
            &[format!(
                "Command name 'nope' is not in {}.",
                project.file_path().display()
            )]
        );
    }

    #[test]
    fn unknown_env_spec_fails() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path());

        let result = engine()
            .prepare_without_interaction(&project, unattended().with_env_spec("py2"))
            .unwrap();

        assert_eq!(
            result.errors(),
            &[format!(
                "Environment spec name 'py2' is not in {}.",
                project.file_path().display()
            )]
        );
    }

    #[test]
    fn command_env_spec_selects_environment() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path())
            .with_env_specs(vec![EnvSpec::named("default"), EnvSpec::named("py2")])
            .with_command(ProjectCommand::unix("legacy", "python old.py").with_env_spec("py2"));

        let result = engine()
            .prepare_without_interaction(&project, unattended().with_command_name("legacy"))
            .unwrap();

        assert!(!result.failed(), "{:?}", result.errors());
        assert_eq!(result.env_spec_name(), "py2");
        assert!(project_dir.path().join("envs").join("py2").exists());
    }

    #[test]
    fn success_carries_command_exec_info() {
        let project_dir = TempDir::new().unwrap();
        let project = Project::new(project_dir.path())
            .with_command(ProjectCommand::unix("default", "echo ${PREFIX}"));

        let result = engine()
            .prepare_without_interaction(&project, unattended().with_extra_args(vec!["x".into()]))
            .unwrap();

        let info = result.command_exec_info().unwrap();
        let prefix = project_dir.path().join("envs").join("default");
        assert_eq!(info.args, vec![format!("echo {} x", prefix.display())]);
        assert!(info.shell);
        assert_eq!(info.env, *result.environ());
    }

    #[test]
    fn whitelist_limits_what_is_provided() {
        let project_dir = TempDir::new().unwrap();
        let (registry, calls) = registry_with_probe(false, true);
        let project = Project::new(project_dir.path())
            .with_requirement(Requirement::custom("probe", "PROBE"))
            .with_requirement(Requirement::custom("probe", "OTHER"));

        engine_with(registry)
            .prepare_without_interaction(&project, unattended().with_whitelist(vec!["OTHER".into()]))
            .unwrap();

        let calls = calls.borrow();
        assert!(calls.contains(&"provide OTHER".to_string()));
        assert!(!calls.contains(&"provide PROBE".to_string()));
        assert!(project_dir.path().join("envs").exists());
    }

    #[test]
    fn keep_going_always_offers_another_stage() {
        let project_dir = TempDir::new().unwrap();
        let (registry, _calls) = registry_with_probe(false, false);
        let project =
            Project::new(project_dir.path()).with_requirement(Requirement::custom("probe", "PROBE"));
        let engine = engine_with(registry);
        let expected_dir = project_dir.path().to_string_lossy().to_string();

        let mut stage = engine.prepare_in_stages(&project, unattended().keep_going(true));
        for _ in 0..6 {
            assert_eq!(stage.environ()[PROJECT_DIR_VAR], expected_dir);
            let next = stage.execute().unwrap();
            stage = next.expect("keep going never stops");
        }
    }

    #[test]
    fn after_success_runs_only_on_success() {
        let project_dir = TempDir::new().unwrap();
        let (registry, _calls) = registry_with_probe(false, false);
        let engine = engine_with(registry);

        let ok = Project::new(project_dir.path());
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let stage = after_stage_success(engine.prepare_in_stages(&ok, unattended()), move |_| {
            flag.set(true)
        });
        run_stages(stage).unwrap();
        assert!(ran.get());

        let failing = Project::new(project_dir.path())
            .with_requirement(Requirement::custom("probe", "PROBE"));
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let stage = after_stage_success(engine.prepare_in_stages(&failing, unattended()), move |_| {
            flag.set(true)
        });
        let result = run_stages(stage).unwrap();
        assert!(result.failed());
        assert!(!ran.get());
    }

    #[test]
    fn unprepare_removes_what_prepare_created() {
        let project_dir = TempDir::new().unwrap();
        let (registry, calls) = registry_with_probe(false, true);
        let engine = engine_with(registry);
        let project =
            Project::new(project_dir.path()).with_requirement(Requirement::custom("probe", "PROBE"));
        let mut caller = Environ::new();
        caller.insert("PROBE".to_string(), "1".to_string());

        let result = engine
            .prepare_without_interaction(&project, unattended().with_environ(caller))
            .unwrap();
        assert!(!result.failed(), "{:?}", result.errors());
        let prefix = project_dir.path().join("envs").join("default");
        assert!(prefix.exists());

        let status = engine.unprepare(&project, &result, None);

        assert!(status.success);
        assert_eq!(status.description, "Success.");
        assert!(!prefix.exists());
        assert_eq!(
            status.logs,
            vec![
                "Removed PROBE.".to_string(),
                format!("Deleted environment files in {}.", prefix.display()),
            ]
        );
        assert_eq!(calls.borrow().last().unwrap(), "unprovide PROBE");
    }

    #[test]
    fn unprepare_with_empty_whitelist_does_nothing() {
        let project_dir = TempDir::new().unwrap();
        let engine = engine();
        let project = Project::new(project_dir.path());
        let result = engine
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        let status = engine.unprepare(&project, &result, Some(&[]));

        assert!(status.success);
        assert_eq!(status.description, "Nothing to clean up.");
        assert!(project_dir.path().join("envs").join("default").exists());
    }

    #[test]
    fn unprepare_after_failure_has_nothing_to_clean() {
        let project_dir = TempDir::new().unwrap();
        let (registry, _calls) = registry_with_probe(true, false);
        let engine = engine_with(registry);
        let project =
            Project::new(project_dir.path()).with_requirement(Requirement::custom("probe", "PROBE"));
        let result = engine
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        let status = engine.unprepare(&project, &result, None);

        assert!(status.success);
        assert_eq!(status.description, "Nothing to clean up.");
    }

    #[test]
    fn unprepare_reports_single_failure_and_keeps_other_logs() {
        let project_dir = TempDir::new().unwrap();
        let (mut registry, _calls) = registry_with_probe(false, true);
        registry.register(Box::new(StickyProvider));
        let engine = engine_with(registry);
        let project = Project::new(project_dir.path())
            .with_requirement(Requirement::custom("sticky", "GLUE"))
            .with_requirement(Requirement::custom("probe", "PROBE"));
        let mut caller = Environ::new();
        caller.insert("PROBE".to_string(), "1".to_string());
        let result = engine
            .prepare_without_interaction(&project, unattended().with_environ(caller))
            .unwrap();

        let whitelist = vec!["GLUE".to_string(), "PROBE".to_string()];
        let status = engine.unprepare(&project, &result, Some(&whitelist));

        assert!(!status.success);
        assert_eq!(status.description, "Could not remove GLUE.");
        assert_eq!(status.errors, vec!["Could not remove GLUE.".to_string()]);
        assert_eq!(status.logs, vec!["Removed PROBE.".to_string()]);
        assert!(project_dir.path().join("envs").join("default").exists());
    }

    #[test]
    fn unprepare_reports_multiple_failures() {
        let project_dir = TempDir::new().unwrap();
        let mut registry = ProviderRegistry::new(Box::new(FakeManager::default())).unwrap();
        registry.register(Box::new(StickyProvider));
        let engine = engine_with(registry);
        let project = Project::new(project_dir.path())
            .with_requirement(Requirement::custom("sticky", "A"))
            .with_requirement(Requirement::custom("sticky", "B"));
        let result = engine
            .prepare_without_interaction(&project, unattended())
            .unwrap();

        let status = engine.unprepare(&project, &result, Some(&["sticky".to_string()]));

        assert!(!status.success);
        assert_eq!(status.description, "Failed to clean up A, B.");
        assert_eq!(
            status.errors,
            vec!["Could not remove A.".to_string(), "Could not remove B.".to_string()]
        );
    }

    #[test]
    fn unprepare_refuses_project_with_problems() {
        let project_dir = TempDir::new().unwrap();
        let engine = engine();
        let clean = Project::new(project_dir.path());
        let result = engine
            .prepare_without_interaction(&clean, unattended())
            .unwrap();
        let broken = Project::new(project_dir.path()).with_problem("oops");

        let status = engine.unprepare(&broken, &result, None);

        assert!(!status.success);
        assert_eq!(status.description, UNABLE_TO_LOAD);
        assert_eq!(status.errors, vec!["oops".to_string()]);
        fs::metadata(project_dir.path().join("envs")).unwrap();
    }
}

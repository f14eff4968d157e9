//! The stage state machine.
//!
//! A prepare run is a chain of [`PrepareStage`]s. Each stage is executed
//! exactly once and then either hands back the next stage or finishes the
//! run with a [`PrepareResult`]. The env spec is always set up by the first
//! stage of a chain; every other requirement follows in a second stage.
//!
//! ```text
//! env spec stage ──ok──▶ requirements stage ──▶ Success | Failure
//!       │                                              │
//!       └──failed──▶ Failure                           │
//!                       │ keep going                   │ keep going
//!                       └──────────▶ retry stage ◀─────┘
//! ```

use std::path::PathBuf;
use std::rc::Rc;

use super::result::{PrepareFailure, PrepareResult, PrepareSuccess};
use crate::environ::Environ;
use crate::error::{PrepkitError, Result};
use crate::providers::{
    ConfigChoice, ProvideContext, ProvideMode, ProviderRegistry, StatusContext,
};
use crate::requirements::{
    EnvSpec, Requirement, RequirementStatus, SharedOverrides, UserConfigOverrides,
};
use crate::secrets::SecretStore;
use crate::state::LocalStateFile;

/// Description of the stage that sets up the env spec.
pub const ENV_SPEC_STAGE: &str = "Set up project environment.";
/// Description of the stage that sets up everything else.
pub const REQUIREMENTS_STAGE: &str = "Set up project requirements.";

type AfterSuccess = Rc<dyn Fn(&mut PrepareResult)>;

/// Everything a chain of stages shares.
pub(crate) struct StageContext {
    pub project_dir: PathBuf,
    pub env_spec: EnvSpec,
    /// Requirements other than the env spec, in declaration order.
    pub requirements: Vec<Requirement>,
    pub registry: Rc<ProviderRegistry>,
    pub secrets: Rc<dyn SecretStore>,
    pub mode: ProvideMode,
    /// Variables or kind names allowed to be provided; `None` allows all.
    pub provide_whitelist: Option<Vec<String>>,
    pub keep_going: bool,
    /// Caller's environ plus the project directory marker.
    pub environ: Environ,
}

enum Batch {
    /// The run can't start; finishes with these errors.
    Refused(Vec<String>),
    EnvSpec,
    Requirements {
        environ: Environ,
        env_spec_status: RequirementStatus,
    },
}

struct Executed {
    statuses: Vec<RequirementStatus>,
    result: Option<PrepareResult>,
}

/// One single-use step of a prepare run.
pub struct PrepareStage {
    description: &'static str,
    context: Rc<StageContext>,
    batch: Batch,
    overrides: SharedOverrides,
    after_success: Vec<AfterSuccess>,
    executed: Option<Executed>,
}

impl std::fmt::Debug for PrepareStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrepareStage")
            .field("description", &self.description)
            .field("mode", &self.context.mode)
            .field("executed", &self.executed.is_some())
            .finish_non_exhaustive()
    }
}

/// Run `f` on the result of the chain starting at `stage`, only if the
/// chain ends in success.
pub fn after_stage_success<F>(mut stage: PrepareStage, f: F) -> PrepareStage
where
    F: Fn(&mut PrepareResult) + 'static,
{
    stage.after_success.push(Rc::new(f));
    stage
}

fn missing_provider_status(requirement: &Requirement) -> RequirementStatus {
    let message = format!(
        "No provider registered for requirement kind '{}'.",
        requirement.kind_name()
    );
    RequirementStatus::unsatisfied(requirement, message.clone()).with_errors(vec![message])
}

impl PrepareStage {
    pub(crate) fn new(context: Rc<StageContext>, overrides: SharedOverrides) -> Self {
        Self {
            description: ENV_SPEC_STAGE,
            context,
            batch: Batch::EnvSpec,
            overrides,
            after_success: Vec::new(),
            executed: None,
        }
    }

    pub(crate) fn refused(
        context: Rc<StageContext>,
        overrides: SharedOverrides,
        errors: Vec<String>,
    ) -> Self {
        Self {
            batch: Batch::Refused(errors),
            ..Self::new(context, overrides)
        }
    }

    fn successor(&self, batch: Batch, description: &'static str) -> Self {
        Self {
            description,
            context: Rc::clone(&self.context),
            batch,
            overrides: Rc::clone(&self.overrides),
            after_success: self.after_success.clone(),
            executed: None,
        }
    }

    /// What executing this stage will do.
    pub fn description(&self) -> &str {
        self.description
    }

    pub fn mode(&self) -> ProvideMode {
        self.context.mode
    }

    /// The environ this stage starts from.
    pub fn environ(&self) -> &Environ {
        match &self.batch {
            Batch::Requirements { environ, .. } => environ,
            _ => &self.context.environ,
        }
    }

    /// Overrides shared by every stage of this run.
    pub fn overrides(&self) -> SharedOverrides {
        Rc::clone(&self.overrides)
    }

    /// Requirements this stage evaluates.
    pub fn requirements(&self) -> Vec<Requirement> {
        match &self.batch {
            Batch::Refused(_) => Vec::new(),
            Batch::EnvSpec => vec![Requirement::env_spec(self.context.env_spec.clone())],
            Batch::Requirements { .. } => self.context.requirements.clone(),
        }
    }

    /// Fresh statuses of this stage's requirements, without changing anything.
    pub fn statuses_before_execute(&self) -> Result<Vec<RequirementStatus>> {
        let local_state = LocalStateFile::load_for_directory(&self.context.project_dir)?;
        let overrides = self.overrides.borrow();
        Ok(self
            .requirements()
            .iter()
            .map(|requirement| self.check(requirement, self.environ(), &local_state, &overrides))
            .collect())
    }

    /// Choices the provider offers for a status of this stage.
    pub fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice> {
        self.context
            .registry
            .provider_for(&status.requirement)
            .map(|provider| provider.configuration_choices(status))
            .unwrap_or_default()
    }

    pub fn is_executed(&self) -> bool {
        self.executed.is_some()
    }

    /// Statuses produced by [`execute`](Self::execute).
    pub fn statuses_after_execute(&self) -> Result<&[RequirementStatus]> {
        self.executed
            .as_ref()
            .map(|e| e.statuses.as_slice())
            .ok_or_else(|| PrepkitError::InvalidState {
                message: "statuses_after_execute isn't available until after execute()"
                    .to_string(),
            })
    }

    /// The result this stage finished the run with.
    ///
    /// `None` when the stage succeeded and handed over to a next stage.
    pub fn result(&self) -> Result<Option<&PrepareResult>> {
        self.executed
            .as_ref()
            .map(|e| e.result.as_ref())
            .ok_or_else(|| PrepkitError::InvalidState {
                message: "result property isn't available until after execute()".to_string(),
            })
    }

    /// Whether this stage finished the run with a failure.
    pub fn failed(&self) -> Result<bool> {
        Ok(self.result()?.is_some_and(PrepareResult::failed))
    }

    /// Run the stage. Returns the next stage, if any.
    pub fn execute(&mut self) -> Result<Option<PrepareStage>> {
        if self.executed.is_some() {
            return Err(PrepkitError::InvalidState {
                message: "execute() was already called on this stage".to_string(),
            });
        }
        tracing::debug!("Executing stage: {}", self.description);

        let batch = std::mem::replace(&mut self.batch, Batch::EnvSpec);
        let next = match &batch {
            Batch::Refused(errors) => {
                let errors = errors.clone();
                self.finish_failure(Vec::new(), self.context.environ.clone(), errors);
                None
            }
            Batch::EnvSpec => self.execute_env_spec()?,
            Batch::Requirements {
                environ,
                env_spec_status,
            } => self.execute_requirements(environ.clone(), env_spec_status.clone())?,
        };
        self.batch = batch;
        Ok(next)
    }

    fn execute_env_spec(&mut self) -> Result<Option<PrepareStage>> {
        let mut local_state = match LocalStateFile::load_for_directory(&self.context.project_dir)
        {
            Ok(state) => state,
            Err(e) => {
                self.finish_failure(Vec::new(), self.context.environ.clone(), vec![e.to_string()]);
                return Ok(None);
            }
        };
        let loaded = local_state.clone();
        let mut environ = self.context.environ.clone();
        let requirement = Requirement::env_spec(self.context.env_spec.clone());

        let overrides = self.overrides.borrow().clone();
        let status = self.satisfy(&requirement, &mut environ, &mut local_state, &overrides);
        self.save_if_changed(&local_state, &loaded);

        if status.satisfied {
            self.executed = Some(Executed {
                statuses: vec![status.clone()],
                result: None,
            });
            let next = self.successor(
                Batch::Requirements {
                    environ,
                    env_spec_status: status,
                },
                REQUIREMENTS_STAGE,
            );
            return Ok(Some(next));
        }

        tracing::debug!("Env spec not ready, only checking the remaining requirements");
        let mut statuses = vec![status];
        statuses.extend(
            self.context
                .requirements
                .iter()
                .map(|r| self.check(r, &environ, &local_state, &overrides)),
        );
        Ok(self.finish(statuses, environ))
    }

    fn execute_requirements(
        &mut self,
        mut environ: Environ,
        env_spec_status: RequirementStatus,
    ) -> Result<Option<PrepareStage>> {
        let mut local_state = match LocalStateFile::load_for_directory(&self.context.project_dir)
        {
            Ok(state) => state,
            Err(e) => {
                self.finish_failure(vec![env_spec_status], environ, vec![e.to_string()]);
                return Ok(None);
            }
        };
        let loaded = local_state.clone();
        let overrides = self.overrides.borrow().clone();

        let mut statuses = vec![env_spec_status];
        for requirement in &self.context.requirements {
            statuses.push(self.satisfy(requirement, &mut environ, &mut local_state, &overrides));
        }
        self.save_if_changed(&local_state, &loaded);

        Ok(self.finish(statuses, environ))
    }

    fn check(
        &self,
        requirement: &Requirement,
        environ: &Environ,
        local_state: &LocalStateFile,
        overrides: &UserConfigOverrides,
    ) -> RequirementStatus {
        let Some(provider) = self.context.registry.provider_for(requirement) else {
            return missing_provider_status(requirement);
        };
        provider.check_status(
            requirement,
            &StatusContext {
                environ,
                local_state,
                secrets: &*self.context.secrets,
                overrides,
                project_dir: &self.context.project_dir,
            },
        )
    }

    fn should_provide(&self, requirement: &Requirement) -> bool {
        if !self.context.mode.provides() {
            return false;
        }
        if requirement.is_env_spec() {
            return true;
        }
        match &self.context.provide_whitelist {
            None => true,
            Some(names) => names
                .iter()
                .any(|n| *n == requirement.env_var || n == requirement.kind_name()),
        }
    }

    /// Check a requirement and provide it when this stage is allowed to.
    fn satisfy(
        &self,
        requirement: &Requirement,
        environ: &mut Environ,
        local_state: &mut LocalStateFile,
        overrides: &UserConfigOverrides,
    ) -> RequirementStatus {
        let status = self.check(requirement, environ, local_state, overrides);
        if !self.should_provide(requirement) {
            return status;
        }
        let Some(provider) = self.context.registry.provider_for(requirement) else {
            return status;
        };

        let mut ctx = ProvideContext {
            environ,
            local_state,
            secrets: &*self.context.secrets,
            overrides,
            project_dir: &self.context.project_dir,
            mode: self.context.mode,
        };
        let status = provider.provide(&mut ctx, &status);
        if !status.satisfied {
            tracing::warn!(
                "Could not provide {}: {}",
                requirement.env_var,
                status.status_description
            );
        }
        status
    }

    fn save_if_changed(&self, local_state: &LocalStateFile, loaded: &LocalStateFile) {
        if local_state == loaded {
            return;
        }
        if let Err(e) = local_state.save() {
            tracing::warn!("Failed to save {}: {}", local_state.path().display(), e);
        }
    }

    fn finish(&mut self, statuses: Vec<RequirementStatus>, environ: Environ) -> Option<PrepareStage> {
        if statuses.iter().all(RequirementStatus::is_satisfied) {
            let mut result = PrepareResult::Success(PrepareSuccess {
                environ,
                logs: collect_logs(&statuses),
                statuses: statuses.clone(),
                command_exec_info: None,
                overrides: self.overrides.borrow().clone(),
                env_spec_name: self.context.env_spec.name.clone(),
            });
            for f in &self.after_success {
                f(&mut result);
            }
            let failed = result.failed();
            self.executed = Some(Executed {
                statuses,
                result: Some(result),
            });
            return if failed { self.retry() } else { None };
        }

        let errors = statuses
            .iter()
            .flat_map(RequirementStatus::failure_errors)
            .collect();
        self.finish_failure(statuses, environ, errors);
        self.retry()
    }

    fn finish_failure(
        &mut self,
        statuses: Vec<RequirementStatus>,
        environ: Environ,
        errors: Vec<String>,
    ) {
        let result = PrepareResult::Failure(PrepareFailure {
            environ,
            logs: collect_logs(&statuses),
            statuses: statuses.clone(),
            errors,
            overrides: self.overrides.borrow().clone(),
            env_spec_name: self.context.env_spec.name.clone(),
        });
        self.executed = Some(Executed {
            statuses,
            result: Some(result),
        });
    }

    /// A fresh stage for another attempt, when the run keeps going.
    fn retry(&self) -> Option<PrepareStage> {
        if !self.context.keep_going || matches!(self.batch, Batch::Refused(_)) {
            return None;
        }
        tracing::debug!("Stage failed, starting over");
        Some(self.successor(Batch::EnvSpec, ENV_SPEC_STAGE))
    }

    /// The failure to report when a run is given up before this stage runs.
    pub(crate) fn abandoned_result(&self) -> PrepareResult {
        let statuses = self.statuses_before_execute().unwrap_or_default();
        let mut errors: Vec<String> = statuses
            .iter()
            .flat_map(RequirementStatus::failure_errors)
            .collect();
        if let Batch::Refused(refusal) = &self.batch {
            errors.extend(refusal.iter().cloned());
        }
        if errors.is_empty() {
            errors.push("The prepare run was stopped before it finished.".to_string());
        }
        PrepareResult::Failure(PrepareFailure {
            environ: self.environ().clone(),
            logs: collect_logs(&statuses),
            statuses,
            errors,
            overrides: self.overrides.borrow().clone(),
            env_spec_name: self.context.env_spec.name.clone(),
        })
    }
}

fn collect_logs(statuses: &[RequirementStatus]) -> Vec<String> {
    statuses.iter().flat_map(|s| s.logs.iter().cloned()).collect()
}

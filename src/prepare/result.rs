//! Terminal outcome of a prepare run.

use crate::environ::{merge_into, Environ};
use crate::project::CommandExecInfo;
use crate::requirements::{RequirementStatus, UserConfigOverrides};

/// A prepare run that satisfied every requirement.
#[derive(Debug, Clone)]
pub struct PrepareSuccess {
    pub environ: Environ,
    pub statuses: Vec<RequirementStatus>,
    /// How to launch the selected command, when one was selected.
    pub command_exec_info: Option<CommandExecInfo>,
    pub logs: Vec<String>,
    pub overrides: UserConfigOverrides,
    pub env_spec_name: String,
}

/// A prepare run that left something unsatisfied.
#[derive(Debug, Clone)]
pub struct PrepareFailure {
    pub environ: Environ,
    pub statuses: Vec<RequirementStatus>,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    pub overrides: UserConfigOverrides,
    pub env_spec_name: String,
}

/// Outcome of preparing a project.
#[derive(Debug, Clone)]
pub enum PrepareResult {
    Success(PrepareSuccess),
    Failure(PrepareFailure),
}

impl PrepareResult {
    /// Whether the run failed.
    pub fn failed(&self) -> bool {
        matches!(self, PrepareResult::Failure(_))
    }

    /// The environment produced by the run.
    ///
    /// On failure this is whatever was set up before the failing stage.
    pub fn environ(&self) -> &Environ {
        match self {
            PrepareResult::Success(s) => &s.environ,
            PrepareResult::Failure(f) => &f.environ,
        }
    }

    /// Statuses of every requirement, env spec first.
    pub fn statuses(&self) -> &[RequirementStatus] {
        match self {
            PrepareResult::Success(s) => &s.statuses,
            PrepareResult::Failure(f) => &f.statuses,
        }
    }

    /// Errors explaining a failure; empty on success.
    pub fn errors(&self) -> &[String] {
        match self {
            PrepareResult::Success(_) => &[],
            PrepareResult::Failure(f) => &f.errors,
        }
    }

    pub fn logs(&self) -> &[String] {
        match self {
            PrepareResult::Success(s) => &s.logs,
            PrepareResult::Failure(f) => &f.logs,
        }
    }

    /// Choices made during the run.
    pub fn overrides(&self) -> &UserConfigOverrides {
        match self {
            PrepareResult::Success(s) => &s.overrides,
            PrepareResult::Failure(f) => &f.overrides,
        }
    }

    /// Env spec the run prepared.
    pub fn env_spec_name(&self) -> &str {
        match self {
            PrepareResult::Success(s) => &s.env_spec_name,
            PrepareResult::Failure(f) => &f.env_spec_name,
        }
    }

    /// Launch info for the selected command, only on success.
    pub fn command_exec_info(&self) -> Option<&CommandExecInfo> {
        match self {
            PrepareResult::Success(s) => s.command_exec_info.as_ref(),
            PrepareResult::Failure(_) => None,
        }
    }

    /// Status of the first requirement whose variable or kind name matches.
    pub fn status_for(&self, env_var_or_kind: &str) -> Option<&RequirementStatus> {
        self.statuses()
            .iter()
            .find(|s| s.env_var() == env_var_or_kind)
            .or_else(|| {
                self.statuses()
                    .iter()
                    .find(|s| s.kind_name() == env_var_or_kind)
            })
    }

    /// Copy the produced environment into `target`.
    pub fn update_environ(&self, target: &mut Environ) {
        merge_into(self.environ(), target);
    }

    /// Turn a success into a failure with one error, keeping everything else.
    pub fn fail_with(&mut self, error: String) {
        if let PrepareResult::Success(success) = self {
            let success = std::mem::replace(
                success,
                PrepareSuccess {
                    environ: Environ::new(),
                    statuses: Vec::new(),
                    command_exec_info: None,
                    logs: Vec::new(),
                    overrides: UserConfigOverrides::new(),
                    env_spec_name: String::new(),
                },
            );
            *self = PrepareResult::Failure(PrepareFailure {
                environ: success.environ,
                statuses: success.statuses,
                errors: vec![error],
                logs: success.logs,
                overrides: success.overrides,
                env_spec_name: success.env_spec_name,
            });
        }
    }
}

//! Providers: per-kind strategies that check and satisfy requirements.
//!
//! Every requirement kind has exactly one [`Provider`], looked up by kind
//! name in the [`ProviderRegistry`]. Providers never return errors for
//! environmental failures (a failed download, a package manager crash);
//! those are captured as errors in the returned status.
//!
//! # Modules
//!
//! - [`env_var`] - Plain environment variables
//! - [`env_spec`] - The project's package environment
//! - [`download`] - Files fetched from a URL
//! - [`service`] - Background services such as Redis
//! - [`registry`] - Kind name to provider lookup

pub mod download;
pub mod env_spec;
pub mod env_var;
pub mod registry;
pub mod service;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::environ::Environ;
use crate::error::PrepkitError;
use crate::requirements::{Requirement, RequirementStatus, Status, UserConfigOverrides};
use crate::secrets::{project_scope, SecretStore};
use crate::state::LocalStateFile;

pub use download::{DownloadProvider, Fetch, HttpFetcher};
pub use env_spec::{CondaManager, EnvSpecProvider, EnvironmentDeviations, EnvironmentManager};
pub use env_var::EnvVarProvider;
pub use registry::ProviderRegistry;
pub use service::ServiceProvider;

/// How far a prepare run goes to satisfy requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvideMode {
    /// Only check; never change anything.
    Check,
    /// Satisfy requirements using defaults, never ask.
    Unattended,
    /// Satisfy requirements using choices the user made.
    Interactive,
}

impl ProvideMode {
    /// Whether this mode ever calls `provide`.
    pub fn provides(&self) -> bool {
        !matches!(self, ProvideMode::Check)
    }
}

impl FromStr for ProvideMode {
    type Err = PrepkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "check" => Ok(ProvideMode::Check),
            "unattended" => Ok(ProvideMode::Unattended),
            "interactive" => Ok(ProvideMode::Interactive),
            _ => Err(PrepkitError::InvalidProvideMode {
                mode: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProvideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvideMode::Check => "check",
            ProvideMode::Unattended => "unattended",
            ProvideMode::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

/// One way a user can configure an unsatisfied requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChoice {
    pub option_id: String,
    pub label: String,
    pub is_default: bool,
    /// Whether the option takes a typed value.
    pub accepts_value: bool,
    /// Whether the typed value should be hidden while entered.
    pub secret: bool,
}

impl ConfigChoice {
    /// An option without a value.
    pub fn new(option_id: &str, label: impl Into<String>) -> Self {
        Self {
            option_id: option_id.to_string(),
            label: label.into(),
            is_default: false,
            accepts_value: false,
            secret: false,
        }
    }

    /// Mark as the default selection.
    pub fn default_selected(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Mark as taking a typed value.
    pub fn with_value(mut self, secret: bool) -> Self {
        self.accepts_value = true;
        self.secret = secret;
        self
    }
}

/// Read-only inputs for checking a requirement.
pub struct StatusContext<'a> {
    pub environ: &'a Environ,
    pub local_state: &'a LocalStateFile,
    pub secrets: &'a dyn SecretStore,
    pub overrides: &'a UserConfigOverrides,
    pub project_dir: &'a Path,
}

impl StatusContext<'_> {
    /// Secret store scope for this project.
    pub fn secret_scope(&self) -> String {
        project_scope(self.project_dir)
    }
}

/// Inputs for satisfying a requirement.
///
/// `environ` is the derived environ of the stage; providers add to it.
pub struct ProvideContext<'a> {
    pub environ: &'a mut Environ,
    pub local_state: &'a mut LocalStateFile,
    pub secrets: &'a dyn SecretStore,
    pub overrides: &'a UserConfigOverrides,
    pub project_dir: &'a Path,
    pub mode: ProvideMode,
}

impl ProvideContext<'_> {
    /// A read-only view for re-checking after providing.
    pub fn status_context(&self) -> StatusContext<'_> {
        StatusContext {
            environ: &*self.environ,
            local_state: &*self.local_state,
            secrets: self.secrets,
            overrides: self.overrides,
            project_dir: self.project_dir,
        }
    }

    /// Secret store scope for this project.
    pub fn secret_scope(&self) -> String {
        project_scope(self.project_dir)
    }
}

/// Inputs for undoing what `provide` did.
pub struct UnprovideContext<'a> {
    pub environ: &'a Environ,
    pub local_state: &'a mut LocalStateFile,
    pub secrets: &'a dyn SecretStore,
    pub project_dir: &'a Path,
}

/// Strategy for one requirement kind.
pub trait Provider {
    /// Kind name this provider handles.
    fn kind(&self) -> &str;

    /// Evaluate a requirement without changing anything.
    fn check_status(&self, requirement: &Requirement, ctx: &StatusContext<'_>)
        -> RequirementStatus;

    /// Ways the user may configure the requirement behind `status`.
    fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice>;

    /// Try to satisfy a requirement, returning its new status.
    ///
    /// Calling this on an already-satisfied requirement must be harmless.
    fn provide(&self, ctx: &mut ProvideContext<'_>, status: &RequirementStatus)
        -> RequirementStatus;

    /// Undo what `provide` did.
    fn unprovide(&self, ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status;
}

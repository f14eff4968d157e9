//! Provider for plain environment variables.

use serde_json::json;

use super::{ConfigChoice, ProvideContext, Provider, StatusContext, UnprovideContext};
use crate::requirements::{Requirement, RequirementStatus, Status};

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Environ,
    Override,
    Secrets,
    LocalState,
    Default,
}

impl Source {
    fn name(&self) -> &'static str {
        match self {
            Source::Environ => "environ",
            Source::Override => "override",
            Source::Secrets => "secrets",
            Source::LocalState => "local_state",
            Source::Default => "default",
        }
    }
}

/// Resolves variables from the environment, user choices, stored values
/// and declared defaults.
#[derive(Debug, Default)]
pub struct EnvVarProvider;

impl EnvVarProvider {
    pub fn new() -> Self {
        Self
    }

    fn resolve(&self, requirement: &Requirement, ctx: &StatusContext<'_>) -> Option<(String, Source)> {
        let name = &requirement.env_var;

        if let Some(value) = ctx.environ.get(name).filter(|v| !v.is_empty()) {
            return Some((value.clone(), Source::Environ));
        }

        match ctx.overrides.option_for(name) {
            Some("variables") => {
                if let Some(value) = ctx.overrides.value_for(name) {
                    return Some((value.to_string(), Source::Override));
                }
            }
            Some("default") => {
                if let Some(value) = requirement.default_value().filter(|v| !v.is_empty()) {
                    return Some((value, Source::Default));
                }
            }
            _ => {}
        }

        let stored = if requirement.encrypted {
            ctx.secrets
                .get(&ctx.secret_scope(), name)
                .map(|v| (v, Source::Secrets))
        } else {
            ctx.local_state
                .get_value(name)
                .map(|v| (v.to_string(), Source::LocalState))
        };
        if let Some((value, source)) = stored.filter(|(v, _)| !v.is_empty()) {
            return Some((value, source));
        }

        requirement
            .default_value()
            .filter(|v| !v.is_empty())
            .map(|v| (v, Source::Default))
    }
}

impl Provider for EnvVarProvider {
    fn kind(&self) -> &str {
        "env_var"
    }

    fn check_status(
        &self,
        requirement: &Requirement,
        ctx: &StatusContext<'_>,
    ) -> RequirementStatus {
        let name = &requirement.env_var;
        let in_environ = ctx.environ.get(name).is_some_and(|v| !v.is_empty());
        let has_default = requirement
            .default_value()
            .is_some_and(|v| !v.is_empty());

        let resolved = self.resolve(requirement, ctx);
        let shown_default = if requirement.encrypted {
            None
        } else {
            requirement.default_value()
        };
        let analysis = json!({
            "source": resolved.as_ref().map(|(_, source)| source.name()),
            "in_environ": in_environ,
            "has_default": has_default,
            "default": shown_default,
        });

        let status = match resolved {
            Some(_) => RequirementStatus::satisfied(
                requirement,
                format!("Environment variable {} is set.", name),
            ),
            None => RequirementStatus::unsatisfied(
                requirement,
                format!("Environment variable {} is not set.", name),
            ),
        };
        status.with_analysis(analysis)
    }

    fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice> {
        let requirement = &status.requirement;
        let in_environ = status.analysis["in_environ"].as_bool().unwrap_or(false);
        let has_default = status.analysis["has_default"].as_bool().unwrap_or(false);

        let mut choices = Vec::new();
        if in_environ {
            choices.push(
                ConfigChoice::new(
                    "environ",
                    format!("Keep value of {} from the environment", requirement.env_var),
                )
                .default_selected(true),
            );
        }
        if has_default {
            let label = match status.analysis["default"].as_str() {
                Some(value) => format!("Use default '{}'", value),
                None => "Use the default value".to_string(),
            };
            choices.push(ConfigChoice::new("default", label).default_selected(!in_environ));
        }
        choices.push(
            ConfigChoice::new("variables", "Use this value:")
                .with_value(requirement.encrypted)
                .default_selected(!in_environ && !has_default),
        );
        choices
    }

    fn provide(
        &self,
        ctx: &mut ProvideContext<'_>,
        status: &RequirementStatus,
    ) -> RequirementStatus {
        let requirement = &status.requirement;
        let name = requirement.env_var.as_str();
        let scope = ctx.secret_scope();
        let mut errors = Vec::new();

        match ctx.overrides.option_for(name) {
            Some("variables") => {
                if let Some(value) = ctx.overrides.value_for(name) {
                    if requirement.encrypted {
                        if let Err(e) = ctx.secrets.set(&scope, name, value) {
                            errors.push(format!("Failed to save {}: {}", name, e));
                        }
                    } else {
                        ctx.local_state.set_value(name, value);
                    }
                }
            }
            Some("default") => {
                if requirement.encrypted {
                    if let Err(e) = ctx.secrets.unset(&scope, name) {
                        errors.push(format!("Failed to forget {}: {}", name, e));
                    }
                } else {
                    ctx.local_state.unset_value(name);
                }
            }
            _ => {}
        }

        let resolved = self.resolve(requirement, &ctx.status_context());
        if let Some((value, source)) = resolved {
            tracing::debug!("Resolved {} from {}", name, source.name());
            ctx.environ.insert(name.to_string(), value);
        }

        self.check_status(requirement, &ctx.status_context())
            .with_errors(errors)
    }

    fn unprovide(&self, _ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status {
        Status::success(format!("Nothing to clean up for {}.", status.env_var()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::Environ;
    use crate::providers::ProvideMode;
    use crate::requirements::UserConfigOverrides;
    use crate::secrets::{MemorySecretStore, SecretStore};
    use crate::state::LocalStateFile;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        environ: Environ,
        local_state: LocalStateFile,
        secrets: MemorySecretStore,
        overrides: UserConfigOverrides,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let local_state = LocalStateFile::new(temp.path());
            Self {
                temp,
                environ: Environ::new(),
                local_state,
                secrets: MemorySecretStore::new(),
                overrides: UserConfigOverrides::new(),
            }
        }

        fn check(&self, requirement: &Requirement) -> RequirementStatus {
            let ctx = StatusContext {
                environ: &self.environ,
                local_state: &self.local_state,
                secrets: &self.secrets,
                overrides: &self.overrides,
                project_dir: self.temp.path(),
            };
            EnvVarProvider::new().check_status(requirement, &ctx)
        }

        fn provide(&mut self, requirement: &Requirement) -> RequirementStatus {
            let status = self.check(requirement);
            let mut ctx = ProvideContext {
                environ: &mut self.environ,
                local_state: &mut self.local_state,
                secrets: &self.secrets,
                overrides: &self.overrides,
                project_dir: self.temp.path(),
                mode: ProvideMode::Interactive,
            };
            EnvVarProvider::new().provide(&mut ctx, &status)
        }
    }

    #[test]
    fn unset_variable_is_unsatisfied() {
        let fixture = Fixture::new();
        let status = fixture.check(&Requirement::env_var("FOO"));
        assert!(!status.is_satisfied());
        assert_eq!(status.status_description, "Environment variable FOO is not set.");
    }

    #[test]
    fn environ_value_satisfies() {
        let mut fixture = Fixture::new();
        fixture.environ.insert("FOO".to_string(), "bar".to_string());
        let status = fixture.check(&Requirement::env_var("FOO"));
        assert!(status.is_satisfied());
        assert_eq!(status.analysis["source"], "environ");
    }

    #[test]
    fn empty_environ_value_does_not_satisfy() {
        let mut fixture = Fixture::new();
        fixture.environ.insert("FOO".to_string(), String::new());
        assert!(!fixture.check(&Requirement::env_var("FOO")).is_satisfied());
    }

    #[test]
    fn default_satisfies_and_is_provided() {
        let mut fixture = Fixture::new();
        let req = Requirement::env_var("PORT").with_option("default", 8080);
        let status = fixture.provide(&req);
        assert!(status.is_satisfied());
        assert_eq!(fixture.environ["PORT"], "8080");
    }

    #[test]
    fn override_value_is_saved_to_local_state() {
        let mut fixture = Fixture::new();
        fixture
            .overrides
            .set_choice("FOO", "variables", Some("chosen".to_string()));
        let status = fixture.provide(&Requirement::env_var("FOO"));

        assert!(status.is_satisfied());
        assert_eq!(fixture.environ["FOO"], "chosen");
        assert_eq!(fixture.local_state.get_value("FOO"), Some("chosen"));
    }

    #[test]
    fn encrypted_override_goes_to_secret_store() {
        let mut fixture = Fixture::new();
        fixture
            .overrides
            .set_choice("DB_PASSWORD", "variables", Some("hunter2".to_string()));
        let status = fixture.provide(&Requirement::env_var("DB_PASSWORD"));

        assert!(status.is_satisfied());
        assert_eq!(fixture.local_state.get_value("DB_PASSWORD"), None);
        let scope = fixture.temp.path().to_string_lossy().to_string();
        assert_eq!(
            fixture.secrets.get(&scope, "DB_PASSWORD"),
            Some("hunter2".to_string())
        );
    }

    #[test]
    fn local_state_value_satisfies() {
        let mut fixture = Fixture::new();
        fixture.local_state.set_value("FOO", "stored");
        let status = fixture.check(&Requirement::env_var("FOO"));
        assert!(status.is_satisfied());
        assert_eq!(status.analysis["source"], "local_state");
    }

    #[test]
    fn environ_wins_over_stored_value() {
        let mut fixture = Fixture::new();
        fixture.local_state.set_value("FOO", "stored");
        fixture.environ.insert("FOO".to_string(), "env".to_string());
        fixture.provide(&Requirement::env_var("FOO"));
        assert_eq!(fixture.environ["FOO"], "env");
    }

    #[test]
    fn choices_offer_default_when_declared() {
        let fixture = Fixture::new();
        let req = Requirement::env_var("HOST").with_option("default", "localhost");
        let status = fixture.check(&req);
        let choices = EnvVarProvider::new().configuration_choices(&status);

        let ids: Vec<&str> = choices.iter().map(|c| c.option_id.as_str()).collect();
        assert_eq!(ids, vec!["default", "variables"]);
        assert!(choices[0].is_default);
        assert_eq!(choices[0].label, "Use default 'localhost'");
    }

    #[test]
    fn encrypted_choice_is_secret() {
        let fixture = Fixture::new();
        let status = fixture.check(&Requirement::env_var("API_SECRET"));
        let choices = EnvVarProvider::new().configuration_choices(&status);
        assert_eq!(choices.len(), 1);
        assert!(choices[0].accepts_value);
        assert!(choices[0].secret);
        assert!(choices[0].is_default);
    }

    #[test]
    fn unprovide_never_deletes() {
        let mut fixture = Fixture::new();
        fixture.local_state.set_value("FOO", "stored");
        let status = fixture.check(&Requirement::env_var("FOO"));
        let environ = fixture.environ.clone();
        let mut ctx = UnprovideContext {
            environ: &environ,
            local_state: &mut fixture.local_state,
            secrets: &fixture.secrets,
            project_dir: fixture.temp.path(),
        };
        let outcome = EnvVarProvider::new().unprovide(&mut ctx, &status);

        assert!(outcome.is_success());
        assert_eq!(outcome.description, "Nothing to clean up for FOO.");
        assert!(outcome.logs.is_empty());
        assert_eq!(fixture.local_state.get_value("FOO"), Some("stored"));
    }
}

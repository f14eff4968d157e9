//! High-level project operations.
//!
//! These sit on top of the engine and the local state the providers use,
//! so values set here are picked up by the next prepare.

use std::fs;

use crate::prepare::{PrepareEngine, PrepareResult};
use crate::project::Project;
use crate::providers::EnvironmentManager;
use crate::requirements::{RequirementKind, Status};
use crate::secrets::{project_scope, SecretStore};
use crate::state::LocalStateFile;

/// Directories under the project that prepare creates.
const GENERATED_DIRS: &[&str] = &["services", "envs"];

fn unknown_variables<'a>(project: &Project, names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .filter(|name| {
            !matches!(
                project.find_requirement(name).map(|r| &r.kind),
                Some(RequirementKind::EnvVar)
            )
        })
        .map(|name| format!("Variable {} does not exist in the project.", name))
        .collect()
}

/// Store values for variables the project declares.
///
/// Encrypted variables go to the secret store, the rest to local state.
pub fn set_variables(
    project: &Project,
    secrets: &dyn SecretStore,
    values: &[(String, String)],
) -> Status {
    let errors = unknown_variables(project, values.iter().map(|(name, _)| name.as_str()));
    if !errors.is_empty() {
        return Status::failure("Could not set variables.").with_errors(errors);
    }

    let mut local_state = match LocalStateFile::load_for_directory(project.directory()) {
        Ok(state) => state,
        Err(e) => return Status::failure("Could not set variables.").with_errors(vec![e.to_string()]),
    };
    let scope = project_scope(project.directory());
    let mut errors = Vec::new();
    for (name, value) in values {
        let encrypted = project
            .find_requirement(name)
            .is_some_and(|r| r.encrypted);
        if encrypted {
            if let Err(e) = secrets.set(&scope, name, value) {
                errors.push(format!("Failed to save {}: {}", name, e));
            }
        } else {
            local_state.set_value(name, value);
        }
    }
    if let Err(e) = local_state.save() {
        errors.push(e.to_string());
    }

    if errors.is_empty() {
        Status::success("Variables set.")
    } else {
        Status::failure("Could not set variables.").with_errors(errors)
    }
}

/// Forget stored values for variables the project declares.
pub fn unset_variables(project: &Project, secrets: &dyn SecretStore, names: &[String]) -> Status {
    let errors = unknown_variables(project, names.iter().map(String::as_str));
    if !errors.is_empty() {
        return Status::failure("Could not unset variables.").with_errors(errors);
    }

    let mut local_state = match LocalStateFile::load_for_directory(project.directory()) {
        Ok(state) => state,
        Err(e) => {
            return Status::failure("Could not unset variables.").with_errors(vec![e.to_string()])
        }
    };
    let scope = project_scope(project.directory());
    let mut errors = Vec::new();
    for name in names {
        let encrypted = project
            .find_requirement(name)
            .is_some_and(|r| r.encrypted);
        if encrypted {
            if let Err(e) = secrets.unset(&scope, name) {
                errors.push(format!("Failed to forget {}: {}", name, e));
            }
        } else {
            local_state.unset_value(name);
        }
    }
    if let Err(e) = local_state.save() {
        errors.push(e.to_string());
    }

    if errors.is_empty() {
        Status::success("Variables unset.")
    } else {
        Status::failure("Could not unset variables.").with_errors(errors)
    }
}

/// Remove packages from the project-owned environment of an env spec.
pub fn remove_packages(
    project: &Project,
    manager: &dyn EnvironmentManager,
    env_spec_name: Option<&str>,
    packages: &[String],
) -> Status {
    let name = env_spec_name.unwrap_or_else(|| project.default_env_spec_name());
    let Some(spec) = project.env_spec(name) else {
        return Status::failure(format!(
            "Environment spec name '{}' is not in {}.",
            name,
            project.file_path().display()
        ));
    };
    let prefix = spec.path(project.directory());
    if !prefix.exists() {
        return Status::success(format!(
            "Environment {} doesn't exist, so there is nothing to remove.",
            prefix.display()
        ));
    }

    tracing::info!("Removing {} from {}", packages.join(", "), prefix.display());
    match manager.remove_packages(&prefix, packages) {
        Ok(()) => {
            let message = format!(
                "Removed {} from {}.",
                packages.join(", "),
                prefix.display()
            );
            Status::success(message.clone()).with_logs(vec![message])
        }
        Err(e) => Status::failure(format!("Failed to remove packages: {}", e))
            .with_errors(vec![format!("{:#}", e)]),
    }
}

/// Unprepare and delete everything prepare generated in the project directory.
pub fn clean(engine: &PrepareEngine, project: &Project, result: &PrepareResult) -> Status {
    let status = engine.unprepare(project, result, None);
    let mut logs = status.logs.clone();
    let mut errors = status.errors.clone();
    if !status.success && errors.is_empty() {
        errors.push(status.description.clone());
    }

    for dir in GENERATED_DIRS {
        let path = project.directory().join(dir);
        if !path.exists() {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => logs.push(format!("Removed {}.", path.display())),
            Err(e) => errors.push(format!("Failed to remove {}: {}.", path.display(), e)),
        }
    }

    if errors.is_empty() {
        Status::success("Cleaned.").with_logs(logs)
    } else {
        Status::failure("Failed to clean everything up.")
            .with_logs(logs)
            .with_errors(errors)
    }
}

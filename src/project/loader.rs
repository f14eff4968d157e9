//! Reading `project.yml`.
//!
//! Loading never fails outright. Anything wrong with the file is recorded as
//! a problem on the returned [`Project`], and a project with problems is
//! refused by the engine with those problems as its errors.

use serde_json::Value;
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use super::{Project, ProjectCommand};
use crate::providers::ProviderRegistry;
use crate::requirements::{Checksum, DownloadSpec, EnvSpec, HashAlgorithm, Requirement};

/// Name of the project file inside a project directory.
pub const PROJECT_FILENAME: &str = "project.yml";

/// Load the project in `directory`.
///
/// A missing project file gives an empty project with no problems.
pub fn load(directory: &Path, registry: &ProviderRegistry) -> Project {
    let project = Project::new(directory);
    let path = project.file_path();
    let mut loader = Loader {
        filename: path.to_string_lossy().to_string(),
        project,
        seen: HashSet::new(),
    };

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {} in {}", PROJECT_FILENAME, directory.display());
            return loader.project;
        }
        Err(e) => {
            let problem = format!("{}: could not read file: {}", loader.filename, e);
            return loader.project.with_problem(problem);
        }
    };

    let root = match serde_yaml::from_str::<Yaml>(&content) {
        Ok(Yaml::Null) => Mapping::new(),
        Ok(Yaml::Mapping(map)) => map,
        Ok(other) => {
            let problem = format!(
                "{}: project file should be a dictionary, not {}",
                loader.filename,
                render(&other)
            );
            return loader.project.with_problem(problem);
        }
        Err(e) => {
            let problem = format!(
                "{} has a syntax error that needs to be fixed by hand: {}",
                loader.filename, e
            );
            return loader.project.with_problem(problem);
        }
    };

    loader.read_name(&root);
    loader.read_env_specs(&root);
    loader.read_variables(&root);
    loader.read_downloads(&root, registry);
    loader.read_services(&root, registry);
    loader.read_commands(&root);

    tracing::debug!(
        "Loaded {} with {} problem(s)",
        loader.filename,
        loader.project.problems.len()
    );
    loader.project
}

struct Loader {
    filename: String,
    project: Project,
    seen: HashSet<String>,
}

fn get<'a>(map: &'a Mapping, key: &str) -> Option<&'a Yaml> {
    map.get(Yaml::String(key.to_string()))
}

fn to_json(value: &Yaml) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Render a YAML value for a problem message.
fn render(value: &Yaml) -> String {
    serde_json::to_string(&to_json(value)).unwrap_or_else(|_| format!("{:?}", value))
}

fn key_string(key: &Yaml) -> Option<String> {
    match key {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn string_list(value: Option<&Yaml>) -> Vec<String> {
    match value {
        Some(Yaml::Sequence(items)) => items
            .iter()
            .filter_map(|item| match item {
                Yaml::String(s) => Some(s.clone()),
                Yaml::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn merge_unique(into: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

impl Loader {
    fn problem(&mut self, message: String) {
        tracing::debug!("Project problem: {}", message);
        self.project.problems.push(message);
    }

    /// Track a variable name, reporting duplicates.
    fn claim(&mut self, name: &str) -> bool {
        if self.seen.insert(name.to_string()) {
            true
        } else {
            self.problem(format!("Variable {} is declared more than once.", name));
            false
        }
    }

    fn read_name(&mut self, root: &Mapping) {
        match get(root, "name") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::String(name)) => self.project.name = name.clone(),
            Some(other) => {
                let problem = format!(
                    "{}: name: field should have a string value not {}",
                    self.filename,
                    render(other)
                );
                self.problem(problem);
            }
        }
        if let Some(Yaml::String(description)) = get(root, "description") {
            self.project.description = Some(description.clone());
        }
    }

    fn read_env_specs(&mut self, root: &Mapping) {
        let global_packages = string_list(get(root, "packages"));
        let global_channels = string_list(get(root, "channels"));

        let mut specs = Vec::new();
        match get(root, "env_specs") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::Mapping(map)) => {
                for (key, attrs) in map {
                    let Some(name) = key_string(key) else {
                        continue;
                    };
                    if name.trim().is_empty() {
                        self.problem(format!(
                            "Environment spec name cannot be empty string, found: '{}' as name",
                            name
                        ));
                        continue;
                    }
                    let mut spec = EnvSpec::named(&name);
                    if let Yaml::Mapping(attrs) = attrs {
                        spec.packages = string_list(get(attrs, "packages"));
                        spec.channels = string_list(get(attrs, "channels"));
                        match get(attrs, "description") {
                            None | Some(Yaml::Null) => {}
                            Some(Yaml::String(d)) => spec.description = Some(d.clone()),
                            Some(_) => {
                                let problem = format!(
                                    "{}: 'description' field of environment {} must be a string",
                                    self.filename, name
                                );
                                self.problem(problem);
                            }
                        }
                    }
                    specs.push(spec);
                }
            }
            Some(other) => {
                let problem = format!(
                    "{}: 'env_specs:' section should be a dictionary from environment name to environment attributes, not {}",
                    self.filename,
                    render(other)
                );
                self.problem(problem);
            }
        }

        if specs.is_empty() {
            specs.push(EnvSpec::named("default"));
        }
        for spec in &mut specs {
            merge_unique(&mut spec.packages, &global_packages);
            merge_unique(&mut spec.channels, &global_channels);
        }
        self.project.env_specs = specs;
    }

    fn read_variables(&mut self, root: &Mapping) {
        match get(root, "variables") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::Sequence(names)) => {
                for item in names {
                    match key_string(item) {
                        Some(name) => self.add_variable(&name, &Yaml::Null),
                        None => {
                            let problem = format!(
                                "variables section contains wrong value type {}, should be dict or list of requirements",
                                render(item)
                            );
                            self.problem(problem);
                        }
                    }
                }
            }
            Some(Yaml::Mapping(map)) => {
                for (key, attrs) in map {
                    if let Some(name) = key_string(key) {
                        self.add_variable(&name, attrs);
                    }
                }
            }
            Some(other) => {
                let problem = format!(
                    "variables section contains wrong value type {}, should be dict or list of requirements",
                    render(other)
                );
                self.problem(problem);
            }
        }
    }

    fn add_variable(&mut self, name: &str, attrs: &Yaml) {
        if name.trim().is_empty() {
            self.problem(format!(
                "Variable name cannot be empty string, found: '{}' as name",
                name
            ));
            return;
        }

        let mut requirement = Requirement::env_var(name);
        let default = match attrs {
            Yaml::Mapping(options) => {
                for (key, value) in options {
                    let Some(key) = key_string(key) else {
                        continue;
                    };
                    if key == "encrypted" {
                        if let Yaml::Bool(encrypted) = value {
                            requirement.encrypted = *encrypted;
                        }
                    } else if key != "default" {
                        requirement.options.insert(key, to_json(value));
                    }
                }
                get(options, "default").cloned()
            }
            scalar => Some(scalar.clone()),
        };

        match default {
            None | Some(Yaml::Null) => {}
            Some(value @ (Yaml::String(_) | Yaml::Number(_))) => {
                requirement.options.insert("default".to_string(), to_json(&value));
            }
            Some(other) => {
                self.problem(format!(
                    "default value for variable {} must be null, a string, or a number, not {}.",
                    name,
                    render(&other)
                ));
                return;
            }
        }

        if self.claim(name) {
            self.project.requirements.push(requirement);
        }
    }

    fn read_downloads(&mut self, root: &Mapping, _registry: &ProviderRegistry) {
        let map = match get(root, "downloads") {
            None | Some(Yaml::Null) => return,
            Some(Yaml::Mapping(map)) => map,
            Some(other) => {
                let problem = format!(
                    "{}: 'downloads:' section should be a dictionary, found {}",
                    self.filename,
                    render(other)
                );
                self.problem(problem);
                return;
            }
        };

        for (key, item) in map {
            let Some(name) = key_string(key) else {
                continue;
            };
            if let Some(requirement) = self.parse_download(&name, item) {
                if self.claim(&name) {
                    self.project.requirements.push(requirement);
                }
            }
        }
    }

    fn parse_download(&mut self, name: &str, item: &Yaml) -> Option<Requirement> {
        let attrs = match item {
            Yaml::String(url) => {
                return Some(Requirement::download(name, DownloadSpec::from_url(url)));
            }
            Yaml::Mapping(attrs) => attrs,
            _ => {
                self.problem(format!(
                    "Download name {} should be followed by a URL string or a dictionary describing the download.",
                    name
                ));
                return None;
            }
        };

        let url = match get(attrs, "url") {
            Some(Yaml::String(url)) if url.trim().is_empty() => {
                self.problem(format!("Download item {} has an empty 'url' field.", name));
                return None;
            }
            Some(Yaml::String(url)) => url.clone(),
            _ => {
                self.problem(format!(
                    "Download item {} doesn't contain a 'url' field.",
                    name
                ));
                return None;
            }
        };

        let mut spec = DownloadSpec::from_url(&url);

        let mut checksum: Option<Checksum> = None;
        for algorithm in HashAlgorithm::ALL {
            let Some(Yaml::String(value)) = get(attrs, algorithm.name()) else {
                continue;
            };
            if let Some(existing) = &checksum {
                self.problem(format!(
                    "Multiple checksums for download {}: {} and {}.",
                    name, existing.algorithm, algorithm
                ));
                return None;
            }
            checksum = Some(Checksum {
                algorithm,
                value: value.to_lowercase(),
            });
        }
        spec.checksum = checksum;

        if let Some(Yaml::Bool(unzip)) = get(attrs, "unzip") {
            spec.unzip = *unzip;
            if get(attrs, "filename").is_none() {
                spec.filename = crate::requirements::default_filename(&url, *unzip);
            }
        }
        if let Some(Yaml::String(filename)) = get(attrs, "filename") {
            spec.filename = filename.clone();
        }

        let mut requirement = Requirement::download(name, spec);
        if let Some(Yaml::String(description)) = get(attrs, "description") {
            requirement = requirement.with_option("description", description.as_str());
        }
        Some(requirement)
    }

    fn read_services(&mut self, root: &Mapping, registry: &ProviderRegistry) {
        let map = match get(root, "services") {
            None | Some(Yaml::Null) => return,
            Some(Yaml::Mapping(map)) => map,
            Some(other) => {
                let problem = format!(
                    "{}: 'services:' section should be a dictionary from environment variable to service type, found {}",
                    self.filename,
                    render(other)
                );
                self.problem(problem);
                return;
            }
        };

        for (key, item) in map {
            let Some(name) = key_string(key) else {
                continue;
            };
            let (type_name, description) = match item {
                Yaml::String(type_name) => (type_name.clone(), None),
                Yaml::Mapping(attrs) => match get(attrs, "type") {
                    Some(Yaml::String(type_name)) => (
                        type_name.clone(),
                        get(attrs, "description").and_then(Yaml::as_str),
                    ),
                    _ => {
                        self.problem(format!(
                            "Service {} doesn't contain a 'type' field.",
                            name
                        ));
                        continue;
                    }
                },
                other => {
                    self.problem(format!(
                        "Service {} should have a service type string or a dictionary as its value, not {}.",
                        name,
                        render(other)
                    ));
                    continue;
                }
            };

            let Some(service_type) = registry.service_type(&type_name) else {
                self.problem(format!(
                    "Service {} has an unknown type '{}'.",
                    name, type_name
                ));
                continue;
            };

            let mut requirement = Requirement::service(&name, service_type.clone());
            if let Some(description) = description {
                requirement = requirement.with_option("description", description);
            }
            if self.claim(&name) {
                self.project.requirements.push(requirement);
            }
        }
    }

    fn read_commands(&mut self, root: &Mapping) {
        let map = match get(root, "commands") {
            None | Some(Yaml::Null) => return,
            Some(Yaml::Mapping(map)) => map,
            Some(other) => {
                let problem = format!(
                    "{}: 'commands:' section should be a dictionary from command names to attributes, not {}",
                    self.filename,
                    render(other)
                );
                self.problem(problem);
                return;
            }
        };

        for (key, attrs) in map {
            let Some(name) = key_string(key) else {
                continue;
            };
            let Yaml::Mapping(attrs) = attrs else {
                let problem = format!(
                    "{}: command name '{}' should be followed by a dictionary of attributes not {}",
                    self.filename,
                    name,
                    render(attrs)
                );
                self.problem(problem);
                continue;
            };
            if let Some(command) = self.parse_command(&name, attrs) {
                self.project.commands.insert(name, command);
            }
        }
    }

    fn parse_command(&mut self, name: &str, attrs: &Mapping) -> Option<ProjectCommand> {
        let mut command = if let Some(Yaml::String(line)) = get(attrs, "unix") {
            ProjectCommand::unix(name, line)
        } else if let Some(Yaml::String(line)) = get(attrs, "app_entry") {
            ProjectCommand::app_entry(name, line)
        } else {
            let problem = format!(
                "{}: command '{}' does not have a command line in it",
                self.filename, name
            );
            self.problem(problem);
            return None;
        };

        match get(attrs, "description") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::String(description)) => command.description = Some(description.clone()),
            Some(_) => {
                let problem = format!(
                    "{}: 'description' field of command {} must be a string",
                    self.filename, name
                );
                self.problem(problem);
                return None;
            }
        }

        match get(attrs, "env_spec") {
            None | Some(Yaml::Null) => {}
            Some(Yaml::String(env_spec)) => {
                if self.project.env_spec(env_spec).is_none() {
                    let problem = format!(
                        "{}: env_spec '{}' for command '{}' does not appear in the env_specs section",
                        self.filename, env_spec, name
                    );
                    self.problem(problem);
                    return None;
                }
                command.env_spec = Some(env_spec.clone());
            }
            Some(_) => {
                let problem = format!(
                    "{}: 'env_spec' field of command {} must be a string (an environment spec name)",
                    self.filename, name
                );
                self.problem(problem);
                return None;
            }
        }

        Some(command)
    }
}

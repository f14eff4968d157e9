//! Requirement definitions.
//!
//! A [`Requirement`] is an inert description of one precondition a project
//! needs before it can run. It never changes after the project is loaded;
//! all evaluation happens in providers.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::environ::ENV_PREFIX_VAR;

/// Suffixes that mark a variable as a secret unless configured otherwise.
const ENCRYPTED_SUFFIXES: &[&str] = &["_PASSWORD", "_SECRET", "_SECRET_KEY"];

/// One precondition of a project.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    /// Environment variable this requirement provides.
    pub env_var: String,
    /// What kind of requirement this is.
    pub kind: RequirementKind,
    /// Free-form options from the project file (`default`, `description`, ...).
    pub options: BTreeMap<String, Value>,
    /// Whether the value must be kept out of on-disk state.
    pub encrypted: bool,
}

/// The closed set of requirement kinds.
///
/// Providers are looked up by [`RequirementKind::name`]; `Custom` kinds only
/// work when a provider for that name has been registered.
#[derive(Debug, Clone, PartialEq)]
pub enum RequirementKind {
    /// A plain environment variable.
    EnvVar,
    /// The project's package environment. Exactly one per project.
    EnvSpec(EnvSpec),
    /// A file fetched from a URL.
    Download(DownloadSpec),
    /// A running background service.
    Service(ServiceSpec),
    /// An extension kind handled by a registered provider.
    Custom(String),
}

impl RequirementKind {
    /// Kind name used for provider dispatch.
    pub fn name(&self) -> &str {
        match self {
            RequirementKind::EnvVar => "env_var",
            RequirementKind::EnvSpec(_) => "env_spec",
            RequirementKind::Download(_) => "download",
            RequirementKind::Service(_) => "service",
            RequirementKind::Custom(name) => name,
        }
    }
}

/// A named package environment specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvSpec {
    pub name: String,
    pub packages: Vec<String>,
    pub channels: Vec<String>,
    pub description: Option<String>,
}

impl EnvSpec {
    /// Create an env spec with no packages.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Location of the project-owned environment for this spec.
    pub fn path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join("envs").join(&self.name)
    }

    /// Package names with any version constraint stripped.
    pub fn package_names(&self) -> Vec<String> {
        self.packages
            .iter()
            .map(|spec| package_name(spec).to_string())
            .collect()
    }
}

/// Extract the bare package name from a spec like `numpy>=1.2` or `python=3.11`.
pub fn package_name(spec: &str) -> &str {
    let end = spec
        .find(|c: char| c == '=' || c == '<' || c == '>' || c == '!' || c == ' ' || c == '[')
        .unwrap_or(spec.len());
    &spec[..end]
}

/// Supported checksum algorithms for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Every algorithm, in the order the project file keys are checked.
    pub const ALL: [HashAlgorithm; 6] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    /// Project-file key for this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Parse a project-file key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|alg| alg.name() == name)
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Expected checksum of a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

/// A file fetched from a URL into the project directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSpec {
    pub url: String,
    /// Path relative to the project directory.
    pub filename: String,
    pub checksum: Option<Checksum>,
    /// Extract the fetched archive into a directory named `filename`.
    pub unzip: bool,
}

impl DownloadSpec {
    /// Build a spec with the defaults the project file applies.
    ///
    /// A URL ending in `.zip` is unzipped by default, and the default
    /// filename drops the `.zip` suffix.
    pub fn from_url(url: &str) -> Self {
        let unzip = url_path(url).to_lowercase().ends_with(".zip");
        Self {
            url: url.to_string(),
            filename: default_filename(url, unzip),
            checksum: None,
            unzip,
        }
    }
}

/// The path part of `url`, without scheme, host, query or fragment.
fn url_path(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    match without_query.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |start| &rest[start..]),
        None => without_query,
    }
}

/// Filename derived from the last URL path segment.
///
/// A URL whose path ends in `/` (or has no path) gives `download`.
pub fn default_filename(url: &str, unzip: bool) -> String {
    let path = url_path(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let name = if last.is_empty() { "download" } else { last };
    if unzip && name.to_lowercase().ends_with(".zip") && name.len() > 4 {
        name[..name.len() - 4].to_string()
    } else {
        name.to_string()
    }
}

/// How to find or start one type of background service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceType {
    /// Type name used in the project file (e.g. `redis`).
    pub name: String,
    /// Human-readable name (e.g. `Redis`).
    pub title: String,
    /// Variable used when the project file doesn't name one.
    pub default_variable: String,
    /// Port a system-wide instance usually listens on.
    pub default_port: u16,
    /// Ports tried when starting a project-owned instance.
    pub port_range: (u16, u16),
    /// Command that starts an instance; `{port}` and `{dir}` are expanded.
    pub start_command: Vec<String>,
    /// Command that stops an instance; `{port}` and `{dir}` are expanded.
    pub stop_command: Vec<String>,
    /// URL handed to the project; `{port}` is expanded.
    pub url_template: String,
}

impl ServiceType {
    /// The built-in Redis service type.
    pub fn redis() -> Self {
        Self {
            name: "redis".to_string(),
            title: "Redis".to_string(),
            default_variable: "REDIS_URL".to_string(),
            default_port: 6379,
            port_range: (6380, 6449),
            start_command: vec![
                "redis-server".to_string(),
                "--port".to_string(),
                "{port}".to_string(),
                "--daemonize".to_string(),
                "yes".to_string(),
                "--pidfile".to_string(),
                "{dir}/redis.pid".to_string(),
                "--logfile".to_string(),
                "{dir}/redis.log".to_string(),
                "--dir".to_string(),
                "{dir}".to_string(),
            ],
            stop_command: vec![
                "redis-cli".to_string(),
                "-p".to_string(),
                "{port}".to_string(),
                "shutdown".to_string(),
            ],
            url_template: "redis://localhost:{port}".to_string(),
        }
    }

    /// URL for an instance on the given port.
    pub fn url_for_port(&self, port: u16) -> String {
        self.url_template.replace("{port}", &port.to_string())
    }
}

/// A background service the project talks to.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub service_type: ServiceType,
}

impl Requirement {
    /// Create a plain environment variable requirement.
    ///
    /// Names ending in `_PASSWORD`, `_SECRET` or `_SECRET_KEY` are encrypted.
    pub fn env_var(name: &str) -> Self {
        Self {
            env_var: name.to_string(),
            kind: RequirementKind::EnvVar,
            options: BTreeMap::new(),
            encrypted: ENCRYPTED_SUFFIXES
                .iter()
                .any(|suffix| name.ends_with(suffix)),
        }
    }

    /// Create the environment-readiness requirement for an env spec.
    pub fn env_spec(spec: EnvSpec) -> Self {
        Self {
            env_var: ENV_PREFIX_VAR.to_string(),
            kind: RequirementKind::EnvSpec(spec),
            options: BTreeMap::new(),
            encrypted: false,
        }
    }

    /// Create a download requirement.
    pub fn download(name: &str, spec: DownloadSpec) -> Self {
        Self {
            env_var: name.to_string(),
            kind: RequirementKind::Download(spec),
            options: BTreeMap::new(),
            encrypted: false,
        }
    }

    /// Create a service requirement.
    pub fn service(name: &str, service_type: ServiceType) -> Self {
        Self {
            env_var: name.to_string(),
            kind: RequirementKind::Service(ServiceSpec { service_type }),
            options: BTreeMap::new(),
            encrypted: false,
        }
    }

    /// Create a requirement of an extension kind.
    pub fn custom(kind: &str, name: &str) -> Self {
        Self {
            env_var: name.to_string(),
            kind: RequirementKind::Custom(kind.to_string()),
            options: BTreeMap::new(),
            encrypted: false,
        }
    }

    /// Attach an option.
    pub fn with_option(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Override the encrypted flag.
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Kind name used for provider dispatch.
    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }

    /// Whether this is the environment-readiness requirement.
    pub fn is_env_spec(&self) -> bool {
        matches!(self.kind, RequirementKind::EnvSpec(_))
    }

    /// The `default` option rendered as a string, if any.
    pub fn default_value(&self) -> Option<String> {
        match self.options.get("default")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The `description` option, if any.
    pub fn description(&self) -> Option<&str> {
        self.options.get("description").and_then(Value::as_str)
    }

    /// One-sentence explanation of what this requirement needs.
    pub fn title(&self) -> String {
        if let Some(description) = self.description() {
            return description.to_string();
        }
        match &self.kind {
            RequirementKind::EnvVar => {
                format!("{} environment variable must be set.", self.env_var)
            }
            RequirementKind::EnvSpec(spec) => {
                format!("A Conda environment for env spec '{}'.", spec.name)
            }
            RequirementKind::Download(_) => {
                format!("A downloaded file which is referenced by {}.", self.env_var)
            }
            RequirementKind::Service(spec) => format!(
                "A running {} service, located by {}.",
                spec.service_type.title, self.env_var
            ),
            RequirementKind::Custom(kind) => {
                format!("{} must be provided by the {} provider.", self.env_var, kind)
            }
        }
    }
}

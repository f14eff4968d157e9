//! Provider for background services such as Redis.
//!
//! A service is satisfied by a URL in the environment, by a system-wide
//! instance on the type's default port, or by an instance this project
//! started itself. Project-owned instances are recorded in the local state
//! so `unprovide` knows how to stop them.

use anyhow::{bail, Context};
use chrono::Utc;
use serde_json::{json, Value};
use std::fs;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{ConfigChoice, ProvideContext, Provider, StatusContext, UnprovideContext};
use crate::requirements::{
    Requirement, RequirementKind, RequirementStatus, ServiceType, Status,
};
use crate::state::{LocalStateFile, RunState};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether something accepts TCP connections on `localhost:port`.
fn port_is_open(port: u16) -> bool {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).is_ok()
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

fn expand(template: &[String], port: u16, dir: &Path) -> Vec<String> {
    let dir = dir.to_string_lossy();
    template
        .iter()
        .map(|arg| arg.replace("{port}", &port.to_string()).replace("{dir}", &dir))
        .collect()
}

fn run_command(args: &[String]) -> anyhow::Result<()> {
    let Some((program, rest)) = args.split_first() else {
        bail!("empty command");
    };
    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to run {}", program))?;
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// The recorded project-owned instance, if any.
fn recorded_port(run_state: &RunState) -> Option<u16> {
    run_state
        .get("port")
        .and_then(Value::as_u64)
        .and_then(|p| u16::try_from(p).ok())
}

/// Finds or starts services.
#[derive(Debug, Default)]
pub struct ServiceProvider;

impl ServiceProvider {
    pub fn new() -> Self {
        Self
    }

    fn service_type(requirement: &Requirement) -> Option<&ServiceType> {
        match &requirement.kind {
            RequirementKind::Service(spec) => Some(&spec.service_type),
            _ => None,
        }
    }

    /// Start a project-owned instance and record it.
    fn start(
        service: &ServiceType,
        env_var: &str,
        local_state: &mut LocalStateFile,
        project_dir: &Path,
    ) -> anyhow::Result<(u16, String)> {
        let (low, high) = service.port_range;
        let port = (low..=high)
            .find(|p| port_is_free(*p))
            .with_context(|| format!("No free port for {} in {}-{}", service.title, low, high))?;

        let dir = project_dir.join("services").join(env_var);
        fs::create_dir_all(&dir)?;

        tracing::info!("Starting {} on port {}", service.title, port);
        run_command(&expand(&service.start_command, port, &dir))
            .with_context(|| format!("Failed to start {}", service.title))?;

        let deadline = Instant::now() + STARTUP_TIMEOUT;
        while !port_is_open(port) {
            if Instant::now() >= deadline {
                bail!("{} did not start listening on port {}", service.title, port);
            }
            thread::sleep(Duration::from_millis(100));
        }

        let url = service.url_for_port(port);
        let mut run_state = RunState::new();
        run_state.insert("port".to_string(), json!(port));
        run_state.insert("url".to_string(), json!(url));
        run_state.insert(
            "shutdown_commands".to_string(),
            json!([expand(&service.stop_command, port, &dir)]),
        );
        run_state.insert("started_at".to_string(), json!(Utc::now().to_rfc3339()));
        local_state.set_service_run_state(env_var, run_state);

        Ok((port, url))
    }
}

impl Provider for ServiceProvider {
    fn kind(&self) -> &str {
        "service"
    }

    fn check_status(
        &self,
        requirement: &Requirement,
        ctx: &StatusContext<'_>,
    ) -> RequirementStatus {
        let Some(service) = Self::service_type(requirement) else {
            return RequirementStatus::unsatisfied(requirement, "Not a service requirement.");
        };
        let name = &requirement.env_var;
        let in_environ = ctx.environ.get(name).filter(|v| !v.is_empty());
        let analysis = json!({
            "title": service.title,
            "in_environ": in_environ.is_some(),
        });

        if let Some(url) = in_environ {
            return RequirementStatus::satisfied(
                requirement,
                format!("Using {} at {}.", service.title, url),
            )
            .with_analysis(analysis);
        }

        let run_state = ctx.local_state.get_service_run_state(name);
        if let Some(port) = recorded_port(&run_state).filter(|p| port_is_open(*p)) {
            return RequirementStatus::satisfied(
                requirement,
                format!("{} started by this project is running on port {}.", service.title, port),
            )
            .with_analysis(analysis);
        }

        RequirementStatus::unsatisfied(requirement, requirement.title()).with_analysis(analysis)
    }

    fn configuration_choices(&self, status: &RequirementStatus) -> Vec<ConfigChoice> {
        let title = status.analysis["title"].as_str().unwrap_or("service");
        let mut choices = vec![
            ConfigChoice::new(
                "find_all",
                format!("Use an existing {} if one is running, else start one", title),
            )
            .default_selected(true),
            ConfigChoice::new("find_local", format!("Always start a dedicated {}", title)),
        ];
        if status.analysis["in_environ"].as_bool().unwrap_or(false) {
            choices.push(ConfigChoice::new(
                "environ",
                format!("Use the {} from the environment", status.env_var()),
            ));
        }
        choices.push(ConfigChoice::new("variables", "Use this URL:").with_value(false));
        choices
    }

    fn provide(
        &self,
        ctx: &mut ProvideContext<'_>,
        status: &RequirementStatus,
    ) -> RequirementStatus {
        let requirement = &status.requirement;
        let Some(service) = Self::service_type(requirement) else {
            return status.clone();
        };
        let name = requirement.env_var.as_str();

        if ctx.environ.get(name).is_some_and(|v| !v.is_empty()) {
            return self.check_status(requirement, &ctx.status_context());
        }

        let option = ctx.overrides.option_for(name).unwrap_or("find_all");
        let mut logs = Vec::new();
        let mut errors = Vec::new();

        if option == "variables" {
            if let Some(url) = ctx.overrides.value_for(name) {
                ctx.environ.insert(name.to_string(), url.to_string());
            }
            return self.check_status(requirement, &ctx.status_context());
        }
        if option == "environ" {
            return self.check_status(requirement, &ctx.status_context());
        }

        let run_state = ctx.local_state.get_service_run_state(name);
        if let Some(port) = recorded_port(&run_state).filter(|p| port_is_open(*p)) {
            ctx.environ
                .insert(name.to_string(), service.url_for_port(port));
            return self.check_status(requirement, &ctx.status_context());
        }

        if option == "find_all" && port_is_open(service.default_port) {
            logs.push(format!(
                "Using system {} on port {}.",
                service.title, service.default_port
            ));
            ctx.environ
                .insert(name.to_string(), service.url_for_port(service.default_port));
        } else if ctx.mode.provides() {
            match Self::start(service, name, ctx.local_state, ctx.project_dir) {
                Ok((port, url)) => {
                    logs.push(format!("Started {} on port {}.", service.title, port));
                    ctx.environ.insert(name.to_string(), url);
                }
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    errors.push(format!("{:#}", e));
                }
            }
        }

        self.check_status(requirement, &ctx.status_context())
            .with_errors(errors)
            .with_logs(logs)
    }

    fn unprovide(&self, ctx: &mut UnprovideContext<'_>, status: &RequirementStatus) -> Status {
        let requirement = &status.requirement;
        let title = Self::service_type(requirement)
            .map(|s| s.title.clone())
            .unwrap_or_else(|| "service".to_string());
        let name = requirement.env_var.as_str();
        let run_state = ctx.local_state.get_service_run_state(name);

        let commands: Vec<Vec<String>> = run_state
            .get("shutdown_commands")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        if commands.is_empty() {
            let message = format!(
                "No need to stop {}, it wasn't started by this project.",
                name
            );
            return Status::success(message.clone()).with_logs(vec![message]);
        }

        let port = recorded_port(&run_state).unwrap_or_default();
        for command in &commands {
            if let Err(e) = run_command(command) {
                let message = format!("Failed to stop {} on port {}: {:#}", title, port, e);
                return Status::failure(message.clone()).with_errors(vec![message]);
            }
        }

        ctx.local_state.clear_service_run_state(name);
        let message = format!("Stopped {} on port {}.", title, port);
        Status::success(message.clone()).with_logs(vec![message])
    }
}

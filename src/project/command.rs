//! Runnable project commands.

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use crate::environ::{Environ, ENV_PREFIX_VAR};

/// How a command's line is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Run through `sh -c`.
    Unix(String),
    /// Split into words; the program is looked up in the environment first.
    AppEntry(String),
}

/// A command declared by the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCommand {
    pub name: String,
    pub command_line: CommandLine,
    /// Env spec this command runs in, if not the default.
    pub env_spec: Option<String>,
    pub description: Option<String>,
}

/// Everything needed to launch a prepared command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecInfo {
    /// Program and arguments; for shell commands a single command line.
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Environ,
    pub shell: bool,
}

static TEMPLATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(PREFIX|PROJECT_DIR)\}").expect("valid regex"));

/// Replace `${PREFIX}` and `${PROJECT_DIR}`.
fn expand_templates(text: &str, prefix: &str, project_dir: &str) -> String {
    TEMPLATE_REGEX
        .replace_all(text, |caps: &Captures<'_>| match &caps[1] {
            "PREFIX" => prefix.to_string(),
            _ => project_dir.to_string(),
        })
        .into_owned()
}

impl ProjectCommand {
    /// A shell command.
    pub fn unix(name: &str, line: &str) -> Self {
        Self {
            name: name.to_string(),
            command_line: CommandLine::Unix(line.to_string()),
            env_spec: None,
            description: None,
        }
    }

    /// An app-entry command.
    pub fn app_entry(name: &str, line: &str) -> Self {
        Self {
            name: name.to_string(),
            command_line: CommandLine::AppEntry(line.to_string()),
            env_spec: None,
            description: None,
        }
    }

    /// Run in a specific env spec.
    pub fn with_env_spec(mut self, env_spec: &str) -> Self {
        self.env_spec = Some(env_spec.to_string());
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Build launch info from a prepared environ.
    pub fn exec_info(
        &self,
        project_dir: &Path,
        environ: &Environ,
        extra_args: &[String],
    ) -> Result<CommandExecInfo, String> {
        let prefix = environ.get(ENV_PREFIX_VAR).cloned().unwrap_or_default();
        let dir = project_dir.to_string_lossy();

        let (args, shell) = match &self.command_line {
            CommandLine::Unix(line) => {
                let mut line = expand_templates(line, &prefix, &dir);
                if !extra_args.is_empty() {
                    line.push(' ');
                    line.push_str(&shell_words::join(extra_args));
                }
                (vec![line], true)
            }
            CommandLine::AppEntry(line) => {
                let mut words: Vec<String> = shell_words::split(line)
                    .map_err(|e| format!("Could not parse command '{}': {}", self.name, e))?
                    .iter()
                    .map(|word| expand_templates(word, &prefix, &dir))
                    .collect();
                let Some(program) = words.first_mut() else {
                    return Err(format!("Command '{}' has an empty command line.", self.name));
                };
                if !prefix.is_empty() && !program.contains('/') {
                    let candidate = Path::new(&prefix).join("bin").join(program.as_str());
                    if candidate.exists() {
                        *program = candidate.to_string_lossy().to_string();
                    }
                }
                words.extend(extra_args.iter().cloned());
                (words, false)
            }
        };

        Ok(CommandExecInfo {
            args,
            cwd: project_dir.to_path_buf(),
            env: environ.clone(),
            shell,
        })
    }
}

impl CommandExecInfo {
    /// A process builder with exactly this environment.
    pub fn to_command(&self) -> Command {
        let mut command = if self.shell {
            let mut command = Command::new("sh");
            command.arg("-c").args(&self.args);
            command
        } else {
            let mut command = Command::new(self.args.first().map(String::as_str).unwrap_or(""));
            command.args(self.args.iter().skip(1));
            command
        };
        command.current_dir(&self.cwd).env_clear().envs(&self.env);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn environ_with_prefix(prefix: &Path) -> Environ {
        let mut environ = Environ::new();
        environ.insert(
            ENV_PREFIX_VAR.to_string(),
            prefix.to_string_lossy().to_string(),
        );
        environ
    }

    #[test]
    fn app_entry_expands_prefix_and_resolves_program() {
        let project = TempDir::new().unwrap();
        let prefix = TempDir::new().unwrap();
        fs::create_dir_all(prefix.path().join("bin")).unwrap();
        fs::write(prefix.path().join("bin").join("python"), "").unwrap();
        let environ = environ_with_prefix(prefix.path());

        let command = ProjectCommand::app_entry("default", "python echo.py ${PREFIX} foo bar");
        let info = command.exec_info(project.path(), &environ, &[]).unwrap();

        let prefix_str = prefix.path().to_string_lossy().to_string();
        assert_eq!(
            info.args,
            vec![
                prefix.path().join("bin").join("python").to_string_lossy().to_string(),
                "echo.py".to_string(),
                prefix_str,
                "foo".to_string(),
                "bar".to_string(),
            ]
        );
        assert!(!info.shell);
        assert_eq!(info.cwd, project.path());
    }

    #[test]
    fn app_entry_keeps_unknown_program_and_appends_args() {
        let project = TempDir::new().unwrap();
        let environ = environ_with_prefix(Path::new("/nonexistent/prefix"));
        let command = ProjectCommand::app_entry("default", "./run.sh ${PROJECT_DIR}");
        let info = command
            .exec_info(project.path(), &environ, &["baz".to_string()])
            .unwrap();
        assert_eq!(info.args[0], "./run.sh");
        assert_eq!(info.args[1], project.path().to_string_lossy());
        assert_eq!(info.args[2], "baz");
    }

    #[test]
    fn unix_command_is_one_shell_line() {
        let project = TempDir::new().unwrap();
        let environ = environ_with_prefix(Path::new("/someplace"));
        let command = ProjectCommand::unix("default", "echo ${PREFIX} foo");
        let info = command
            .exec_info(project.path(), &environ, &["two words".to_string()])
            .unwrap();
        assert!(info.shell);
        assert_eq!(info.args, vec!["echo /someplace foo 'two words'".to_string()]);
    }

    #[test]
    fn unbalanced_quotes_are_reported() {
        let project = TempDir::new().unwrap();
        let command = ProjectCommand::app_entry("broken", "python 'oops");
        let err = command
            .exec_info(project.path(), &Environ::new(), &[])
            .unwrap_err();
        assert!(err.contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn to_command_runs_with_given_env() {
        let project = TempDir::new().unwrap();
        let mut environ = Environ::new();
        environ.insert("GREETING".to_string(), "hello".to_string());
        environ.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        let command = ProjectCommand::unix("default", "echo $GREETING");
        let info = command.exec_info(project.path(), &environ, &[]).unwrap();

        let output = info.to_command().output().unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}

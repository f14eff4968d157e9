//! Per-project local state.
//!
//! `project-local.yml` sits next to the project file and holds values the
//! user configured plus metadata providers need to undo their work (what
//! was downloaded, which service was started where). Encrypted values are
//! never written here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrepkitError, Result};

/// Provider metadata for one requirement.
pub type RunState = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct LocalStateData {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    service_run_states: BTreeMap<String, RunState>,
}

/// The `project-local.yml` file of one project.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalStateFile {
    path: PathBuf,
    data: LocalStateData,
}

impl LocalStateFile {
    /// File name inside the project directory.
    pub const FILENAME: &'static str = "project-local.yml";

    /// Empty state that will be saved under `directory`.
    pub fn new(directory: &Path) -> Self {
        Self {
            path: directory.join(Self::FILENAME),
            data: LocalStateData::default(),
        }
    }

    /// Load the state for a project directory.
    ///
    /// A missing or empty file yields empty state.
    pub fn load_for_directory(directory: &Path) -> Result<Self> {
        let path = directory.join(Self::FILENAME);
        if !path.exists() {
            return Ok(Self::new(directory));
        }

        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(Self::new(directory));
        }
        let data: LocalStateData =
            serde_yaml::from_str(&content).map_err(|e| PrepkitError::ProjectLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;

        Ok(Self { path, data })
    }

    /// Where this state is saved.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save using write-to-temp-then-rename.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(&self.data)
            .map_err(|e| anyhow::anyhow!("Failed to serialize local state: {}", e))?;

        let temp_path = self.path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Saved local state to {}", self.path.display());
        Ok(())
    }

    /// A configured variable value.
    pub fn get_value(&self, env_var: &str) -> Option<&str> {
        self.data.variables.get(env_var).map(String::as_str)
    }

    /// Set a configured variable value.
    pub fn set_value(&mut self, env_var: &str, value: &str) {
        self.data
            .variables
            .insert(env_var.to_string(), value.to_string());
    }

    /// Remove a configured variable value.
    pub fn unset_value(&mut self, env_var: &str) {
        self.data.variables.remove(env_var);
    }

    /// All configured variable values.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.data.variables
    }

    /// Run state recorded for a requirement; empty when nothing was recorded.
    pub fn get_service_run_state(&self, env_var: &str) -> RunState {
        self.data
            .service_run_states
            .get(env_var)
            .cloned()
            .unwrap_or_default()
    }

    /// Replace the run state for a requirement.
    pub fn set_service_run_state(&mut self, env_var: &str, state: RunState) {
        if state.is_empty() {
            self.data.service_run_states.remove(env_var);
        } else {
            self.data
                .service_run_states
                .insert(env_var.to_string(), state);
        }
    }

    /// Forget the run state for a requirement.
    pub fn clear_service_run_state(&mut self, env_var: &str) {
        self.data.service_run_states.remove(env_var);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        let state = LocalStateFile::load_for_directory(temp.path()).unwrap();
        assert!(state.variables().is_empty());
        assert_eq!(state.path(), temp.path().join("project-local.yml"));
    }

    #[test]
    fn save_and_reload() {
        let temp = TempDir::new().unwrap();
        let mut state = LocalStateFile::load_for_directory(temp.path()).unwrap();
        state.set_value("FOO", "bar");
        let mut run_state = RunState::new();
        run_state.insert("filename".to_string(), Value::from("data.csv"));
        state.set_service_run_state("DATAFILE", run_state);
        state.save().unwrap();

        let loaded = LocalStateFile::load_for_directory(temp.path()).unwrap();
        assert_eq!(loaded.get_value("FOO"), Some("bar"));
        assert_eq!(
            loaded.get_service_run_state("DATAFILE")["filename"],
            Value::from("data.csv")
        );
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let mut state = LocalStateFile::new(temp.path());
        state.set_value("A", "1");
        state.save().unwrap();

        assert!(temp.path().join("project-local.yml").exists());
        assert!(!temp.path().join("project-local.yml.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_load_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("project-local.yml"), "variables: [unclosed").unwrap();
        let result = LocalStateFile::load_for_directory(temp.path());
        assert!(matches!(result, Err(PrepkitError::ProjectLoad { .. })));
    }

    #[test]
    fn empty_run_state_is_removed() {
        let temp = TempDir::new().unwrap();
        let mut state = LocalStateFile::new(temp.path());
        let mut run_state = RunState::new();
        run_state.insert("port".to_string(), Value::from(6380));
        state.set_service_run_state("REDIS_URL", run_state);
        state.set_service_run_state("REDIS_URL", RunState::new());
        assert!(state.get_service_run_state("REDIS_URL").is_empty());
    }

    #[test]
    fn unset_value_removes() {
        let temp = TempDir::new().unwrap();
        let mut state = LocalStateFile::new(temp.path());
        state.set_value("FOO", "bar");
        state.unset_value("FOO");
        assert_eq!(state.get_value("FOO"), None);
    }
}

//! Requirement status types.
//!
//! Each provider evaluation produces a fresh [`RequirementStatus`]. Cleanup
//! and project operations report a plain [`Status`].

use serde_json::Value;

use super::requirement::Requirement;

/// The result of evaluating a single requirement.
#[derive(Debug, Clone)]
pub struct RequirementStatus {
    /// The requirement that was evaluated.
    pub requirement: Requirement,
    /// Whether the requirement is met.
    pub satisfied: bool,
    /// Human-readable summary of the current state.
    pub status_description: String,
    /// Errors hit while evaluating or providing, in order.
    pub errors: Vec<String>,
    /// Log lines produced while providing.
    pub logs: Vec<String>,
    /// Provider-specific data (e.g. the resolved path of a download).
    pub analysis: Value,
}

impl RequirementStatus {
    /// A status for a met requirement.
    pub fn satisfied(requirement: &Requirement, description: impl Into<String>) -> Self {
        Self::new(requirement, true, description)
    }

    /// A status for an unmet requirement.
    pub fn unsatisfied(requirement: &Requirement, description: impl Into<String>) -> Self {
        Self::new(requirement, false, description)
    }

    fn new(requirement: &Requirement, satisfied: bool, description: impl Into<String>) -> Self {
        Self {
            requirement: requirement.clone(),
            satisfied,
            status_description: description.into(),
            errors: Vec::new(),
            logs: Vec::new(),
            analysis: Value::Null,
        }
    }

    /// Attach errors.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors.extend(errors);
        self
    }

    /// Attach log lines.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs.extend(logs);
        self
    }

    /// Attach provider analysis.
    pub fn with_analysis(mut self, analysis: Value) -> Self {
        self.analysis = analysis;
        self
    }

    /// Whether the requirement is met.
    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// Variable of the evaluated requirement.
    pub fn env_var(&self) -> &str {
        &self.requirement.env_var
    }

    /// Kind name of the evaluated requirement.
    pub fn kind_name(&self) -> &str {
        self.requirement.kind_name()
    }

    /// Errors to report for this status in a failed prepare.
    ///
    /// Satisfied statuses contribute nothing; unsatisfied ones contribute
    /// their own errors followed by a line naming what is missing.
    pub fn failure_errors(&self) -> Vec<String> {
        if self.satisfied {
            return Vec::new();
        }
        let mut errors = self.errors.clone();
        errors.push(format!(
            "missing requirement to run this project: {}",
            self.requirement.title()
        ));
        errors
    }
}

/// Outcome of an operation that isn't tied to one requirement evaluation.
///
/// Used for `unprovide`, `unprepare` and project operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub success: bool,
    pub description: String,
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

impl Status {
    /// A successful outcome.
    pub fn success(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: description.into(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A failed outcome.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            success: false,
            description: description.into(),
            logs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Attach log lines.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.logs = logs;
        self
    }

    /// Attach errors.
    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfied_status_is_satisfied() {
        let req = Requirement::env_var("FOO");
        let status = RequirementStatus::satisfied(&req, "Environment variable FOO is set.");
        assert!(status.is_satisfied());
        assert_eq!(status.env_var(), "FOO");
        assert_eq!(status.kind_name(), "env_var");
        assert!(status.failure_errors().is_empty());
    }

    #[test]
    fn unsatisfied_status_reports_missing_requirement_last() {
        let req = Requirement::env_var("FOO");
        let status = RequirementStatus::unsatisfied(&req, "Environment variable FOO is not set.")
            .with_errors(vec!["first".to_string()]);
        assert!(!status.is_satisfied());
        assert_eq!(
            status.failure_errors(),
            vec![
                "first".to_string(),
                "missing requirement to run this project: FOO environment variable must be set."
                    .to_string()
            ]
        );
    }

    #[test]
    fn analysis_defaults_to_null() {
        let req = Requirement::env_var("FOO");
        let status = RequirementStatus::satisfied(&req, "ok");
        assert!(status.analysis.is_null());
        let status = status.with_analysis(serde_json::json!({"path": "/x"}));
        assert_eq!(status.analysis["path"], "/x");
    }

    #[test]
    fn simple_status_builders() {
        let ok = Status::success("Success.").with_logs(vec!["did it".to_string()]);
        assert!(ok.is_success());
        assert_eq!(ok.logs, vec!["did it".to_string()]);

        let bad = Status::failure("Could not.").with_errors(vec!["why".to_string()]);
        assert!(!bad.is_success());
        assert_eq!(bad.errors, vec!["why".to_string()]);
    }
}

//! Error types for prepkit operations.
//!
//! This module defines [`PrepkitError`], the error type returned by the
//! engine's public API, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Provider failures never surface here: they are captured into
//!   requirement statuses and reported through a failed `PrepareResult`.
//! - `PrepkitError` covers contract violations (reading a stage result
//!   before executing it, an unknown provide mode, an invalid interactive
//!   choice) and I/O on the crate's own files.
//! - Use `anyhow::Error` (via `PrepkitError::Other`) for unexpected errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for prepkit operations.
#[derive(Debug, Error)]
pub enum PrepkitError {
    /// The project file or local state could not be read or parsed.
    #[error("Failed to load {path}: {message}")]
    ProjectLoad { path: PathBuf, message: String },

    /// A provide mode string did not name a known mode.
    #[error("invalid provide mode {mode}")]
    InvalidProvideMode { mode: String },

    /// A stage was used in a way its lifecycle does not allow.
    #[error("{message}")]
    InvalidState { message: String },

    /// An interactive submission named a requirement that is not awaiting input.
    #[error("Requirement '{requirement}' is not awaiting configuration")]
    UnknownRequirement { requirement: String },

    /// An interactive submission named an option the requirement does not offer.
    #[error("Requirement '{requirement}' has no option '{option}'")]
    InvalidChoice { requirement: String, option: String },

    /// A prompt had no answer available without a terminal.
    #[error("Cannot prompt for '{key}' in non-interactive mode (no default value)")]
    NoPromptAnswer { key: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for prepkit operations.
pub type Result<T> = std::result::Result<T, PrepkitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_load_displays_path_and_message() {
        let err = PrepkitError::ProjectLoad {
            path: PathBuf::from("/proj/project.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/proj/project.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn invalid_provide_mode_mentions_mode() {
        let err = PrepkitError::InvalidProvideMode {
            mode: "BAD_PROVIDE_MODE".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("invalid provide mode"));
        assert!(msg.contains("BAD_PROVIDE_MODE"));
    }

    #[test]
    fn invalid_state_displays_message() {
        let err = PrepkitError::InvalidState {
            message: "result property isn't available until after execute()".into(),
        };
        assert!(err.to_string().contains("isn't available"));
    }

    #[test]
    fn invalid_choice_displays_requirement_and_option() {
        let err = PrepkitError::InvalidChoice {
            requirement: "DATAFILE".into(),
            option: "teleport".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("DATAFILE"));
        assert!(msg.contains("teleport"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PrepkitError = io_err.into();
        assert!(matches!(err, PrepkitError::Io(_)));
    }

    #[test]
    fn anyhow_error_converts() {
        let err: PrepkitError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, PrepkitError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }
}

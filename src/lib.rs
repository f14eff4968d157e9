//! prepkit - Turn declarative project descriptions into ready-to-run
//! process environments.
//!
//! A project declares what it needs to run: environment variables, a
//! package environment, downloaded files, background services. prepkit
//! checks each requirement, provides what is missing, and hands back the
//! environment variables a command should run with. It can also undo
//! what it set up.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`environ`] - Environment variable maps
//! - [`error`] - Error types and result aliases
//! - [`ops`] - Variable, package and cleanup operations on a project
//! - [`prepare`] - The prepare engine, its stages and interactive sessions
//! - [`project`] - Project model and `project.yml` loading
//! - [`providers`] - Per-kind strategies that check and satisfy requirements
//! - [`requirements`] - Requirements, statuses and user choices
//! - [`secrets`] - Secret storage and output masking
//! - [`state`] - Per-project local state
//! - [`ui`] - Interactive prompts, spinners, and terminal output
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use prepkit::environ::Environ;
//! use prepkit::prepare::{PrepareEngine, PrepareOptions};
//! use prepkit::project::Project;
//! use prepkit::providers::{ProvideMode, ProviderRegistry};
//! use prepkit::requirements::Requirement;
//! use prepkit::secrets::MemorySecretStore;
//!
//! let project = Project::new("/nonexistent/demo")
//!     .with_requirement(Requirement::env_var("DATABASE_URL"));
//! let engine = PrepareEngine::new(
//!     Rc::new(ProviderRegistry::with_conda().unwrap()),
//!     Rc::new(MemorySecretStore::new()),
//! );
//!
//! let options = PrepareOptions::new(ProvideMode::Check).with_environ(Environ::new());
//! let result = engine.check(&project, options).unwrap();
//! assert!(result.failed());
//! assert!(!result.status_for("DATABASE_URL").unwrap().is_satisfied());
//! ```

pub mod cli;
pub mod environ;
pub mod error;
pub mod ops;
pub mod prepare;
pub mod project;
pub mod providers;
pub mod requirements;
pub mod secrets;
pub mod state;
pub mod ui;

pub use error::{PrepkitError, Result};

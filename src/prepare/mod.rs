//! Preparing projects to run.
//!
//! [`PrepareEngine`] turns a [`Project`](crate::project::Project) into a
//! ready environment by driving providers through a chain of
//! [`PrepareStage`]s:
//!
//! 1. The env spec is checked and, unless only checking, provided.
//! 2. If it is ready, every other requirement is provided in declaration
//!    order. Otherwise the rest are only checked and the run fails.
//!
//! Runs happen without interaction ([`PrepareEngine::prepare_without_interaction`])
//! or through an [`InteractiveSession`] that asks for choices between stages.
//! [`PrepareEngine::unprepare`] undoes what a run set up.
//!
//! # Modules
//!
//! - [`engine`] - Entry points and options
//! - [`stage`] - The stage state machine
//! - [`interactive`] - Read/write sessions for interactive runs
//! - [`result`] - Run outcomes

pub mod engine;
pub mod interactive;
pub mod result;
pub mod stage;

pub use engine::{PrepareEngine, PrepareOptions, UNABLE_TO_LOAD};
pub use interactive::{
    prepare_interactively, ConfigSubmission, InputSource, InteractiveSession, RequirementForm,
    SessionPayload,
};
pub use result::{PrepareFailure, PrepareResult, PrepareSuccess};
pub use stage::{after_stage_success, PrepareStage, ENV_SPEC_STAGE, REQUIREMENTS_STAGE};

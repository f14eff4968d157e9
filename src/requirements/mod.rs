//! Requirements and their evaluated status.
//!
//! # Modules
//!
//! - [`requirement`] - Inert requirement descriptions and their kinds
//! - [`status`] - Results of evaluating a requirement
//! - [`overrides`] - Choices made during one prepare attempt

pub mod overrides;
pub mod requirement;
pub mod status;

pub use overrides::{ChoiceSelection, SharedOverrides, UserConfigOverrides};
pub use requirement::{
    default_filename, package_name, Checksum, DownloadSpec, EnvSpec, HashAlgorithm, Requirement,
    RequirementKind, ServiceSpec, ServiceType,
};
pub use status::{RequirementStatus, Status};

//! Core data types: requests, dependencies, manifests, errors.

pub mod dependency;
pub mod errors;
pub mod manifest;
pub mod naming;
pub mod request;

pub use dependency::{DependencyMap, DependencySpec};
pub use errors::{ArtifactError, BuildError, CompileError, ConfigError};
pub use manifest::{CargoConfig, Manifest};
pub use request::{BuildRequest, Profile, SourcePayload};

//! rustlet - compile Rust snippets into loadable native libraries
//!
//! This crate provides the build pipeline behind the `rustlet` command:
//! manifest synthesis, scratch build directories, target resolution, the
//! cargo invocation with its diagnostic stream, and library loading.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test doubles for rustlet unit tests.
///
/// Only available when compiling tests. Provides a scripted compiler runner
/// and companion probe.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    errors::{ArtifactError, BuildError, CompileError, ConfigError},
    request::{BuildRequest, Profile, SourcePayload},
};
pub use builder::diagnostics::escape_braces;
pub use ops::{BuildOutcome, CompiledLibrary, Session};
pub use util::{config::Config, shell::Shell};

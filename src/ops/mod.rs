//! High-level operations.
//!
//! This module contains the build session and the commands built on it.

pub mod clean;
pub mod collaborators;
pub mod session;

pub use clean::clean_stale;
pub use collaborators::{BindingGenerator, RegistrationIntrospector};
pub use session::{BuildOutcome, CompiledLibrary, Session};

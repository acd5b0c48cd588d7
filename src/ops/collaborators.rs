//! Hooks for the embedding host.
//!
//! Neither hook is required. A session without them builds and loads plain
//! libraries.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::artifact::NativeLibrary;

/// Proposes a registration declaration for a source fragment.
///
/// The returned text is appended to the source before it is written to the
/// build directory.
pub trait RegistrationIntrospector: Send + Sync {
    /// Declaration to append to `source`, built as library `library_name`.
    fn registration(&self, source: &str, library_name: &str) -> Option<String>;
}

/// Emits host-callable wrappers for a loaded library.
pub trait BindingGenerator: Send + Sync {
    /// Write wrappers for `library` and return the file they were written to.
    ///
    /// `declaration` is the library name the registration was made under.
    fn generate(&self, library: &NativeLibrary, declaration: &str) -> Result<PathBuf>;
}

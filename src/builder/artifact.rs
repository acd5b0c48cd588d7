//! Built library location and loading.

use std::fmt;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::builder::target::{HostOs, ToolchainPlan};
use crate::core::errors::ArtifactError;
use crate::core::request::Profile;

/// File name cargo gives a `cdylib` named `name` on `os`.
pub fn library_filename(name: &str, os: HostOs) -> String {
    match os {
        HostOs::Windows => format!("{}.dll", name),
        HostOs::MacOs => format!("lib{}.dylib", name),
        HostOs::Linux | HostOs::OtherUnix => format!("lib{}.so", name),
    }
}

/// Where the library for `name` lands inside `build_dir`.
pub fn artifact_path(
    build_dir: &Path,
    plan: &ToolchainPlan,
    profile: Profile,
    name: &str,
    os: HostOs,
) -> PathBuf {
    build_dir
        .join(plan.output_subdir(profile))
        .join(library_filename(name, os))
}

/// A dynamic library loaded into this process.
pub struct NativeLibrary {
    library: Library,
    path: PathBuf,
}

impl NativeLibrary {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the library exports `name`.
    pub fn has_symbol(&self, name: &str) -> bool {
        // SAFETY: the symbol is only looked up, never called or dereferenced.
        unsafe { self.library.get::<*const ()>(name.as_bytes()).is_ok() }
    }

    /// Look up an exported symbol.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported item.
    pub unsafe fn symbol<T>(&self, name: &str) -> Result<Symbol<'_, T>, libloading::Error> {
        self.library.get(name.as_bytes())
    }

    /// Unload the library.
    pub fn close(self) -> Result<(), ArtifactError> {
        let path = self.path;
        self.library
            .close()
            .map_err(|source| ArtifactError::Load { path, source })
    }
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Load the library at `path`.
pub fn load_library(path: &Path) -> Result<NativeLibrary, ArtifactError> {
    if !path.is_file() {
        return Err(ArtifactError::Missing {
            path: path.to_path_buf(),
        });
    }

    // SAFETY: loading runs the library's initializers. The library was just
    // built from user code, which is trusted by whoever asked for it.
    let library = unsafe { Library::new(path) }.map_err(|source| ArtifactError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!("loaded {}", path.display());
    Ok(NativeLibrary {
        library,
        path: path.to_path_buf(),
    })
}

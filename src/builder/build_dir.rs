//! Scratch build directory management.
//!
//! A [`BuildCache`] tracks at most one build directory. With caching enabled
//! the directory (and cargo's `target/` inside it) is reused across builds, so
//! dependencies compile once per session. A build with caching disabled tears
//! the directory down before and after itself.
//!
//! Layout:
//!
//! ```text
//! <build dir>/
//!   Cargo.toml
//!   .cargo/config.toml
//!   src/lib.rs
//!   target/
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::core::manifest::TARGET_DIR;
use crate::util::fs::{canonicalize, ensure_dir, remove_dir_all_if_exists, write_string};

/// Prefix of scratch directory names.
pub const DIR_PREFIX: &str = "rustlet-";

/// Source root inside the build directory.
pub const SOURCE_DIR: &str = "src";

/// Cargo configuration directory inside the build directory.
pub const CONFIG_DIR: &str = ".cargo";

/// Subdirectories every tracked build directory contains.
pub const REQUIRED_SUBDIRS: [&str; 3] = [SOURCE_DIR, TARGET_DIR, CONFIG_DIR];

#[derive(Debug)]
struct TrackedDir {
    dir: TempDir,
    /// Symlink-resolved path of `dir`.
    path: PathBuf,
}

/// Owner of the session's build directory.
#[derive(Debug, Default)]
pub struct BuildCache {
    /// Where scratch directories are created; system temp dir if `None`.
    parent: Option<PathBuf>,
    current: Option<TrackedDir>,
    releases: u64,
}

impl BuildCache {
    /// Cache creating directories in the system temp dir.
    pub fn new() -> Self {
        BuildCache::default()
    }

    /// Cache creating directories under `parent`.
    pub fn in_dir(parent: impl Into<PathBuf>) -> Self {
        BuildCache {
            parent: Some(parent.into()),
            ..BuildCache::default()
        }
    }

    /// Get the build directory, creating it if needed.
    ///
    /// With `cache == false` any tracked directory is deleted first, so the
    /// caller always starts from an empty tree.
    pub fn acquire(&mut self, cache: bool) -> Result<PathBuf> {
        if !cache {
            self.release()?;
        }

        if let Some(tracked) = &self.current {
            return Ok(tracked.path.clone());
        }

        let tracked = self.create()?;
        tracing::debug!("created build directory {}", tracked.path.display());
        let path = tracked.path.clone();
        self.current = Some(tracked);
        Ok(path)
    }

    fn create(&self) -> Result<TrackedDir> {
        let builder = {
            let mut b = tempfile::Builder::new();
            b.prefix(DIR_PREFIX);
            b
        };
        let dir = match &self.parent {
            Some(parent) => {
                ensure_dir(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .context("failed to create build directory")?;

        // `dir` is removed on drop if any of this fails.
        for sub in REQUIRED_SUBDIRS {
            let sub_path = dir.path().join(sub);
            fs::create_dir_all(&sub_path)
                .with_context(|| format!("failed to create {}", sub_path.display()))?;
        }
        let path = canonicalize(dir.path())?;

        Ok(TrackedDir { dir, path })
    }

    /// Delete the tracked directory, if any. Returns whether one was removed.
    pub fn release(&mut self) -> Result<bool> {
        let Some(tracked) = self.current.take() else {
            return Ok(false);
        };

        let path = tracked.path.clone();
        tracked
            .dir
            .close()
            .with_context(|| format!("failed to remove build directory {}", path.display()))?;
        self.releases += 1;
        tracing::debug!("removed build directory {}", path.display());
        Ok(true)
    }

    /// The tracked directory, if one is live.
    pub fn current(&self) -> Option<&Path> {
        self.current.as_ref().map(|t| t.path.as_path())
    }

    /// How many directories this cache has torn down.
    pub fn releases(&self) -> u64 {
        self.releases
    }

    /// Configured parent directory.
    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }
}

/// Releases the cache's directory when dropped, if armed.
///
/// Covers every exit path of an uncached build, including `?` returns.
pub struct ReleaseGuard<'a> {
    cache: &'a mut BuildCache,
    armed: bool,
}

impl<'a> ReleaseGuard<'a> {
    pub fn new(cache: &'a mut BuildCache, armed: bool) -> Self {
        ReleaseGuard { cache, armed }
    }
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.cache.release() {
                tracing::warn!("{:#}", e);
            }
        }
    }
}

/// Write the generated package files into `root`.
pub fn write_package(root: &Path, manifest: &str, cargo_config: &str, source: &str) -> Result<()> {
    write_string(&root.join("Cargo.toml"), manifest)?;
    write_string(&root.join(CONFIG_DIR).join("config.toml"), cargo_config)?;
    write_string(&root.join(SOURCE_DIR).join("lib.rs"), source)?;
    Ok(())
}

/// Remove scratch directories left under `parent` by earlier processes.
pub fn remove_stale(parent: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !parent.is_dir() {
        return Ok(removed);
    }

    for entry in fs::read_dir(parent)
        .with_context(|| format!("failed to read directory: {}", parent.display()))?
    {
        let entry = entry?;
        let is_scratch = entry.file_name().to_string_lossy().starts_with(DIR_PREFIX)
            && entry.file_type()?.is_dir();
        if is_scratch {
            remove_dir_all_if_exists(&entry.path())?;
            removed.push(entry.path());
        }
    }

    removed.sort();
    Ok(removed)
}

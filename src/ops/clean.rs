//! Removal of scratch directories left by earlier processes.

use std::path::PathBuf;

use anyhow::Result;

use crate::builder::build_dir::remove_stale;
use crate::util::config::Config;

/// Delete `rustlet-*` directories under the configured `[build] dir`.
///
/// Returns `None` when no directory is configured; scratch directories in the
/// system temp dir never outlive their process.
pub fn clean_stale(config: &Config) -> Result<Option<Vec<PathBuf>>> {
    match &config.build.dir {
        Some(dir) => remove_stale(dir).map(Some),
        None => Ok(None),
    }
}

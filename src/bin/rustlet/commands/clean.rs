//! `rustlet clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanArgs;
use rustlet::ops::clean_stale;
use rustlet::util::config::load_default_config;
use rustlet::util::shell::Status;
use rustlet::Shell;

pub fn execute(_args: CleanArgs, shell: Arc<Shell>) -> Result<()> {
    let config = load_default_config();

    match clean_stale(&config)? {
        None => shell.note("no `[build] dir` configured; build directories are removed on exit"),
        Some(removed) if removed.is_empty() => shell.note("nothing to clean"),
        Some(removed) => {
            for path in removed {
                shell.status(Status::Removed, path.display());
            }
        }
    }

    Ok(())
}

//! Test doubles for the build pipeline.
//!
//! [`ScriptedRunner`] stands in for cargo: it records every command it is
//! given, replays canned stdout lines and an exit code, and can drop a fake
//! library where cargo would have written the real one. [`ScriptedProbe`]
//! answers companion-toolchain lookups from fixed tables.
//!
//! # Example
//!
//! ```rust,ignore
//! use rustlet::test_support::{compiler_message, ScriptedRunner};
//!
//! let runner = ScriptedRunner::new(101)
//!     .with_lines([compiler_message("error", "error: boom")]);
//! ```

pub mod fixtures;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::builder::artifact::library_filename;
use crate::builder::cargo::CompilerRunner;
use crate::builder::target::{CompanionProbe, HostOs};
use crate::core::errors::ConfigError;
use crate::util::process::ProcessBuilder;

pub use fixtures::*;

/// One `compiler-message` line as cargo prints it.
pub fn compiler_message(level: &str, rendered: &str) -> String {
    serde_json::json!({
        "reason": "compiler-message",
        "package_id": "rustlet1 0.0.1 (path+file:///tmp/rustlet-test)",
        "manifest_path": "/tmp/rustlet-test/Cargo.toml",
        "message": {
            "level": level,
            "message": rendered.lines().next().unwrap_or_default(),
            "rendered": rendered,
            "spans": [],
            "children": []
        }
    })
    .to_string()
}

/// The trailing `build-finished` line.
pub fn build_finished(success: bool) -> String {
    serde_json::json!({ "reason": "build-finished", "success": success }).to_string()
}

/// Companion probe backed by in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    env: BTreeMap<String, String>,
    dirs: BTreeSet<PathBuf>,
}

impl ScriptedProbe {
    /// A probe with no environment and no directories.
    pub fn new() -> Self {
        ScriptedProbe::default()
    }

    /// Report `path` as an existing directory.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    /// Set an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl CompanionProbe for ScriptedProbe {
    fn env_var(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains(path)
    }
}

/// What a successful scripted run leaves in the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ArtifactMode {
    None,
    /// A file with garbage contents.
    Fake,
    /// A symlink to an existing library.
    Link(PathBuf),
}

/// Compiler runner replaying a fixed script.
///
/// Artifacts are named for a Linux host.
#[derive(Debug)]
pub struct ScriptedRunner {
    exit_code: Option<i32>,
    lines: Vec<String>,
    artifact: ArtifactMode,
    calls: Mutex<Vec<ProcessBuilder>>,
}

impl ScriptedRunner {
    /// A runner that prints nothing and exits with `exit_code`.
    pub fn new(exit_code: i32) -> Self {
        ScriptedRunner {
            exit_code: Some(exit_code),
            lines: Vec::new(),
            artifact: ArtifactMode::None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A runner simulating a process killed by a signal.
    pub fn killed() -> Self {
        ScriptedRunner {
            exit_code: None,
            ..ScriptedRunner::new(0)
        }
    }

    /// A successful run that produces a library.
    pub fn succeeding() -> Self {
        ScriptedRunner::new(0).with_artifact()
    }

    /// Lines to print on stdout.
    pub fn with_lines(mut self, lines: impl IntoIterator<Item = String>) -> Self {
        self.lines.extend(lines);
        self
    }

    /// Drop a fake library where cargo would put it.
    pub fn with_artifact(mut self) -> Self {
        self.artifact = ArtifactMode::Fake;
        self
    }

    /// Link the output to an existing library instead.
    pub fn with_artifact_link(mut self, target: impl Into<PathBuf>) -> Self {
        self.artifact = ArtifactMode::Link(target.into());
        self
    }

    /// Commands received so far.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn write_artifact(&self, command: &ProcessBuilder) -> Result<()> {
        let value = |prefix: &str| {
            command
                .get_args()
                .iter()
                .find_map(|a| a.strip_prefix(prefix).map(PathBuf::from))
        };

        let manifest_path = value("--manifest-path=").context("no --manifest-path")?;
        let manifest: toml::Table = toml::from_str(&std::fs::read_to_string(&manifest_path)?)?;
        let name = manifest
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .context("manifest without package name")?;

        let mut dir = value("--target-dir=").context("no --target-dir")?;
        if let Some(triple) = value("--target=") {
            dir.push(triple);
        }
        let args = command.get_args();
        let folder = if args.iter().any(|a| a == "--release") {
            "release"
        } else if args.iter().any(|a| a == "--profile=perf") {
            "perf"
        } else {
            "debug"
        };
        dir.push(folder);

        std::fs::create_dir_all(&dir)?;
        let output = dir.join(library_filename(name, HostOs::Linux));
        if output.exists() {
            std::fs::remove_file(&output)?;
        }
        match &self.artifact {
            ArtifactMode::None => {}
            ArtifactMode::Fake => std::fs::write(&output, b"fake")?,
            ArtifactMode::Link(target) => link(target, &output)?,
        }
        Ok(())
    }
}

#[cfg(unix)]
fn link(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link(target: &Path, link: &Path) -> Result<()> {
    std::fs::copy(target, link)?;
    Ok(())
}

/// A shared library that is present on most Linux systems, if any is found.
pub fn system_library() -> Option<PathBuf> {
    [
        "/lib/x86_64-linux-gnu/libm.so.6",
        "/usr/lib/x86_64-linux-gnu/libm.so.6",
        "/lib/aarch64-linux-gnu/libm.so.6",
        "/usr/lib/aarch64-linux-gnu/libm.so.6",
        "/lib64/libm.so.6",
        "/usr/lib64/libm.so.6",
        "/usr/lib/libm.so.6",
        "/lib/libm.so.6",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.is_file())
}

impl CompilerRunner for ScriptedRunner {
    fn program(&self) -> Result<PathBuf, ConfigError> {
        Ok(PathBuf::from("cargo"))
    }

    fn run(
        &self,
        command: &ProcessBuilder,
        _quiet: bool,
        on_line: &mut dyn FnMut(String),
    ) -> Result<Option<i32>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }
        for line in &self.lines {
            on_line(line.clone());
        }
        if self.artifact != ArtifactMode::None && self.exit_code == Some(0) {
            self.write_artifact(command)?;
        }
        Ok(self.exit_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_runner_records_and_replays() {
        let runner = ScriptedRunner::new(1).with_lines([build_finished(false)]);
        let mut seen = Vec::new();
        let code = runner
            .run(&ProcessBuilder::new("cargo").arg("build"), false, &mut |l| {
                seen.push(l)
            })
            .unwrap();

        assert_eq!(code, Some(1));
        assert_eq!(seen.len(), 1);
        assert_eq!(runner.calls()[0].get_args(), ["build"]);
    }

    #[test]
    fn test_scripted_probe() {
        let probe = ScriptedProbe::new().with_dir("/opt/x").with_env("K", "v");
        assert!(probe.is_dir(Path::new("/opt/x")));
        assert!(!probe.is_dir(Path::new("/opt/y")));
        assert_eq!(probe.env_var("K").as_deref(), Some("v"));
        assert!(probe.env_var("MISSING").is_none());
    }
}

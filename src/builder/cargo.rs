//! Cargo invocation.
//!
//! Cargo runs as a child process while its stdout is read line by line on a
//! producer thread. Each line that parses as a compiler diagnostic is sent
//! over a channel to the calling thread, which processes records in arrival
//! order. The exit status is only inspected once stdout is fully drained,
//! because the messages explaining a failure arrive last.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Result};

use crate::builder::diagnostics::{DiagnosticProcessor, DiagnosticRecord, ProcessedDiagnostics};
use crate::builder::target::ToolchainPlan;
use crate::core::errors::ConfigError;
use crate::core::manifest::TARGET_DIR;
use crate::core::request::{FeatureMap, Profile};
use crate::util::process::{cargo_bin_dir, find_cargo, ProcessBuilder, StderrMode};

/// Message format requesting JSON records with ANSI-rendered text.
pub const MESSAGE_FORMAT: &str = "--message-format=json-diagnostic-rendered-ansi";

/// Runs the compiler process.
pub trait CompilerRunner: Send + Sync {
    /// Path of the cargo executable.
    fn program(&self) -> Result<PathBuf, ConfigError>;

    /// Run `command`, handing every stdout line to `on_line` as it arrives.
    ///
    /// Returns the exit code, `None` if the process died from a signal.
    /// Stderr is passed through unless `quiet`.
    fn run(
        &self,
        command: &ProcessBuilder,
        quiet: bool,
        on_line: &mut dyn FnMut(String),
    ) -> Result<Option<i32>>;
}

/// Runs the real `cargo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CargoRunner;

impl CompilerRunner for CargoRunner {
    fn program(&self) -> Result<PathBuf, ConfigError> {
        find_cargo().ok_or(ConfigError::CargoNotFound)
    }

    fn run(
        &self,
        command: &ProcessBuilder,
        quiet: bool,
        on_line: &mut dyn FnMut(String),
    ) -> Result<Option<i32>> {
        let stderr = if quiet {
            StderrMode::Null
        } else {
            StderrMode::Inherit
        };
        let status = command.exec_streaming(stderr, on_line)?;
        Ok(status.code())
    }
}

/// Inputs for one `cargo build` command line.
#[derive(Debug, Clone)]
pub struct CargoInvocation<'a> {
    pub cargo: &'a Path,
    pub plan: &'a ToolchainPlan,
    pub build_dir: &'a Path,
    pub profile: Profile,
    /// Declared features; all of them are enabled.
    pub features: &'a FeatureMap,
    /// Whether cargo should render colored diagnostics.
    pub color: bool,
    /// Extra environment for the process.
    pub env: &'a BTreeMap<String, String>,
}

impl CargoInvocation<'_> {
    /// Build the command.
    pub fn command(&self) -> Result<ProcessBuilder> {
        let mut cmd = ProcessBuilder::new(self.cargo);

        if let Some(channel) = &self.plan.channel {
            cmd = cmd.arg(format!("+{}", channel));
        }
        cmd = cmd.arg("build").arg("--lib");
        if let Some(triple) = &self.plan.target {
            cmd = cmd.arg(format!("--target={}", triple));
        }
        cmd = cmd
            .arg(format!(
                "--manifest-path={}",
                self.build_dir.join("Cargo.toml").display()
            ))
            .arg(format!(
                "--target-dir={}",
                self.build_dir.join(TARGET_DIR).display()
            ))
            .args(self.profile.cargo_args());
        if !self.features.is_empty() {
            let names: Vec<&str> = self.features.keys().map(String::as_str).collect();
            cmd = cmd.arg(format!("--features={}", names.join(",")));
        }
        cmd = cmd
            .arg(MESSAGE_FORMAT)
            .arg(if self.color {
                "--color=always"
            } else {
                "--color=never"
            })
            .cwd(self.build_dir);

        cmd = cmd.env("PATH", self.search_path()?.to_string_lossy());
        for (key, value) in self.env {
            cmd = cmd.env(key, value);
        }

        Ok(cmd)
    }

    /// `PATH` for the child: plan directories, then the inherited `PATH`, then
    /// the cargo home `bin`.
    fn search_path(&self) -> Result<OsString> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs: Vec<PathBuf> = self.plan.path_prepend.clone();
        dirs.extend(std::env::split_paths(&inherited));
        if let Some(bin) = cargo_bin_dir() {
            if !dirs.contains(&bin) {
                dirs.push(bin);
            }
        }
        std::env::join_paths(dirs).map_err(|e| anyhow!("invalid PATH entry: {}", e))
    }
}

/// Run `command` and feed its diagnostics through `processor`.
pub fn invoke(
    runner: &dyn CompilerRunner,
    command: &ProcessBuilder,
    quiet: bool,
    mut processor: DiagnosticProcessor<'_>,
) -> Result<ProcessedDiagnostics> {
    tracing::debug!("running `{}`", command.display_command());

    let (tx, rx) = mpsc::channel::<DiagnosticRecord>();

    let exit_code = thread::scope(|scope| {
        let producer = scope.spawn(move || {
            runner.run(command, quiet, &mut |line| {
                if let Some(record) = DiagnosticRecord::parse(&line) {
                    // The receiver outlives the producer; a send cannot fail.
                    let _ = tx.send(record);
                }
            })
        });

        for record in rx {
            processor.accept(record);
        }

        producer
            .join()
            .map_err(|_| anyhow!("compiler output reader panicked"))?
    })?;

    tracing::debug!(?exit_code, "cargo finished");
    Ok(processor.finish(exit_code))
}

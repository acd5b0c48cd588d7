//! Error taxonomy for the build pipeline.
//!
//! Configuration problems are detected before cargo is launched, compile
//! failures carry the rendered compiler errors, and artifact errors happen after
//! a successful compile. None of these are retried.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Invalid or unusable build configuration.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ConfigError {
    #[error("invalid build profile `{name}`")]
    #[diagnostic(
        code(rustlet::config::invalid_profile),
        help("expected one of: dev, release, perf")
    )]
    InvalidProfile { name: String },

    #[error("dependency `{name}` has an empty specification")]
    #[diagnostic(code(rustlet::config::null_dependency))]
    NullDependency { name: String },

    #[error("invalid dependency `{input}`: {reason}")]
    #[diagnostic(code(rustlet::config::invalid_dependency))]
    InvalidDependency { input: String, reason: String },

    #[error("unknown target architecture `{arch}`")]
    #[diagnostic(
        code(rustlet::config::unknown_arch),
        help("only x86_64 and x86 are supported on Windows")
    )]
    UnknownArchitecture { arch: String },

    #[error("the MinGW-w64 companion toolchain (Rtools) was not found")]
    #[diagnostic(code(rustlet::config::companion_missing))]
    MissingCompanionToolchain { searched: PathBuf },

    #[error("companion toolchain directory `{}` does not exist", path.display())]
    #[diagnostic(code(rustlet::config::companion_path))]
    CompanionPathNotFound { path: PathBuf },

    #[error("host runtime {major}.{minor} with the UCRT runtime is not supported")]
    #[diagnostic(
        code(rustlet::config::unsupported_runtime),
        help("UCRT builds require host runtime 4.2 or newer")
    )]
    UnsupportedRuntime { major: u32, minor: u32 },

    #[error("invalid host runtime descriptor `{input}`")]
    #[diagnostic(code(rustlet::config::invalid_runtime))]
    InvalidRuntime { input: String },

    #[error("`cargo` was not found on PATH or in the cargo home directory")]
    #[diagnostic(
        code(rustlet::config::cargo_missing),
        help("install Rust with rustup: https://rustup.rs")
    )]
    CargoNotFound,
}

/// The compiler exited with a non-zero status.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("{}", render_compile_errors(.messages))]
#[diagnostic(code(rustlet::compile::failed))]
pub struct CompileError {
    /// Rendered compiler error messages, in the order they were emitted.
    pub messages: Vec<String>,
}

fn render_compile_errors(messages: &[String]) -> String {
    let mut out = String::from("Rust code could not be compiled successfully. Aborting.");
    for (i, msg) in messages.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, msg.trim_end()));
    }
    out
}

/// The compiled library could not be located or loaded.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ArtifactError {
    #[error("expected build artifact `{}` was not produced", path.display())]
    #[diagnostic(code(rustlet::artifact::missing))]
    Missing { path: PathBuf },

    #[error("failed to load `{}`", path.display())]
    #[diagnostic(code(rustlet::artifact::load))]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
}

/// Any failure of the build pipeline.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum BuildError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BuildError::Config(ConfigError::MissingCompanionToolchain { searched }) => {
                Diagnostic::error(self.to_string())
                    .with_context(format!("searched {}", searched.display()))
                    .with_suggestion(suggestions::INSTALL_RTOOLS)
                    .with_suggestion(suggestions::RTOOLS_HOME)
            }
            BuildError::Config(ConfigError::CompanionPathNotFound { path }) => {
                Diagnostic::error(self.to_string())
                    .with_location(path)
                    .with_suggestion(suggestions::RTOOLS_HOME)
            }
            BuildError::Config(ConfigError::CargoNotFound) => {
                Diagnostic::error(self.to_string()).with_suggestion(suggestions::INSTALL_RUST)
            }
            BuildError::Config(err) => Diagnostic::error(err.to_string()),
            BuildError::Compile(err) => {
                let mut diag =
                    Diagnostic::error("Rust code could not be compiled successfully. Aborting.");
                if err.messages.is_empty() {
                    diag = diag.with_context("cargo exited unsuccessfully without reporting errors");
                }
                for (i, msg) in err.messages.iter().enumerate() {
                    diag = diag.with_context(format!("{}. {}", i + 1, msg.trim_end()));
                }
                diag.with_suggestion(suggestions::BUILD_FAILED)
            }
            BuildError::Artifact(ArtifactError::Missing { path }) => {
                Diagnostic::error(self.to_string())
                    .with_location(path)
                    .with_suggestion(suggestions::CLEAN_BUILD_DIR)
            }
            BuildError::Artifact(ArtifactError::Load { path, source }) => {
                Diagnostic::error(self.to_string())
                    .with_location(path)
                    .with_context(source.to_string())
            }
            BuildError::Other(err) => Diagnostic::error(format!("{:#}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_numbers_messages() {
        let err = CompileError {
            messages: vec![
                "error[E0425]: cannot find value `x`\n".to_string(),
                "error: aborting due to 1 previous error".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("Rust code could not be compiled successfully."));
        assert!(text.contains("\n1. error[E0425]: cannot find value `x`"));
        assert!(text.contains("\n2. error: aborting"));
    }

    #[test]
    fn test_empty_compile_error_is_generic() {
        let err = BuildError::from(CompileError { messages: vec![] });
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("could not be compiled"));
        assert!(output.contains("without reporting errors"));
    }

    #[test]
    fn test_companion_missing_has_suggestions() {
        let err = BuildError::from(ConfigError::MissingCompanionToolchain {
            searched: PathBuf::from("C:\\rtools43"),
        });
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("Rtools"));
        assert!(output.contains("help: consider:"));
    }
}

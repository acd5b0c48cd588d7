//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use rustlet::Profile;

/// rustlet - compile Rust snippets into loadable native libraries
#[derive(Parser)]
#[command(name = "rustlet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a file or snippet and load the library
    Build(BuildArgs),

    /// Compile snippets read from stdin, separated by `;;` lines
    Repl(ReplArgs),

    /// Show the toolchain plan and generated Cargo.toml without compiling
    Plan(PlanArgs),

    /// Remove scratch build directories left under the configured build dir
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Settings shared by every command that builds a request.
#[derive(Args, Clone, Debug, Default)]
pub struct RequestArgs {
    /// Add a dependency (`serde=1.0` or `serde={ version = "1", features = ["derive"] }`)
    #[arg(long = "dep", value_name = "NAME=SPEC")]
    pub deps: Vec<String>,

    /// Declare and enable a feature that turns on dependency features (`fast=rand/simd_support`)
    #[arg(long = "feature", value_name = "NAME=DEP,...")]
    pub features: Vec<String>,

    /// Environment variable for the cargo process
    #[arg(long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Build profile: dev, release or perf
    #[arg(long)]
    pub profile: Option<Profile>,

    /// Toolchain channel (e.g. nightly)
    #[arg(long, env = "RUSTLET_TOOLCHAIN")]
    pub toolchain: Option<String>,

    /// Use a fresh build directory and delete it afterwards
    #[arg(long)]
    pub no_cache: bool,

    /// Suppress compiler warnings and cargo's stderr
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "code"])))]
pub struct BuildArgs {
    /// Rust source file to compile
    pub file: Option<PathBuf>,

    /// Inline Rust source to compile
    #[arg(long)]
    pub code: Option<String>,

    /// Check that the library exports this symbol
    #[arg(long = "symbol", value_name = "NAME")]
    pub symbols: Vec<String>,

    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args)]
pub struct ReplArgs {
    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Rust source file the manifest is generated for
    #[arg(conflicts_with = "code")]
    pub file: Option<PathBuf>,

    /// Inline Rust source the manifest is generated for
    #[arg(long)]
    pub code: Option<String>,

    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Args)]
pub struct CleanArgs {}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

//! rustlet CLI - compile Rust snippets into loadable libraries

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use rustlet::util::diagnostic::emit;
use rustlet::util::shell::ColorChoice;
use rustlet::{BuildError, Shell};

fn main() {
    let cli = Cli::parse();
    let color = if cli.no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let shell = Arc::new(Shell::from_flags(false, cli.verbose, color));

    if let Err(e) = run(cli, Arc::clone(&shell)) {
        report(&e, &shell);
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: Arc<Shell>) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("rustlet=debug")
    } else {
        EnvFilter::new("rustlet=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, shell),
        Commands::Repl(args) => commands::repl::execute(args, shell),
        Commands::Plan(args) => commands::plan::execute(args, shell),
        Commands::Clean(args) => commands::clean::execute(args, shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print a top-level error, with suggestions for pipeline failures.
pub(crate) fn report(e: &anyhow::Error, shell: &Shell) {
    match e.downcast_ref::<BuildError>() {
        Some(err) => emit(&err.to_diagnostic(), shell.use_color()),
        None => shell.error(format!("{:#}", e)),
    }
}

//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod plan;
pub mod repl;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::RequestArgs;
use rustlet::core::dependency::DependencySpec;
use rustlet::util::config::{load_default_config, Config};
use rustlet::{BuildError, BuildRequest, Session, Shell, SourcePayload};

/// Open a session on the merged global and project configuration.
pub fn open_session(shell: Arc<Shell>) -> Result<Session> {
    let config = load_default_config();
    Ok(Session::new(config, shell).map_err(BuildError::from)?)
}

/// Build a request: configured defaults first, then command-line settings.
pub fn build_request(
    args: &RequestArgs,
    source: SourcePayload,
    config: &Config,
) -> Result<BuildRequest> {
    let builder = match source {
        SourcePayload::Code(code) => BuildRequest::code(code),
        SourcePayload::File(path) => BuildRequest::file(path),
    };
    let mut builder = config.apply_defaults(builder).map_err(BuildError::from)?;

    for dep in &args.deps {
        let (name, spec) = DependencySpec::parse_pair(dep).map_err(BuildError::from)?;
        builder = builder.dependency(name, spec);
    }
    for feature in &args.features {
        let (name, enables) = parse_feature(feature)?;
        builder = builder.feature(name, enables);
    }
    for pair in &args.env {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --env `{}`: expected KEY=VALUE", pair);
        };
        builder = builder.env(key, value);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }
    if args.toolchain.is_some() {
        builder = builder.toolchain(args.toolchain.clone());
    }
    if args.no_cache {
        builder = builder.cache(false);
    }
    if args.quiet {
        builder = builder.quiet(true);
    }

    Ok(builder.build().map_err(BuildError::from)?)
}

/// Parse `name=dep/feat,dep2`. A bare name declares an empty feature.
pub fn parse_feature(input: &str) -> Result<(String, Vec<String>)> {
    let (name, enables) = input.split_once('=').unwrap_or((input, ""));
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid --feature `{}`: missing feature name", input);
    }
    let enables = enables
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok((name.to_string(), enables))
}

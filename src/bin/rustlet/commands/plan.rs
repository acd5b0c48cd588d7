//! `rustlet plan` command

use std::sync::Arc;

use anyhow::Result;

use super::{build_request, open_session};
use crate::cli::PlanArgs;
use rustlet::{BuildError, Shell, SourcePayload};

pub fn execute(args: PlanArgs, shell: Arc<Shell>) -> Result<()> {
    let source = match (args.file, args.code) {
        (Some(path), _) => SourcePayload::File(path),
        (None, code) => SourcePayload::Code(code.unwrap_or_default()),
    };

    let session = open_session(shell)?;
    let request = build_request(&args.request, source, session.config())?;
    let plan = session
        .plan(request.toolchain())
        .map_err(BuildError::from)?;

    print!("{}", plan);
    println!("profile:   {}", request.profile());
    println!();
    print!("{}", session.preview_manifest(&request)?);

    Ok(())
}

//! `rustlet build` command

use std::sync::Arc;

use anyhow::{bail, Result};

use super::{build_request, open_session};
use crate::cli::BuildArgs;
use rustlet::util::diagnostic::{emit, suggestions, Diagnostic};
use rustlet::{Shell, SourcePayload};

pub fn execute(args: BuildArgs, shell: Arc<Shell>) -> Result<()> {
    let source = match (args.file, args.code) {
        (Some(path), _) => SourcePayload::File(path),
        (None, Some(code)) => SourcePayload::Code(code),
        (None, None) => bail!("either FILE or --code is required"),
    };

    let mut session = open_session(Arc::clone(&shell))?;
    let request = build_request(&args.request, source, session.config())?;
    let compiled = session.compile(&request)?;

    println!("{}", compiled.path().display());

    let missing: Vec<&str> = args
        .symbols
        .iter()
        .map(String::as_str)
        .filter(|name| !compiled.library.has_symbol(name))
        .collect();
    for name in &args.symbols {
        if missing.contains(&name.as_str()) {
            let diag = Diagnostic::warning(format!("symbol `{}` is not exported", name))
                .with_location(compiled.path())
                .with_suggestion(suggestions::EXPORT_SYMBOL);
            emit(&diag, shell.use_color());
        } else {
            shell.note(format!("symbol `{}` found", name));
        }
    }
    if !missing.is_empty() {
        bail!("library does not export: {}", missing.join(", "));
    }

    Ok(())
}

//! `rustlet repl` command
//!
//! Reads snippets from stdin and compiles each one in the same session, so
//! the build directory and compiled dependencies are shared between them.

use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::Result;

use super::{build_request, open_session};
use crate::cli::ReplArgs;
use rustlet::{Shell, SourcePayload};

/// Line that ends a snippet.
pub const SEPARATOR: &str = ";;";

/// Splits a stream into snippets at [`SEPARATOR`] lines.
pub struct Snippets<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> Snippets<R> {
    pub fn new(reader: R) -> Self {
        Snippets {
            reader,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for Snippets<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let mut snippet = String::new();
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line) {
                    Ok(0) => {
                        self.done = true;
                        break;
                    }
                    Ok(_) if line.trim() == SEPARATOR => break,
                    Ok(_) => snippet.push_str(&line),
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
            }
            // Blank snippets (`;;` twice, trailing whitespace) are skipped.
            if !snippet.trim().is_empty() {
                return Some(Ok(snippet));
            }
        }
        None
    }
}

pub fn execute(args: ReplArgs, shell: Arc<Shell>) -> Result<()> {
    let mut session = open_session(Arc::clone(&shell))?;
    let stdin = io::stdin();
    let mut failures = 0usize;

    for snippet in Snippets::new(stdin.lock()) {
        let request = build_request(&args.request, SourcePayload::Code(snippet?), session.config())?;
        match session.compile(&request) {
            Ok(compiled) => println!("{}", compiled.path().display()),
            Err(e) => {
                failures += 1;
                crate::report(&anyhow::Error::from(e), &shell);
            }
        }
    }

    if failures > 0 {
        shell.warn(format!("{} snippet(s) failed to compile", failures));
    }
    Ok(())
}

//! Cargo's JSON diagnostic stream.
//!
//! Cargo is run with `--message-format=json-diagnostic-rendered-ansi`, which
//! prints one JSON object per line. Only `compiler-message` records matter:
//! warnings are shown as soon as they arrive, errors are held back and only
//! reported if cargo exits unsuccessfully.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::util::shell::Shell;

/// Reason tag of records carrying rustc diagnostics.
pub const COMPILER_MESSAGE: &str = "compiler-message";

#[derive(Debug, Deserialize)]
struct RawRecord {
    reason: String,
    #[serde(default)]
    message: Option<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    level: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    rendered: Option<String>,
}

/// Diagnostic severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    /// note, help, failure-note, ...
    Other(String),
}

impl Level {
    fn parse(level: &str) -> Self {
        match level {
            // Internal compiler errors use "error: internal compiler error".
            l if l == "error" || l.starts_with("error:") => Level::Error,
            "warning" => Level::Warning,
            other => Level::Other(other.to_string()),
        }
    }
}

/// One compiler diagnostic from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub level: Level,
    /// Display text, possibly with ANSI sequences.
    pub rendered: String,
}

impl DiagnosticRecord {
    /// Parse one line of cargo output.
    ///
    /// Returns `None` for records that are not compiler messages (artifacts,
    /// build-script output, `build-finished`) and for lines that are not JSON.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let record: RawRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("skipping non-JSON cargo output ({}): {}", e, line);
                return None;
            }
        };

        if record.reason != COMPILER_MESSAGE {
            return None;
        }

        let message = record.message?;
        let rendered = message.rendered.unwrap_or(message.message);
        Some(DiagnosticRecord {
            level: Level::parse(&message.level),
            rendered,
        })
    }
}

/// Warnings and errors collected from one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedDiagnostics {
    pub success: bool,
    pub warnings: Vec<String>,
    /// Empty on success.
    pub errors: Vec<String>,
}

/// Buckets diagnostics by severity as they stream in.
pub struct DiagnosticProcessor<'a> {
    shell: &'a Shell,
    quiet: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl<'a> DiagnosticProcessor<'a> {
    pub fn new(shell: &'a Shell, quiet: bool) -> Self {
        DiagnosticProcessor {
            shell,
            quiet,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn render(&self, rendered: &str) -> String {
        if self.shell.use_color() {
            rendered.to_string()
        } else {
            strip_ansi(rendered)
        }
    }

    /// Handle one record. Warnings are emitted immediately unless quiet.
    pub fn accept(&mut self, record: DiagnosticRecord) {
        match record.level {
            Level::Warning => {
                let text = self.render(&record.rendered);
                if !self.quiet {
                    self.shell.compiler_message(&text);
                }
                self.warnings.push(text);
            }
            Level::Error => {
                let text = self.render(&record.rendered);
                self.errors.push(text);
            }
            Level::Other(level) => {
                tracing::trace!("ignoring `{}` diagnostic", level);
            }
        }
    }

    /// Finish processing given cargo's exit code (`None` if killed by a signal).
    ///
    /// The exit code alone decides success; a failure without parsed errors
    /// still fails.
    pub fn finish(self, exit_code: Option<i32>) -> ProcessedDiagnostics {
        let success = exit_code == Some(0);
        ProcessedDiagnostics {
            success,
            warnings: self.warnings,
            errors: if success { Vec::new() } else { self.errors },
        }
    }
}

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07").expect("valid ANSI regex")
});

/// Remove ANSI escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").into_owned()
}

/// Double `{` and `}` so compiler text survives brace-placeholder templates.
pub fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::shell::Verbosity;

    fn message(level: &str, rendered: &str) -> String {
        serde_json::json!({
            "reason": "compiler-message",
            "package_id": "rustlet1 0.0.1 (path+file:///tmp/x)",
            "message": { "level": level, "message": "msg", "rendered": rendered }
        })
        .to_string()
    }

    #[test]
    fn test_parse_filters_reasons() {
        assert!(DiagnosticRecord::parse(r#"{"reason":"build-finished","success":true}"#).is_none());
        assert!(DiagnosticRecord::parse(
            r#"{"reason":"compiler-artifact","filenames":["/tmp/librustlet1.so"]}"#
        )
        .is_none());
        assert!(DiagnosticRecord::parse("   Compiling libc v0.2.150").is_none());
        assert!(DiagnosticRecord::parse("").is_none());

        let rec = DiagnosticRecord::parse(&message("warning", "warning: unused")).unwrap();
        assert_eq!(rec.level, Level::Warning);
        assert_eq!(rec.rendered, "warning: unused");
    }

    #[test]
    fn test_ice_counts_as_error() {
        let rec = DiagnosticRecord::parse(&message("error: internal compiler error", "boom"))
            .unwrap();
        assert_eq!(rec.level, Level::Error);
    }

    #[test]
    fn test_rendered_falls_back_to_message() {
        let line = r#"{"reason":"compiler-message","message":{"level":"error","message":"plain"}}"#;
        assert_eq!(DiagnosticRecord::parse(line).unwrap().rendered, "plain");
    }

    #[test]
    fn test_warnings_emitted_errors_held() {
        let shell = Shell::capture(Verbosity::Normal);
        let mut processor = DiagnosticProcessor::new(&shell, false);

        for line in [
            message("error", "error[E0425]: first"),
            message("warning", "warning: unused"),
            message("note", "note: ignored"),
            message("error", "error: second"),
        ] {
            processor.accept(DiagnosticRecord::parse(&line).unwrap());
        }

        assert_eq!(shell.captured(), vec!["warning: unused".to_string()]);

        let out = processor.finish(Some(101));
        assert!(!out.success);
        assert_eq!(out.errors, vec!["error[E0425]: first", "error: second"]);
        assert_eq!(out.warnings, vec!["warning: unused"]);
    }

    #[test]
    fn test_success_with_empty_stream() {
        let shell = Shell::capture(Verbosity::Normal);
        let out = DiagnosticProcessor::new(&shell, false).finish(Some(0));
        assert_eq!(
            out,
            ProcessedDiagnostics {
                success: true,
                warnings: vec![],
                errors: vec![],
            }
        );
    }

    #[test]
    fn test_failure_without_errors_and_signal_exit() {
        let shell = Shell::capture(Verbosity::Normal);
        let out = DiagnosticProcessor::new(&shell, false).finish(Some(1));
        assert!(!out.success);
        assert!(out.errors.is_empty());

        let out = DiagnosticProcessor::new(&shell, false).finish(None);
        assert!(!out.success);
    }

    #[test]
    fn test_quiet_keeps_warnings_silent() {
        let shell = Shell::capture(Verbosity::Normal);
        let mut processor = DiagnosticProcessor::new(&shell, true);
        processor.accept(DiagnosticRecord::parse(&message("warning", "warning: w")).unwrap());
        assert!(shell.captured().is_empty());
        assert_eq!(processor.finish(Some(0)).warnings.len(), 1);
    }

    #[test]
    fn test_colorless_shell_strips_ansi() {
        let shell = Shell::capture(Verbosity::Normal);
        let mut processor = DiagnosticProcessor::new(&shell, false);
        processor.accept(
            DiagnosticRecord::parse(&message(
                "warning",
                "\u{1b}[0m\u{1b}[1m\u{1b}[33mwarning\u{1b}[0m: unused",
            ))
            .unwrap(),
        );
        assert_eq!(shell.captured(), vec!["warning: unused".to_string()]);
    }

    #[test]
    fn test_escape_braces() {
        assert_eq!(
            escape_braces("expected `{integer}`, found `()`"),
            "expected `{{integer}}`, found `()`"
        );
    }
}

//! Library naming.
//!
//! Every build produces a library with a distinct crate name. Inline sources
//! get `rustlet<N>` from a per-session counter; file sources use the file stem,
//! moved out of the anonymous namespace when the stem looks like `rustlet<N>`.
//! A fresh name per inline build keeps a newly built library from colliding
//! with one that is still loaded.

use std::path::Path;

/// Prefix for anonymous library names.
pub const ANONYMOUS_PREFIX: &str = "rustlet";

/// Monotonic name source for anonymous builds.
#[derive(Debug, Clone, Default)]
pub struct LibraryNamer {
    counter: u64,
}

impl LibraryNamer {
    pub fn new() -> Self {
        LibraryNamer::default()
    }

    /// Next anonymous name: `rustlet1`, `rustlet2`, ...
    pub fn next_anonymous(&mut self) -> String {
        self.counter += 1;
        format!("{}{}", ANONYMOUS_PREFIX, self.counter)
    }

    /// Number of anonymous names handed out so far.
    pub fn count(&self) -> u64 {
        self.counter
    }
}

/// Prefix for file stems that would shadow an anonymous name.
pub const FILE_PREFIX: &str = "file_";

/// Name for a file-based source, derived from its stem.
pub fn name_for_file(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = sanitize(&stem);
    if is_anonymous(&name) {
        format!("{}{}", FILE_PREFIX, name)
    } else {
        name
    }
}

/// Whether `name` is in the `rustlet<N>` form handed out by [`LibraryNamer`].
pub fn is_anonymous(name: &str) -> bool {
    name.strip_prefix(ANONYMOUS_PREFIX)
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Reduce `raw` to a valid crate identifier.
///
/// Characters outside `[A-Za-z0-9_]` are dropped; an empty or digit-leading
/// result gets the anonymous prefix.
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();

    match cleaned.chars().next() {
        None => ANONYMOUS_PREFIX.to_string(),
        Some(c) if c.is_ascii_digit() => format!("{}_{}", ANONYMOUS_PREFIX, cleaned),
        Some(_) => cleaned,
    }
}

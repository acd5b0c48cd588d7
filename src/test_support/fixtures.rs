//! Source fixtures for pipeline tests.

use std::path::{Path, PathBuf};

/// A snippet exporting one C-ABI function.
pub const ADD_SNIPPET: &str = r#"
#[no_mangle]
pub extern "C" fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#;

/// Write `content` to `dir/file_name` and return the path.
pub fn write_source(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = dir.join(file_name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(&path, content).expect("write fixture source");
    path
}

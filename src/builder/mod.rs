//! Build pipeline pieces.
//!
//! Target resolution, the scratch build directory, the cargo invocation with
//! its diagnostic stream, and loading of the produced library.

pub mod artifact;
pub mod build_dir;
pub mod cargo;
pub mod diagnostics;
pub mod target;

pub use artifact::{load_library, NativeLibrary};
pub use build_dir::{BuildCache, ReleaseGuard};
pub use cargo::{CargoRunner, CompilerRunner};
pub use diagnostics::{DiagnosticProcessor, DiagnosticRecord, ProcessedDiagnostics};
pub use target::{
    resolve_plan, CompanionProbe, CrtFlavor, HostDescriptor, HostOs, RuntimeInfo, SystemProbe,
    ToolchainPlan,
};

//! Generated `Cargo.toml` and `.cargo/config.toml` documents.
//!
//! Both files are built as typed documents and serialized with `toml`; no
//! string templating is involved.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::dependency::DependencyMap;
use crate::core::request::{BuildRequest, FeatureMap, PatchMap};

/// Version written into every generated package.
pub const PACKAGE_VERSION: &str = "0.0.1";

/// Rust edition of generated packages.
pub const EDITION: &str = "2021";

/// Target directory name, relative to the build directory.
pub const TARGET_DIR: &str = "target";

/// The generated package manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub package: PackageSection,
    pub lib: LibSection,
    pub dependencies: DependencyMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub patch: PatchMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub features: FeatureMap,
    pub profile: BTreeMap<String, ProfileSection>,
    /// Empty `[workspace]` keeps an enclosing workspace from claiming the package.
    pub workspace: WorkspaceSection,
}

/// `[package]`
#[derive(Debug, Clone, Serialize)]
pub struct PackageSection {
    pub name: String,
    pub version: String,
    pub edition: String,
    pub publish: bool,
}

/// `[lib]`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LibSection {
    pub path: String,
    pub crate_type: Vec<String>,
}

/// A `[profile.<name>]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileSection {
    pub inherits: String,
    pub lto: String,
    pub opt_level: u8,
    pub panic: String,
    pub codegen_units: u32,
}

impl ProfileSection {
    /// The `perf` profile: release plus thin LTO, abort on panic, one codegen unit.
    pub fn perf() -> Self {
        ProfileSection {
            inherits: "release".to_string(),
            lto: "thin".to_string(),
            opt_level: 3,
            panic: "abort".to_string(),
            codegen_units: 1,
        }
    }
}

/// `[workspace]`
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkspaceSection {}

impl Manifest {
    /// Build the manifest for `request`, compiled as library `lib_name`.
    ///
    /// `base` is the mandatory dependency set; request dependencies with the
    /// same name replace the base entry.
    pub fn synthesize(request: &BuildRequest, lib_name: &str, base: &DependencyMap) -> Self {
        let mut dependencies = base.clone();
        dependencies.extend(
            request
                .dependencies()
                .iter()
                .map(|(name, spec)| (name.clone(), spec.clone())),
        );

        // Emitted unconditionally so `--profile=perf` never needs a re-synthesis.
        let profile = BTreeMap::from([("perf".to_string(), ProfileSection::perf())]);

        Manifest {
            package: PackageSection {
                name: lib_name.to_string(),
                version: PACKAGE_VERSION.to_string(),
                edition: EDITION.to_string(),
                publish: false,
            },
            lib: LibSection {
                path: "src/lib.rs".to_string(),
                crate_type: vec!["cdylib".to_string()],
            },
            dependencies,
            patch: request
                .patch()
                .iter()
                .filter(|(_, deps)| !deps.is_empty())
                .map(|(registry, deps)| (registry.clone(), deps.clone()))
                .collect(),
            features: request.features().clone(),
            profile,
            workspace: WorkspaceSection::default(),
        }
    }

    /// Serialize to `Cargo.toml` text.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize Cargo.toml")
    }
}

/// The generated `.cargo/config.toml`.
#[derive(Debug, Clone, Serialize)]
pub struct CargoConfig {
    pub build: CargoBuildSection,
}

/// `[build]` of `.cargo/config.toml`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CargoBuildSection {
    pub rustflags: Vec<String>,
    pub target_dir: String,
}

impl Default for CargoConfig {
    fn default() -> Self {
        CargoConfig {
            build: CargoBuildSection {
                rustflags: vec!["-C".to_string(), "target-cpu=native".to_string()],
                target_dir: TARGET_DIR.to_string(),
            },
        }
    }
}

impl CargoConfig {
    /// Serialize to `.cargo/config.toml` text.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("failed to serialize .cargo/config.toml")
    }
}

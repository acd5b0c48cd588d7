//! Configuration file support for rustlet.
//!
//! Two locations are consulted:
//! - Global: `<config dir>/rustlet/config.toml` - user-wide defaults
//! - Project: `.rustlet/config.toml` - overrides for the current directory
//!
//! Project config takes precedence over global config.
//!
//! ```toml
//! [build]
//! toolchain = "stable"
//! profile = "release"
//! cache = true
//!
//! [dependencies]
//! libc = "0.2"
//!
//! [patch.crates-io]
//! libc = { git = "https://github.com/rust-lang/libc" }
//!
//! [host]
//! runtime = "4.3"
//! crt = "ucrt"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::target::{CrtFlavor, RuntimeInfo};
use crate::core::dependency::{DependencyMap, DependencySpec};
use crate::core::errors::ConfigError;
use crate::core::request::{BuildRequestBuilder, Profile};

/// Name of the dependency every generated library links against.
pub const BASE_DEPENDENCY: &str = "libc";

/// Version requirement used for [`BASE_DEPENDENCY`] unless configured.
pub const BASE_DEPENDENCY_VERSION: &str = "0.2";

/// rustlet configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Extra base dependencies added to every generated manifest
    pub dependencies: DependencyMap,

    /// Default registry patches, keyed by registry name
    pub patch: BTreeMap<String, DependencyMap>,

    /// Host runtime description used on Windows
    pub host: HostConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Toolchain channel passed as `+<channel>` (e.g. "stable", "nightly")
    pub toolchain: Option<String>,

    /// Default build profile (dev, release, perf)
    pub profile: Option<String>,

    /// Reuse the build directory across builds
    pub cache: Option<bool>,

    /// Suppress compiler warnings and cargo stderr
    pub quiet: Option<bool>,

    /// Parent directory for scratch build directories (system temp if unset)
    pub dir: Option<PathBuf>,
}

/// Host runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host runtime version as `<major>.<minor>`
    pub runtime: Option<String>,

    /// C runtime flavor of the host ("ucrt" or "msvcrt")
    pub crt: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.toolchain.is_some() {
            self.build.toolchain = other.build.toolchain;
        }
        if other.build.profile.is_some() {
            self.build.profile = other.build.profile;
        }
        if other.build.cache.is_some() {
            self.build.cache = other.build.cache;
        }
        if other.build.quiet.is_some() {
            self.build.quiet = other.build.quiet;
        }
        if other.build.dir.is_some() {
            self.build.dir = other.build.dir;
        }

        self.dependencies.extend(other.dependencies);
        for (registry, deps) in other.patch {
            self.patch.entry(registry).or_default().extend(deps);
        }

        if other.host.runtime.is_some() {
            self.host.runtime = other.host.runtime;
        }
        if other.host.crt.is_some() {
            self.host.crt = other.host.crt;
        }
    }

    /// The mandatory dependency set: [`BASE_DEPENDENCY`] plus configured extras.
    pub fn base_dependencies(&self) -> DependencyMap {
        let mut deps = DependencyMap::new();
        deps.insert(
            BASE_DEPENDENCY.to_string(),
            DependencySpec::version(BASE_DEPENDENCY_VERSION),
        );
        deps.extend(self.dependencies.clone());
        deps
    }

    /// Configured default profile, if any.
    pub fn profile(&self) -> Result<Option<Profile>, ConfigError> {
        self.build.profile.as_deref().map(str::parse::<Profile>).transpose()
    }

    /// Whether builds reuse the build directory (default: true).
    pub fn cache(&self) -> bool {
        self.build.cache.unwrap_or(true)
    }

    /// Whether builds are quiet by default (default: false).
    pub fn quiet(&self) -> bool {
        self.build.quiet.unwrap_or(false)
    }

    /// Parse the `[host]` section.
    pub fn runtime(&self) -> Result<Option<RuntimeInfo>, ConfigError> {
        let Some(version) = self.host.runtime.as_deref() else {
            return Ok(None);
        };
        let crt = match self.host.crt.as_deref() {
            Some(crt) => crt.parse()?,
            None => CrtFlavor::Ucrt,
        };
        RuntimeInfo::parse(version, crt).map(Some)
    }

    /// Seed a request with configured defaults.
    ///
    /// Settings applied to the builder afterwards override these.
    pub fn apply_defaults(
        &self,
        builder: BuildRequestBuilder,
    ) -> Result<BuildRequestBuilder, ConfigError> {
        let mut builder = builder
            .toolchain(self.build.toolchain.clone())
            .patches(self.patch.clone())
            .cache(self.cache())
            .quiet(self.quiet());
        if let Some(profile) = self.profile()? {
            builder = builder.profile(profile);
        }
        Ok(builder)
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.rustlet/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "rustlet").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Get the project config path (.rustlet/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".rustlet").join("config.toml")
}

/// Load configuration for the current working directory.
pub fn load_default_config() -> Config {
    let cwd = std::env::current_dir().unwrap_or_default();
    let global = global_config_path().unwrap_or_default();
    load_config(&global, &project_config_path(&cwd))
}

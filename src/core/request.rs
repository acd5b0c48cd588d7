//! Build requests and build profiles.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::dependency::{DependencyMap, DependencySpec};
use crate::core::errors::ConfigError;

/// Build profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Unoptimized, with debug info.
    #[default]
    Dev,
    /// Cargo's release profile.
    Release,
    /// `perf`: release with thin LTO, abort on panic, one codegen unit.
    Perf,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Dev => "dev",
            Profile::Release => "release",
            Profile::Perf => "perf",
        }
    }

    /// Cargo arguments selecting this profile.
    pub fn cargo_args(&self) -> Vec<String> {
        match self {
            Profile::Dev => Vec::new(),
            Profile::Release => vec!["--release".to_string()],
            Profile::Perf => vec!["--profile=perf".to_string()],
        }
    }

    /// Folder under the target directory holding this profile's output.
    ///
    /// Cargo keeps the historical `debug` folder name for `dev`.
    pub fn output_dir_name(&self) -> &'static str {
        match self {
            Profile::Dev => "debug",
            Profile::Release => "release",
            Profile::Perf => "perf",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Profile::Dev),
            "release" => Ok(Profile::Release),
            "perf" => Ok(Profile::Perf),
            _ => Err(ConfigError::InvalidProfile {
                name: s.to_string(),
            }),
        }
    }
}

/// Where the Rust source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
    /// Inline source text.
    Code(String),
    /// A `.rs` file on disk.
    File(PathBuf),
}

/// Feature table: feature name to the dependency features it enables.
pub type FeatureMap = BTreeMap<String, Vec<String>>;

/// Registry patch table: registry name to dependency overrides.
pub type PatchMap = BTreeMap<String, DependencyMap>;

/// One immutable build request.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    source: SourcePayload,
    dependencies: DependencyMap,
    patch: PatchMap,
    features: FeatureMap,
    profile: Profile,
    toolchain: Option<String>,
    env: BTreeMap<String, String>,
    cache: bool,
    quiet: bool,
}

impl BuildRequest {
    /// Start a request for inline source.
    pub fn code(source: impl Into<String>) -> BuildRequestBuilder {
        BuildRequestBuilder::new(SourcePayload::Code(source.into()))
    }

    /// Start a request for a source file.
    pub fn file(path: impl Into<PathBuf>) -> BuildRequestBuilder {
        BuildRequestBuilder::new(SourcePayload::File(path.into()))
    }

    pub fn source(&self) -> &SourcePayload {
        &self.source
    }

    /// User-declared dependencies.
    pub fn dependencies(&self) -> &DependencyMap {
        &self.dependencies
    }

    pub fn patch(&self) -> &PatchMap {
        &self.patch
    }

    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Toolchain channel override (e.g. "nightly").
    pub fn toolchain(&self) -> Option<&str> {
        self.toolchain.as_deref()
    }

    /// Extra environment for the compiler subprocess.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Whether the build directory may be reused.
    pub fn cache(&self) -> bool {
        self.cache
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }
}

/// Builder for [`BuildRequest`].
#[derive(Debug, Clone)]
pub struct BuildRequestBuilder {
    request: BuildRequest,
}

impl BuildRequestBuilder {
    fn new(source: SourcePayload) -> Self {
        BuildRequestBuilder {
            request: BuildRequest {
                source,
                dependencies: DependencyMap::new(),
                patch: PatchMap::new(),
                features: FeatureMap::new(),
                profile: Profile::default(),
                toolchain: None,
                env: BTreeMap::new(),
                cache: true,
                quiet: false,
            },
        }
    }

    /// Declare a dependency.
    pub fn dependency(mut self, name: impl Into<String>, spec: impl Into<DependencySpec>) -> Self {
        self.request.dependencies.insert(name.into(), spec.into());
        self
    }

    /// Declare several dependencies.
    pub fn dependencies(mut self, deps: impl IntoIterator<Item = (String, DependencySpec)>) -> Self {
        self.request.dependencies.extend(deps);
        self
    }

    /// Add a registry patch entry.
    pub fn patch(
        mut self,
        registry: impl Into<String>,
        name: impl Into<String>,
        spec: impl Into<DependencySpec>,
    ) -> Self {
        self.request
            .patch
            .entry(registry.into())
            .or_default()
            .insert(name.into(), spec.into());
        self
    }

    /// Merge a whole patch table; entries already present win.
    pub fn patches(mut self, patches: PatchMap) -> Self {
        for (registry, deps) in patches {
            let table = self.request.patch.entry(registry).or_default();
            for (name, spec) in deps {
                table.entry(name).or_insert(spec);
            }
        }
        self
    }

    /// Declare a feature and the dependency features it enables.
    pub fn feature(mut self, name: impl Into<String>, enables: Vec<String>) -> Self {
        self.request.features.insert(name.into(), enables);
        self
    }

    pub fn profile(mut self, profile: Profile) -> Self {
        self.request.profile = profile;
        self
    }

    pub fn toolchain(mut self, toolchain: Option<String>) -> Self {
        self.request.toolchain = toolchain.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.env.insert(key.into(), value.into());
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.request.cache = cache;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.request.quiet = quiet;
        self
    }

    /// Validate and finish the request.
    pub fn build(self) -> Result<BuildRequest, ConfigError> {
        for (name, spec) in &self.request.dependencies {
            spec.validate(name)?;
        }
        for deps in self.request.patch.values() {
            for (name, spec) in deps {
                spec.validate(name)?;
            }
        }
        Ok(self.request)
    }
}

//! Dependency specification.
//!
//! Dependencies are forwarded to the generated `Cargo.toml` verbatim. The only
//! validation done here is rejecting an empty specification; anything else that
//! cargo does not understand is reported by cargo itself.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

/// Dependency specification as it appears in `[dependencies]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple version string: `foo = "1.0"`
    Simple(String),

    /// Detailed specification
    Detailed(DetailedDependencySpec),
}

/// Detailed dependency specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DetailedDependencySpec {
    /// Version requirement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Path to local dependency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Git repository URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,

    /// Git branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Git tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Git revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Alternative registry name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,

    /// Real package name when the key is a rename
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Whether this dependency is optional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,

    /// Features to enable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,

    /// Whether to use default features
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_features: Option<bool>,
}

/// Ordered dependency table, keyed by dependency name.
pub type DependencyMap = BTreeMap<String, DependencySpec>;

impl DependencySpec {
    /// Shorthand for a plain version requirement.
    pub fn version(req: impl Into<String>) -> Self {
        DependencySpec::Simple(req.into())
    }

    /// Whether the specification carries nothing at all.
    pub fn is_empty(&self) -> bool {
        match self {
            DependencySpec::Simple(v) => v.trim().is_empty(),
            DependencySpec::Detailed(d) => *d == DetailedDependencySpec::default(),
        }
    }

    /// Reject an empty specification for the dependency `name`.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Err(ConfigError::NullDependency {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Parse a `name=spec` pair as given on the command line.
    ///
    /// `spec` is either a bare version requirement (`serde=1.0`) or a TOML
    /// inline table (`serde={ version = "1", features = ["derive"] }`).
    pub fn parse_pair(pair: &str) -> Result<(String, DependencySpec), ConfigError> {
        let (name, spec) = match pair.split_once('=') {
            Some((name, spec)) => (name.trim(), spec.trim()),
            None => (pair.trim(), ""),
        };

        if name.is_empty() {
            return Err(ConfigError::InvalidDependency {
                input: pair.to_string(),
                reason: "missing dependency name".to_string(),
            });
        }

        let dep = if spec.starts_with('{') {
            #[derive(Deserialize)]
            struct Wrapper {
                dep: DetailedDependencySpec,
            }
            let wrapper: Wrapper = toml::from_str(&format!("dep = {}", spec)).map_err(|e| {
                ConfigError::InvalidDependency {
                    input: pair.to_string(),
                    reason: e.message().to_string(),
                }
            })?;
            DependencySpec::Detailed(wrapper.dep)
        } else {
            DependencySpec::Simple(spec.trim_matches('"').to_string())
        };

        dep.validate(name)?;
        Ok((name.to_string(), dep))
    }
}

impl From<&str> for DependencySpec {
    fn from(s: &str) -> Self {
        DependencySpec::Simple(s.to_string())
    }
}

//! Target resolution.
//!
//! Maps a [`HostDescriptor`] to a [`ToolchainPlan`]. Resolution is a pure
//! function of the descriptor and a [`CompanionProbe`], so every platform
//! branch is testable from any host.
//!
//! Only Windows needs work: libraries are built for the GNU target so they
//! match a MinGW-built host, which in turn needs the MinGW-w64 toolchain
//! shipped with Rtools. UCRT hosts need the Rtools release matching the host
//! runtime version, whose compiler directory is put on `PATH` for the build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::errors::ConfigError;
use crate::core::manifest::TARGET_DIR;
use crate::core::request::Profile;

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    Linux,
    /// Any other Unix-like system.
    OtherUnix,
}

impl HostOs {
    /// The OS this binary was compiled for.
    pub fn current() -> Self {
        HostOs::from_os_str(std::env::consts::OS)
    }

    /// Classify a `std::env::consts::OS` value.
    pub fn from_os_str(os: &str) -> Self {
        match os {
            "windows" => HostOs::Windows,
            "macos" | "ios" => HostOs::MacOs,
            "linux" | "android" => HostOs::Linux,
            _ => HostOs::OtherUnix,
        }
    }
}

/// C runtime flavor of the host process on Windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrtFlavor {
    /// Legacy `msvcrt.dll`.
    Msvcrt,
    /// Universal C runtime.
    Ucrt,
}

impl FromStr for CrtFlavor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "msvcrt" => Ok(CrtFlavor::Msvcrt),
            "ucrt" => Ok(CrtFlavor::Ucrt),
            _ => Err(ConfigError::InvalidRuntime {
                input: s.to_string(),
            }),
        }
    }
}

/// Version and C runtime of the host runtime embedding the libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub major: u32,
    pub minor: u32,
    pub crt: CrtFlavor,
}

impl RuntimeInfo {
    /// Parse `<major>.<minor>[.<patch>]`.
    pub fn parse(version: &str, crt: CrtFlavor) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidRuntime {
            input: version.to_string(),
        };
        let mut parts = version.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        Ok(RuntimeInfo { major, minor, crt })
    }
}

/// Everything target resolution needs to know about the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDescriptor {
    pub os: HostOs,
    /// CPU architecture as in `std::env::consts::ARCH`.
    pub arch: String,
    pub runtime: Option<RuntimeInfo>,
}

impl HostDescriptor {
    /// Describe the current host.
    pub fn current(runtime: Option<RuntimeInfo>) -> Self {
        HostDescriptor {
            os: HostOs::current(),
            arch: std::env::consts::ARCH.to_string(),
            runtime,
        }
    }
}

/// Resolved toolchain parameters for one build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainPlan {
    /// Toolchain channel passed as `+<channel>`.
    pub channel: Option<String>,
    /// Explicit target triple; `None` builds for the host default.
    pub target: Option<String>,
    /// Directories put in front of `PATH` for the compiler process.
    pub path_prepend: Vec<PathBuf>,
}

impl ToolchainPlan {
    /// Output folder relative to the build directory:
    /// `target[/<triple>]/<profile folder>`.
    pub fn output_subdir(&self, profile: Profile) -> PathBuf {
        let mut dir = PathBuf::from(TARGET_DIR);
        if let Some(triple) = &self.target {
            dir.push(triple);
        }
        dir.push(profile.output_dir_name());
        dir
    }
}

impl fmt::Display for ToolchainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "toolchain: {}",
            self.channel.as_deref().unwrap_or("(default)")
        )?;
        writeln!(f, "target:    {}", self.target.as_deref().unwrap_or("(host)"))?;
        for dir in &self.path_prepend {
            writeln!(f, "path:      {}", dir.display())?;
        }
        Ok(())
    }
}

/// Environment and filesystem lookups used for companion discovery.
pub trait CompanionProbe: Send + Sync {
    /// Read an environment variable.
    fn env_var(&self, key: &str) -> Option<String>;

    /// Whether `path` is an existing directory.
    fn is_dir(&self, path: &Path) -> bool;
}

/// Probe backed by the real process environment and filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl CompanionProbe for SystemProbe {
    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

/// Where one Rtools release lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompanionLayout {
    /// Environment variable overriding the installation root.
    pub env_var: &'static str,
    /// Installation root when the variable is unset.
    pub default_root: &'static str,
    /// Compiler directory below the root, put on `PATH` (UCRT only).
    pub bin_subdir: Option<&'static str>,
}

const UCRT_BIN_SUBDIR: &str = "x86_64-w64-mingw32.static.posix/bin";

const RTOOLS40: CompanionLayout = CompanionLayout {
    env_var: "RTOOLS40_HOME",
    default_root: "C:\\rtools40",
    bin_subdir: None,
};

/// The Rtools release to use for a host runtime.
pub fn companion_layout(runtime: Option<RuntimeInfo>) -> Result<CompanionLayout, ConfigError> {
    let Some(rt) = runtime.filter(|rt| rt.crt == CrtFlavor::Ucrt) else {
        return Ok(RTOOLS40);
    };

    let (env_var, default_root) = match (rt.major, rt.minor) {
        (4, 2) => ("RTOOLS42_HOME", "C:\\rtools42"),
        (4, 3) => ("RTOOLS43_HOME", "C:\\rtools43"),
        (4, 4) => ("RTOOLS44_HOME", "C:\\rtools44"),
        (4, m) if m >= 5 => ("RTOOLS45_HOME", "C:\\rtools45"),
        (major, _) if major > 4 => ("RTOOLS45_HOME", "C:\\rtools45"),
        (major, minor) => return Err(ConfigError::UnsupportedRuntime { major, minor }),
    };

    Ok(CompanionLayout {
        env_var,
        default_root,
        bin_subdir: Some(UCRT_BIN_SUBDIR),
    })
}

/// GNU target triple for a Windows architecture.
pub fn windows_gnu_triple(arch: &str) -> Result<&'static str, ConfigError> {
    match arch {
        "x86_64" => Ok("x86_64-pc-windows-gnu"),
        "x86" | "i686" | "i386" => Ok("i686-pc-windows-gnu"),
        other => Err(ConfigError::UnknownArchitecture {
            arch: other.to_string(),
        }),
    }
}

/// Resolve the toolchain plan for `host`.
///
/// Every failure here happens before cargo is launched.
pub fn resolve_plan(
    host: &HostDescriptor,
    probe: &dyn CompanionProbe,
    channel: Option<&str>,
) -> Result<ToolchainPlan, ConfigError> {
    let mut plan = ToolchainPlan {
        channel: channel.map(str::to_string),
        ..ToolchainPlan::default()
    };

    if host.os != HostOs::Windows {
        return Ok(plan);
    }

    plan.target = Some(windows_gnu_triple(&host.arch)?.to_string());

    let layout = companion_layout(host.runtime)?;
    let root = probe
        .env_var(layout.env_var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(layout.default_root));

    if !probe.is_dir(&root) {
        return Err(ConfigError::MissingCompanionToolchain { searched: root });
    }

    if let Some(subdir) = layout.bin_subdir {
        let bin = subdir.split('/').fold(root, |dir, part| dir.join(part));
        if !probe.is_dir(&bin) {
            return Err(ConfigError::CompanionPathNotFound { path: bin });
        }
        plan.path_prepend.push(bin);
    }

    tracing::debug!(?plan, "resolved toolchain plan");
    Ok(plan)
}

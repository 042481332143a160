//! Install target platform and build-target naming.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Arch;

/// Operating system of an install target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// macOS (the only OS the published formulas target).
    #[default]
    Macos,
    /// Linux, used for local builds and CI.
    Linux,
}

impl Os {
    /// Get the current operating system.
    ///
    /// Anything that is not Linux is treated as macOS.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Macos
        }
    }

    /// Lowercase name, also the prefix of every build target.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "macos" | "darwin" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            _ => Err(format!("Unknown operating system: {s}")),
        }
    }
}

/// An OS/architecture pair that selects the artifact or build target.
///
/// # Example
///
/// ```
/// use amx_schema::{Arch, Os, Platform};
///
/// let p = Platform::new(Os::Macos, Arch::Arm64);
/// assert_eq!(p.target(), "macosArm64");
/// assert_eq!(p.legacy_target(), None);
///
/// let intel = Platform::new(Os::Macos, Arch::X64);
/// assert_eq!(intel.target(), "macosX64");
/// assert_eq!(intel.legacy_target().as_deref(), Some("macos"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Arch,
}

impl Platform {
    /// Create a platform from its parts.
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// The platform this process is running on.
    pub fn current() -> Self {
        Self::new(Os::current(), Arch::current())
    }

    /// Return a copy with the architecture replaced.
    pub fn with_arch(self, arch: Arch) -> Self {
        Self { arch, ..self }
    }

    /// Primary build target name: `{os}{Arch}` (e.g. `macosArm64`, `macosX64`).
    pub fn target(&self) -> String {
        format!("{}{}", self.os.as_str(), self.arch.target_suffix())
    }

    /// Older unqualified target name, tried when the primary artifact is absent.
    ///
    /// Only non-arm64 targets have one: before the X64 target was split out,
    /// the Intel build was published under the bare OS name.
    pub fn legacy_target(&self) -> Option<String> {
        match self.arch {
            Arch::Arm64 => None,
            Arch::X64 => Some(self.os.as_str().to_string()),
        }
    }

    /// Target names in the order they should be searched.
    pub fn candidate_targets(&self) -> Vec<String> {
        let mut targets = vec![self.target()];
        targets.extend(self.legacy_target());
        targets
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Parse `os-arch` (e.g. `macos-arm64`) or a bare architecture, which
    /// keeps the host OS.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((os, arch)) => Ok(Self::new(os.parse()?, arch.parse()?)),
            None => Ok(Self::current().with_arch(s.parse()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm64_selects_arm64_target_without_fallback() {
        let p = Platform::new(Os::Macos, Arch::Arm64);
        assert_eq!(p.target(), "macosArm64");
        assert_eq!(p.candidate_targets(), vec!["macosArm64".to_string()]);
    }

    #[test]
    fn x64_falls_back_to_unqualified_target() {
        let p = Platform::new(Os::Macos, Arch::X64);
        assert_eq!(
            p.candidate_targets(),
            vec!["macosX64".to_string(), "macos".to_string()]
        );
    }

    #[test]
    fn linux_targets_follow_same_rule() {
        let p = Platform::new(Os::Linux, Arch::X64);
        assert_eq!(p.target(), "linuxX64");
        assert_eq!(p.legacy_target().as_deref(), Some("linux"));
    }

    #[test]
    fn parse_os_arch_pair() {
        let p: Platform = "macos-x86_64".parse().unwrap();
        assert_eq!(p, Platform::new(Os::Macos, Arch::X64));
        assert_eq!(p.to_string(), "macos-x64");
    }

    #[test]
    fn parse_bare_arch_keeps_host_os() {
        let p: Platform = "arm64".parse().unwrap();
        assert_eq!(p.os, Os::current());
        assert_eq!(p.arch, Arch::Arm64);
    }

    #[test]
    fn parse_rejects_unknown_os() {
        assert!("windows-x64".parse::<Platform>().is_err());
    }
}

//! CPU architecture of an install target.
///
/// Formulas ship either one universal archive or a build that is told which
/// architecture to target. The architecture decides the build target name
/// (`macosArm64` vs `macosX64`).
///
/// # Example
///
/// ```
/// use amx_schema::Arch;
///
/// let current = Arch::current();
/// println!("Running on: {}", current);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// ARM64 architecture (Apple Silicon: M1, M2, M3, etc.)
    #[default]
    Arm64,
    /// `x86_64` architecture (Intel Macs, most Linux hosts)
    X64,
}

impl Arch {
    /// Get the current architecture
    pub fn current() -> Self {
        #[cfg(target_arch = "aarch64")]
        {
            Self::Arm64
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            Self::X64
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X64 => "x64",
        }
    }

    /// Suffix appended to the OS name to form a build target (`Arm64` / `X64`).
    pub fn target_suffix(&self) -> &'static str {
        match self {
            Self::Arm64 => "Arm64",
            Self::X64 => "X64",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "arm64" | "aarch64" | "arm" => Ok(Self::Arm64),
            "x64" | "x86_64" | "amd64" | "intel" => Ok(Self::X64),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

//! TOML formula parsing
//!
//! A formula is the package descriptor for one installable binary: identity
//! metadata, exactly one artifact source, the installed binary name and the
//! smoke tests to run afterwards.
//!
//! ```toml
//! [package]
//! name = "amx-operator"
//! display_name = "AMX Operator"
//! version = "1.0.3"
//! homepage = "https://github.com/aimatrix/amx-operator-cli"
//! license = "MIT"
//!
//! [source]
//! kind = "prebuilt"
//! url = "https://public.aimatrix.com/dist/amx-operator/public/amx-operator-1.0.3.tar.gz"
//! sha256 = "3d9536ee6e30a1cc7753ac2044bdc4b23198baa3f1b87fccbd8e8f4e86f7fed1"
//! entry = "amx-operator.kexe"
//!
//! [[test]]
//! args = ["--version"]
//! contains = "AMX Operator"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::types::{PackageName, Sha256Digest, Version};

/// Placeholder substituted with the build target name in build templates.
pub const TARGET_PLACEHOLDER: &str = "{target}";

/// Errors that can occur when loading or parsing a formula.
#[derive(Error, Debug)]
pub enum FormulaError {
    /// An I/O error occurred while reading a formula file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid formula.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The formula parsed but violates a structural rule.
    #[error("Invalid formula: {0}")]
    Invalid(String),

    /// No formula file matched the reference.
    #[error("Formula not found: {0}")]
    NotFound(String),
}

/// Metadata describing a package's identity and provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaInfo {
    /// Unique name; also the default installed binary name.
    pub name: PackageName,
    /// Release version.
    pub version: Version,
    /// Product name printed by `--version` (e.g. "AMX Coder").
    #[serde(default)]
    pub display_name: Option<String>,
    /// Short human-readable summary of the package.
    #[serde(default)]
    pub description: String,
    /// URL of the project's homepage.
    #[serde(default)]
    pub homepage: String,
    /// SPDX license identifier for the package.
    #[serde(default)]
    pub license: String,
}

/// Where the installable binary comes from. Exactly one per formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactSource {
    /// A published archive containing the finished executable.
    Prebuilt(PrebuiltSource),
    /// A source archive compiled by an external build tool.
    #[serde(rename = "build")]
    BuildFromSource(BuildSource),
}

impl ArtifactSource {
    /// Download URL of the archive.
    pub fn url(&self) -> &str {
        match self {
            Self::Prebuilt(p) => &p.url,
            Self::BuildFromSource(b) => &b.url,
        }
    }

    /// Declared digest of the archive.
    pub fn sha256(&self) -> &Sha256Digest {
        match self {
            Self::Prebuilt(p) => &p.sha256,
            Self::BuildFromSource(b) => &b.sha256,
        }
    }

    /// Short label for display.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Prebuilt(_) => "prebuilt",
            Self::BuildFromSource(_) => "build",
        }
    }
}

/// A prebuilt archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrebuiltSource {
    /// Download URL for the archive.
    pub url: String,
    /// Expected SHA-256 digest of the downloaded archive.
    pub sha256: Sha256Digest,
    /// Archive member holding the executable; defaults to the binary name.
    #[serde(default)]
    pub entry: Option<String>,
}

/// A source archive plus the recipe for building it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSource {
    /// Download URL for the source archive.
    pub url: String,
    /// Expected SHA-256 digest of the source archive.
    pub sha256: Sha256Digest,
    /// Build tool executable (e.g. `gradle`).
    pub tool: String,
    /// Task template; `{target}` is replaced with the platform target name.
    #[serde(default = "default_task")]
    pub task: String,
    /// Extra arguments passed after the task (e.g. `--no-daemon`).
    #[serde(default)]
    pub args: Vec<String>,
    /// Path of the produced executable relative to the source root, `{target}` expanded.
    pub artifact: String,
    /// Tools that must be present before the build starts.
    #[serde(default)]
    pub dependencies: Vec<BuildDependency>,
    /// Extra environment variables for the build tool.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_task() -> String {
    format!("{TARGET_PLACEHOLDER}Binaries")
}

impl BuildSource {
    /// Task argument for a target (`macosArm64` -> `macosArm64Binaries`).
    pub fn task_for(&self, target: &str) -> String {
        self.task.replace(TARGET_PLACEHOLDER, target)
    }

    /// Artifact path for a target, relative to the source root.
    pub fn artifact_for(&self, target: &str) -> PathBuf {
        PathBuf::from(self.artifact.replace(TARGET_PLACEHOLDER, target))
    }
}

/// A build-time dependency: a named tool with an optional version constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildDependency {
    /// Dependency name (e.g. `openjdk`).
    pub name: String,
    /// Accepted versions (e.g. `"17"` means `>=17.0.0, <18.0.0`).
    #[serde(default)]
    pub version: Option<semver::VersionReq>,
    /// Executable probed for presence; defaults to `name`.
    #[serde(default)]
    pub executable: Option<String>,
    /// Environment variable that receives the dependency's home during the build.
    #[serde(default)]
    pub home_env: Option<String>,
}

impl BuildDependency {
    /// Executable to look for.
    pub fn executable(&self) -> &str {
        self.executable.as_deref().unwrap_or(&self.name)
    }
}

/// Installation specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Installed binary name (defaults to the package name).
    #[serde(default)]
    pub bin: Option<String>,
}

/// A smoke test: run the binary with `args`, expect success and `contains` in the output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    /// Arguments passed to the installed binary.
    pub args: Vec<String>,
    /// Substring the output must contain.
    pub contains: String,
}

/// Complete formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Core metadata for the package (name, version, homepage, etc.).
    pub package: FormulaInfo,
    /// The single artifact source.
    pub source: ArtifactSource,
    /// Install options.
    #[serde(default)]
    pub install: InstallSpec,
    /// Post-install smoke tests.
    #[serde(default, rename = "test")]
    pub tests: Vec<TestCase>,
}

impl Formula {
    /// Parse a formula from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Io` if the file cannot be read,
    /// `FormulaError::Parse` if the TOML content is invalid, or
    /// `FormulaError::Invalid` if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, FormulaError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a formula from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Parse` if the TOML content does not match the
    /// schema, or `FormulaError::Invalid` if validation fails.
    pub fn parse(content: &str) -> Result<Self, FormulaError> {
        let formula: Self = toml::from_str(content)?;
        formula.validate()?;
        Ok(formula)
    }

    /// Check the fields the schema alone cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), FormulaError> {
        let invalid = |msg: &str| Err(FormulaError::Invalid(msg.to_string()));

        if !is_single_component(self.package.name.as_str()) {
            return invalid("package.name must be a single path component");
        }
        if !is_single_component(self.package.version.as_str()) {
            return invalid("package.version must be a single path component");
        }
        if !self.package.homepage.is_empty() && !self.package.homepage.starts_with("http") {
            return invalid("package.homepage must start with http(s)");
        }
        let url = self.source.url();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(FormulaError::Invalid(format!(
                "source.url must be http(s): '{url}'"
            )));
        }
        if !is_single_component(self.binary_name()) {
            return invalid("install.bin must be a bare file name");
        }
        if let ArtifactSource::BuildFromSource(build) = &self.source {
            if build.tool.is_empty() {
                return invalid("source.tool is empty");
            }
            if build.artifact.is_empty() {
                return invalid("source.artifact is empty");
            }
            if Path::new(&build.artifact).is_absolute() {
                return invalid("source.artifact must be relative to the source root");
            }
        }
        if self.tests.iter().any(|t| t.contains.is_empty()) {
            return invalid("test.contains must not be empty");
        }
        Ok(())
    }

    /// Name of the installed executable.
    pub fn binary_name(&self) -> &str {
        self.install
            .bin
            .as_deref()
            .unwrap_or(self.package.name.as_str())
    }

    /// Product name for display, falling back to the package name.
    pub fn display_name(&self) -> &str {
        self.package
            .display_name
            .as_deref()
            .unwrap_or(self.package.name.as_str())
    }
}

/// Names, versions and binary names become store path segments, so each
/// must be exactly one normal component (no separators, `.` or `..`).
fn is_single_component(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(['/', '\\'])
}

/// Resolve a formula reference: an existing path, or `<tap>/<name>.toml`.
///
/// # Errors
///
/// Returns `FormulaError::NotFound` if neither location exists.
pub fn locate(reference: &str, tap: &Path) -> Result<PathBuf, FormulaError> {
    let direct = PathBuf::from(reference);
    if direct.is_file() {
        return Ok(direct);
    }
    let in_tap = tap.join(format!("{reference}.toml"));
    if in_tap.is_file() {
        return Ok(in_tap);
    }
    Err(FormulaError::NotFound(format!(
        "'{reference}' (looked in {})",
        tap.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREBUILT: &str = r#"
[package]
name = "amx-operator"
display_name = "AMX Operator"
version = "1.0.3"
homepage = "https://github.com/aimatrix/amx-operator-cli"
license = "MIT"

[source]
kind = "prebuilt"
url = "https://public.aimatrix.com/dist/amx-operator/public/amx-operator-1.0.3.tar.gz"
sha256 = "3d9536ee6e30a1cc7753ac2044bdc4b23198baa3f1b87fccbd8e8f4e86f7fed1"
entry = "amx-operator.kexe"

[[test]]
args = ["--version"]
contains = "AMX Operator"

[[test]]
args = ["--help"]
contains = "Multi-Agent Coding Workspace"
"#;

    const BUILD: &str = r#"
[package]
name = "amx-coder"
version = "1.0.0"
license = "MIT"

[source]
kind = "build"
url = "https://github.com/aimatrix/amx-coder/archive/refs/tags/v1.0.0.tar.gz"
sha256 = "0019dfc4b32d63c1392aa264aed2253c1e0c2fb09216f8e2cc269bbfb8bb49b5"
tool = "gradle"
args = ["--no-daemon"]
artifact = "build/bin/{target}/releaseExecutable/amx-coder.kexe"

[[source.dependencies]]
name = "gradle"

[[source.dependencies]]
name = "openjdk"
version = "17"
executable = "java"
home_env = "JAVA_HOME"
"#;

    #[test]
    fn parses_prebuilt() {
        let f = Formula::parse(PREBUILT).unwrap();
        assert_eq!(f.package.name, "amx-operator");
        assert_eq!(f.binary_name(), "amx-operator");
        assert_eq!(f.display_name(), "AMX Operator");
        assert_eq!(f.tests.len(), 2);
        match &f.source {
            ArtifactSource::Prebuilt(p) => {
                assert_eq!(p.entry.as_deref(), Some("amx-operator.kexe"));
            }
            ArtifactSource::BuildFromSource(_) => panic!("expected prebuilt"),
        }
    }

    #[test]
    fn parses_build_with_default_task() {
        let f = Formula::parse(BUILD).unwrap();
        let ArtifactSource::BuildFromSource(build) = &f.source else {
            panic!("expected build source");
        };
        assert_eq!(build.task_for("macosArm64"), "macosArm64Binaries");
        assert_eq!(
            build.artifact_for("macos"),
            PathBuf::from("build/bin/macos/releaseExecutable/amx-coder.kexe")
        );
        assert_eq!(build.dependencies.len(), 2);
        assert_eq!(build.dependencies[0].executable(), "gradle");
        let jdk = &build.dependencies[1];
        assert_eq!(jdk.executable(), "java");
        let req = jdk.version.as_ref().unwrap();
        assert!(req.matches(&semver::Version::new(17, 0, 2)));
        assert!(!req.matches(&semver::Version::new(21, 0, 0)));
    }

    #[test]
    fn rejects_bad_digest() {
        let bad = PREBUILT.replace(
            "3d9536ee6e30a1cc7753ac2044bdc4b23198baa3f1b87fccbd8e8f4e86f7fed1",
            "3d95fed1",
        );
        assert!(matches!(Formula::parse(&bad), Err(FormulaError::Parse(_))));
    }

    #[test]
    fn rejects_unknown_source_kind() {
        let bad = PREBUILT.replace("kind = \"prebuilt\"", "kind = \"cask\"");
        assert!(Formula::parse(&bad).is_err());
    }

    #[test]
    fn rejects_non_http_url() {
        let bad = PREBUILT.replace("https://public.aimatrix.com", "ftp://public.aimatrix.com");
        assert!(matches!(
            Formula::parse(&bad),
            Err(FormulaError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_empty_test_expectation() {
        let bad = PREBUILT.replace("contains = \"AMX Operator\"", "contains = \"\"");
        assert!(matches!(
            Formula::parse(&bad),
            Err(FormulaError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_names_that_leave_the_store() {
        for bad in [
            PREBUILT.replace("version = \"1.0.3\"", "version = \"../../../outside\""),
            PREBUILT.replace("version = \"1.0.3\"", "version = \"..\""),
            PREBUILT.replace("name = \"amx-operator\"", "name = \"amx/operator\""),
            PREBUILT.replace("name = \"amx-operator\"", "name = \"/tmp/amx\""),
            format!("{PREBUILT}\n[install]\nbin = \"..\"\n"),
        ] {
            assert!(
                matches!(Formula::parse(&bad), Err(FormulaError::Invalid(_))),
                "accepted: {bad}"
            );
        }
    }

    #[test]
    fn install_bin_overrides_binary_name() {
        let custom = format!("{PREBUILT}\n[install]\nbin = \"amxop\"\n");
        let f = Formula::parse(&custom).unwrap();
        assert_eq!(f.binary_name(), "amxop");
    }

    #[test]
    fn locate_prefers_path_then_tap() {
        let dir = tempfile::tempdir().unwrap();
        let tap = dir.path().join("formulas");
        fs::create_dir_all(&tap).unwrap();
        fs::write(tap.join("amx-operator.toml"), PREBUILT).unwrap();

        let found = locate("amx-operator", &tap).unwrap();
        assert_eq!(found, tap.join("amx-operator.toml"));

        let direct = tap.join("amx-operator.toml");
        assert_eq!(locate(direct.to_str().unwrap(), dir.path()).unwrap(), direct);

        assert!(matches!(
            locate("amx-missing", &tap),
            Err(FormulaError::NotFound(_))
        ));
    }
}

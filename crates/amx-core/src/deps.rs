//! Build dependency resolution.
//!
//! A formula that builds from source names the tools it needs (`gradle`,
//! `openjdk@17`). Before anything is downloaded each one is located, and
//! version-checked when the formula constrains it. A dependency with a
//! `home_env` also yields the home directory exported to the build tool
//! (`JAVA_HOME`).
//!
//! Home lookup order: [`BuildEnv::homes`] (keyed by dependency name), then
//! [`BuildEnv::home_vars`] (the operator's `JAVA_HOME`), then the directory
//! above the executable's `bin/`. A configured home is authoritative: the
//! executable must be `<home>/bin/<exe>`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;

use crate::InstallError;
use crate::formula::BuildDependency;

static VERSION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d+)(?:\.(\d+))?(?:\.(\d+))?").ok());

/// Explicit environment configuration for dependency lookup and the build step.
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
    /// Executable search path; `None` means the process `PATH`.
    pub search_path: Option<OsString>,
    /// Dependency homes keyed by dependency name (e.g. `openjdk` -> JDK root).
    pub homes: BTreeMap<String, PathBuf>,
    /// `*_HOME` variables keyed by variable name (e.g. `JAVA_HOME`).
    pub home_vars: BTreeMap<String, PathBuf>,
    /// Additional variables exported to the build tool.
    pub vars: BTreeMap<String, String>,
}

impl BuildEnv {
    /// Configuration that inherits the process `PATH` and `*_HOME` variables.
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    /// Configuration from an environment snapshot: `PATH` becomes the search
    /// path and every non-empty `*_HOME` variable a home.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let mut env = Self::default();
        for (key, value) in vars {
            if key == "PATH" {
                env.search_path = Some(value);
            } else if let Some(key) = key.to_str() {
                if key.ends_with("_HOME") && !value.is_empty() {
                    env.home_vars.insert(key.to_string(), PathBuf::from(value));
                }
            }
        }
        env
    }

    /// Set the home of a dependency.
    pub fn with_home(mut self, name: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        self.homes.insert(name.into(), home.into());
        self
    }

    /// Locate an executable on the configured search path.
    pub fn find_executable(&self, name: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let paths = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));
        which::which_in(name, paths, cwd).ok()
    }
}

/// A build dependency that was found on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// Dependency name from the formula.
    pub name: String,
    /// Absolute path of the probed executable.
    pub executable: PathBuf,
    /// Installation root (parent of the executable's `bin/`), when known.
    pub home: Option<PathBuf>,
    /// Variable to export `home` as during the build.
    pub home_env: Option<String>,
    /// Version reported by the executable, when a constraint required probing.
    pub version: Option<semver::Version>,
}

/// Resolve every dependency, failing on the first one that is missing.
///
/// # Errors
///
/// Returns [`InstallError::MissingDependency`] naming the dependency and why
/// it was rejected.
pub fn resolve_dependencies(
    deps: &[BuildDependency],
    env: &BuildEnv,
) -> Result<Vec<ResolvedDependency>, InstallError> {
    deps.iter().map(|dep| resolve_one(dep, env)).collect()
}

fn resolve_one(dep: &BuildDependency, env: &BuildEnv) -> Result<ResolvedDependency, InstallError> {
    let missing = |reason: String| InstallError::MissingDependency {
        name: dep.name.clone(),
        reason,
    };
    let exe_name = dep.executable();

    let configured = env.homes.get(&dep.name).cloned().or_else(|| {
        dep.home_env
            .as_ref()
            .and_then(|var| env.home_vars.get(var).cloned())
    });

    let executable = if let Some(home) = &configured {
        let candidate = home.join("bin").join(exe_name);
        if !candidate.is_file() {
            return Err(missing(format!(
                "'{exe_name}' not found in configured home {}",
                home.display()
            )));
        }
        candidate
    } else {
        env.find_executable(exe_name)
            .ok_or_else(|| missing(format!("'{exe_name}' not found on PATH")))?
    };

    let home = configured.or_else(|| infer_home(&executable));

    let version = match &dep.version {
        Some(req) => {
            let found = probe_version(&executable).ok_or_else(|| {
                missing(format!(
                    "could not determine version of {}",
                    executable.display()
                ))
            })?;
            if !req.matches(&found) {
                return Err(missing(format!("found {found}, need {req}")));
            }
            Some(found)
        }
        None => None,
    };

    tracing::debug!(
        name = %dep.name,
        executable = %executable.display(),
        version = ?version,
        "resolved build dependency"
    );

    Ok(ResolvedDependency {
        name: dep.name.clone(),
        executable,
        home,
        home_env: dep.home_env.clone(),
        version,
    })
}

/// Shared prefixes whose `bin/` holds launcher stubs, not a tool's own tree.
const SYSTEM_PREFIXES: &[&str] = &["/", "/usr", "/usr/local"];

/// Home of an executable: `<home>/bin/<exe>` with symlinks followed.
///
/// System prefixes never count (`/usr/bin/java` on macOS is a stub).
fn infer_home(executable: &Path) -> Option<PathBuf> {
    let real = executable.canonicalize().ok()?;
    let bin = real.parent()?;
    if bin.file_name()? != "bin" {
        return None;
    }
    let home = bin.parent()?;
    if SYSTEM_PREFIXES.iter().any(|p| home == Path::new(p)) {
        return None;
    }
    Some(home.to_path_buf())
}

/// Run `<exe> --version` and parse the first version-looking token.
pub fn probe_version(executable: &Path) -> Option<semver::Version> {
    let output = Command::new(executable).arg("--version").output().ok()?;
    // Some JDKs print the banner on stderr
    let text = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    parse_version_token(&text)
}

/// Parse the first `N[.N[.N]]` token, padding missing parts with zero.
pub fn parse_version_token(text: &str) -> Option<semver::Version> {
    let caps = VERSION_TOKEN.as_ref()?.captures(text)?;
    let part = |i: usize| -> Option<u64> {
        caps.get(i).map_or(Some(0), |m| m.as_str().parse().ok())
    };
    Some(semver::Version::new(part(1)?, part(2)?, part(3)?))
}

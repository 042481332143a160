use dirs::home_dir;
use std::path::{Path, PathBuf};

use crate::types::{PackageName, Version};

/// Environment variable overriding the install root.
pub const HOME_ENV: &str = "AMX_HOME";

/// On-disk layout of an amx installation.
///
/// ```text
/// <root>/
/// ├── bin/                         # Links to installed binaries
/// ├── store/<name>/<version>/bin/  # Kegs
/// ├── tmp/                         # Staging (same volume as store)
/// └── logs/                        # Build logs
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at `$AMX_HOME`, or `~/.amx`. None if the user's home cannot be resolved.
    pub fn try_from_env() -> Option<Self> {
        if let Ok(val) = std::env::var(HOME_ENV) {
            return Some(Self::new(val));
        }
        home_dir().map(|h| Self::new(h.join(".amx")))
    }

    /// Install root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Package store path: <root>/store
    pub fn store_path(&self) -> PathBuf {
        self.root.join("store")
    }

    /// Keg for one installed version: <root>/store/<name>/<version>
    pub fn keg_path(&self, name: &PackageName, version: &Version) -> PathBuf {
        self.store_path().join(name).join(version)
    }

    /// Binary link directory: <root>/bin
    pub fn bin_path(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Temp path: <root>/tmp (guaranteed same volume as store)
    pub fn tmp_path(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Logs directory: <root>/logs
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Generate a build log path for a package
    pub fn build_log_path(&self, package: &str, version: &str) -> PathBuf {
        let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
        self.log_dir()
            .join(format!("build-{package}-{version}-{timestamp}.log"))
    }
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.split('/').next_back().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keg_path_nests_name_and_version() {
        let layout = Layout::new("/opt/amx");
        let keg = layout.keg_path(&PackageName::new("amx-coder"), &Version::from("1.0.2"));
        assert_eq!(keg, PathBuf::from("/opt/amx/store/amx-coder/1.0.2"));
    }

    #[test]
    fn build_log_is_under_logs() {
        let layout = Layout::new("/opt/amx");
        let log = layout.build_log_path("amx-coder", "1.0.0");
        assert!(log.starts_with("/opt/amx/logs"));
        let name = log.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("build-amx-coder-1.0.0-"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn filename_from_url_strips_query() {
        assert_eq!(
            filename_from_url("https://example.com/dist/amx-coder-1.0.2.tar.gz?sig=abc"),
            "amx-coder-1.0.2.tar.gz"
        );
        assert_eq!(filename_from_url(""), "");
    }
}

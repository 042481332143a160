//! The package installer.
//!
//! [`Installer::install`] resolves one formula for one platform into an
//! executable file in the store:
//!
//! 1. Build formulas resolve their dependencies first, so a missing JDK fails
//!    before anything is fetched.
//! 2. The archive is downloaded into a private staging directory under
//!    `tmp/` and verified against the declared digest while it streams.
//! 3. The archive is extracted. Prebuilt formulas then locate their entry;
//!    build formulas run the build tool and locate its artifact.
//! 4. The binary is written into `store/<name>/<version>/bin/` with mode
//!    `0o755` and linked from `bin/`.
//!
//! Staging is a [`tempfile::TempDir`], so every failure leaves the store as it
//! was. Nothing is retried.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;

use crate::builder::Builder;
use crate::deps::{BuildEnv, ResolvedDependency, resolve_dependencies};
use crate::formula::{ArtifactSource, Formula};
use crate::io::download::DownloadRequest;
use crate::io::extract::{extract_auto, find_entry, strip_components};
use crate::paths::{Layout, filename_from_url};
use crate::types::{PackageName, Platform, Sha256Digest, Version};
use crate::{InstallError, Reporter};

/// Where an install put things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPath {
    /// The executable inside the keg.
    pub binary: PathBuf,
    /// Link in `<root>/bin`, when one could be created.
    pub link: Option<PathBuf>,
    /// Verified digest of the downloaded archive.
    pub sha256: Sha256Digest,
    /// Size of the installed executable in bytes.
    pub size: u64,
}

/// Installs formulas into a [`Layout`].
pub struct Installer {
    layout: Layout,
    client: Client,
    env: BuildEnv,
    reporter: Arc<dyn Reporter>,
    verbose: bool,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("layout", &self.layout)
            .field("env", &self.env)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// HTTP client used for archive downloads.
///
/// # Errors
///
/// Fails if the TLS backend cannot be initialised.
pub fn default_client() -> Result<Client, InstallError> {
    Client::builder()
        .user_agent(crate::USER_AGENT)
        .build()
        .map_err(|e| InstallError::context("Failed to create HTTP client", e))
}

impl Installer {
    /// Installer with the process environment and a default HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be created.
    pub fn new(layout: Layout, reporter: Arc<dyn Reporter>) -> Result<Self, InstallError> {
        Ok(Self {
            layout,
            client: default_client()?,
            env: BuildEnv::from_process(),
            reporter,
            verbose: false,
        })
    }

    /// Use a specific HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Use an explicit build environment instead of the process one.
    pub fn with_build_env(mut self, env: BuildEnv) -> Self {
        self.env = env;
        self
    }

    /// Stream build tool output to the terminal instead of the log file.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The layout installs go into.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Path the formula's binary occupies once installed.
    pub fn installed_binary(&self, formula: &Formula) -> PathBuf {
        keg_binary(&self.layout, formula)
    }

    /// Install `formula` for `platform`.
    ///
    /// # Errors
    ///
    /// - [`InstallError::MissingDependency`] for an absent or outdated build dependency.
    /// - [`InstallError::ChecksumMismatch`] when the archive digest differs.
    /// - [`InstallError::EntryNotFound`] when a prebuilt archive lacks its entry.
    /// - [`InstallError::BuildToolFailure`] / [`InstallError::BuildArtifactNotFound`]
    ///   when building from source fails.
    pub async fn install(
        &self,
        formula: &Formula,
        platform: Platform,
    ) -> Result<InstalledPath, InstallError> {
        let name = formula.package.name.clone();
        let version = formula.package.version.clone();

        let result = self.install_inner(formula, platform, &name, &version).await;
        match &result {
            Ok(installed) => {
                self.reporter.done(
                    &name,
                    &version,
                    &installed.binary.display().to_string(),
                    Some(installed.size),
                );
            }
            // The download already reported the mismatch
            Err(InstallError::ChecksumMismatch { .. }) => {}
            Err(e) => self.reporter.failed(&name, &version, &e.to_string()),
        }
        result
    }

    async fn install_inner(
        &self,
        formula: &Formula,
        platform: Platform,
        name: &PackageName,
        version: &Version,
    ) -> Result<InstalledPath, InstallError> {
        let deps = match &formula.source {
            ArtifactSource::BuildFromSource(build) => {
                tracing::warn!(
                    package = %name,
                    "building from source is a legacy install path; prefer a prebuilt formula"
                );
                self.reporter.warning(&format!(
                    "{name} {version} builds from source with {}",
                    build.tool
                ));
                resolve_dependencies(&build.dependencies, &self.env)?
            }
            ArtifactSource::Prebuilt(_) => Vec::new(),
        };

        let tmp_path = self.layout.tmp_path();
        std::fs::create_dir_all(&tmp_path)?;
        let staging = tempfile::Builder::new()
            .prefix("amx-")
            .tempdir_in(&tmp_path)?;

        let url = formula.source.url();
        let archive_name = match filename_from_url(url) {
            "" => "download",
            file => file,
        };
        let archive = staging.path().join(archive_name);

        let sha256 = DownloadRequest::new(
            &self.client,
            name,
            version,
            url,
            &archive,
            formula.source.sha256(),
            self.reporter.as_ref(),
        )
        .execute()
        .await?;

        self.reporter.extracting(name, version);
        let tree = staging.path().join("tree");
        let files = {
            let archive = archive.clone();
            let tree = tree.clone();
            tokio::task::spawn_blocking(move || extract_auto(&archive, &tree))
                .await
                .map_err(|e| InstallError::context("Extraction task panicked", e))??
        };
        tracing::debug!(files = files.len(), "extracted");

        let produced = match &formula.source {
            ArtifactSource::Prebuilt(prebuilt) => {
                let entry = prebuilt
                    .entry
                    .as_deref()
                    .unwrap_or_else(|| formula.binary_name());
                find_entry(&files, entry).ok_or_else(|| InstallError::EntryNotFound {
                    entry: entry.to_string(),
                    archive: archive_name.to_string(),
                })?
            }
            ArtifactSource::BuildFromSource(build) => {
                strip_components(&tree)?;
                self.reporter.building(name, version, &platform.target());
                self.run_build(build.clone(), platform, deps, tree, name, version)
                    .await?
            }
        };

        self.reporter.installing(name, version);
        let binary = place_binary(&produced, &keg_binary(&self.layout, formula))?;
        let size = std::fs::metadata(&binary)?.len();

        let link = match link_binary(&binary, &self.layout.bin_path(), formula.binary_name()) {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(binary = %binary.display(), error = %e, "could not link binary");
                self.reporter
                    .warning(&format!("installed but not linked: {e}"));
                None
            }
        };

        tracing::info!(
            package = %name,
            %version,
            binary = %binary.display(),
            sha256 = %sha256.short(),
            "installed"
        );

        Ok(InstalledPath {
            binary,
            link,
            sha256,
            size,
        })
    }

    async fn run_build(
        &self,
        build: crate::formula::BuildSource,
        platform: Platform,
        deps: Vec<ResolvedDependency>,
        tree: PathBuf,
        name: &PackageName,
        version: &Version,
    ) -> Result<PathBuf, InstallError> {
        let log_path = self
            .layout
            .build_log_path(name.as_str(), version.as_str());
        let env = self.env.clone();
        let verbose = self.verbose;

        let built = tokio::task::spawn_blocking(move || {
            Builder::new(&tree, &env).build(&build, platform, &deps, &log_path, verbose)
        })
        .await
        .map_err(|e| InstallError::context("Build task panicked", e))??;

        tracing::debug!(target = %built.target, artifact = %built.path.display(), "build finished");
        Ok(built.path)
    }
}

fn keg_binary(layout: &Layout, formula: &Formula) -> PathBuf {
    layout
        .keg_path(&formula.package.name, &formula.package.version)
        .join("bin")
        .join(formula.binary_name())
}

/// Copy `source` to `dest` with mode `0o755`, replacing any previous file.
///
/// The copy is written beside `dest` and renamed into place, so `dest` is
/// never observed half-written.
fn place_binary(source: &Path, dest: &Path) -> Result<PathBuf, InstallError> {
    let dir = dest
        .parent()
        .ok_or_else(|| InstallError::context("Invalid keg path", dest.display()))?;
    std::fs::create_dir_all(dir)?;

    let file_name = dest
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = dir.join(format!(".{file_name}.partial"));
    std::fs::copy(source, &partial)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o755))?;
    }

    std::fs::rename(&partial, dest)?;
    Ok(dest.to_path_buf())
}

/// Point `<bin_dir>/<name>` at `binary`, replacing an existing link.
fn link_binary(binary: &Path, bin_dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(bin_dir)?;
    let target = bin_dir.join(name);
    if target.exists() || target.is_symlink() {
        std::fs::remove_file(&target)?;
    }

    #[cfg(unix)]
    std::os::unix::fs::symlink(binary, &target)?;
    #[cfg(not(unix))]
    std::fs::copy(binary, &target)?;

    Ok(target)
}

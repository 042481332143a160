//! Domain-specific errors for install operations

use std::path::PathBuf;

use thiserror::Error;

use crate::formula::FormulaError;
use crate::io::download::DownloadError;
use crate::io::extract::ExtractError;

/// Every way an install can fail. All of them abort the install; none are retried.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The downloaded archive does not hash to the declared digest.
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// A declared build dependency is absent or has the wrong version.
    #[error("Missing build dependency '{name}': {reason}")]
    MissingDependency { name: String, reason: String },

    /// The build finished but no executable exists at any candidate path.
    #[error("Built executable not found at {}", join_paths(.searched))]
    BuildArtifactNotFound { searched: Vec<PathBuf> },

    /// The external build tool exited non-zero (or was killed by a signal).
    #[error("Build tool '{tool}' failed with exit code {code:?} (log: {})", .log.display())]
    BuildToolFailure {
        tool: String,
        code: Option<i32>,
        log: PathBuf,
    },

    /// The archive did not contain the declared executable.
    #[error("Archive entry '{entry}' not found in {archive}")]
    EntryNotFound { entry: String, archive: String },

    /// A post-install smoke test failed.
    #[error("Post-install check failed: {0}")]
    VerificationFailed(String),

    #[error("Download failed: {0}")]
    Download(DownloadError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{context}: {message}")]
    Context {
        context: &'static str,
        message: String,
    },
}

impl InstallError {
    /// Create an error with context for better debugging.
    pub fn context(ctx: &'static str, msg: impl std::fmt::Display) -> Self {
        Self::Context {
            context: ctx,
            message: msg.to_string(),
        }
    }
}

impl From<DownloadError> for InstallError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::HashMismatch { expected, actual } => {
                Self::ChecksumMismatch { expected, actual }
            }
            other => Self::Download(other),
        }
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_mismatch_becomes_checksum_mismatch() {
        let err: InstallError = DownloadError::HashMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .into();
        assert!(matches!(err, InstallError::ChecksumMismatch { .. }));
        assert_eq!(err.to_string(), "Checksum mismatch: expected aa, got bb");
    }

    #[test]
    fn artifact_not_found_lists_every_path() {
        let err = InstallError::BuildArtifactNotFound {
            searched: vec![PathBuf::from("a/macosX64"), PathBuf::from("a/macos")],
        };
        assert_eq!(
            err.to_string(),
            "Built executable not found at a/macosX64, a/macos"
        );
    }
}

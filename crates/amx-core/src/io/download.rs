//! Async download with streaming SHA256 verification.
//!
//! The archive is hashed while it is written, so verification costs no second
//! pass. A mismatching file is deleted before the error is returned.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::Reporter;
use crate::types::{PackageName, Sha256Digest, Version};

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// Request for a download operation
pub struct DownloadRequest<'a> {
    pub client: &'a Client,
    pub pkg_name: &'a PackageName,
    pub version: &'a Version,
    pub url: &'a str,
    pub dest: &'a Path,
    pub expected_hash: &'a Sha256Digest,
    pub reporter: &'a dyn Reporter,
}

impl<'a> DownloadRequest<'a> {
    pub fn new(
        client: &'a Client,
        pkg_name: &'a PackageName,
        version: &'a Version,
        url: &'a str,
        dest: &'a Path,
        expected_hash: &'a Sha256Digest,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            client,
            pkg_name,
            version,
            url,
            dest,
            expected_hash,
            reporter,
        }
    }

    /// Execute the download, returning the verified digest.
    pub async fn execute(self) -> Result<Sha256Digest, DownloadError> {
        download_and_verify(self).await
    }
}

impl std::fmt::Debug for DownloadRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("pkg_name", &self.pkg_name)
            .field("url", &self.url)
            .field("dest", &self.dest)
            .finish_non_exhaustive()
    }
}

/// Downloads a file to `dest`, hashing as it streams, and verifies the digest.
pub async fn download_and_verify(req: DownloadRequest<'_>) -> Result<Sha256Digest, DownloadError> {
    let DownloadRequest {
        client,
        pkg_name,
        version,
        url,
        dest,
        expected_hash,
        reporter,
    } = req;

    tracing::debug!(%url, dest = %dest.display(), "downloading");

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let total_size = response.content_length();
    reporter.downloading(pkg_name, version, 0, total_size);

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        reporter.downloading(pkg_name, version, downloaded, total_size);
    }

    file.flush().await?;
    drop(file);

    let actual_hash = Sha256Digest::from_hasher(hasher);

    if &actual_hash != expected_hash {
        tracing::warn!(%url, expected = %expected_hash, actual = %actual_hash, "hash mismatch");
        reporter.failed(pkg_name, version, "hash mismatch");
        tokio::fs::remove_file(dest).await.ok();
        return Err(DownloadError::HashMismatch {
            expected: expected_hash.to_string(),
            actual: actual_hash.to_string(),
        });
    }

    tracing::debug!(%url, bytes = downloaded, "download verified");
    Ok(actual_hash)
}

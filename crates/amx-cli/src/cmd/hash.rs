//! Hash command

use amx_schema::Sha256Digest;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Compute SHA256 hash of files
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = Sha256Digest::compute_file(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        println!("{digest} {}", file.display());
    }
    Ok(())
}

//! Archive extraction module
//!
//! Handles tar.gz (the published format), tar.zst, tar, zip and raw binaries,
//! and locates the executable entry inside the extracted tree.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use zip::ZipArchive;
use zstd::stream::Decoder as ZstdDecoder;

use crate::types::ArtifactFormat;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive error: {0}")]
    Archive(String),
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Whether this is an executable
    pub is_executable: bool,
}

/// Extract a tar.zst archive to a destination directory
pub fn extract_tar_zst(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let zstd_decoder = ZstdDecoder::new(reader)?;

    extract_tar(zstd_decoder, dest_dir)
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let gz_decoder = flate2::read::GzDecoder::new(reader);

    extract_tar(gz_decoder, dest_dir)
}

/// True when every component is a plain name (no `..`, no root, no prefix).
fn is_contained(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Extract a tar archive from a reader
fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<Vec<ExtractedFile>, ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    let mut extracted_files = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;

        if entry.header().entry_type().is_dir() {
            continue;
        }

        let relative_path: PathBuf = entry
            .path()?
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect();

        // Reject entries that would land outside dest_dir
        if !is_contained(&relative_path) {
            return Err(ExtractError::Archive(format!(
                "Invalid path in archive: {}",
                relative_path.display()
            )));
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent)?;
        }

        entry.unpack(&absolute_path)?;

        let is_executable = entry
            .header()
            .mode()
            .map(|m| m & 0o111 != 0)
            .unwrap_or(false);

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

    fs::create_dir_all(dest_dir)?;
    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::Archive(e.to_string()))?;
        let Some(relative_path) = file.enclosed_name() else {
            continue;
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile)?;

        #[cfg(unix)]
        let is_executable = if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
            mode & 0o111 != 0
        } else {
            false
        };
        #[cfg(not(unix))]
        let is_executable = false;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Detect archive format from file extension
pub fn detect_format(path: &Path) -> ArtifactFormat {
    ArtifactFormat::detect(&path.to_string_lossy())
}

/// Extract an archive, auto-detecting format from its file name
pub fn extract_auto(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ExtractError> {
    let format = detect_format(archive_path);
    tracing::debug!(archive = %archive_path.display(), ?format, "extracting");

    match format {
        ArtifactFormat::TarZst => extract_tar_zst(archive_path, dest_dir),
        ArtifactFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
        ArtifactFormat::Tar => {
            let file = File::open(archive_path)?;
            extract_tar(BufReader::new(file), dest_dir)
        }
        ArtifactFormat::Zip => extract_zip(archive_path, dest_dir),
        ArtifactFormat::Binary => {
            // Raw binaries are copied as-is
            fs::create_dir_all(dest_dir)?;
            let filename = archive_path
                .file_name()
                .ok_or_else(|| ExtractError::Archive("Invalid filename".to_string()))?;
            let dest_path = dest_dir.join(filename);
            fs::copy(archive_path, &dest_path)?;

            Ok(vec![ExtractedFile {
                relative_path: PathBuf::from(filename),
                absolute_path: dest_path,
                is_executable: true,
            }])
        }
    }
}

/// Detect if a directory has a single top-level directory and strip it by moving contents up.
///
/// Source tarballs from GitHub (`amx-coder-1.0.0/...`) always have one.
pub fn strip_components(dir: &Path) -> io::Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();

    // Filter out hidden files (like .DS_Store)
    entries.retain(|e| !e.file_name().to_string_lossy().starts_with('.'));

    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        let top_level = entries[0].path();
        let sub_entries: Vec<_> = fs::read_dir(&top_level)?.filter_map(Result::ok).collect();

        for entry in sub_entries {
            let target = dir.join(entry.file_name());
            fs::rename(entry.path(), target)?;
        }

        fs::remove_dir(top_level)?;
    }

    Ok(())
}

/// Pick the archive entry to install from the extracted files.
///
/// An exact relative path wins. Otherwise any file with the same file name
/// matches (archives often nest the binary under a versioned directory);
/// executables are preferred over other files, then the shortest path.
/// Entries that would escape the extraction root never match.
pub fn find_entry(files: &[ExtractedFile], entry: &str) -> Option<PathBuf> {
    let entry_path = Path::new(entry);
    if entry.is_empty() || !is_contained(entry_path) {
        return None;
    }

    let wanted: PathBuf = entry_path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if let Some(exact) = files.iter().find(|f| f.relative_path == wanted) {
        return Some(exact.absolute_path.clone());
    }

    let name = wanted.file_name()?;
    files
        .iter()
        .filter(|f| f.relative_path.file_name() == Some(name))
        .min_by_key(|f| {
            (
                !f.is_executable,
                f.relative_path.components().count(),
                f.relative_path.clone(),
            )
        })
        .map(|f| f.absolute_path.clone())
}

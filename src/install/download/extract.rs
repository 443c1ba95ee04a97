//! Release archive extraction
//!
//! Windows releases are zip archives holding a directory tree; linux and
//! macOS releases are gzip-compressed tarballs holding a single `mintas`
//! executable.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use log::{debug, info};
use tar::Archive;
use zip::ZipArchive;

use super::platform::{ArchiveKind, Platform};
use crate::install::InstallerError;

/// File name of the executable inside unix release archives
pub const UNIX_BINARY_NAME: &str = "mintas";

/// Unpack `archive` into `destination` and return the payload path
///
/// The payload is the staging directory itself for zip archives and the
/// extracted `mintas` executable for tarballs.
pub async fn extract(
    archive: &Path,
    platform: Platform,
    destination: &Path,
) -> Result<PathBuf, InstallerError> {
    info!(
        "Extracting {} into {}",
        archive.display(),
        destination.display()
    );

    // Wrap CPU-bound extraction in spawn_blocking
    let archive = archive.to_path_buf();
    let destination = destination.to_path_buf();
    tokio::task::spawn_blocking(move || extract_blocking(&archive, platform, &destination))
        .await
        .map_err(|e| InstallerError::Extraction(format!("extraction task failed: {e}")))?
}

/// Synchronous form of [`extract`]
pub fn extract_blocking(
    archive: &Path,
    platform: Platform,
    destination: &Path,
) -> Result<PathBuf, InstallerError> {
    std::fs::create_dir_all(destination).map_err(|e| {
        InstallerError::Extraction(format!("cannot create {}: {e}", destination.display()))
    })?;

    match platform.archive_kind() {
        ArchiveKind::Zip => {
            extract_zip(archive, destination)?;
            Ok(destination.to_path_buf())
        }
        ArchiveKind::TarGz => {
            extract_tar_gz(archive, destination)?;
            locate_unix_binary(destination)
        }
    }
}

fn extract_zip(archive: &Path, destination: &Path) -> Result<(), InstallerError> {
    let file = File::open(archive).map_err(|e| {
        InstallerError::Extraction(format!("failed to open {}: {e}", archive.display()))
    })?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| InstallerError::Extraction(format!("failed to read ZIP archive: {e}")))?;

    if zip.is_empty() {
        return Err(InstallerError::Extraction("ZIP archive is empty".to_string()));
    }

    // Entries with absolute or parent-relative names are refused here
    zip.extract(destination)
        .map_err(|e| InstallerError::Extraction(format!("failed to unpack ZIP archive: {e}")))?;

    debug!("Unpacked {} ZIP entries", zip.len());
    Ok(())
}

fn extract_tar_gz(archive: &Path, destination: &Path) -> Result<(), InstallerError> {
    let file = File::open(archive).map_err(|e| {
        InstallerError::Extraction(format!("failed to open {}: {e}", archive.display()))
    })?;
    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_preserve_permissions(true);
    tar.unpack(destination)
        .map_err(|e| InstallerError::Extraction(format!("failed to unpack tarball: {e}")))
}

/// Find `mintas` at the staging root, or one directory below it
///
/// Only regular files qualify; a symlink named `mintas` is refused since the
/// unprivileged and elevated placement paths would treat it differently.
fn locate_unix_binary(staging: &Path) -> Result<PathBuf, InstallerError> {
    let direct = staging.join(UNIX_BINARY_NAME);
    if let Some(found) = regular_file(&direct)? {
        return Ok(found);
    }

    let entries = std::fs::read_dir(staging).map_err(|e| {
        InstallerError::Extraction(format!("cannot list {}: {e}", staging.display()))
    })?;
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(nested) = regular_file(&entry.path().join(UNIX_BINARY_NAME))? {
            debug!("Found {} one level down at {}", UNIX_BINARY_NAME, nested.display());
            return Ok(nested);
        }
    }

    Err(InstallerError::Extraction(format!(
        "archive does not contain a `{UNIX_BINARY_NAME}` executable"
    )))
}

/// `Some(path)` for a regular file, `None` when absent, an error for anything else
fn regular_file(path: &Path) -> Result<Option<PathBuf>, InstallerError> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_file() => Ok(Some(path.to_path_buf())),
        Ok(meta) if meta.file_type().is_dir() => Ok(None),
        Ok(_) => Err(InstallerError::Extraction(format!(
            "{} is not a regular file",
            path.display()
        ))),
        Err(_) => Ok(None),
    }
}

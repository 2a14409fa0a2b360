//! Deterministic ZIP archive creation.
//!
//! The archive is written to a temporary file next to the destination and
//! only moved into place once complete, so a failed build never leaves a
//! truncated archive behind.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::ArchiveError;
use crate::analyzer::validate_entry_name;
use crate::manifest::{ArchiveManifest, EntrySource};

/// Directory, relative to the project root, that receives built archives.
const ARCHIVE_DIR: &str = "deployment";

/// A completed archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    pub path: PathBuf,
    pub size: u64,
    /// Hex-encoded SHA-256 of the archive bytes.
    pub sha256: String,
    pub entries: usize,
}

/// Default archive location for a driver: `<project>/deployment/<name>.zip`.
pub fn default_archive_path(project_root: &Path, driver_name: &str) -> PathBuf {
    project_root
        .join(ARCHIVE_DIR)
        .join(format!("{driver_name}.zip"))
}

/// Builds a ZIP archive at `destination`.
///
/// `extras` are synthetic entries applied after the manifest; an extra entry
/// replaces a file entry of the same name.
pub fn build(
    manifest: &ArchiveManifest,
    extras: &BTreeMap<String, Vec<u8>>,
    destination: &Path,
) -> Result<ArchiveHandle, ArchiveError> {
    let merged = manifest.merged_with(extras);
    for name in merged.names() {
        validate_entry_name(name)?;
    }

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;

    // Dropped (and deleted) on any early return.
    let mut temp = NamedTempFile::new_in(&parent)?;
    write_entries(&merged, temp.as_file_mut())?;
    temp.as_file_mut().sync_all()?;

    let sha256 = file_sha256(temp.path())?;
    let size = temp.as_file().metadata()?.len();

    temp.persist(destination).map_err(|e| e.error)?;

    debug!(
        path = %destination.display(),
        entries = merged.len(),
        bytes = size,
        "archive built"
    );

    Ok(ArchiveHandle {
        path: destination.to_path_buf(),
        size,
        sha256,
        entries: merged.len(),
    })
}

fn write_entries(manifest: &ArchiveManifest, out: &mut File) -> Result<(), ArchiveError> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut writer = ZipWriter::new(out);
    for (name, source) in manifest.iter() {
        writer.start_file(name, options)?;
        match source {
            EntrySource::File(path) => {
                let mut file = File::open(path).map_err(|e| {
                    std::io::Error::new(e.kind(), format!("{}: {e}", path.display()))
                })?;
                std::io::copy(&mut file, &mut writer)?;
            }
            EntrySource::Bytes(data) => writer.write_all(data)?,
        }
    }
    writer.finish()?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String, ArchiveError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

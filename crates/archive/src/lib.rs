//! Filtering, analysis and packaging of driver source trees.
//!
//! The pipeline inside this crate is:
//!
//! 1. **Filter**: decide archive membership of a relative path
//! 2. **Analyze**: walk a directory (or file list) into an [`ArchiveManifest`]
//! 3. **Build**: stream the manifest plus synthetic entries into a ZIP file

mod analyzer;
mod builder;
mod descriptor;
mod filter;
mod manifest;

use std::path::PathBuf;

pub use analyzer::{Analyzer, TargetSource, analyze};
pub use builder::{ArchiveHandle, build, default_archive_path};
pub use descriptor::{DEBUG_DESCRIPTOR_NAME, debug_descriptor};
pub use filter::{FileFilter, matches, normalize_relative};
pub use manifest::{ArchiveManifest, EntrySource};

/// Errors produced by the archive crate.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("directory not found: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid file filter {pattern:?}: {reason}")]
    InvalidFilter { pattern: String, reason: String },

    #[error("invalid entry name: {0}")]
    InvalidEntryName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ArchiveError {
    /// Whether the error concerns the source tree rather than the archive
    /// being written.
    pub fn is_filesystem(&self) -> bool {
        matches!(
            self,
            Self::MissingRoot(_) | Self::NotADirectory(_) | Self::NotAFile(_) | Self::Walk { .. }
        )
    }
}

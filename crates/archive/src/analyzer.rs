//! Source tree analysis.
//!
//! Walks a directory (or checks an explicit file list), applies the file
//! filters and produces an [`ArchiveManifest`] mapping entry names to the
//! absolute paths they are read from.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::ArchiveError;
use crate::filter::{FileFilter, matches, normalize_relative};
use crate::manifest::ArchiveManifest;

/// What a publish target reads its files from, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Every regular file below this directory (`""` is the project root).
    Directory(String),
    /// Exactly these files, named relative to `base`.
    Files { base: String, files: Vec<String> },
}

impl Default for TargetSource {
    fn default() -> Self {
        Self::Directory(String::new())
    }
}

/// Analyzer variant chosen for a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Analyzer {
    Directory { root: PathBuf },
    FileList { root: PathBuf, files: Vec<String> },
}

impl Analyzer {
    /// Picks the analyzer for `source` under `project_root`.
    pub fn for_target(project_root: &Path, source: &TargetSource) -> Self {
        match source {
            TargetSource::Directory(dir) => Self::Directory {
                root: join_relative(project_root, dir),
            },
            TargetSource::Files { base, files } => Self::FileList {
                root: join_relative(project_root, base),
                files: files.clone(),
            },
        }
    }

    /// Directory the entry names are relative to.
    pub fn root(&self) -> &Path {
        match self {
            Self::Directory { root } | Self::FileList { root, .. } => root,
        }
    }

    pub fn analyze(&self, filters: &[FileFilter]) -> Result<ArchiveManifest, ArchiveError> {
        match self {
            Self::Directory { root } => analyze(root, filters),
            Self::FileList { root, files } => analyze_files(root, files, filters),
        }
    }
}

/// Walks `root_dir` recursively and maps every included regular file.
///
/// Symbolic links are followed, but each real directory is entered at most
/// once, which also breaks link cycles. Entries are visited in name order,
/// so a directory reachable by several paths is packaged under the first.
pub fn analyze(root_dir: &Path, filters: &[FileFilter]) -> Result<ArchiveManifest, ArchiveError> {
    let root = canonical_root(root_dir)?;

    let mut manifest = ArchiveManifest::new();
    let mut visited = HashSet::new();
    visited.insert(root.clone());

    walk_dir(&root, &root, filters, &mut visited, &mut manifest)?;

    debug!(
        root = %root.display(),
        entries = manifest.len(),
        "directory analysis complete"
    );
    Ok(manifest)
}

fn analyze_files(
    root_dir: &Path,
    files: &[String],
    filters: &[FileFilter],
) -> Result<ArchiveManifest, ArchiveError> {
    let root = canonical_root(root_dir)?;
    let mut manifest = ArchiveManifest::new();

    for file in files {
        let name = normalize_relative(file);
        validate_entry_name(&name)?;

        let path = root.join(&name);
        let metadata = std::fs::metadata(&path).map_err(|source| ArchiveError::Walk {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(ArchiveError::NotAFile(path));
        }

        if matches(&name, filters) {
            manifest.insert_file(name, path);
        } else {
            debug!(entry = %name, "excluded by filters");
        }
    }

    debug!(
        root = %root.display(),
        listed = files.len(),
        entries = manifest.len(),
        "file list analysis complete"
    );
    Ok(manifest)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    filters: &[FileFilter],
    visited: &mut HashSet<PathBuf>,
    manifest: &mut ArchiveManifest,
) -> Result<(), ArchiveError> {
    let walk_err = |source: std::io::Error| ArchiveError::Walk {
        path: current.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(current)
        .map_err(walk_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(walk_err)?;
    // Name order decides which alias of a shared directory is kept.
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();

        // Follows symlinks; a dangling link is not a regular file.
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "skipping dangling link");
                continue;
            }
            Err(source) => return Err(ArchiveError::Walk { path, source }),
        };

        if metadata.is_dir() {
            let real = std::fs::canonicalize(&path).map_err(|source| ArchiveError::Walk {
                path: path.clone(),
                source,
            })?;
            if !visited.insert(real) {
                debug!(path = %path.display(), "directory already visited");
                continue;
            }
            walk_dir(root, &path, filters, visited, manifest)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
            let name = rel_path.to_string_lossy().replace('\\', "/");

            if matches(&name, filters) {
                manifest.insert_file(name, path);
            }
        }
    }

    Ok(())
}

fn canonical_root(root_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let root = std::fs::canonicalize(root_dir).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ArchiveError::MissingRoot(root_dir.to_path_buf()),
        _ => ArchiveError::Walk {
            path: root_dir.to_path_buf(),
            source: e,
        },
    })?;
    if !root.is_dir() {
        return Err(ArchiveError::NotADirectory(root_dir.to_path_buf()));
    }
    Ok(root)
}

fn join_relative(project_root: &Path, relative: &str) -> PathBuf {
    let relative = normalize_relative(relative);
    if relative.is_empty() {
        project_root.to_path_buf()
    } else {
        project_root.join(relative)
    }
}

/// Rejects names that would escape the archive root.
pub(crate) fn validate_entry_name(name: &str) -> Result<(), ArchiveError> {
    if name.is_empty() {
        return Err(ArchiveError::InvalidEntryName("empty name".into()));
    }
    for component in Path::new(name).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(ArchiveError::InvalidEntryName(name.to_string())),
        }
    }
    Ok(())
}

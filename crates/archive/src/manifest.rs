use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where the bytes of an archive entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Read from this absolute path at build time.
    File(PathBuf),
    /// Synthetic content generated in memory.
    Bytes(Vec<u8>),
}

/// Mapping of archive entry name to its content source.
///
/// Entry names are relative and `/`-separated. Iteration is ordered by
/// name so the archive layout is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    entries: BTreeMap<String, EntrySource>,
}

impl ArchiveManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `name` to a file on disk, replacing any previous mapping.
    pub fn insert_file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.entries
            .insert(name.into(), EntrySource::File(path.into()));
    }

    /// Maps `name` to in-memory bytes, replacing any previous mapping.
    pub fn insert_bytes(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries
            .insert(name.into(), EntrySource::Bytes(data.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<EntrySource> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&EntrySource> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntrySource)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Applies synthetic entries on top of the filesystem entries.
    ///
    /// Filesystem entries go in first, synthetic entries overwrite by name.
    pub fn merged_with(&self, extras: &BTreeMap<String, Vec<u8>>) -> ArchiveManifest {
        let mut merged = self.clone();
        for (name, data) in extras {
            merged.insert_bytes(name.clone(), data.clone());
        }
        merged
    }
}

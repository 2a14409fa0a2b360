//! Include/exclude filters over relative archive paths.
//!
//! Filters are evaluated in declaration order and the last matching filter
//! decides. A path no filter matches is included.

use glob::{MatchOptions, Pattern};

use crate::ArchiveError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A glob pattern with an include/exclude polarity.
///
/// `*` matches within one path component, `**` spans separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    source: String,
    pattern: Pattern,
    include: bool,
}

impl FileFilter {
    /// Compiles `pattern` into a filter.
    pub fn new(pattern: &str, include: bool) -> Result<Self, ArchiveError> {
        // A trailing `**` only matches directories in `glob`; widen it to the
        // files beneath them.
        let expanded = if pattern == "**" || pattern.ends_with("/**") {
            format!("{pattern}/*")
        } else {
            pattern.to_string()
        };
        let compiled = Pattern::new(&expanded).map_err(|e| ArchiveError::InvalidFilter {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            source: pattern.to_string(),
            pattern: compiled,
            include,
        })
    }

    pub fn include(pattern: &str) -> Result<Self, ArchiveError> {
        Self::new(pattern, true)
    }

    pub fn exclude(pattern: &str) -> Result<Self, ArchiveError> {
        Self::new(pattern, false)
    }

    /// The source pattern text.
    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn is_include(&self) -> bool {
        self.include
    }

    /// Whether this filter's pattern matches an already-normalized path.
    fn is_match(&self, normalized: &str) -> bool {
        self.pattern.matches_with(normalized, MATCH_OPTIONS)
    }
}

/// Normalizes a relative path to `/` separators without a leading `./`.
pub fn normalize_relative(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while let Some(rest) = normalized.strip_prefix("./") {
        normalized = rest.to_string();
    }
    normalized
}

/// Decides whether `relative_path` belongs in the archive.
pub fn matches(relative_path: &str, filters: &[FileFilter]) -> bool {
    let normalized = normalize_relative(relative_path);
    filters
        .iter()
        .fold(true, |included, filter| {
            if filter.is_match(&normalized) {
                filter.include
            } else {
                included
            }
        })
}

//! Exclude pattern matching.
//!
//! Patterns use gitignore semantics via the `ignore` crate:
//!
//! - `*.md` (no slash) matches at any depth
//! - `docs/*.md` (inner slash) is anchored at the include root
//! - `shared/` (trailing slash) matches directories only
//! - `**/node_modules` matches the directory and, through its parents,
//!   everything below it
//! - `!keep.txt` re-includes a previously excluded path

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// A compiled set of exclude patterns.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    matcher: Gitignore,
}

impl ExcludeSet {
    /// Compile the given patterns. Blank lines and `#` comments are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> crate::Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            let line = pattern.as_ref().trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder
                .add_line(None, line)
                .map_err(|e| crate::Error::InvalidExcludePattern {
                    pattern: line.to_owned(),
                    source: e,
                })?;
        }
        let matcher = builder
            .build()
            .map_err(|e| crate::Error::InvalidExcludePattern {
                pattern: patterns
                    .iter()
                    .map(|p| p.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
                source: e,
            })?;
        Ok(Self { matcher })
    }

    /// Whether `rel_path`, or any of its parent directories, is excluded.
    ///
    /// `rel_path` must be relative; `is_dir` should be true for directories.
    pub fn is_excluded(&self, rel_path: &Path, is_dir: bool) -> bool {
        if rel_path.as_os_str().is_empty() || rel_path.has_root() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    /// Whether an include entry as written in the manifest is excluded.
    ///
    /// A trailing slash marks the entry as a directory, so `shared/` is
    /// matched by both `shared` and `shared/`.
    pub fn excludes_include(&self, include: &str) -> bool {
        let is_dir = include.ends_with('/');
        let trimmed = include.trim_start_matches("./").trim_end_matches('/');
        self.is_excluded(Path::new(trimmed), is_dir)
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }
}

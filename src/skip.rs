//! Skip-pattern application for directory scanning (`spec.md` §6).
//!
//! Loading `.goldieskip` off disk is a convenience kept here because a
//! complete ambient implementation should not leave even the default list
//! undocumented, but the *loader* proper (discovering the file, deciding
//! whether to use it) is an external collaborator per `spec.md` §1; this
//! module's load path is intentionally thin.

use std::path::Path;

use crate::error::GoldieResult;

/// Default patterns applied when no `.goldieskip` file is present.
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    ".git/", "target/", "node_modules/", ".DS_Store", "*.lock",
];

/// A compiled set of shell-glob skip patterns.
///
/// Patterns with a trailing `/` match directory names; all other patterns
/// match file or directory basenames and path components.
#[derive(Debug, Clone)]
pub struct SkipPatterns {
    directory_patterns: Vec<glob::Pattern>,
    general_patterns: Vec<glob::Pattern>,
}

impl SkipPatterns {
    /// Build a pattern set from raw glob strings, as loaded from a
    /// `.goldieskip` file or supplied by the caller.
    pub fn from_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut directory_patterns = Vec::new();
        let mut general_patterns = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref();
            if let Some(stripped) = raw.strip_suffix('/') {
                if let Ok(pattern) = glob::Pattern::new(stripped) {
                    directory_patterns.push(pattern);
                }
            } else if let Ok(pattern) = glob::Pattern::new(raw) {
                general_patterns.push(pattern);
            }
        }

        Self {
            directory_patterns,
            general_patterns,
        }
    }

    /// The built-in default skip list.
    pub fn defaults() -> Self {
        Self::from_patterns(DEFAULT_SKIP_PATTERNS.iter().copied())
    }

    /// Load patterns from a `.goldieskip` file at `dir`'s root, if present.
    /// Non-empty, non-comment (`#`) lines replace the defaults entirely; an
    /// absent file yields the defaults, and a present-but-empty file yields
    /// an empty pattern set (no paths skipped).
    pub async fn load(dir: impl AsRef<Path>) -> GoldieResult<Self> {
        let skip_file = dir.as_ref().join(".goldieskip");
        if !skip_file.exists() {
            return Ok(Self::defaults());
        }

        let contents = tokio::fs::read_to_string(&skip_file).await?;
        let patterns: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        Ok(Self::from_patterns(patterns))
    }

    /// Returns `true` if `path`'s basename (or, for directories, its name)
    /// matches a skip pattern and the directory subtree or file should be
    /// pruned/omitted.
    pub fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => return false,
        };

        if is_dir && self.directory_patterns.iter().any(|p| p.matches(name)) {
            return true;
        }

        if self.general_patterns.iter().any(|p| p.matches(name)) {
            return true;
        }

        // Also check path components, so a pattern like "target/" prunes a
        // nested `foo/target/bar.rs` even when scanning from `foo`.
        path.components().any(|component| {
            let component = component.as_os_str().to_string_lossy();
            self.directory_patterns
                .iter()
                .any(|p| p.matches(&component))
        })
    }
}

//! Path selection shared by local and remote file sources.

use ctxgen_shared::{GlobPattern, Result, has_glob_chars};

/// One `path` / `notPath` entry: a glob, or a plain substring.
#[derive(Debug, Clone)]
enum PathMatcher {
    Glob(GlobPattern),
    Substring(String),
}

impl PathMatcher {
    fn new(pattern: &str) -> Result<Self> {
        if has_glob_chars(pattern) {
            Ok(Self::Glob(GlobPattern::new(pattern)?))
        } else {
            Ok(Self::Substring(pattern.trim_matches('/').to_string()))
        }
    }

    /// Globs match the whole relative path or any single segment of it.
    fn matches(&self, rel: &str) -> bool {
        match self {
            Self::Glob(glob) => glob.is_match(rel) || rel.split('/').any(|seg| glob.is_match(seg)),
            Self::Substring(s) => rel.contains(s.as_str()),
        }
    }
}

/// `filePattern` + `path` + `notPath`, applied to `/`-separated relative paths.
#[derive(Debug, Clone, Default)]
pub(crate) struct PathFilter {
    file_patterns: Vec<GlobPattern>,
    include: Vec<PathMatcher>,
    exclude: Vec<PathMatcher>,
}

impl PathFilter {
    pub(crate) fn new(file_pattern: &[String], path: &[String], not_path: &[String]) -> Result<Self> {
        let compile = |items: &[String]| -> Result<Vec<PathMatcher>> {
            items
                .iter()
                .filter(|p| !p.trim().is_empty())
                .map(|p| PathMatcher::new(p))
                .collect()
        };
        Ok(Self {
            file_patterns: GlobPattern::compile_all(file_pattern)?,
            include: compile(path)?,
            exclude: compile(not_path)?,
        })
    }

    /// Whether a file at `rel` is selected.
    ///
    /// A file pattern without `/` is matched against the file name only.
    pub(crate) fn matches(&self, rel: &str) -> bool {
        let name = rel.rsplit('/').next().unwrap_or(rel);
        let pattern_ok = self.file_patterns.is_empty()
            || self.file_patterns.iter().any(|p| {
                if p.as_str().contains('/') {
                    p.is_match(rel)
                } else {
                    p.is_match(name)
                }
            });
        let include_ok = self.include.is_empty() || self.include.iter().any(|m| m.matches(rel));
        pattern_ok && include_ok && !self.is_excluded(rel)
    }

    /// Whether `rel` (file or directory) hits a `notPath` entry.
    pub(crate) fn is_excluded(&self, rel: &str) -> bool {
        self.exclude.iter().any(|m| m.matches(rel))
    }
}

//! Glob-like path patterns.
//!
//! Supports `*` (any run of characters within one path segment), `**`
//! (any number of segments, including none when followed by `/`) and `?`
//! (one character within a segment). Everything else matches literally.

use regex::Regex;

use crate::error::{CtxgenError, Result};

/// Whether `s` contains characters that make it a glob rather than a plain path.
pub fn has_glob_chars(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

/// A compiled glob pattern matched against `/`-separated relative paths.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    regex: Regex,
}

impl GlobPattern {
    /// Compile a glob pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| {
            CtxgenError::validation(format!("invalid glob pattern '{pattern}': {e}"))
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    /// Compile every pattern, failing on the first invalid one.
    pub fn compile_all(patterns: &[String]) -> Result<Vec<Self>> {
        patterns.iter().map(|p| Self::new(p)).collect()
    }

    /// Match against a relative path. Backslashes are treated as separators.
    pub fn is_match(&self, path: &str) -> bool {
        if path.contains('\\') {
            self.regex.is_match(&path.replace('\\', "/"))
        } else {
            self.regex.is_match(path)
        }
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Convert a glob-like pattern to an anchored regex.
fn glob_to_regex(pattern: &str) -> String {
    let escaped = regex::escape(pattern)
        .replace(r"\*\*/", "(?:.*/)?")
        .replace(r"\*\*", ".*")
        .replace(r"\*", "[^/]*")
        .replace(r"\?", "[^/]");
    format!("^{escaped}$")
}

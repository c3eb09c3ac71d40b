//! Error types for ctxgen.
//!
//! Library crates use [`CtxgenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all ctxgen operations.
#[derive(Debug, thiserror::Error)]
pub enum CtxgenError {
    /// Application configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A context config file could not be parsed.
    #[error("parse error in {origin}: {message}")]
    Parse { origin: String, message: String },

    /// An import directive could not be resolved.
    #[error("import error: {0}")]
    Import(String),

    /// Network/HTTP error while fetching an import or a source.
    #[error("network error: {0}")]
    Network(String),

    /// A source produced no content because its fetcher failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// A content modifier rejected or failed on its input.
    #[error("modifier error: {0}")]
    Modifier(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad prompt, bad output path, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CtxgenError>;

impl CtxgenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for the given origin (file path or URL).
    pub fn parse(origin: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CtxgenError::config("missing output dir");
        assert_eq!(err.to_string(), "config error: missing output dir");

        let err = CtxgenError::parse("context.yaml", "unexpected key");
        assert_eq!(err.to_string(), "parse error in context.yaml: unexpected key");

        let err = CtxgenError::validation("prompt id is empty");
        assert!(err.to_string().contains("prompt id is empty"));
    }

    #[test]
    fn io_error_keeps_path() {
        let err = CtxgenError::io(
            "/tmp/missing.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.yaml"));
    }
}

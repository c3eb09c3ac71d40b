//! Non-throwing error accumulation.

use serde::Serialize;

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub scope: String,
    pub message: String,
}

impl std::fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.scope, self.message)
    }
}

/// Append-only list of `(scope, message)` pairs.
///
/// Each document compile owns one; the run keeps another that absorbs them
/// all once compilation finishes.
#[derive(Debug, Clone, Default)]
pub struct ErrorCollector {
    entries: Vec<ErrorEntry>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.entries.push(ErrorEntry {
            scope: scope.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// Messages only, in insertion order.
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Append every entry of `other`.
    pub fn extend(&mut self, other: &ErrorCollector) {
        self.entries.extend(other.entries.iter().cloned());
    }
}

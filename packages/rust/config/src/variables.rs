//! Immutable variable scopes and flat token substitution.
//!
//! Two token forms exist:
//! - `{{KEY}}` in document, source and prompt content
//! - `${KEY}` in import directive paths, URLs and headers
//!
//! Substitution is a single pass. Unknown keys are left verbatim, and
//! substituted values are never scanned again.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

static BRACE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("valid regex")
});

static DOLLAR_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("valid regex"));

/// An immutable key→value map. Cloning is cheap; merging builds a new scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableScope {
    vars: Arc<BTreeMap<String, String>>,
}

impl VariableScope {
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self {
            vars: Arc::new(vars),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }

    /// A new scope with `overrides` layered on top; `overrides` wins on collision.
    pub fn merge(&self, overrides: &VariableScope) -> VariableScope {
        if overrides.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return overrides.clone();
        }
        let mut merged = (*self.vars).clone();
        merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::new(merged)
    }

    /// Replace every `{{KEY}}` with its value, leaving unknown tokens untouched.
    pub fn substitute(&self, text: &str) -> String {
        self.replace_with(&BRACE_TOKEN_RE, text)
    }

    /// Replace every `${KEY}` with its value, leaving unknown tokens untouched.
    pub fn substitute_env(&self, text: &str) -> String {
        self.replace_with(&DOLLAR_TOKEN_RE, text)
    }

    fn replace_with(&self, re: &Regex, text: &str) -> String {
        if self.is_empty() || !re.is_match(text) {
            return text.to_string();
        }
        re.replace_all(text, |caps: &Captures| match self.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
    }
}

impl From<BTreeMap<String, String>> for VariableScope {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Self::new(vars)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableScope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

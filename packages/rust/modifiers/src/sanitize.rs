//! Redaction of secrets and user-listed terms.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use ctxgen_shared::{CtxgenError, Result};

use crate::{ContentModifier, parse_options};

/// Built-in rules: (pattern, replacement template). `{r}` is the redaction marker.
const BUILTIN_RULES: [(&str, &str); 5] = [
    (
        r"-----BEGIN [A-Z ]*PRIVATE KEY-----[\s\S]*?-----END [A-Z ]*PRIVATE KEY-----",
        "{r}",
    ),
    (r"\bAKIA[0-9A-Z]{16}\b", "{r}"),
    (r"\bgh[pousr]_[A-Za-z0-9]{36,}\b", "{r}"),
    (r"\bglpat-[A-Za-z0-9_\-]{20,}\b", "{r}"),
    (
        r#"(?i)\b(api[_-]?key|secret|password|passwd|access[_-]?token|auth[_-]?token)(\s*[:=]\s*)["']?[^\s"']+["']?"#,
        "${1}${2}{r}",
    ),
];

static BUILTIN: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    BUILTIN_RULES
        .iter()
        .map(|(pattern, template)| (Regex::new(pattern).expect("valid regex"), *template))
        .collect()
});

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SanitizeOptions {
    /// Extra regular expressions; each whole match is redacted.
    patterns: Vec<String>,
    /// Literal terms, matched case-insensitively.
    keywords: Vec<String>,
    replacement: String,
    builtin: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            keywords: Vec::new(),
            replacement: "[REDACTED]".into(),
            builtin: true,
        }
    }
}

/// `sanitizer`: options `{patterns, keywords, replacement = "[REDACTED]", builtin = true}`.
pub struct Sanitizer;

impl ContentModifier for Sanitizer {
    fn name(&self) -> &str {
        "sanitizer"
    }

    fn apply(&self, content: &str, options: &Value) -> Result<String> {
        let opts: SanitizeOptions = parse_options(self.name(), options)?;
        // `$` in the marker must not be read as a capture reference.
        let marker = opts.replacement.replace('$', "$$");
        let mut out = content.to_string();

        if opts.builtin {
            for (re, template) in BUILTIN.iter() {
                out = re
                    .replace_all(&out, template.replace("{r}", &marker).as_str())
                    .into_owned();
            }
        }

        for pattern in &opts.patterns {
            let re = Regex::new(pattern).map_err(|e| {
                CtxgenError::Modifier(format!("invalid sanitizer pattern '{pattern}': {e}"))
            })?;
            out = re.replace_all(&out, marker.as_str()).into_owned();
        }

        for keyword in opts.keywords.iter().filter(|k| !k.is_empty()) {
            let re = Regex::new(&format!("(?i){}", regex::escape(keyword)))
                .map_err(|e| CtxgenError::Modifier(format!("invalid keyword '{keyword}': {e}")))?;
            out = re.replace_all(&out, marker.as_str()).into_owned();
        }

        debug!(changed = out != content, "sanitizer applied");
        Ok(out)
    }
}

//! Markdown normalization passes.
//!
//! Used after HTML conversion and as the standalone `markdown-cleanup`
//! modifier. Every pass is `&str -> String` and leaves fenced code alone
//! where it would otherwise change meaning.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use ctxgen_shared::Result;

use crate::{ContentModifier, parse_options};

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

static FENCE_LANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
});

static WRAPPER_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary)(?:\s[^>]*)?>",
    )
    .expect("valid regex")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s+(.+)$").expect("valid regex"));

/// Run every pass in order.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut out = md.replace("\r\n", "\n");
    out = fix_fence_languages(&out);
    out = map_outside_fences(&out, |line| WRAPPER_TAG_RE.replace_all(line, "").into_owned());
    out = resolve_links(&out, base_url);
    out = trim_line_ends(&out);
    out = BLANK_RUN_RE.replace_all(&out, "\n\n").into_owned();
    let trimmed = out.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

/// `language-js` style fence hints become plain `js`.
fn fix_fence_languages(md: &str) -> String {
    FENCE_LANG_RE.replace_all(md, "```$1").into_owned()
}

/// Apply `f` to every line outside fenced code blocks.
fn map_outside_fences(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    let mut in_fence = false;
    let mut out = md
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return line.to_string();
            }
            if in_fence { line.to_string() } else { f(line) }
        })
        .collect::<Vec<_>>()
        .join("\n");
    if md.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Make relative link targets absolute. Images, anchors and absolute URLs are kept.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    LINK_RE
        .replace_all(md, |caps: &Captures| {
            let (bang, text, href) = (&caps[1], &caps[2], &caps[3]);
            let absolute = href.starts_with('#')
                || href.starts_with("mailto:")
                || Url::parse(href).is_ok();
            if !bang.is_empty() || absolute {
                return caps[0].to_string();
            }
            match base.join(href) {
                Ok(resolved) => format!("[{text}]({resolved})"),
                Err(_) => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn trim_line_ends(md: &str) -> String {
    md.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Demote every H1 after the first to H2.
fn demote_extra_h1s(md: &str) -> String {
    let mut seen_h1 = false;
    map_outside_fences(md, |line| match HEADING_RE.captures(line) {
        Some(caps) if seen_h1 => format!("## {}", &caps[1]),
        Some(_) => {
            seen_h1 = true;
            line.to_string()
        }
        None => line.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Modifier
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CleanupOptions {
    base_url: Option<String>,
    demote_headings: bool,
}

/// `markdown-cleanup`: options `{baseUrl?, demoteHeadings = false}`.
pub struct MarkdownCleanup;

impl ContentModifier for MarkdownCleanup {
    fn name(&self) -> &str {
        "markdown-cleanup"
    }

    fn apply(&self, content: &str, options: &Value) -> Result<String> {
        let opts: CleanupOptions = parse_options(self.name(), options)?;
        let base_url = opts.base_url.as_deref().and_then(|u| Url::parse(u).ok());
        let cleaned = run_pipeline(content, base_url.as_ref());
        Ok(if opts.demote_headings {
            demote_extra_h1s(&cleaned)
        } else {
            cleaned
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_blank_runs_and_trailing_space() {
        let out = run_pipeline("# A   \n\n\n\n\nBody\t\n", None);
        assert_eq!(out, "# A\n\nBody\n");
    }

    #[test]
    fn strips_wrapper_tags_outside_fences() {
        let md = "<div class=\"note\">Text</div>\n```html\n<div>kept</div>\n```\n";
        let out = run_pipeline(md, None);
        assert!(out.starts_with("Text\n"));
        assert!(out.contains("<div>kept</div>"));
    }

    #[test]
    fn fixes_fence_language_hints() {
        let out = run_pipeline("```language-rust\nfn main() {}\n```", None);
        assert!(out.starts_with("```rust\n"));
    }

    #[test]
    fn resolves_only_relative_links() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let md = "[a](intro) [b](https://other.org/x) [c](#top) ![img](pic.png)";
        let out = run_pipeline(md, Some(&base));
        assert!(out.contains("[a](https://example.com/docs/intro)"));
        assert!(out.contains("[b](https://other.org/x)"));
        assert!(out.contains("[c](#top)"));
        assert!(out.contains("![img](pic.png)"));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(run_pipeline("  \n\n ", None), "");
    }

    #[test]
    fn modifier_demotes_extra_h1s_when_asked() {
        let opts = serde_json::json!({"demoteHeadings": true});
        let out = MarkdownCleanup
            .apply("# One\n\n# Two\n```\n# not a heading\n```\n", &opts)
            .unwrap();
        assert_eq!(out, "# One\n\n## Two\n```\n# not a heading\n```\n");
    }
}

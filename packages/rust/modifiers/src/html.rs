//! HTML → Markdown via `htmd`, with table pre-processing and chrome stripping.

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use ctxgen_shared::{CtxgenError, Result};

use crate::{ContentModifier, cleanup, parse_options};

/// Tags dropped entirely during conversion.
const SKIP_TAGS: [&str; 6] = ["script", "style", "nav", "iframe", "noscript", "svg"];

/// Containers tried, in order, when looking for the main content.
const CONTENT_SELECTORS: [&str; 7] = [
    "article .markdown",
    ".vp-doc",
    ".markdown-section",
    "[role=\"main\"]",
    "article",
    "main",
    ".content",
];

/// Convert an HTML page (or fragment) to cleaned Markdown.
///
/// Relative links are resolved against `base_url` when given.
#[instrument(skip(html), fields(len = html.len()))]
pub fn html_to_markdown(html: &str, base_url: Option<&Url>) -> Result<String> {
    let content = extract_content_html(html);
    convert_fragment(&content, base_url)
}

/// Convert HTML without looking for a main-content container.
pub(crate) fn convert_fragment(html: &str, base_url: Option<&Url>) -> Result<String> {
    let (html, tables) = extract_tables(html);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();
    let mut raw = converter
        .convert(&html)
        .map_err(|e| CtxgenError::Modifier(format!("htmd conversion failed: {e}")))?;

    for (i, table) in tables.iter().enumerate() {
        raw = raw.replacen(&table_placeholder(i), table, 1);
    }

    debug!(raw_len = raw.len(), tables = tables.len(), "htmd conversion complete");
    Ok(cleanup::run_pipeline(&raw, base_url))
}

// ---------------------------------------------------------------------------
// Modifier
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HtmlOptions {
    base_url: Option<String>,
    /// Look for `<main>`, `<article>`, ... before converting.
    extract_main: bool,
}

impl Default for HtmlOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            extract_main: true,
        }
    }
}

/// `html-to-markdown`: options `{baseUrl?, extractMain = true}`.
pub struct HtmlToMarkdown;

impl ContentModifier for HtmlToMarkdown {
    fn name(&self) -> &str {
        "html-to-markdown"
    }

    fn apply(&self, content: &str, options: &Value) -> Result<String> {
        let opts: HtmlOptions = parse_options(self.name(), options)?;
        let base_url = opts.base_url.as_deref().and_then(|u| Url::parse(u).ok());
        if opts.extract_main {
            html_to_markdown(content, base_url.as_ref())
        } else {
            convert_fragment(content, base_url.as_ref())
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The main content container's inner HTML, else `<body>`, else the input.
fn extract_content_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    for sel in CONTENT_SELECTORS.iter().copied().chain(["body"]) {
        if let Ok(selector) = Selector::parse(sel) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }

    html.to_string()
}

/// `htmd` 0.1 has no table support. Swap each `<table>` for a placeholder
/// paragraph and return the Markdown tables to splice back in afterwards.
fn extract_tables(html: &str) -> (String, Vec<String>) {
    let Ok(table_sel) = Selector::parse("table") else {
        return (html.to_string(), Vec::new());
    };
    let doc = Html::parse_fragment(html);
    if doc.select(&table_sel).next().is_none() {
        return (html.to_string(), Vec::new());
    }

    // Work on the re-serialized fragment so table markup matches byte for byte.
    let mut result = doc.root_element().inner_html();
    let mut tables = Vec::new();
    for table in doc.select(&table_sel) {
        let marker = format!("<p>{}</p>", table_placeholder(tables.len()));
        result = result.replacen(&table.html(), &marker, 1);
        tables.push(table_to_markdown(&table));
    }
    (result, tables)
}

fn table_placeholder(index: usize) -> String {
    format!("CTXGENTABLE{index}PLACEHOLDER")
}

fn table_to_markdown(table: &ElementRef) -> String {
    let (Ok(tr_sel), Ok(th_sel), Ok(td_sel)) = (
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) else {
        return String::new();
    };

    let cell_text = |cell: ElementRef| cell.text().collect::<String>().trim().replace('|', "\\|");

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;
    for tr in table.select(&tr_sel) {
        let headers: Vec<String> = tr.select(&th_sel).map(cell_text).collect();
        if !headers.is_empty() {
            has_header = rows.is_empty();
            rows.push(headers);
            continue;
        }
        let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    if columns == 0 {
        return String::new();
    }
    for row in &mut rows {
        row.resize(columns, String::new());
    }

    let line = |cells: &[String]| format!("| {} |\n", cells.join(" | "));

    let mut md = String::new();
    let body = if has_header {
        md.push_str(&line(&rows[0]));
        &rows[1..]
    } else {
        md.push_str(&line(&vec![String::new(); columns]));
        &rows[..]
    };
    md.push_str(&line(&vec!["---".to_string(); columns]));
    for row in body {
        md.push_str(&line(row));
    }
    md.trim_end().to_string()
}

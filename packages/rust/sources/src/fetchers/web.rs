//! `url` sources: fetch pages, optionally narrow by CSS selector, convert to Markdown.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use ctxgen_modifiers::html_to_markdown;
use ctxgen_shared::{CtxgenError, Result, Source, SourceKind, UrlSource};

use crate::http;
use crate::{FetchContext, SourceFetcher, type_mismatch};

pub struct UrlFetcher {
    client: Client,
}

impl UrlFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip_all, fields(%url))]
    async fn fetch_one(&self, url: &Url, spec: &UrlSource) -> Result<String> {
        let mut request = self.client.get(url.as_str());
        for (name, value) in &spec.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let fetched = http::send(request, url.as_str()).await?;

        let is_html = fetched.content_type.contains("html")
            || (fetched.content_type.is_empty() && looks_like_html(&fetched.body));
        if !is_html {
            debug!(content_type = %fetched.content_type, "non-HTML response kept as text");
            return Ok(fetched.body);
        }

        let html = match &spec.selector {
            Some(selector) => select_html(&fetched.body, selector)?,
            None => fetched.body,
        };
        html_to_markdown(&html, Some(url))
    }
}

#[async_trait]
impl SourceFetcher for UrlFetcher {
    fn source_type(&self) -> &'static str {
        "url"
    }

    async fn fetch(&self, source: &Source, _ctx: &FetchContext) -> Result<String> {
        let SourceKind::Url(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        if spec.urls.is_empty() {
            return Err(CtxgenError::Fetch("url source has no urls".into()));
        }

        let mut sections = Vec::with_capacity(spec.urls.len());
        for raw in &spec.urls {
            let url = Url::parse(raw)
                .map_err(|e| CtxgenError::Fetch(format!("invalid url '{raw}': {e}")))?;
            let body = self.fetch_one(&url, spec).await?;
            sections.push(if spec.urls.len() > 1 {
                format!("### {url}\n\n{}", body.trim_end())
            } else {
                body.trim_end().to_string()
            });
        }
        Ok(sections.join("\n\n"))
    }
}

/// Outer HTML of every element matching `selector`, in document order.
fn select_html(html: &str, selector: &str) -> Result<String> {
    let sel = Selector::parse(selector)
        .map_err(|e| CtxgenError::Fetch(format!("invalid selector '{selector}': {e}")))?;
    let doc = Html::parse_document(html);
    let parts: Vec<String> = doc.select(&sel).map(|el| el.html()).collect();
    if parts.is_empty() {
        return Err(CtxgenError::Fetch(format!("selector '{selector}' matched nothing")));
    }
    Ok(format!("<body>{}</body>", parts.join("\n")))
}

fn looks_like_html(body: &str) -> bool {
    let head = body.trim_start().get(..64).unwrap_or(body.trim_start()).to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

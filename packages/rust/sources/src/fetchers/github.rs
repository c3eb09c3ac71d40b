//! `github` sources via the REST API: one tree listing, then raw file contents.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use ctxgen_shared::{CtxgenError, GithubSource, Result, Source, SourceKind};

use crate::filter::PathFilter;
use crate::http;
use crate::render::file_block;
use crate::{FetchContext, SourceFetcher, type_mismatch};

const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GithubFetcher {
    client: Client,
    api_base: String,
}

impl GithubFetcher {
    pub fn new(client: Client) -> Self {
        Self::with_api_base(client, DEFAULT_API_BASE)
    }

    /// Point at another API root (GitHub Enterprise, or a mock server).
    pub fn with_api_base(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, url: &str, accept: &str, token: Option<&str>) -> RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("Accept", accept)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
    }

    #[instrument(skip_all, fields(repository = %spec.repository))]
    async fn fetch_repository(&self, spec: &GithubSource, token: Option<&str>) -> Result<String> {
        let (owner, repo) = spec
            .repository
            .split_once('/')
            .filter(|(o, r)| !o.is_empty() && !r.is_empty() && !r.contains('/'))
            .ok_or_else(|| {
                CtxgenError::Fetch(format!(
                    "github repository must be 'owner/name', got '{}'",
                    spec.repository
                ))
            })?;
        let branch = spec.branch.as_deref().unwrap_or("main");

        let tree_url = format!(
            "{}/repos/{owner}/{repo}/git/trees/{}?recursive=1",
            self.api_base,
            urlencoding::encode(branch)
        );
        let fetched = http::send(
            self.request(&tree_url, "application/vnd.github+json", token),
            &tree_url,
        )
        .await?;
        let tree: TreeResponse = serde_json::from_str(&fetched.body)
            .map_err(|e| CtxgenError::Fetch(format!("unexpected tree response: {e}")))?;
        if tree.truncated {
            warn!(repository = %spec.repository, "tree listing truncated by GitHub");
        }

        let filter = PathFilter::new(&spec.file_pattern, &[], &spec.not_path)?;
        let paths = select_paths(
            tree.tree
                .into_iter()
                .filter(|item| item.kind == "blob")
                .map(|item| item.path),
            &spec.source_paths,
            &filter,
        );
        debug!(files = paths.len(), "github files selected");

        let mut blocks = Vec::with_capacity(paths.len());
        for path in paths {
            let encoded: Vec<String> = path
                .split('/')
                .map(|seg| urlencoding::encode(seg).into_owned())
                .collect();
            let file_url = format!(
                "{}/repos/{owner}/{repo}/contents/{}?ref={}",
                self.api_base,
                encoded.join("/"),
                urlencoding::encode(branch)
            );
            let fetched = http::send(
                self.request(&file_url, "application/vnd.github.raw", token),
                &file_url,
            )
            .await?;
            blocks.push(file_block(&path, &fetched.body));
        }
        Ok(blocks.join("\n"))
    }
}

#[async_trait]
impl SourceFetcher for GithubFetcher {
    fn source_type(&self) -> &'static str {
        "github"
    }

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let SourceKind::Github(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        let token = spec
            .github_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(ctx.github_token.as_deref());
        self.fetch_repository(spec, token).await
    }
}

/// Keep paths under any of `roots` (all when empty) that pass `filter`, sorted.
///
/// Filters see the path relative to the matched root.
pub(crate) fn select_paths(
    paths: impl Iterator<Item = String>,
    roots: &[String],
    filter: &PathFilter,
) -> Vec<String> {
    let roots: Vec<String> = roots
        .iter()
        .map(|r| r.trim().trim_start_matches("./").trim_matches('/').to_string())
        .collect();

    let mut selected: Vec<String> = paths
        .filter(|path| {
            let rel = if roots.is_empty() || roots.iter().any(|r| r.is_empty() || r == ".") {
                Some(path.as_str())
            } else {
                roots.iter().find_map(|root| {
                    if path == root {
                        Some(path.rsplit('/').next().unwrap_or(path))
                    } else {
                        path.strip_prefix(root.as_str())?.strip_prefix('/')
                    }
                })
            };
            rel.is_some_and(|rel| filter.matches(rel))
        })
        .collect();
    selected.sort();
    selected
}

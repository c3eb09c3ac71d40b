//! Source fetchers: turn a document [`Source`] into text.
//!
//! Each source `type` has one [`SourceFetcher`]; [`SourceFetcherRegistry`]
//! dispatches on [`Source::type_name`]. Network-backed fetchers share one
//! `reqwest` client built with the run's fetch timeout.

mod fetchers;
mod filter;
mod http;
mod render;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use ctxgen_shared::{CtxgenError, Result, Source};

pub use fetchers::{
    FileFetcher, GitDiffFetcher, GithubFetcher, GitlabFetcher, TextFetcher, TreeFetcher,
    UrlFetcher,
};
pub use render::render_tree;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Per-document inputs a fetcher may need.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    /// Directory of the config that declared the document.
    pub base_dir: PathBuf,
    /// Fallback when a github source sets no `githubToken`.
    pub github_token: Option<String>,
    /// Fallback when a gitlab source sets no `token`.
    pub gitlab_token: Option<String>,
    /// Fallback when a gitlab source sets no `server`.
    pub gitlab_server: Option<String>,
}

impl FetchContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Fetches the raw content of one source type.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// The `type` value this fetcher handles.
    fn source_type(&self) -> &'static str;

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds one fetcher per source type.
pub struct SourceFetcherRegistry {
    fetchers: Vec<Box<dyn SourceFetcher>>,
}

impl SourceFetcherRegistry {
    /// A registry with every built-in fetcher; HTTP requests use `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = http::build_client(timeout)?;
        Ok(Self {
            fetchers: vec![
                Box::new(TextFetcher),
                Box::new(FileFetcher),
                Box::new(TreeFetcher),
                Box::new(UrlFetcher::new(client.clone())),
                Box::new(GithubFetcher::new(client.clone())),
                Box::new(GitlabFetcher::new(client)),
                Box::new(GitDiffFetcher),
            ],
        })
    }

    /// An empty registry, for callers that register their own fetchers.
    pub fn empty() -> Self {
        Self {
            fetchers: Vec::new(),
        }
    }

    /// Add a fetcher, replacing any existing one for the same type.
    pub fn register(&mut self, fetcher: Box<dyn SourceFetcher>) {
        self.fetchers
            .retain(|f| f.source_type() != fetcher.source_type());
        self.fetchers.push(fetcher);
    }

    pub fn source_types(&self) -> Vec<&'static str> {
        self.fetchers.iter().map(|f| f.source_type()).collect()
    }

    /// Fetch `source` with the fetcher registered for its type.
    pub async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let source_type = source.type_name();
        let fetcher = self
            .fetchers
            .iter()
            .find(|f| f.source_type() == source_type)
            .ok_or_else(|| {
                CtxgenError::Fetch(format!("no fetcher registered for source type '{source_type}'"))
            })?;

        let content = fetcher.fetch(source, ctx).await?;
        debug!(source_type, len = content.len(), "source fetched");
        Ok(content)
    }
}

/// Error for a fetcher handed a source of another type.
pub(crate) fn type_mismatch(expected: &str, source: &Source) -> CtxgenError {
    CtxgenError::Fetch(format!(
        "{expected} fetcher cannot handle '{}' sources",
        source.type_name()
    ))
}

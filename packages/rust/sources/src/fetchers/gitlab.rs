//! `gitlab` sources via API v4: paginated tree listing, then raw file contents.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, instrument};

use ctxgen_shared::{CtxgenError, GitlabSource, Result, Source, SourceKind};

use super::github::select_paths;
use crate::filter::PathFilter;
use crate::http;
use crate::render::file_block;
use crate::{FetchContext, SourceFetcher, type_mismatch};

const DEFAULT_SERVER: &str = "https://gitlab.com";

/// Upper bound on tree pages followed for one source.
const MAX_TREE_PAGES: usize = 50;

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

pub struct GitlabFetcher {
    client: Client,
}

impl GitlabFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn request(&self, url: &str, token: Option<&str>) -> RequestBuilder {
        let request = self.client.get(url);
        match token {
            Some(token) => request.header("PRIVATE-TOKEN", token),
            None => request,
        }
    }

    #[instrument(skip_all, fields(repository = %spec.repository, %server))]
    async fn fetch_project(
        &self,
        spec: &GitlabSource,
        server: &str,
        token: Option<&str>,
    ) -> Result<String> {
        if spec.repository.trim().is_empty() {
            return Err(CtxgenError::Fetch("gitlab source has no repository".into()));
        }
        let api = format!("{}/api/v4/projects/{}", server.trim_end_matches('/'), urlencoding::encode(&spec.repository));
        let branch = spec.branch.as_deref().unwrap_or("main");
        let encoded_branch = urlencoding::encode(branch);

        let mut blobs = Vec::new();
        let mut page = Some("1".to_string());
        let mut pages = 0;
        while let Some(current) = page.take() {
            pages += 1;
            if pages > MAX_TREE_PAGES {
                return Err(CtxgenError::Fetch(format!(
                    "gitlab tree for {} exceeds {MAX_TREE_PAGES} pages",
                    spec.repository
                )));
            }
            let url = format!(
                "{api}/repository/tree?ref={encoded_branch}&recursive=true&per_page=100&page={current}"
            );
            let fetched = http::send(self.request(&url, token), &url).await?;
            let items: Vec<TreeItem> = serde_json::from_str(&fetched.body)
                .map_err(|e| CtxgenError::Fetch(format!("unexpected tree response: {e}")))?;
            blobs.extend(items.into_iter().filter(|i| i.kind == "blob").map(|i| i.path));
            page = fetched.next_page;
        }

        let filter = PathFilter::new(&spec.file_pattern, &[], &spec.not_path)?;
        let paths = select_paths(blobs.into_iter(), &spec.source_paths, &filter);
        debug!(files = paths.len(), pages, "gitlab files selected");

        let mut blocks = Vec::with_capacity(paths.len());
        for path in paths {
            let url = format!(
                "{api}/repository/files/{}/raw?ref={encoded_branch}",
                urlencoding::encode(&path)
            );
            let fetched = http::send(self.request(&url, token), &url).await?;
            blocks.push(file_block(&path, &fetched.body));
        }
        Ok(blocks.join("\n"))
    }
}

#[async_trait]
impl SourceFetcher for GitlabFetcher {
    fn source_type(&self) -> &'static str {
        "gitlab"
    }

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let SourceKind::Gitlab(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        let server = spec
            .server
            .as_deref()
            .or(ctx.gitlab_server.as_deref())
            .unwrap_or(DEFAULT_SERVER);
        let token = spec
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .or(ctx.gitlab_token.as_deref());
        self.fetch_project(spec, server, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn follows_pagination_and_fetches_raw_files() {
        let server = MockServer::start().await;
        let tree = "/api/v4/projects/group%2Fproject/repository/tree";

        Mock::given(method("GET"))
            .and(path(tree))
            .and(query_param("page", "1"))
            .and(header("PRIVATE-TOKEN", "glpat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-next-page", "2")
                    .set_body_json(serde_json::json!([
                        {"path": "lib", "type": "tree"},
                        {"path": "lib/a.py", "type": "blob"}
                    ])),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(tree))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-next-page", "")
                    .set_body_json(serde_json::json!([
                        {"path": "lib/b.txt", "type": "blob"}
                    ])),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v4/projects/group%2Fproject/repository/files/lib%2Fa.py/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_string("print('a')\n"))
            .mount(&server)
            .await;

        let fetcher = GitlabFetcher::new(http::build_client(Duration::from_secs(5)).unwrap());
        let source: Source = serde_json::from_str(&format!(
            r#"{{"type": "gitlab", "server": "{}", "repository": "group/project", "filePattern": "*.py", "token": "glpat"}}"#,
            server.uri()
        ))
        .unwrap();

        let out = fetcher.fetch(&source, &FetchContext::default()).await.unwrap();
        assert_eq!(out, "### lib/a.py\n\n```python\nprint('a')\n```\n");
    }
}

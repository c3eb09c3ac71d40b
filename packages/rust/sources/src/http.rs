//! Shared HTTP plumbing for network-backed fetchers.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};

use ctxgen_shared::{CtxgenError, Result};

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("ctxgen/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| CtxgenError::Network(format!("failed to build HTTP client: {e}")))
}

/// A fetched body plus the response's content type.
pub(crate) struct Fetched {
    pub body: String,
    pub content_type: String,
    pub next_page: Option<String>,
}

/// Send `request`; non-2xx statuses and transport failures become network errors.
pub(crate) async fn send(request: RequestBuilder, what: &str) -> Result<Fetched> {
    let response = request
        .send()
        .await
        .map_err(|e| CtxgenError::Network(format!("{what}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CtxgenError::Network(format!("{what}: HTTP {status}")));
    }

    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let content_type = header("content-type").unwrap_or_default();
    let next_page = header("x-next-page").filter(|p| !p.trim().is_empty());

    let body = response
        .text()
        .await
        .map_err(|e| CtxgenError::Network(format!("{what}: failed to read body: {e}")))?;

    Ok(Fetched {
        body,
        content_type,
        next_page,
    })
}

//! Built-in fetchers, one per source type.

mod git_diff;
mod github;
mod gitlab;
mod local;
mod text;
mod web;

pub use git_diff::GitDiffFetcher;
pub use github::GithubFetcher;
pub use gitlab::GitlabFetcher;
pub use local::{FileFetcher, TreeFetcher};
pub use text::TextFetcher;
pub use web::UrlFetcher;

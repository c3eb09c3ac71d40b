//! `git_diff` sources: shell out to `git` and keep the selected file sections.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use ctxgen_shared::{CtxgenError, GitDiffSource, Result, Source, SourceKind};

use crate::filter::PathFilter;
use crate::render::fence_for;
use crate::{FetchContext, SourceFetcher, type_mismatch};

pub struct GitDiffFetcher;

#[async_trait]
impl SourceFetcher for GitDiffFetcher {
    fn source_type(&self) -> &'static str {
        "git_diff"
    }

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let SourceKind::GitDiff(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        run_diff(spec, ctx).await
    }
}

#[instrument(skip_all, fields(commit = %spec.commit))]
async fn run_diff(spec: &GitDiffSource, ctx: &FetchContext) -> Result<String> {
    let repo = ctx.base_dir.join(&spec.repository);
    let args = git_args(&spec.commit);
    debug!(repo = %repo.display(), ?args, "running git");

    let output = Command::new("git")
        .arg("-C")
        .arg(&repo)
        .args(&args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| CtxgenError::Fetch(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CtxgenError::Fetch(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    let diff = String::from_utf8_lossy(&output.stdout);
    let filter = PathFilter::new(&spec.file_pattern, &[], &[])?;
    let diff = filter_sections(&diff, &filter);
    if diff.trim().is_empty() {
        return Ok(String::new());
    }

    let fence = fence_for(&diff);
    Ok(format!("{fence}diff\n{}\n{fence}\n", diff.trim_end()))
}

/// Map the `commit` setting to `git` arguments.
fn git_args(commit: &str) -> Vec<String> {
    let commit = commit.trim();
    let args: Vec<&str> = match commit {
        "" | "unstaged" => vec!["diff"],
        "staged" => vec!["diff", "--cached"],
        "last" => vec!["diff", "HEAD~1", "HEAD"],
        c if c.contains("..") => vec!["diff", c],
        c if c.starts_with("HEAD~") => vec!["diff", c, "HEAD"],
        c => vec!["show", "--format=", c],
    };
    let mut args: Vec<String> = args.into_iter().map(str::to_string).collect();
    args.insert(0, "--no-pager".into());
    args.push("--no-color".into());
    args
}

/// Keep only `diff --git` sections whose file passes `filter`.
fn filter_sections(diff: &str, filter: &PathFilter) -> String {
    let mut out = String::new();
    let mut keep = true;
    for line in diff.split_inclusive('\n') {
        if let Some(header) = line.strip_prefix("diff --git ") {
            let path = header
                .trim_end()
                .rsplit_once(" b/")
                .map(|(_, b)| b)
                .unwrap_or(header.trim_end());
            keep = filter.matches(path);
        }
        if keep {
            out.push_str(line);
        }
    }
    out
}

//! `file` and `tree` sources over the local filesystem.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use walkdir::WalkDir;

use ctxgen_shared::{CtxgenError, FileSource, Result, Source, SourceKind, TreeSource};

use crate::filter::PathFilter;
use crate::render::{file_block, render_tree};
use crate::{FetchContext, SourceFetcher, type_mismatch};

/// A selected file. `display` is relative to the declaring config's directory.
struct LocalEntry {
    display: String,
    abs: PathBuf,
    size: u64,
}

// ---------------------------------------------------------------------------
// file
// ---------------------------------------------------------------------------

/// `file`: concatenated contents of every selected file.
pub struct FileFetcher;

#[async_trait]
impl SourceFetcher for FileFetcher {
    fn source_type(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let SourceKind::File(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        let spec = spec.clone();
        let base_dir = ctx.base_dir.clone();
        tokio::task::spawn_blocking(move || render_files(&spec, &base_dir))
            .await
            .map_err(|e| CtxgenError::Fetch(format!("file source task failed: {e}")))?
    }
}

fn render_files(spec: &FileSource, base_dir: &Path) -> Result<String> {
    let filter = PathFilter::new(&spec.file_pattern, &spec.path, &spec.not_path)?;
    let entries = collect_entries(base_dir, &spec.source_paths, &filter, None)?;
    let limit = spec.max_files.filter(|m| *m > 0);

    let mut listed = Vec::new();
    let mut blocks = Vec::new();
    for entry in entries {
        if limit.is_some_and(|m| blocks.len() >= m) {
            debug!(limit = ?limit, "maxFiles reached");
            break;
        }
        let content = match std::fs::read_to_string(&entry.abs) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %entry.abs.display(), error = %e, "skipping unreadable or binary file");
                continue;
            }
        };
        if !spec.contains.is_empty() && !spec.contains.iter().any(|c| content.contains(c.as_str())) {
            continue;
        }
        if spec.not_contains.iter().any(|c| content.contains(c.as_str())) {
            continue;
        }
        blocks.push(file_block(&entry.display, &content));
        listed.push((entry.display, None));
    }

    let mut out = String::new();
    if spec.show_tree_view && !listed.is_empty() {
        out.push_str(&format!("```\n{}```\n\n", render_tree(&listed)));
    }
    out.push_str(&blocks.join("\n"));

    debug!(files = blocks.len(), "file source rendered");
    Ok(out)
}

// ---------------------------------------------------------------------------
// tree
// ---------------------------------------------------------------------------

/// `tree`: a directory listing of the selected files.
pub struct TreeFetcher;

#[async_trait]
impl SourceFetcher for TreeFetcher {
    fn source_type(&self) -> &'static str {
        "tree"
    }

    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<String> {
        let SourceKind::Tree(spec) = &source.kind else {
            return Err(type_mismatch(self.source_type(), source));
        };
        let spec = spec.clone();
        let base_dir = ctx.base_dir.clone();
        tokio::task::spawn_blocking(move || render_listing(&spec, &base_dir))
            .await
            .map_err(|e| CtxgenError::Fetch(format!("tree source task failed: {e}")))?
    }
}

fn render_listing(spec: &TreeSource, base_dir: &Path) -> Result<String> {
    let filter = PathFilter::new(&spec.file_pattern, &spec.path, &spec.not_path)?;
    let entries = collect_entries(base_dir, &spec.source_paths, &filter, spec.max_depth)?;
    if entries.is_empty() {
        return Ok(String::new());
    }

    let listed: Vec<(String, Option<u64>)> = entries
        .into_iter()
        .map(|e| (e.display, spec.show_size.then_some(e.size)))
        .collect();
    Ok(format!("```\n{}```\n", render_tree(&listed)))
}

// ---------------------------------------------------------------------------
// Walking
// ---------------------------------------------------------------------------

/// Selected files under every source path (default `.`), sorted per root, deduplicated.
fn collect_entries(
    base_dir: &Path,
    source_paths: &[String],
    filter: &PathFilter,
    max_depth: Option<usize>,
) -> Result<Vec<LocalEntry>> {
    let default_roots = [".".to_string()];
    let roots = if source_paths.is_empty() {
        &default_roots[..]
    } else {
        source_paths
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for source_path in roots {
        let root = base_dir.join(source_path);
        let meta = std::fs::metadata(&root).map_err(|e| {
            CtxgenError::Fetch(format!("source path {}: {e}", root.display()))
        })?;

        if meta.is_file() {
            let display = clean_display(source_path);
            if !filter.is_excluded(&display) && seen.insert(root.clone()) {
                entries.push(LocalEntry {
                    display,
                    abs: root,
                    size: meta.len(),
                });
            }
            continue;
        }

        let mut walker = WalkDir::new(&root).follow_links(true).sort_by_file_name();
        if let Some(depth) = max_depth {
            walker = walker.max_depth(depth);
        }
        let walk = walker.into_iter().filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            e.file_name() != ".git" && !filter.is_excluded(&relative(&root, e.path()))
        });

        for entry in walk {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative(&root, entry.path());
            if !filter.matches(&rel) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let abs = entry.into_path();
            if seen.insert(abs.clone()) {
                entries.push(LocalEntry {
                    display: join_display(source_path, &rel),
                    abs,
                    size,
                });
            }
        }
    }

    Ok(entries)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn clean_display(path: &str) -> String {
    let mut p = path.trim().replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    p.trim_end_matches('/').to_string()
}

fn join_display(source_path: &str, rel: &str) -> String {
    let prefix = clean_display(source_path);
    if prefix.is_empty() || prefix == "." {
        rel.to_string()
    } else {
        format!("{prefix}/{rel}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_project() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ctxgen-local-test-{}", uuid::Uuid::now_v7()));
        for (path, content) in [
            ("src/lib.rs", "pub mod api;\n"),
            ("src/api/routes.rs", "// routes\nfn handler() {}\n"),
            ("src/api/generated.rs", "// @generated\n"),
            ("tests/it.rs", "#[test] fn t() {}\n"),
            ("README.md", "# Demo\n"),
            (".git/HEAD", "ref: refs/heads/main\n"),
        ] {
            let full = dir.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        dir
    }

    fn file_source(json: &str) -> FileSource {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn file_source_filters_by_pattern_and_not_path() {
        let dir = temp_project();
        let spec = file_source(r#"{"sourcePaths": ".", "filePattern": "*.rs", "notPath": ["tests"]}"#);
        let out = render_files(&spec, &dir).unwrap();

        assert!(out.contains("### src/api/routes.rs"));
        assert!(out.contains("### src/lib.rs"));
        assert!(!out.contains("tests/it.rs"));
        assert!(!out.contains("README.md"));
        assert!(!out.contains("refs/heads"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_source_content_filters_and_limit() {
        let dir = temp_project();
        let spec = file_source(
            r#"{"sourcePaths": ["src"], "filePattern": "*.rs", "notContains": "@generated", "maxFiles": 1}"#,
        );
        let out = render_files(&spec, &dir).unwrap();
        assert!(out.contains("### src/api/routes.rs"));
        assert!(!out.contains("generated.rs"));
        assert!(!out.contains("src/lib.rs"));

        let spec = file_source(r#"{"sourcePaths": ["src"], "contains": "handler"}"#);
        let out = render_files(&spec, &dir).unwrap();
        assert_eq!(out.matches("### ").count(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_source_explicit_file_and_tree_view() {
        let dir = temp_project();
        let spec = file_source(r#"{"sourcePaths": ["./README.md", "src/api"], "showTreeView": true}"#);
        let out = render_files(&spec, &dir).unwrap();
        assert!(out.starts_with("```\n"));
        assert!(out.contains("├── README.md"));
        assert!(out.contains("### README.md"));
        assert!(out.contains("### src/api/routes.rs"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_source_path_is_error() {
        let dir = temp_project();
        let spec = file_source(r#"{"sourcePaths": ["nope"]}"#);
        let err = render_files(&spec, &dir).unwrap_err();
        assert!(err.to_string().contains("nope"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tree_respects_depth_and_sizes() {
        let dir = temp_project();
        let spec: TreeSource =
            serde_json::from_str(r#"{"sourcePaths": ".", "maxDepth": 2, "showSize": true}"#).unwrap();
        let out = render_listing(&spec, &dir).unwrap();
        assert!(out.contains("lib.rs ("));
        assert!(out.contains("README.md (7 B)"));
        assert!(!out.contains("routes.rs"));
        assert!(!out.contains("HEAD"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn fetcher_resolves_against_base_dir() {
        let dir = temp_project();
        let source: Source =
            serde_json::from_str(r#"{"type": "file", "sourcePaths": "README.md"}"#).unwrap();
        let out = FileFetcher
            .fetch(&source, &FetchContext::new(&dir))
            .await
            .unwrap();
        assert_eq!(out, "### README.md\n\n```markdown\n# Demo\n```\n");

        let _ = std::fs::remove_dir_all(&dir);
    }
}

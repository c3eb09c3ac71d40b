//! Text rendering for file listings and file contents.

use std::collections::BTreeMap;

/// One fenced block per file, headed by its path.
pub(crate) fn file_block(path: &str, content: &str) -> String {
    let fence = fence_for(content);
    let lang = language_for(path);
    let body = content.trim_end_matches('\n');
    format!("### {path}\n\n{fence}{lang}\n{body}\n{fence}\n")
}

/// A fence longer than any backtick run inside `content`.
pub(crate) fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat(longest.max(2) + 1)
}

fn language_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "php" => "php",
        "rb" => "ruby",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "cs" => "csharp",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "xml" => "xml",
        _ => "",
    }
}

#[derive(Default)]
struct Node {
    size: Option<u64>,
    children: BTreeMap<String, Node>,
}

/// Render `/`-separated paths as an indented tree. Sizes are shown when given.
pub fn render_tree(entries: &[(String, Option<u64>)]) -> String {
    let mut root = Node::default();
    for (path, size) in entries {
        let mut node = &mut root;
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.size = *size;
    }

    let mut out = String::new();
    write_children(&root, "", &mut out);
    out
}

fn write_children(node: &Node, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, (name, child)) in node.children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        let suffix = if child.children.is_empty() {
            child.size.map(|s| format!(" ({})", human_size(s))).unwrap_or_default()
        } else {
            "/".to_string()
        };
        out.push_str(&format!("{prefix}{branch}{name}{suffix}\n"));

        let next = format!("{prefix}{}", if last { "    " } else { "│   " });
        write_children(child, &next, out);
    }
}

fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_renders_nested_paths() {
        let entries = vec![
            ("src/main.rs".to_string(), None),
            ("src/lib.rs".to_string(), None),
            ("Cargo.toml".to_string(), None),
        ];
        let tree = render_tree(&entries);
        assert_eq!(
            tree,
            "├── Cargo.toml\n└── src/\n    ├── lib.rs\n    └── main.rs\n"
        );
    }

    #[test]
    fn tree_shows_sizes() {
        let tree = render_tree(&[("a.bin".to_string(), Some(2048)), ("b.txt".to_string(), Some(12))]);
        assert!(tree.contains("a.bin (2.0 KB)"));
        assert!(tree.contains("b.txt (12 B)"));
    }

    #[test]
    fn file_block_picks_language_and_fence() {
        let block = file_block("src/lib.rs", "pub fn x() {}\n");
        assert_eq!(block, "### src/lib.rs\n\n```rust\npub fn x() {}\n```\n");

        let nested = file_block("README.md", "```sh\nls\n```");
        assert!(nested.contains("````markdown\n"));
    }
}

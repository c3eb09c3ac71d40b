//! Config data model: what one context config file declares.
//!
//! These types are deserialized straight from JSON, YAML or TOML and are
//! immutable afterwards. Keys use the camelCase spelling of the config format.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// RawConfig
// ---------------------------------------------------------------------------

/// Everything a single config file declares, before import resolution.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Import directives, folded in array order.
    #[serde(rename = "import", alias = "imports")]
    pub imports: Vec<ImportDirective>,
    /// Variables for `{{KEY}}` substitution.
    #[serde(deserialize_with = "scalar_map")]
    pub variables: BTreeMap<String, String>,
    /// Documents to compile.
    pub documents: Vec<Document>,
    /// Prompts and prompt templates.
    pub prompts: Vec<Prompt>,
    /// Tool declarations (carried through, not executed).
    pub tools: Vec<Tool>,
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// Where an import directive points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A local file path or glob, relative to the importing config.
    Local { path: String },
    /// A remote config fetched over HTTP(S).
    Url { url: String },
}

/// A config-level instruction to merge another config into this one.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "ImportRepr")]
pub struct ImportDirective {
    pub target: ImportTarget,
    /// Prepended to every imported document's output path.
    pub path_prefix: Option<String>,
    /// Allow-list of (post-prefix) output paths; `None` keeps all documents.
    pub docs: Option<Vec<String>>,
    /// Prompt/tool selection.
    pub filter: ImportFilter,
    /// Extra HTTP headers for URL imports.
    pub headers: BTreeMap<String, String>,
}

impl ImportDirective {
    /// A plain local import with no selection applied.
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            target: ImportTarget::Local { path: path.into() },
            path_prefix: None,
            docs: None,
            filter: ImportFilter::default(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ImportRepr {
    Short(String),
    Full(ImportEntry),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportEntry {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    path_prefix: Option<String>,
    #[serde(default)]
    docs: Option<Vec<String>>,
    #[serde(default)]
    filter: ImportFilter,
    #[serde(default, deserialize_with = "scalar_map")]
    headers: BTreeMap<String, String>,
}

impl TryFrom<ImportRepr> for ImportDirective {
    type Error = String;

    fn try_from(repr: ImportRepr) -> Result<Self, Self::Error> {
        let entry = match repr {
            ImportRepr::Short(path) => return Ok(Self::local(path)),
            ImportRepr::Full(entry) => entry,
        };

        let target = match (entry.kind.as_deref(), entry.path, entry.url) {
            (Some("url"), _, Some(url)) | (None, None, Some(url)) => ImportTarget::Url { url },
            (Some("url"), Some(path), None) => ImportTarget::Url { url: path },
            (Some("local") | None, Some(path), _) => ImportTarget::Local { path },
            (Some("local"), None, Some(_)) => {
                return Err("local import requires 'path', found only 'url'".into());
            }
            (Some(other), _, _) if other != "url" && other != "local" => {
                return Err(format!("unknown import type '{other}'"));
            }
            _ => return Err("import requires either 'path' or 'url'".into()),
        };

        Ok(Self {
            target,
            path_prefix: entry.path_prefix.filter(|p| !p.is_empty()),
            docs: entry.docs,
            filter: entry.filter,
            headers: entry.headers,
        })
    }
}

/// Selection applied to an imported config's prompts and tools.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImportFilter {
    pub tags: TagFilter,
    pub ids: Option<Vec<String>>,
}

/// Tag-based include/exclude lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TagFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ImportFilter {
    /// Whether an item with this id and tag set survives the filter.
    pub fn allows(&self, id: &str, tags: &[String]) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|allowed| allowed == id) {
                return false;
            }
        }
        let intersects = |list: &[String]| tags.iter().any(|t| list.contains(t));
        (self.tags.include.is_empty() || intersects(&self.tags.include))
            && !intersects(&self.tags.exclude)
    }
}

// ---------------------------------------------------------------------------
// Documents and sources
// ---------------------------------------------------------------------------

/// A compilation unit producing one output file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub description: String,
    pub output_path: String,
    #[serde(default = "default_true")]
    pub overwrite: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub modifiers: Vec<ModifierRef>,
}

fn default_true() -> bool {
    true
}

/// A typed content provider attached to a document.
#[derive(Debug, Clone, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub description: String,
    /// Wraps rendered content as `<tag>...</tag>`.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub modifiers: Vec<ModifierRef>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

impl Source {
    /// The `type` string used to pick a fetcher.
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// The wrapping tag: the configured one, or `INSTRUCTION` for text sources.
    pub fn effective_tag(&self) -> Option<&str> {
        match (&self.tag, &self.kind) {
            (Some(tag), _) if tag.is_empty() => None,
            (Some(tag), _) => Some(tag.as_str()),
            (None, SourceKind::Text(_)) => Some("INSTRUCTION"),
            (None, _) => None,
        }
    }
}

/// Variant-specific source settings, keyed by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    Text(TextSource),
    File(FileSource),
    Url(UrlSource),
    Github(GithubSource),
    Gitlab(GitlabSource),
    #[serde(alias = "git-diff")]
    GitDiff(GitDiffSource),
    Tree(TreeSource),
}

impl SourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::File(_) => "file",
            Self::Url(_) => "url",
            Self::Github(_) => "github",
            Self::Gitlab(_) => "gitlab",
            Self::GitDiff(_) => "git_diff",
            Self::Tree(_) => "tree",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextSource {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    #[serde(default, deserialize_with = "one_or_many")]
    pub source_paths: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub file_pattern: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_path: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub path: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub contains: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_contains: Vec<String>,
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub show_tree_view: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeSource {
    #[serde(default, deserialize_with = "one_or_many")]
    pub source_paths: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub file_pattern: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_path: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub path: Vec<String>,
    #[serde(default)]
    pub max_depth: Option<usize>,
    #[serde(default)]
    pub show_size: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSource {
    #[serde(default, deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    /// CSS selector limiting which part of each page is kept.
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default, deserialize_with = "scalar_map")]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubSource {
    /// `owner/name`.
    pub repository: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub source_paths: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub file_pattern: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_path: Vec<String>,
    #[serde(default)]
    pub github_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitlabSource {
    #[serde(default)]
    pub server: Option<String>,
    /// `group/project` path.
    pub repository: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub source_paths: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub file_pattern: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub not_path: Vec<String>,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitDiffSource {
    /// `unstaged`, `staged`, `last`, a `a..b` range, or a single commit.
    #[serde(default = "default_commit")]
    pub commit: String,
    /// Path to the repository, relative to the declaring config.
    #[serde(default = "default_repository")]
    pub repository: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub file_pattern: Vec<String>,
}

fn default_commit() -> String {
    "unstaged".into()
}
fn default_repository() -> String {
    ".".into()
}

/// Reference to a content modifier: a bare name or `{name, options}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "ModifierRepr")]
pub struct ModifierRef {
    pub name: String,
    pub options: serde_json::Value,
}

impl ModifierRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: serde_json::Value::Null,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModifierRepr {
    Name(String),
    Configured {
        name: String,
        #[serde(default)]
        options: serde_json::Value,
    },
}

impl From<ModifierRepr> for ModifierRef {
    fn from(repr: ModifierRepr) -> Self {
        match repr {
            ModifierRepr::Name(name) => Self::named(name),
            ModifierRepr::Configured { name, options } => Self { name, options },
        }
    }
}

// ---------------------------------------------------------------------------
// Prompts and tools
// ---------------------------------------------------------------------------

/// Whether a prompt is emitted (`prompt`) or only inherited from (`template`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    #[default]
    Prompt,
    Template,
}

/// A reusable or emitted LLM instruction unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    #[serde(default)]
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: PromptKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extend: Vec<PromptExtension>,
}

/// One chat message. Role validity is checked by the prompt resolver, not at parse time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Inheritance from a template, with `{{arg}}` values for its messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExtension {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "scalar_map")]
    pub arguments: BTreeMap<String, String>,
}

/// A tool declaration. Type-specific keys are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_tool_type", rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_tool_type() -> String {
    "run".into()
}

// ---------------------------------------------------------------------------
// Warning
// ---------------------------------------------------------------------------

/// A recovered, non-fatal problem (skipped import, dropped prompt, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub scope: String,
    pub message: String,
}

impl Warning {
    pub fn new(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.scope, self.message)
    }
}

// ---------------------------------------------------------------------------
// Lenient field helpers
// ---------------------------------------------------------------------------

/// Scalars YAML/TOML users write as variable or argument values.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
        }
    }
}

/// Deserialize a `{key: scalar}` map into strings; `null` values become empty.
fn scalar_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Option<Scalar>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.map(Scalar::into_string).unwrap_or_default()))
        .collect())
}

/// Accept either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_short_form_is_local() {
        let config: RawConfig = serde_yaml::from_str("import:\n  - ./base.yaml\n").unwrap();
        assert_eq!(
            config.imports[0].target,
            ImportTarget::Local {
                path: "./base.yaml".into()
            }
        );
    }

    #[test]
    fn import_type_inferred_from_url() {
        let yaml = r#"
import:
  - url: https://example.com/shared.yaml
    headers:
      Authorization: "Bearer ${TOKEN}"
  - path: services/*.yaml
    pathPrefix: services
    docs: [services/api.md]
    filter:
      tags:
        include: [backend]
      ids: [deploy]
"#;
        let config: RawConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(config.imports[0].target, ImportTarget::Url { .. }));
        assert_eq!(
            config.imports[0].headers["Authorization"],
            "Bearer ${TOKEN}"
        );
        let second = &config.imports[1];
        assert_eq!(second.path_prefix.as_deref(), Some("services"));
        assert_eq!(second.docs.as_ref().unwrap(), &vec!["services/api.md".to_string()]);
        assert_eq!(second.filter.tags.include, vec!["backend".to_string()]);
    }

    #[test]
    fn import_without_target_is_rejected() {
        let result: Result<RawConfig, _> = serde_yaml::from_str("import:\n  - pathPrefix: x\n");
        assert!(result.is_err());
    }

    #[test]
    fn variables_accept_scalars() {
        let yaml = "variables:\n  NAME: demo\n  PORT: 8080\n  DEBUG: true\n  EMPTY: ~\n";
        let config: RawConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.variables["PORT"], "8080");
        assert_eq!(config.variables["DEBUG"], "true");
        assert_eq!(config.variables["EMPTY"], "");
    }

    #[test]
    fn sources_dispatch_on_type() {
        let yaml = r#"
documents:
  - description: Overview
    outputPath: overview.md
    sources:
      - type: text
        content: hello
      - type: file
        sourcePaths: src
        filePattern: ["*.rs", "*.toml"]
        maxFiles: 10
        modifiers:
          - markdown-cleanup
          - name: sanitizer
            options: { rules: [] }
      - type: git_diff
        commit: staged
"#;
        let config: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let doc = &config.documents[0];
        assert!(doc.overwrite);
        assert_eq!(doc.sources.len(), 3);
        assert_eq!(doc.sources[0].type_name(), "text");
        assert_eq!(doc.sources[0].effective_tag(), Some("INSTRUCTION"));

        let SourceKind::File(file) = &doc.sources[1].kind else {
            panic!("expected file source");
        };
        assert_eq!(file.source_paths, vec!["src".to_string()]);
        assert_eq!(file.file_pattern.len(), 2);
        assert_eq!(file.max_files, Some(10));
        assert_eq!(doc.sources[1].modifiers[0], ModifierRef::named("markdown-cleanup"));
        assert_eq!(doc.sources[1].modifiers[1].name, "sanitizer");
        assert_eq!(doc.sources[1].effective_tag(), None);

        let SourceKind::GitDiff(diff) = &doc.sources[2].kind else {
            panic!("expected git_diff source");
        };
        assert_eq!(diff.commit, "staged");
        assert_eq!(diff.repository, ".");
    }

    #[test]
    fn unknown_source_type_fails_parse() {
        let yaml = "documents:\n  - outputPath: a.md\n    sources:\n      - type: carrier-pigeon\n";
        assert!(serde_yaml::from_str::<RawConfig>(yaml).is_err());
    }

    #[test]
    fn prompt_defaults_to_prompt_kind() {
        let json = r#"{"prompts": [
            {"id": "base", "type": "template", "messages": [{"role": "user", "content": "x"}]},
            {"id": "child", "extend": [{"id": "base", "arguments": {"n": 3}}]}
        ]}"#;
        let config: RawConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.prompts[0].kind, PromptKind::Template);
        assert_eq!(config.prompts[1].kind, PromptKind::Prompt);
        assert_eq!(config.prompts[1].extend[0].arguments["n"], "3");
    }

    #[test]
    fn tool_keeps_extra_keys() {
        let yaml = "tools:\n  - id: test\n    description: Run tests\n    commands:\n      - cmd: cargo\n";
        let config: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let tool = &config.tools[0];
        assert_eq!(tool.kind, "run");
        assert!(tool.extra.contains_key("commands"));
    }

    #[test]
    fn filter_include_and_exclude() {
        let filter = ImportFilter {
            tags: TagFilter {
                include: vec!["backend".into()],
                exclude: vec!["deprecated".into()],
            },
            ids: None,
        };
        assert!(filter.allows("a", &["backend".into()]));
        assert!(!filter.allows("b", &["frontend".into()]));
        assert!(!filter.allows("c", &["backend".into(), "deprecated".into()]));
    }

    #[test]
    fn filter_ids_restrict() {
        let filter = ImportFilter {
            tags: TagFilter::default(),
            ids: Some(vec!["keep".into()]),
        };
        assert!(filter.allows("keep", &[]));
        assert!(!filter.allows("drop", &[]));
    }
}

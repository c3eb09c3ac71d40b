//! Import graph resolution.
//!
//! Walks the imports declared by a root config depth-first and folds every
//! imported config into one [`ResolvedRegistry`]:
//!
//! 1. Expand the directive (`${KEY}` substitution, glob expansion)
//! 2. Skip targets already on the current branch (cycle → warning)
//! 3. Reuse fully resolved targets from the cross-branch cache (diamonds)
//! 4. Otherwise parse, recurse, and cache the target
//! 5. Apply the directive's prefix / `docs` / filter selection and fold it in
//!
//! Imported sub-registries fold in array order, then the importer's own
//! declarations go on top. Only a root config failure is fatal; every other
//! problem becomes a [`Warning`] and the directive is skipped.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;
use walkdir::WalkDir;

use ctxgen_shared::{
    CtxgenError, GlobPattern, ImportDirective, ImportTarget, RawConfig, Result, Warning,
    has_glob_chars,
};

use crate::parser::{self, ConfigFormat};
use crate::registry::ResolvedRegistry;
use crate::variables::VariableScope;

/// User-Agent string for URL imports.
const USER_AGENT: &str = concat!("ctxgen/", env!("CARGO_PKG_VERSION"));

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Settings for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Base directory for documents declared by URL-imported configs.
    pub work_dir: PathBuf,
    /// Timeout for each URL import.
    pub fetch_timeout: Duration,
}

/// A config file's location, which is also its identity in the import graph.
#[derive(Debug, Clone)]
enum ConfigLocation {
    /// A local file, canonicalized.
    File(PathBuf),
    /// A config fetched over HTTP(S).
    Remote(Url),
    /// A config passed inline, anchored at a directory.
    Inline(PathBuf),
}

impl ConfigLocation {
    fn canonical_id(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Remote(url) => url.to_string(),
            Self::Inline(dir) => format!("inline:{}", dir.display()),
        }
    }

    fn base_dir(&self, work_dir: &Path) -> PathBuf {
        match self {
            Self::File(path) => path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| work_dir.to_path_buf()),
            Self::Remote(_) => work_dir.to_path_buf(),
            Self::Inline(dir) => dir.clone(),
        }
    }
}

/// Resolves a root config and everything it imports. One instance per run.
pub struct ImportResolver {
    options: ResolverOptions,
    env: VariableScope,
    client: Client,
    cache: HashMap<String, Arc<ResolvedRegistry>>,
    warnings: Vec<Warning>,
}

impl ImportResolver {
    /// `env` is the only scope `${KEY}` tokens in import directives read from.
    pub fn new(options: ResolverOptions, env: VariableScope) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(options.fetch_timeout)
            .build()
            .map_err(|e| CtxgenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            options,
            env,
            client,
            cache: HashMap::new(),
            warnings: Vec::new(),
        })
    }

    /// Resolve a root config file. Failing to read or parse it is fatal.
    #[instrument(skip_all, fields(root = %path.display()))]
    pub async fn resolve_file(mut self, path: &Path) -> Result<(ResolvedRegistry, Vec<Warning>)> {
        let canonical = std::fs::canonicalize(path).map_err(|e| CtxgenError::io(path, e))?;
        let raw = parser::parse_file(&canonical)?;
        let location = ConfigLocation::File(canonical);

        let registry = self.resolve_config(&location, raw, &BTreeSet::new()).await;
        Ok(self.finish(registry))
    }

    /// Resolve an already-parsed root config anchored at `base_dir`.
    #[instrument(skip_all, fields(base_dir = %base_dir.display()))]
    pub async fn resolve_inline(
        mut self,
        raw: RawConfig,
        base_dir: &Path,
    ) -> Result<(ResolvedRegistry, Vec<Warning>)> {
        let location = ConfigLocation::Inline(base_dir.to_path_buf());
        let registry = self.resolve_config(&location, raw, &BTreeSet::new()).await;
        Ok(self.finish(registry))
    }

    fn finish(self, registry: ResolvedRegistry) -> (ResolvedRegistry, Vec<Warning>) {
        info!(
            documents = registry.documents.len(),
            prompts = registry.prompts.len(),
            tools = registry.tools.len(),
            imports = registry.imports.len(),
            warnings = self.warnings.len(),
            "import resolution complete"
        );
        (registry, self.warnings)
    }

    /// Resolve one config: its imports first, then its own declarations on top.
    ///
    /// `ancestors` is this branch's in-progress set, copied per call so that
    /// sibling branches never see each other's entries.
    fn resolve_config<'a>(
        &'a mut self,
        location: &'a ConfigLocation,
        raw: RawConfig,
        ancestors: &'a BTreeSet<String>,
    ) -> BoxFuture<'a, ResolvedRegistry> {
        Box::pin(async move {
            let id = location.canonical_id();
            let mut branch = ancestors.clone();
            branch.insert(id.clone());

            let mut acc = ResolvedRegistry::default();

            for directive in &raw.imports {
                for target in self.expand_targets(location, directive) {
                    let target_id = target.canonical_id();

                    if branch.contains(&target_id) {
                        self.warn(
                            &target_id,
                            format!("import cycle detected from {id}, skipping"),
                        );
                        continue;
                    }

                    // `${KEY}` only reads the run-wide env scope, so a target
                    // resolves the same way from every importer.
                    let cached = self.cache.get(&target_id).cloned();
                    let sub = match cached {
                        Some(sub) => {
                            debug!(target = %target_id, "reusing resolved import");
                            sub
                        }
                        None => match self.load(&target, directive).await {
                            Ok(child) => {
                                let resolved = self.resolve_config(&target, child, &branch).await;
                                let resolved = Arc::new(resolved);
                                self.cache.insert(target_id.clone(), Arc::clone(&resolved));
                                resolved
                            }
                            Err(e) => {
                                self.warn(&target_id, format!("import skipped: {e}"));
                                continue;
                            }
                        },
                    };

                    if !acc.imports.contains(&target_id) {
                        acc.imports.push(target_id.clone());
                    }
                    acc.absorb(sub.select(directive));
                    debug!(importer = %id, target = %target_id, "import folded");
                }
            }

            let base_dir = location.base_dir(&self.options.work_dir);
            acc.absorb(ResolvedRegistry::from_raw(&raw, &id, &base_dir));
            acc
        })
    }

    /// Turn one directive into concrete config locations.
    fn expand_targets(
        &mut self,
        location: &ConfigLocation,
        directive: &ImportDirective,
    ) -> Vec<ConfigLocation> {
        match &directive.target {
            ImportTarget::Url { url } => {
                let url = self.env.substitute_env(url);
                match Url::parse(&url) {
                    Ok(parsed) => vec![ConfigLocation::Remote(parsed)],
                    Err(e) => {
                        self.warn(&url, format!("invalid import URL: {e}"));
                        Vec::new()
                    }
                }
            }
            ImportTarget::Local { path } => {
                let path = self.env.substitute_env(path);
                match location {
                    ConfigLocation::Remote(base) => {
                        if has_glob_chars(&path) {
                            self.warn(&path, "glob imports are not supported inside URL configs");
                            return Vec::new();
                        }
                        match base.join(&path) {
                            Ok(url) => vec![ConfigLocation::Remote(url)],
                            Err(e) => {
                                self.warn(&path, format!("cannot resolve against {base}: {e}"));
                                Vec::new()
                            }
                        }
                    }
                    ConfigLocation::File(_) | ConfigLocation::Inline(_) => {
                        let base_dir = location.base_dir(&self.options.work_dir);
                        if has_glob_chars(&path) {
                            let own_id = location.canonical_id();
                            let matches: Vec<ConfigLocation> = expand_glob(&base_dir, &path)
                                .into_iter()
                                .map(|p| ConfigLocation::File(canonicalize_lossy(&p)))
                                .filter(|target| {
                                    let is_self = target.canonical_id() == own_id;
                                    if is_self {
                                        debug!(pattern = %path, "glob matched the importing config, ignoring");
                                    }
                                    !is_self
                                })
                                .collect();
                            if matches.is_empty() {
                                self.warn(&path, "glob import matched no files");
                            }
                            matches
                        } else {
                            vec![ConfigLocation::File(canonicalize_lossy(&base_dir.join(&path)))]
                        }
                    }
                }
            }
        }
    }

    /// Read and parse an import target.
    async fn load(
        &self,
        target: &ConfigLocation,
        directive: &ImportDirective,
    ) -> Result<RawConfig> {
        match target {
            ConfigLocation::File(path) => parser::parse_file(path),
            ConfigLocation::Remote(url) => self.fetch_remote(url, directive).await,
            ConfigLocation::Inline(_) => Err(CtxgenError::Import(
                "inline configs cannot be imported".into(),
            )),
        }
    }

    async fn fetch_remote(
        &self,
        url: &Url,
        directive: &ImportDirective,
    ) -> Result<RawConfig> {
        debug!(%url, "fetching remote config");

        let mut request = self.client.get(url.as_str());
        for (name, value) in &directive.headers {
            request = request.header(name.as_str(), self.env.substitute_env(value));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CtxgenError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CtxgenError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CtxgenError::Network(format!("{url}: failed to read body: {e}")))?;

        parser::parse_str(
            &body,
            ConfigFormat::from_path(Path::new(url.path())),
            url.as_str(),
        )
    }

    fn warn(&mut self, scope: &str, message: impl Into<String>) {
        let warning = Warning::new(format!("import:{scope}"), message);
        warn!(scope = %warning.scope, message = %warning.message, "import warning");
        self.warnings.push(warning);
    }
}

/// Expand a glob relative to `base_dir` into matching files, in lexical order.
fn expand_glob(base_dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let components: Vec<&str> = pattern.split('/').collect();
    let first_glob = components
        .iter()
        .position(|c| has_glob_chars(c))
        .unwrap_or(components.len());

    let prefix = components[..first_glob].join("/");
    let rest = components[first_glob..].join("/");
    let root = if prefix.is_empty() {
        base_dir.to_path_buf()
    } else {
        base_dir.join(&prefix)
    };

    let Ok(matcher) = GlobPattern::new(&rest) else {
        return Vec::new();
    };

    let mut walker = WalkDir::new(&root).follow_links(true).sort_by_file_name();
    if !rest.contains("**") {
        walker = walker.max_depth(components.len() - first_glob);
    }

    let mut matches: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .strip_prefix(&root)
                .map(|rel| matcher.is_match(&rel.to_string_lossy()))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    matches.sort();
    matches
}

/// Canonicalize when the file exists; otherwise normalize lexically so the
/// identity is still stable for cycle detection and error messages.
fn canonicalize_lossy(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        let mut out = PathBuf::new();
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other.as_os_str()),
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ctxgen-resolver-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::canonicalize(&dir).unwrap()
    }

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn resolver(work_dir: &Path, env: VariableScope) -> ImportResolver {
        ImportResolver::new(
            ResolverOptions {
                work_dir: work_dir.to_path_buf(),
                fetch_timeout: Duration::from_secs(5),
            },
            env,
        )
        .unwrap()
    }

    fn paths(registry: &ResolvedRegistry) -> Vec<&str> {
        registry
            .documents
            .iter()
            .map(|d| d.document.output_path.as_str())
            .collect()
    }

    #[tokio::test]
    async fn diamond_import_folds_shared_config_once() {
        let tmp = temp_dir();
        write(&tmp, "b.yaml", "documents:\n  - {description: B, outputPath: b.md}\n");
        write(
            &tmp,
            "c.yaml",
            "import:\n  - b.yaml\ndocuments:\n  - {description: C, outputPath: c.md}\n",
        );
        let root = write(
            &tmp,
            "a.yaml",
            "import:\n  - b.yaml\n  - c.yaml\ndocuments:\n  - {description: A, outputPath: a.md}\n",
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(paths(&registry), vec!["b.md", "c.md", "a.md"]);
        assert_eq!(registry.imports.len(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn cycle_is_skipped_with_warning() {
        let tmp = temp_dir();
        write(
            &tmp,
            "b.yaml",
            "import:\n  - a.yaml\ndocuments:\n  - {description: B, outputPath: b.md}\n",
        );
        let root = write(
            &tmp,
            "a.yaml",
            "import:\n  - b.yaml\ndocuments:\n  - {description: A, outputPath: a.md}\n",
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();

        assert_eq!(paths(&registry), vec!["b.md", "a.md"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("cycle"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn self_import_is_a_cycle() {
        let tmp = temp_dir();
        let root = write(
            &tmp,
            "a.yaml",
            "import:\n  - ./a.yaml\ndocuments:\n  - {outputPath: a.md}\n",
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();

        assert_eq!(paths(&registry), vec!["a.md"]);
        assert_eq!(warnings.len(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn docs_allow_list_selects_documents() {
        let tmp = temp_dir();
        write(
            &tmp,
            "base.yaml",
            "documents:\n  - {outputPath: first.md}\n  - {outputPath: second.md}\n  - {outputPath: third.md}\n",
        );
        let root = write(
            &tmp,
            "main.yaml",
            "import:\n  - path: base.yaml\n    docs: [first.md, third.md]\n",
        );

        let (registry, _) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(paths(&registry), vec!["first.md", "third.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn nested_prefixes_compose() {
        let tmp = temp_dir();
        write(&tmp, "lib/leaf.yaml", "documents:\n  - {outputPath: leaf.md}\n");
        write(
            &tmp,
            "lib/mid.yaml",
            "import:\n  - path: leaf.yaml\n    pathPrefix: inner\n",
        );
        let root = write(
            &tmp,
            "main.yaml",
            "import:\n  - path: lib/mid.yaml\n    pathPrefix: outer\n",
        );

        let (registry, _) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(paths(&registry), vec!["outer/inner/leaf.md"]);
        // sources of the leaf resolve against the leaf's own directory
        assert_eq!(registry.documents[0].base_dir, tmp.join("lib"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn importer_variables_override_imported() {
        let tmp = temp_dir();
        write(
            &tmp,
            "base.yaml",
            "variables:\n  SHARED_VAR: base-shared-value\n  BASE_VAR: base-variable-value\n",
        );
        let root = write(
            &tmp,
            "main.yaml",
            "import:\n  - base.yaml\nvariables:\n  SHARED_VAR: main-shared-value\n",
        );

        let (registry, _) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(registry.variables.get("SHARED_VAR"), Some("main-shared-value"));
        assert_eq!(registry.variables.get("BASE_VAR"), Some("base-variable-value"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn later_import_overrides_earlier_variable() {
        let tmp = temp_dir();
        write(&tmp, "one.yaml", "variables: {K: one}\n");
        write(&tmp, "two.yaml", "variables: {K: two}\n");
        let root = write(&tmp, "main.yaml", "import: [one.yaml, two.yaml]\n");

        let (registry, _) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(registry.variables.get("K"), Some("two"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn glob_imports_resolve_in_lexical_order() {
        let tmp = temp_dir();
        write(&tmp, "services/b.yaml", "documents:\n  - {outputPath: b.md}\n");
        write(&tmp, "services/a.yaml", "documents:\n  - {outputPath: a.md}\n");
        write(&tmp, "services/notes.txt", "not a config");
        let root = write(&tmp, "main.yaml", "import:\n  - services/*.yaml\n");

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(paths(&registry), vec!["a.md", "b.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn env_tokens_resolve_import_paths() {
        let tmp = temp_dir();
        write(&tmp, "shared/base.yaml", "documents:\n  - {outputPath: base.md}\n");
        let root = write(&tmp, "main.yaml", "import:\n  - ${SHARED_DIR}/base.yaml\n");

        let env: VariableScope = [("SHARED_DIR", "shared")].into_iter().collect();
        let (registry, warnings) = resolver(&tmp, env).resolve_file(&root).await.unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(paths(&registry), vec!["base.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn config_variables_do_not_fill_import_tokens() {
        let tmp = temp_dir();
        write(&tmp, "shared/base.yaml", "documents:\n  - {outputPath: base.md}\n");
        let root = write(
            &tmp,
            "main.yaml",
            "variables:\n  SHARED_DIR: shared\nimport:\n  - ${SHARED_DIR}/base.yaml\n",
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert!(registry.documents.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].scope.contains("${SHARED_DIR}"), "{warnings:?}");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn shared_import_resolves_the_same_from_every_importer() {
        let tmp = temp_dir();
        write(&tmp, "leaves/leaf.yaml", "documents:\n  - {outputPath: leaf.md}\n");
        write(&tmp, "shared.yaml", "import:\n  - ${LEAF_DIR}/leaf.yaml\n");
        write(&tmp, "b.yaml", "variables: {LEAF_DIR: from-b}\nimport:\n  - shared.yaml\n");
        write(&tmp, "c.yaml", "variables: {LEAF_DIR: from-c}\nimport:\n  - shared.yaml\n");
        let root = write(&tmp, "a.yaml", "import:\n  - b.yaml\n  - c.yaml\n");

        let env: VariableScope = [("LEAF_DIR", "leaves")].into_iter().collect();
        let (registry, warnings) = resolver(&tmp, env).resolve_file(&root).await.unwrap();

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(paths(&registry), vec!["leaf.md"]);
        assert_eq!(registry.variables.get("LEAF_DIR"), Some("from-c"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn broken_imports_warn_and_continue() {
        let tmp = temp_dir();
        write(&tmp, "broken.yaml", "documents: [\n");
        let root = write(
            &tmp,
            "main.yaml",
            "import:\n  - missing.yaml\n  - broken.yaml\ndocuments:\n  - {outputPath: main.md}\n",
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(paths(&registry), vec!["main.md"]);
        assert_eq!(warnings.len(), 2);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_root_is_fatal() {
        let tmp = temp_dir();
        let result = resolver(&tmp, VariableScope::default())
            .resolve_file(&tmp.join("nope.yaml"))
            .await;
        assert!(result.is_err());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn malformed_root_is_fatal() {
        let tmp = temp_dir();
        let root = write(&tmp, "main.yaml", "documents: [\n");
        let result = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await;
        assert!(matches!(result, Err(CtxgenError::Parse { .. })));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn url_import_with_headers_and_relative_child() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/configs/shared.yaml"))
            .and(wiremock::matchers::header("Authorization", "Bearer secret"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                "import:\n  - child.json\ndocuments:\n  - {outputPath: remote.md}\n",
            ))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/configs/child.json"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(
                r#"{"documents": [{"outputPath": "child.md"}]}"#,
            ))
            .mount(&server)
            .await;

        let tmp = temp_dir();
        let root = write(
            &tmp,
            "main.yaml",
            &format!(
                "import:\n  - url: {}/configs/shared.yaml\n    headers:\n      Authorization: Bearer ${{API_TOKEN}}\n",
                server.uri()
            ),
        );

        let env: VariableScope = [("API_TOKEN", "secret")].into_iter().collect();
        let (registry, warnings) = resolver(&tmp, env).resolve_file(&root).await.unwrap();

        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(paths(&registry), vec!["child.md", "remote.md"]);
        assert_eq!(registry.documents[0].base_dir, tmp);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn url_import_failure_is_a_warning() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = temp_dir();
        let root = write(
            &tmp,
            "main.yaml",
            &format!(
                "import:\n  - url: {}/missing.yaml\ndocuments:\n  - {{outputPath: main.md}}\n",
                server.uri()
            ),
        );

        let (registry, warnings) = resolver(&tmp, VariableScope::default())
            .resolve_file(&root)
            .await
            .unwrap();
        assert_eq!(paths(&registry), vec!["main.md"]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("404"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn inline_root_resolves_relative_imports() {
        let tmp = temp_dir();
        write(&tmp, "base.yaml", "documents:\n  - {outputPath: base.md}\n");
        let raw: RawConfig =
            serde_json::from_str(r#"{"import": ["base.yaml"], "documents": [{"outputPath": "inline.md"}]}"#)
                .unwrap();

        let (registry, _) = resolver(&tmp, VariableScope::default())
            .resolve_inline(raw, &tmp)
            .await
            .unwrap();
        assert_eq!(paths(&registry), vec!["base.md", "inline.md"]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn canonicalize_lossy_normalizes_missing_paths() {
        let p = canonicalize_lossy(Path::new("/nonexistent/ctxgen/a/../b/./c.yaml"));
        assert_eq!(p, PathBuf::from("/nonexistent/ctxgen/b/c.yaml"));
    }
}

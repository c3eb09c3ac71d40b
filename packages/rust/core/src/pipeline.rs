//! End-to-end `generate` pipeline: resolve imports → flatten prompts →
//! compile documents → write outputs → report.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use ctxgen_config::{
    ImportResolver, ResolvedDocument, ResolvedRegistry, ResolverOptions, VariableScope,
    find_root_config, load_env_scope, parse_str, system_variables,
};
use ctxgen_shared::{AppConfig, CtxgenError, Result, Warning, token_from_env};
use ctxgen_sources::FetchContext;

use crate::cancel::CancelSignal;
use crate::compiler::{CompiledDocument, DocumentCompiler};
use crate::errors::ErrorCollector;
use crate::report::{DocumentReport, DocumentStatus, RunReport};
use crate::writer::{resolve_output_path, write_atomic};

/// Configuration for one `generate` run.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Directory relative paths resolve against.
    pub work_dir: PathBuf,
    /// Root config; discovered in `work_dir` when unset.
    pub config_file: Option<PathBuf>,
    /// Root config text, used instead of any file.
    pub inline: Option<String>,
    /// `.env`-style file layered over the process environment.
    pub env_file: Option<PathBuf>,
    /// Output root, relative to `work_dir` unless absolute.
    pub output_dir: PathBuf,
    /// Documents compiled at once.
    pub concurrency: usize,
    /// Per-fetch timeout.
    pub fetch_timeout: Duration,
    pub github_token: Option<String>,
    pub gitlab_token: Option<String>,
    pub gitlab_server: Option<String>,
}

impl GenerateConfig {
    /// Settings from the app config, with tokens read from the env vars it names.
    pub fn from_app_config(app: &AppConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            config_file: None,
            inline: None,
            env_file: None,
            output_dir: PathBuf::from(&app.defaults.output_dir),
            concurrency: app.defaults.concurrency.max(1),
            fetch_timeout: Duration::from_secs(app.defaults.fetch_timeout_secs.max(1)),
            github_token: token_from_env(&app.github.token_env),
            gitlab_token: token_from_env(&app.gitlab.token_env),
            gitlab_server: Some(app.gitlab.server.clone()).filter(|s| !s.is_empty()),
        }
    }

    /// Defaults without touching the user's app config or token env vars.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let app = AppConfig::default();
        Self {
            github_token: None,
            gitlab_token: None,
            ..Self::from_app_config(&app, work_dir)
        }
    }

    pub fn output_root(&self) -> PathBuf {
        self.relative_to_work_dir(&self.output_dir)
    }

    fn relative_to_work_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}

/// The merged config plus what it took to build it.
#[derive(Debug)]
pub struct LoadedConfig {
    pub registry: ResolvedRegistry,
    /// `${KEY}` scope: process env plus the env file.
    pub env: VariableScope,
    pub warnings: Vec<Warning>,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each document finishes compiling, in declaration order.
    fn document_compiled(&self, output_path: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_compiled(&self, _output_path: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Find, parse, and resolve the root config with all of its imports.
///
/// Only a root config that cannot be found, read, or parsed is an error;
/// import problems come back as warnings.
#[instrument(skip_all, fields(work_dir = %config.work_dir.display()))]
pub async fn load_registry(config: &GenerateConfig) -> Result<LoadedConfig> {
    let env_file = config
        .env_file
        .as_deref()
        .map(|p| config.relative_to_work_dir(p));
    let env = load_env_scope(env_file.as_deref())?;

    let resolver = ImportResolver::new(
        ResolverOptions {
            work_dir: config.work_dir.clone(),
            fetch_timeout: config.fetch_timeout,
        },
        env.clone(),
    )?;

    let (registry, warnings) = match &config.inline {
        Some(text) => {
            let raw = parse_str(text, None, "inline config")?;
            resolver.resolve_inline(raw, &config.work_dir).await?
        }
        None => {
            let path = match &config.config_file {
                Some(path) => config.relative_to_work_dir(path),
                None => find_root_config(&config.work_dir).ok_or_else(|| {
                    CtxgenError::config(format!(
                        "no context config found in {}",
                        config.work_dir.display()
                    ))
                })?,
            };
            info!(config = %path.display(), "loading root config");
            resolver.resolve_file(&path).await?
        }
    };

    for warning in &warnings {
        warn!(scope = %warning.scope, "{}", warning.message);
    }
    info!(
        documents = registry.documents.len(),
        prompts = registry.prompts.len(),
        tools = registry.tools.len(),
        imports = registry.imports.len(),
        "config resolved"
    );

    Ok(LoadedConfig {
        registry,
        env,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Generate
// ---------------------------------------------------------------------------

/// Run the full pipeline.
///
/// Returns `Err` only for fatal root-config failures; everything else is
/// reported per document in the [`RunReport`].
#[instrument(skip_all, fields(work_dir = %config.work_dir.display()))]
pub async fn generate(
    config: &GenerateConfig,
    progress: &dyn ProgressReporter,
    cancel: CancelSignal,
) -> Result<RunReport> {
    let start = Instant::now();

    // Phase 1: Imports
    progress.phase("Resolving imports");
    let LoadedConfig {
        registry,
        mut warnings,
        ..
    } = load_registry(config).await?;
    let ResolvedRegistry {
        variables,
        documents,
        prompts,
        imports,
        ..
    } = registry;

    // Phase 2: Prompts
    progress.phase("Flattening prompts");
    let (prompts, prompt_warnings) = ctxgen_prompts::flatten(&prompts);
    for warning in &prompt_warnings {
        warn!(scope = %warning.scope, "{}", warning.message);
    }
    warnings.extend(prompt_warnings);
    let prompt_ids: Vec<String> = prompts.into_iter().map(|p| p.id).collect();

    if documents.is_empty() {
        info!("no documents declared");
        let report = RunReport::new(imports, prompt_ids, Vec::new(), warnings);
        progress.done(&report);
        return Ok(report);
    }

    // Phase 3: Compile
    progress.phase("Compiling documents");
    // `{{KEY}}` never sees the process env or the env file; those only feed `${KEY}` in imports.
    let scope = system_variables(&config.work_dir).merge(&variables);
    let compiler = DocumentCompiler::with_defaults(config.fetch_timeout)?.with_credentials(
        FetchContext {
            base_dir: config.work_dir.clone(),
            github_token: config.github_token.clone(),
            gitlab_token: config.gitlab_token.clone(),
            gitlab_server: config.gitlab_server.clone(),
        },
    );
    let compiled = compile_all(
        Arc::new(compiler),
        documents,
        scope,
        config.concurrency,
        &cancel,
        progress,
    )
    .await;

    // Phase 4: Write
    progress.phase("Writing documents");
    let output_root = config.output_root();
    let (result, run_errors) = write_all(&output_root, compiled, &cancel);

    let report = RunReport::new(imports, prompt_ids, result, warnings).with_errors(&run_errors);
    info!(
        documents = report.result.len(),
        errors = run_errors.len(),
        status = ?report.status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generate complete"
    );
    progress.done(&report);
    Ok(report)
}

/// Compile every document on a bounded worker pool. Output keeps declaration order.
async fn compile_all(
    compiler: Arc<DocumentCompiler>,
    documents: Vec<ResolvedDocument>,
    scope: VariableScope,
    concurrency: usize,
    cancel: &CancelSignal,
    progress: &dyn ProgressReporter,
) -> Vec<CompiledDocument> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let total = documents.len();

    let mut handles = Vec::with_capacity(total);
    for document in documents {
        let output_path = document.document.output_path.clone();
        let overwrite = document.document.overwrite;
        let compiler = Arc::clone(&compiler);
        let semaphore = Arc::clone(&semaphore);
        let scope = scope.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();
            compiler.compile(&document, &scope, &cancel).await
        });
        handles.push((output_path, overwrite, handle));
    }

    let mut compiled = Vec::with_capacity(total);
    for (index, (output_path, overwrite, handle)) in handles.into_iter().enumerate() {
        let document = match handle.await {
            Ok(document) => document,
            Err(e) => {
                warn!(output = %output_path, error = %e, "compile task failed");
                let mut errors = ErrorCollector::new();
                errors.add(output_path.clone(), format!("compile task failed: {e}"));
                CompiledDocument {
                    output_path,
                    overwrite,
                    content: String::new(),
                    errors,
                }
            }
        };
        progress.document_compiled(&document.output_path, index + 1, total);
        compiled.push(document);
    }
    compiled
}

/// Write compiled documents one at a time, in declaration order.
///
/// `overwrite: false` only protects files that existed before this run, so
/// later declarations of the same path still replace earlier ones.
fn write_all(
    root: &Path,
    compiled: Vec<CompiledDocument>,
    cancel: &CancelSignal,
) -> (Vec<DocumentReport>, ErrorCollector) {
    let context_path = root.display().to_string();
    let targets: Vec<Result<PathBuf>> = compiled
        .iter()
        .map(|d| resolve_output_path(root, &d.output_path))
        .collect();
    let preexisting: HashSet<PathBuf> = targets
        .iter()
        .filter_map(|t| t.as_ref().ok())
        .filter(|p| p.exists())
        .cloned()
        .collect();

    let mut run_errors = ErrorCollector::new();
    let mut reports = Vec::with_capacity(compiled.len());

    for (document, target) in compiled.into_iter().zip(targets) {
        let CompiledDocument {
            output_path,
            overwrite,
            content,
            mut errors,
        } = document;

        let mut skipped = false;
        match target {
            Err(e) => errors.add(output_path.clone(), e.to_string()),
            Ok(_) if cancel.is_cancelled() => {
                errors.add(output_path.clone(), "run cancelled before write");
            }
            Ok(path) if !overwrite && preexisting.contains(&path) => {
                info!(path = %path.display(), "keeping existing file (overwrite: false)");
                skipped = true;
            }
            Ok(path) => match write_atomic(&path, &content) {
                Ok(()) => debug!(path = %path.display(), "document written"),
                Err(e) => errors.add(output_path.clone(), e.to_string()),
            },
        }

        let status = if errors.has_errors() {
            DocumentStatus::Error
        } else if skipped {
            DocumentStatus::Skipped
        } else {
            DocumentStatus::Success
        };
        run_errors.extend(&errors);
        reports.push(DocumentReport {
            context_path: context_path.clone(),
            output_path,
            status,
            errors: errors.messages(),
        });
    }

    (reports, run_errors)
}

//! Document compilation: fetch every source, run modifiers, assemble Markdown.

use std::time::Duration;

use tracing::{debug, instrument, warn};

use ctxgen_config::{ResolvedDocument, VariableScope};
use ctxgen_modifiers::ContentModifierChain;
use ctxgen_shared::{CtxgenError, ModifierRef, Result, Source};
use ctxgen_sources::{FetchContext, SourceFetcherRegistry};

use crate::cancel::CancelSignal;
use crate::errors::ErrorCollector;

/// One document's compiled text plus the errors hit while building it.
#[derive(Debug, Clone)]
pub struct CompiledDocument {
    pub output_path: String,
    pub overwrite: bool,
    pub content: String,
    pub errors: ErrorCollector,
}

/// Turns resolved documents into Markdown.
pub struct DocumentCompiler {
    fetchers: SourceFetcherRegistry,
    modifiers: ContentModifierChain,
    fetch_timeout: Duration,
    /// Tokens and server fallbacks; `base_dir` is replaced per document.
    credentials: FetchContext,
}

impl DocumentCompiler {
    pub fn new(
        fetchers: SourceFetcherRegistry,
        modifiers: ContentModifierChain,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetchers,
            modifiers,
            fetch_timeout,
            credentials: FetchContext::default(),
        }
    }

    /// Built-in fetchers and modifiers.
    pub fn with_defaults(fetch_timeout: Duration) -> Result<Self> {
        Ok(Self::new(
            SourceFetcherRegistry::new(fetch_timeout)?,
            ContentModifierChain::new(),
            fetch_timeout,
        ))
    }

    pub fn with_credentials(mut self, credentials: FetchContext) -> Self {
        self.credentials = credentials;
        self
    }

    /// Compile one document. Never fails; problems land in `errors` and in
    /// inline `Error:` blocks.
    #[instrument(skip_all, fields(output = %resolved.document.output_path))]
    pub async fn compile(
        &self,
        resolved: &ResolvedDocument,
        scope: &VariableScope,
        cancel: &CancelSignal,
    ) -> CompiledDocument {
        let document = &resolved.document;
        let ctx = FetchContext {
            base_dir: resolved.base_dir.clone(),
            ..self.credentials.clone()
        };
        let mut errors = ErrorCollector::new();

        let mut sections = Vec::with_capacity(document.sources.len() + 1);
        let title = document.description.trim();
        if !title.is_empty() {
            sections.push(format!("# {title}"));
        }

        for (index, source) in document.sources.iter().enumerate() {
            let error_scope = format!("{}#source[{index}]", document.output_path);
            let body = match self.fetch(source, &ctx, cancel).await {
                Ok(raw) => {
                    let chain: Vec<ModifierRef> = source
                        .modifiers
                        .iter()
                        .chain(document.modifiers.iter())
                        .cloned()
                        .collect();
                    match self.modifiers.apply(&raw, &chain) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(scope = %error_scope, error = %e, "modifier failed");
                            errors.add(error_scope, e.to_string());
                            format!("Error: {e}")
                        }
                    }
                }
                Err(e) => {
                    warn!(scope = %error_scope, error = %e, "source failed");
                    errors.add(error_scope, e.to_string());
                    format!("Error: {e}")
                }
            };
            sections.push(render_section(source, &body));
        }

        let content = scope.substitute(&format!("{}\n", sections.join("\n\n")));
        debug!(
            sources = document.sources.len(),
            errors = errors.len(),
            size = content.len(),
            "document compiled"
        );

        CompiledDocument {
            output_path: document.output_path.clone(),
            overwrite: document.overwrite,
            content,
            errors,
        }
    }

    async fn fetch(
        &self,
        source: &Source,
        ctx: &FetchContext,
        cancel: &CancelSignal,
    ) -> Result<String> {
        if cancel.is_cancelled() {
            return Err(CtxgenError::Fetch("run cancelled".into()));
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(CtxgenError::Fetch("run cancelled".into())),
            fetched = tokio::time::timeout(self.fetch_timeout, self.fetchers.fetch(source, ctx)) => {
                match fetched {
                    Ok(result) => result,
                    Err(_) => Err(CtxgenError::Fetch(format!(
                        "{} source timed out after {}s",
                        source.type_name(),
                        self.fetch_timeout.as_secs_f64()
                    ))),
                }
            }
        }
    }
}

/// `## description`, then the body, wrapped in the source's tag if it has one.
fn render_section(source: &Source, body: &str) -> String {
    let body = body.trim_end_matches('\n');
    let mut out = String::new();
    let description = source.description.trim();
    if !description.is_empty() {
        out.push_str("## ");
        out.push_str(description);
        out.push_str("\n\n");
    }
    match source.effective_tag() {
        Some(tag) => {
            out.push_str(&format!("<{tag}>\n{body}\n</{tag}>"));
        }
        None => out.push_str(body),
    }
    out
}

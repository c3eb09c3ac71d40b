//! The merged, resolution-ready config model.

use std::path::{Path, PathBuf};

use ctxgen_shared::{Document, ImportDirective, Prompt, RawConfig, Tool};

use crate::variables::VariableScope;

/// Which config declared a document, and where in its `documents` list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentOrigin {
    pub config_id: String,
    pub index: usize,
}

/// A document placed into a registry, with its provenance.
#[derive(Debug, Clone)]
pub struct ResolvedDocument {
    pub origin: DocumentOrigin,
    /// Directory of the declaring config; relative source paths resolve here.
    pub base_dir: PathBuf,
    /// The document with any import path prefixes applied to `output_path`.
    pub document: Document,
}

/// Accumulator for import resolution and the final merged config.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRegistry {
    pub variables: VariableScope,
    pub documents: Vec<ResolvedDocument>,
    pub prompts: Vec<Prompt>,
    pub tools: Vec<Tool>,
    /// Canonical ids of every config folded in through imports, first-seen order.
    pub imports: Vec<String>,
}

impl ResolvedRegistry {
    /// A registry holding only one config's own declarations.
    pub fn from_raw(raw: &RawConfig, config_id: &str, base_dir: &Path) -> Self {
        let mut registry = Self {
            variables: VariableScope::new(raw.variables.clone()),
            documents: raw
                .documents
                .iter()
                .enumerate()
                .map(|(index, document)| ResolvedDocument {
                    origin: DocumentOrigin {
                        config_id: config_id.to_string(),
                        index,
                    },
                    base_dir: base_dir.to_path_buf(),
                    document: document.clone(),
                })
                .collect(),
            ..Self::default()
        };
        for prompt in &raw.prompts {
            upsert_by_id(&mut registry.prompts, prompt.clone(), |p| &p.id);
        }
        for tool in &raw.tools {
            upsert_by_id(&mut registry.tools, tool.clone(), |t| &t.id);
        }
        registry
    }

    /// Fold `other` on top of `self`.
    ///
    /// Variables and same-id prompts/tools from `other` win. Documents are
    /// appended, except that the same declaration reaching this registry twice
    /// with the same output path (a diamond import) is kept once.
    pub fn absorb(&mut self, other: ResolvedRegistry) {
        self.variables = self.variables.merge(&other.variables);

        for doc in other.documents {
            let seen = self.documents.iter().any(|existing| {
                existing.origin == doc.origin
                    && existing.document.output_path == doc.document.output_path
            });
            if !seen {
                self.documents.push(doc);
            }
        }
        for prompt in other.prompts {
            upsert_by_id(&mut self.prompts, prompt, |p| &p.id);
        }
        for tool in other.tools {
            upsert_by_id(&mut self.tools, tool, |t| &t.id);
        }
        for id in other.imports {
            if !self.imports.contains(&id) {
                self.imports.push(id);
            }
        }
    }

    /// The part of this registry an import directive asks for: path prefix,
    /// then the `docs` allow-list, then the prompt/tool filter.
    pub fn select(&self, directive: &ImportDirective) -> ResolvedRegistry {
        let documents = self
            .documents
            .iter()
            .map(|doc| {
                let mut doc = doc.clone();
                if let Some(prefix) = &directive.path_prefix {
                    doc.document.output_path = prefix_output_path(prefix, &doc.document.output_path);
                }
                doc
            })
            .filter(|doc| match &directive.docs {
                None => true,
                Some(allowed) => {
                    let path = normalize_output_path(&doc.document.output_path);
                    allowed.iter().any(|a| normalize_output_path(a) == path)
                }
            })
            .collect();

        ResolvedRegistry {
            variables: self.variables.clone(),
            documents,
            prompts: self
                .prompts
                .iter()
                .filter(|p| directive.filter.allows(&p.id, &p.tags))
                .cloned()
                .collect(),
            tools: self
                .tools
                .iter()
                .filter(|t| directive.filter.allows(&t.id, &t.tags))
                .cloned()
                .collect(),
            imports: self.imports.clone(),
        }
    }

    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn tool(&self, id: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.id == id)
    }
}

/// Replace an item with the same id (dropping its old position) or append.
fn upsert_by_id<T>(items: &mut Vec<T>, item: T, id: impl Fn(&T) -> &String) {
    let key = id(&item).clone();
    items.retain(|existing| *id(existing) != key);
    items.push(item);
}

/// Strip a leading `./` and surrounding slashes so equivalent spellings compare equal.
pub(crate) fn normalize_output_path(path: &str) -> String {
    let mut p = path.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.trim_matches('/').to_string()
}

fn prefix_output_path(prefix: &str, path: &str) -> String {
    let prefix = normalize_output_path(prefix);
    let path = normalize_output_path(path);
    if prefix.is_empty() {
        path
    } else {
        format!("{prefix}/{path}")
    }
}

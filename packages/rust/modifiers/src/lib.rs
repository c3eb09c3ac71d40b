//! Content modifiers applied to fetched source text.
//!
//! A modifier is a named `&str -> String` transform with optional JSON options.
//! [`ContentModifierChain`] looks modifiers up by name and applies a list of
//! [`ModifierRef`]s in order.

mod cleanup;
mod html;
mod sanitize;
mod trim;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use ctxgen_shared::{CtxgenError, ModifierRef, Result};

pub use cleanup::MarkdownCleanup;
pub use html::{HtmlToMarkdown, html_to_markdown};
pub use sanitize::Sanitizer;
pub use trim::Trim;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A named text transform.
pub trait ContentModifier: Send + Sync {
    /// Id used in config `modifiers` lists.
    fn name(&self) -> &str;

    /// Transform `content`. `options` is `Value::Null` when none were given.
    fn apply(&self, content: &str, options: &Value) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered modifiers, looked up by name.
pub struct ContentModifierChain {
    modifiers: Vec<Box<dyn ContentModifier>>,
}

impl ContentModifierChain {
    /// A chain with every built-in modifier registered.
    pub fn new() -> Self {
        Self {
            modifiers: vec![
                Box::new(HtmlToMarkdown),
                Box::new(MarkdownCleanup),
                Box::new(Sanitizer),
                Box::new(Trim),
            ],
        }
    }

    /// Add or replace a modifier by name.
    pub fn register(&mut self, modifier: Box<dyn ContentModifier>) {
        self.modifiers.retain(|m| m.name() != modifier.name());
        self.modifiers.push(modifier);
    }

    pub fn get(&self, name: &str) -> Option<&dyn ContentModifier> {
        self.modifiers
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.modifiers.iter().map(|m| m.name()).collect()
    }

    /// Apply `refs` in order. The first failure (including an unknown name) stops the chain.
    pub fn apply(&self, text: &str, refs: &[ModifierRef]) -> Result<String> {
        let mut current = text.to_string();
        for modifier_ref in refs {
            let modifier = self.get(&modifier_ref.name).ok_or_else(|| {
                CtxgenError::Modifier(format!("unknown modifier '{}'", modifier_ref.name))
            })?;
            current = modifier
                .apply(&current, &modifier_ref.options)
                .map_err(|e| match e {
                    CtxgenError::Modifier(msg) => {
                        CtxgenError::Modifier(format!("{}: {msg}", modifier_ref.name))
                    }
                    other => CtxgenError::Modifier(format!("{}: {other}", modifier_ref.name)),
                })?;
            debug!(modifier = %modifier_ref.name, len = current.len(), "modifier applied");
        }
        Ok(current)
    }
}

impl Default for ContentModifierChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a modifier's options; `null` yields the defaults.
pub(crate) fn parse_options<T: DeserializeOwned + Default>(name: &str, options: &Value) -> Result<T> {
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| CtxgenError::Modifier(format!("invalid options for {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn applies_modifiers_in_order() {
        let chain = ContentModifierChain::new();
        let refs = vec![
            ModifierRef::named("html-to-markdown"),
            ModifierRef {
                name: "trim".into(),
                options: json!({"maxLines": 1}),
            },
        ];
        let out = chain
            .apply("<html><body><main><h1>Title</h1><p>Body text</p></main></body></html>", &refs)
            .unwrap();
        assert_eq!(out, "# Title");
    }

    #[test]
    fn unknown_modifier_is_error() {
        let chain = ContentModifierChain::new();
        let err = chain
            .apply("x", &[ModifierRef::named("does-not-exist")])
            .unwrap_err();
        assert!(err.to_string().contains("unknown modifier 'does-not-exist'"));
    }

    #[test]
    fn bad_options_name_the_modifier() {
        let chain = ContentModifierChain::new();
        let refs = vec![ModifierRef {
            name: "trim".into(),
            options: json!({"maxLines": "many"}),
        }];
        let err = chain.apply("x", &refs).unwrap_err();
        assert!(err.to_string().contains("trim"));
    }

    #[test]
    fn register_replaces_by_name() {
        struct Upper;
        impl ContentModifier for Upper {
            fn name(&self) -> &str {
                "trim"
            }
            fn apply(&self, content: &str, _: &Value) -> Result<String> {
                Ok(content.to_uppercase())
            }
        }

        let mut chain = ContentModifierChain::new();
        let before = chain.names().len();
        chain.register(Box::new(Upper));
        assert_eq!(chain.names().len(), before);
        assert_eq!(chain.apply("abc", &[ModifierRef::named("trim")]).unwrap(), "ABC");
    }

    #[test]
    fn empty_chain_is_identity() {
        let chain = ContentModifierChain::new();
        assert_eq!(chain.apply("  keep  ", &[]).unwrap(), "  keep  ");
    }
}

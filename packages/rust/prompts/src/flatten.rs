//! Resolve `extend` chains among prompts and templates.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use ctxgen_config::VariableScope;
use ctxgen_shared::{Message, Prompt, PromptKind, Warning};

const VALID_ROLES: [&str; 2] = ["user", "assistant"];

/// Why a prompt's inheritance chain could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtendError {
    #[error("extends unknown prompt '{0}'")]
    Missing(String),

    #[error("extend cycle through '{0}'")]
    Cycle(String),

    #[error("'{owner}' has an extend entry #{index} without an id")]
    InvalidExtension { owner: String, index: usize },

    #[error("template '{0}' has no messages")]
    EmptyTemplate(String),
}

/// Flatten every `prompt`-kind entry into a standalone prompt.
///
/// Templates are never emitted. A prompt whose chain is broken (unknown id,
/// cycle, empty template anywhere below it) or that fails validation is
/// dropped with a warning. When two entries share an id, the later one wins
/// and takes the later position.
pub fn flatten(prompts: &[Prompt]) -> (Vec<Prompt>, Vec<Warning>) {
    let mut by_id: HashMap<&str, &Prompt> = HashMap::new();
    for prompt in prompts {
        by_id.insert(prompt.id.as_str(), prompt);
    }

    // Keep only the last occurrence of each id, in registration order.
    let mut seen = HashSet::new();
    let mut ordered: Vec<&Prompt> = prompts
        .iter()
        .rev()
        .filter(|p| seen.insert(p.id.as_str()))
        .collect();
    ordered.reverse();

    let mut flattened = Vec::new();
    let mut warnings = Vec::new();

    for prompt in ordered {
        if prompt.kind == PromptKind::Template {
            continue;
        }

        let mut visiting = HashSet::new();
        let result = resolve_messages(prompt, &by_id, &mut visiting)
            .map_err(|e| e.to_string())
            .and_then(|messages| {
                validate(prompt, &messages)?;
                Ok(messages)
            });

        match result {
            Ok(messages) => {
                debug!(id = %prompt.id, messages = messages.len(), "prompt flattened");
                flattened.push(Prompt {
                    messages,
                    extend: Vec::new(),
                    ..prompt.clone()
                });
            }
            Err(reason) => {
                let scope = if prompt.id.is_empty() {
                    "prompt:<unnamed>".to_string()
                } else {
                    format!("prompt:{}", prompt.id)
                };
                warn!(%scope, %reason, "prompt dropped");
                warnings.push(Warning::new(scope, format!("prompt dropped: {reason}")));
            }
        }
    }

    info!(
        declared = prompts.len(),
        emitted = flattened.len(),
        dropped = warnings.len(),
        "prompts flattened"
    );
    (flattened, warnings)
}

/// Inherited messages (in `extend` order) followed by the node's own.
fn resolve_messages<'a>(
    node: &'a Prompt,
    by_id: &HashMap<&str, &'a Prompt>,
    visiting: &mut HashSet<&'a str>,
) -> Result<Vec<Message>, ExtendError> {
    if !visiting.insert(node.id.as_str()) {
        return Err(ExtendError::Cycle(node.id.clone()));
    }

    let mut messages = Vec::new();
    for (index, extension) in node.extend.iter().enumerate() {
        if extension.id.trim().is_empty() {
            return Err(ExtendError::InvalidExtension {
                owner: node.id.clone(),
                index,
            });
        }

        let parent = by_id
            .get(extension.id.as_str())
            .copied()
            .ok_or_else(|| ExtendError::Missing(extension.id.clone()))?;

        let inherited = resolve_messages(parent, by_id, visiting)?;
        if parent.kind == PromptKind::Template && inherited.is_empty() {
            return Err(ExtendError::EmptyTemplate(parent.id.clone()));
        }

        let arguments: VariableScope = extension.arguments.clone().into();
        messages.extend(
            inherited
                .into_iter()
                .map(|m| Message::new(m.role, arguments.substitute(&m.content))),
        );
    }
    messages.extend(node.messages.iter().cloned());

    // Siblings may share ancestors; only the active path counts as a cycle.
    visiting.remove(node.id.as_str());
    Ok(messages)
}

fn validate(prompt: &Prompt, messages: &[Message]) -> Result<(), String> {
    if prompt.id.trim().is_empty() {
        return Err("missing id".into());
    }
    if messages.is_empty() {
        return Err("no messages".into());
    }
    for (i, message) in messages.iter().enumerate() {
        if !VALID_ROLES.contains(&message.role.as_str()) {
            return Err(format!(
                "message #{i} has invalid role '{}' (expected user or assistant)",
                message.role
            ));
        }
        if message.content.trim().is_empty() {
            return Err(format!("message #{i} has empty content"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts(yaml: &str) -> Vec<Prompt> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn template_inheritance_substitutes_arguments() {
        let input = prompts(
            r#"
- id: base-template
  type: template
  messages:
    - {role: user, content: "Base content with {{baseVar}}."}
- id: final
  extend:
    - id: base-template
      arguments: {baseVar: final value}
  messages:
    - {role: user, content: "Own content."}
"#,
        );

        let (out, warnings) = flatten(&input);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "final");
        assert!(out[0].extend.is_empty());
        let contents: Vec<&str> = out[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Base content with final value.", "Own content."]);
    }

    #[test]
    fn multi_level_chain_is_post_order() {
        let input = prompts(
            r#"
- id: root
  type: template
  messages: [{role: user, content: "root {{x}}"}]
- id: mid
  type: template
  extend: [{id: root, arguments: {x: from-mid}}]
  messages: [{role: assistant, content: "mid {{y}}"}]
- id: leaf
  extend: [{id: mid, arguments: {y: from-leaf}}]
  messages: [{role: user, content: leaf}]
"#,
        );

        let (out, _) = flatten(&input);
        let contents: Vec<&str> = out[0].messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["root from-mid", "mid from-leaf", "leaf"]);
    }

    #[test]
    fn shared_ancestor_is_not_a_cycle() {
        let input = prompts(
            r#"
- {id: base, type: template, messages: [{role: user, content: base}]}
- {id: a, type: template, extend: [{id: base}], messages: [{role: user, content: a}]}
- {id: b, type: template, extend: [{id: base}], messages: [{role: user, content: b}]}
- {id: p, extend: [{id: a}, {id: b}]}
"#,
        );

        let (out, warnings) = flatten(&input);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(out[0].messages.len(), 4);
    }

    #[test]
    fn template_cycle_rejects_everything() {
        let input = prompts(
            r#"
- {id: template-a, type: template, extend: [{id: template-b}], messages: [{role: user, content: a}]}
- {id: template-b, type: template, extend: [{id: template-a}], messages: [{role: user, content: b}]}
- {id: user-prompt, extend: [{id: template-a}]}
"#,
        );

        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("cycle"));
    }

    #[test]
    fn templates_are_never_emitted() {
        let input = prompts("- {id: t, type: template, messages: [{role: user, content: x}]}\n");
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_parent_rejects_prompt() {
        let input = prompts("- {id: p, extend: [{id: nope}], messages: [{role: user, content: x}]}\n");
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert!(warnings[0].message.contains("unknown prompt 'nope'"));
    }

    #[test]
    fn empty_template_propagates_transitively() {
        let input = prompts(
            r#"
- {id: empty, type: template}
- {id: mid, type: template, extend: [{id: empty}], messages: [{role: user, content: mid}]}
- {id: p, extend: [{id: mid}], messages: [{role: user, content: own}]}
"#,
        );
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert!(warnings[0].message.contains("template 'empty' has no messages"));
    }

    #[test]
    fn duplicate_id_later_wins() {
        let input = prompts(
            r#"
- {id: duplicate-id, messages: [{role: user, content: First prompt content}]}
- {id: other, messages: [{role: user, content: other}]}
- {id: duplicate-id, messages: [{role: user, content: Second prompt content}]}
"#,
        );
        let (out, _) = flatten(&input);
        let ids: Vec<&str> = out.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["other", "duplicate-id"]);
        assert_eq!(out[1].messages[0].content, "Second prompt content");
    }

    #[test]
    fn empty_messages_rejected() {
        let input = prompts("- {id: empty, messages: []}\n");
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn invalid_role_and_blank_content_rejected() {
        let input = prompts(
            r#"
- {id: bad-role, messages: [{role: system, content: x}]}
- {id: blank, messages: [{role: user, content: "  "}]}
- {id: "", messages: [{role: user, content: x}]}
"#,
        );
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn extend_entry_without_id_rejected() {
        let input = prompts("- {id: p, extend: [{arguments: {a: b}}], messages: [{role: user, content: x}]}\n");
        let (out, warnings) = flatten(&input);
        assert!(out.is_empty());
        assert!(warnings[0].message.contains("without an id"));
    }
}

//! Fill a flattened prompt with caller arguments.

use std::collections::BTreeMap;

use serde_json::Value;

use ctxgen_config::VariableScope;
use ctxgen_shared::{CtxgenError, Message, Prompt, Result};

/// Argument names listed in the prompt's `schema.required`.
pub fn required_arguments(prompt: &Prompt) -> Vec<String> {
    prompt
        .schema
        .as_ref()
        .and_then(|s| s.get("required"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Substitute `{{arg}}` tokens in every message.
///
/// Schema `properties.<name>.default` values fill in for omitted arguments.
/// A required argument that is still missing is a validation error.
pub fn render(prompt: &Prompt, arguments: &BTreeMap<String, String>) -> Result<Vec<Message>> {
    let mut values = schema_defaults(prompt);
    values.extend(arguments.iter().map(|(k, v)| (k.clone(), v.clone())));

    let missing: Vec<String> = required_arguments(prompt)
        .into_iter()
        .filter(|name| !values.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return Err(CtxgenError::validation(format!(
            "prompt '{}' is missing required argument(s): {}",
            prompt.id,
            missing.join(", ")
        )));
    }

    let scope = VariableScope::new(values);
    Ok(prompt
        .messages
        .iter()
        .map(|m| Message::new(m.role.clone(), scope.substitute(&m.content)))
        .collect())
}

fn schema_defaults(prompt: &Prompt) -> BTreeMap<String, String> {
    let Some(properties) = prompt
        .schema
        .as_ref()
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };

    properties
        .iter()
        .filter_map(|(name, spec)| {
            let default = match spec.get("default")? {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((name.clone(), default))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(yaml: &str) -> Prompt {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn args(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    const REVIEW: &str = r#"
id: review
schema:
  type: object
  required: [language]
  properties:
    language: {type: string}
    focus: {type: string, default: correctness}
messages:
  - {role: user, content: "Review this {{language}} code for {{focus}}."}
"#;

    #[test]
    fn render_fills_arguments_and_defaults() {
        let messages = render(&prompt(REVIEW), &args(&[("language", "Rust")])).unwrap();
        assert_eq!(messages[0].content, "Review this Rust code for correctness.");
    }

    #[test]
    fn caller_argument_beats_default() {
        let messages = render(
            &prompt(REVIEW),
            &args(&[("language", "Go"), ("focus", "style")]),
        )
        .unwrap();
        assert_eq!(messages[0].content, "Review this Go code for style.");
    }

    #[test]
    fn missing_required_argument_is_error() {
        let err = render(&prompt(REVIEW), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CtxgenError::Validation { .. }));
        assert!(err.to_string().contains("language"));
    }

    #[test]
    fn no_schema_leaves_unknown_tokens() {
        let p = prompt("id: p\nmessages: [{role: user, content: \"hi {{name}}\"}]\n");
        let messages = render(&p, &BTreeMap::new()).unwrap();
        assert_eq!(messages[0].content, "hi {{name}}");
        assert!(required_arguments(&p).is_empty());
    }
}

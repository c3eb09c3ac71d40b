use serde::Deserialize;
use serde_json::Value;

use ctxgen_shared::Result;

use crate::{ContentModifier, parse_options};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TrimOptions {
    max_lines: Option<usize>,
    max_chars: Option<usize>,
}

/// `trim`: strip surrounding whitespace, optionally truncating to
/// `maxLines` lines and then `maxChars` characters.
pub struct Trim;

impl ContentModifier for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    fn apply(&self, content: &str, options: &Value) -> Result<String> {
        let opts: TrimOptions = parse_options(self.name(), options)?;
        let mut out = content.trim().to_string();

        if let Some(max) = opts.max_lines {
            out = out.lines().take(max).collect::<Vec<_>>().join("\n");
        }
        if let Some(max) = opts.max_chars {
            if let Some((idx, _)) = out.char_indices().nth(max) {
                out.truncate(idx);
            }
        }
        Ok(out.trim_end().to_string())
    }
}

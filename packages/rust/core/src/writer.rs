//! Output path validation and atomic writes.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use ctxgen_shared::{CtxgenError, Result};

/// Join a document's `outputPath` onto the output root.
///
/// Empty, absolute, and `..`-escaping paths are rejected.
pub fn resolve_output_path(root: &Path, output_path: &str) -> Result<PathBuf> {
    let trimmed = output_path.trim();
    if trimmed.is_empty() {
        return Err(CtxgenError::validation("document has an empty outputPath"));
    }

    let relative = Path::new(trimmed);
    let mut clean = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(CtxgenError::validation(format!(
                    "outputPath '{output_path}' escapes the output directory"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(CtxgenError::validation(format!(
                    "outputPath '{output_path}' must be relative"
                )));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(CtxgenError::validation(format!(
            "outputPath '{output_path}' does not name a file"
        )));
    }
    Ok(root.join(clean))
}

/// Write `content` to `target` through a sibling temp file and a rename.
pub fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| CtxgenError::validation(format!("{} has no parent", target.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| CtxgenError::io(parent, e))?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| CtxgenError::io(&temp, e))?;
    std::fs::rename(&temp, target).map_err(|e| CtxgenError::io(target, e))?;

    debug!(path = %target.display(), size = content.len(), "wrote document");
    Ok(())
}

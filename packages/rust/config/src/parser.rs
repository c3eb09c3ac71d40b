//! Parse one config file into a [`RawConfig`]. No import knowledge here.

use std::path::{Path, PathBuf};

use tracing::debug;

use ctxgen_shared::{CtxgenError, RawConfig, Result};

/// File names probed, in order, when no config file is given explicitly.
pub const ROOT_CONFIG_NAMES: [&str; 4] =
    ["context.yaml", "context.yml", "context.json", "context.toml"];

/// Serialization format of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Infer the format from a file path or URL path.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Locate the default root config in `work_dir`.
pub fn find_root_config(work_dir: &Path) -> Option<PathBuf> {
    ROOT_CONFIG_NAMES
        .iter()
        .map(|name| work_dir.join(name))
        .find(|p| p.is_file())
}

/// Parse config text. With no known format, JSON is tried first, then YAML.
pub fn parse_str(content: &str, format: Option<ConfigFormat>, origin: &str) -> Result<RawConfig> {
    if content.trim().is_empty() {
        debug!(origin, "empty config, nothing declared");
        return Ok(RawConfig::default());
    }

    match format {
        Some(ConfigFormat::Json) => {
            serde_json::from_str(content).map_err(|e| CtxgenError::parse(origin, e.to_string()))
        }
        Some(ConfigFormat::Yaml) => {
            serde_yaml::from_str(content).map_err(|e| CtxgenError::parse(origin, e.to_string()))
        }
        Some(ConfigFormat::Toml) => {
            toml::from_str(content).map_err(|e| CtxgenError::parse(origin, e.to_string()))
        }
        None => serde_json::from_str(content).or_else(|json_err| {
            serde_yaml::from_str(content).map_err(|yaml_err| {
                CtxgenError::parse(
                    origin,
                    format!("not valid JSON ({json_err}) or YAML ({yaml_err})"),
                )
            })
        }),
    }
}

/// Read and parse a config file from disk.
pub fn parse_file(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CtxgenError::io(path, e))?;
    let config = parse_str(
        &content,
        ConfigFormat::from_path(path),
        &path.display().to_string(),
    )?;

    debug!(
        path = %path.display(),
        imports = config.imports.len(),
        documents = config.documents.len(),
        prompts = config.prompts.len(),
        tools = config.tools.len(),
        "parsed config"
    );

    Ok(config)
}

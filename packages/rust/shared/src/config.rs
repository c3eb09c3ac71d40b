//! Application configuration for ctxgen.
//!
//! User config lives at `~/.ctxgen/ctxgen.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CtxgenError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ctxgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ctxgen";

/// Upper bound for the default compile worker count.
const MAX_DEFAULT_CONCURRENCY: usize = 8;

// ---------------------------------------------------------------------------
// Config structs (matching ctxgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// GitHub source settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// GitLab source settings.
    #[serde(default)]
    pub gitlab: GitlabConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output directory for compiled documents, relative to the work dir.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Number of documents compiled concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Timeout applied to every source fetch and URL import.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_output_dir() -> String {
    ".context".into()
}
fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_CONCURRENCY)
}
fn default_fetch_timeout() -> u64 {
    30
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_github_token_env")]
    pub token_env: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token_env: default_github_token_env(),
        }
    }
}

fn default_github_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[gitlab]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitlabConfig {
    /// Name of the env var holding the API token.
    #[serde(default = "default_gitlab_token_env")]
    pub token_env: String,

    /// Server used when a source does not name one.
    #[serde(default = "default_gitlab_server")]
    pub server: String,
}

impl Default for GitlabConfig {
    fn default() -> Self {
        Self {
            token_env: default_gitlab_token_env(),
            server: default_gitlab_server(),
        }
    }
}

fn default_gitlab_token_env() -> String {
    "GITLAB_TOKEN".into()
}
fn default_gitlab_server() -> String {
    "https://gitlab.com".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ctxgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CtxgenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ctxgen/ctxgen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CtxgenError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CtxgenError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CtxgenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CtxgenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CtxgenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a token from the named env var; empty values count as unset.
pub fn token_from_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}

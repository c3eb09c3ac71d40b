//! Environment-derived and predefined variables.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Local;
use tracing::debug;

use ctxgen_shared::{CtxgenError, Result};

use crate::variables::VariableScope;

/// Build the `${KEY}` scope: the process environment with an optional
/// `.env`-style file layered on top. The process environment is not modified.
pub fn load_env_scope(env_file: Option<&Path>) -> Result<VariableScope> {
    let mut vars: BTreeMap<String, String> = std::env::vars().collect();

    if let Some(path) = env_file {
        let iter = dotenv::from_path_iter(path).map_err(|e| {
            CtxgenError::config(format!("failed to read env file {}: {e}", path.display()))
        })?;
        let mut count = 0usize;
        for item in iter {
            let (key, value) = item.map_err(|e| {
                CtxgenError::config(format!("invalid line in env file {}: {e}", path.display()))
            })?;
            vars.insert(key, value);
            count += 1;
        }
        debug!(path = %path.display(), count, "loaded env file");
    }

    Ok(VariableScope::new(vars))
}

/// Predefined variables available to `{{KEY}}` substitution in every document.
pub fn system_variables(work_dir: &Path) -> VariableScope {
    let now = Local::now();
    let mut vars = BTreeMap::new();

    vars.insert("DATETIME".into(), now.format("%Y-%m-%d %H:%M:%S").to_string());
    vars.insert("DATE".into(), now.format("%Y-%m-%d").to_string());
    vars.insert("TIME".into(), now.format("%H:%M:%S").to_string());
    vars.insert("TIMESTAMP".into(), now.timestamp().to_string());
    vars.insert("OS".into(), std::env::consts::OS.to_string());
    vars.insert("ARCH".into(), std::env::consts::ARCH.to_string());
    vars.insert("PWD".into(), work_dir.display().to_string());

    if let Some(user) = std::env::var("USER")
        .ok()
        .or_else(|| std::env::var("USERNAME").ok())
    {
        vars.insert("USER".into(), user);
    }
    if let Some(home) = dirs::home_dir() {
        vars.insert("HOME".into(), home.display().to_string());
    }
    if let Some(host) = hostname() {
        vars.insert("HOSTNAME".into(), host);
    }

    VariableScope::new(vars)
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::env::var("COMPUTERNAME").ok())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|s| s.trim().to_string())
        })
        .filter(|h| !h.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ctxgen-env-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn env_file_overrides_process_env() {
        let tmp = temp_dir();
        let env_path = tmp.join(".env");
        std::fs::write(&env_path, "CTXGEN_TEST_IMPORT_DIR=shared\n# comment\nPATH=from-file\n")
            .unwrap();

        let scope = load_env_scope(Some(&env_path)).unwrap();
        assert_eq!(scope.get("CTXGEN_TEST_IMPORT_DIR"), Some("shared"));
        assert_eq!(scope.get("PATH"), Some("from-file"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_env_file_is_config_error() {
        let err = load_env_scope(Some(Path::new("/nonexistent/ctxgen/.env"))).unwrap_err();
        assert!(err.to_string().contains("failed to read env file"));
    }

    #[test]
    fn system_variables_include_basics() {
        let vars = system_variables(Path::new("/work"));
        assert_eq!(vars.get("PWD"), Some("/work"));
        assert_eq!(vars.get("OS"), Some(std::env::consts::OS));
        assert_eq!(vars.get("DATE").map(str::len), Some(10));
        assert!(vars.get("TIMESTAMP").is_some());
    }
}

//! Shared types, error model, and configuration for ctxgen.
//!
//! This crate is the foundation depended on by all other ctxgen crates.
//! It provides:
//! - [`CtxgenError`] — the unified error type
//! - The config data model ([`RawConfig`], [`Document`], [`Source`], [`Prompt`], [`Tool`])
//! - Application settings ([`AppConfig`], config loading)
//! - Glob matching shared by import expansion and file sources

pub mod config;
pub mod error;
pub mod pattern;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GithubConfig, GitlabConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, token_from_env,
};
pub use error::{CtxgenError, Result};
pub use pattern::{GlobPattern, has_glob_chars};
pub use types::{
    Document, FileSource, GitDiffSource, GithubSource, GitlabSource, ImportDirective,
    ImportFilter, ImportTarget, Message, ModifierRef, Prompt, PromptExtension, PromptKind,
    RawConfig, Source, SourceKind, TagFilter, TextSource, Tool, TreeSource, UrlSource, Warning,
};

//! Core pipeline orchestration for ctxgen.
//!
//! This crate ties together import resolution, prompt flattening, source
//! fetching, and content modifiers into the end-to-end `generate` run.

pub mod cancel;
pub mod compiler;
pub mod errors;
pub mod pipeline;
pub mod report;
pub mod writer;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use compiler::{CompiledDocument, DocumentCompiler};
pub use errors::{ErrorCollector, ErrorEntry};
pub use pipeline::{
    GenerateConfig, LoadedConfig, ProgressReporter, SilentProgress, generate, load_registry,
};
pub use report::{DocumentReport, DocumentStatus, RunReport, RunStatus};

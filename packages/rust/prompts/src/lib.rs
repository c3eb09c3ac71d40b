//! Prompt template inheritance and rendering.
//!
//! - [`flatten`] resolves `extend` chains into standalone prompts
//! - [`render`] fills a flattened prompt's `{{arg}}` tokens from caller arguments

mod flatten;
mod render;

pub use flatten::{ExtendError, flatten};
pub use render::{render, required_arguments};

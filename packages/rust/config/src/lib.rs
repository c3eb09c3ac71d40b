//! Config parsing, variable scoping, and import resolution.
//!
//! - [`parser`] turns one config file into a [`RawConfig`](ctxgen_shared::RawConfig)
//! - [`variables`] holds the immutable [`VariableScope`] and token substitution
//! - [`env`] builds the `${KEY}` scope and the predefined system variables
//! - [`resolver`] walks the import graph into one [`ResolvedRegistry`]

pub mod env;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod variables;

pub use env::{load_env_scope, system_variables};
pub use parser::{ConfigFormat, find_root_config, parse_file, parse_str};
pub use registry::{DocumentOrigin, ResolvedDocument, ResolvedRegistry};
pub use resolver::{ImportResolver, ResolverOptions};
pub use variables::VariableScope;

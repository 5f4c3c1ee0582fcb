//! Configuration and document loading.
//!
//! This module handles:
//! - Parsing the optional `schemaplan.yaml` tool configuration
//! - Loading schema, value and state documents
//! - Computing content hashes for schemas, values and set elements

mod hash;
mod loader;
mod parser;
mod spec;

pub use hash::ContentHasher;
pub use loader::{DocumentFormat, SchemaLoader};
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file, user_config_file};
pub use spec::{PlanConfig, StateConfig, ToolConfig};

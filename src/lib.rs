// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Schemaplan
//!
//! A schema-driven state reconciliation engine for resource providers.
//!
//! ## Overview
//!
//! Given a resource schema, the configuration a user wrote and the state
//! recorded for the resource, schemaplan computes:
//!
//! - The structural type a schema implies, and the empty value of that type
//! - The configuration coerced to conform to the schema
//! - The proposed new object, merging configuration with prior state
//! - The legacy flat diff between prior and planned state
//! - The change descriptor handed to core, with its replace paths
//!
//! ## Architecture
//!
//! Planning follows **desired state reconciliation**:
//!
//! 1. **Desired State**: the configuration value
//! 2. **Recorded State**: the flatmap instance state in the state store
//! 3. **Planner**: proposes, diffs and runs customization hooks
//! 4. **Executor**: re-plans at apply time and rejects drifted diffs
//!
//! ## Modules
//!
//! - [`value`]: Dynamic values, types and paths
//! - [`schema`]: Schema model, implied types and coercion
//! - [`legacy`]: Flatmap encoding, flat diffs and instance state
//! - [`planner`]: Proposed values, change descriptors, plans and apply
//! - [`wire`]: Provider protocol schema messages
//! - [`state`]: State storage with locking
//! - [`config`]: Tool configuration and document loading
//! - [`reconciler`]: Planning and applying against stored state
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! attributes:
//!   id:
//!     type: string
//!     computed: true
//!   name:
//!     type: string
//!     required: true
//! block_types:
//!   rule:
//!     nesting: set
//!     block:
//!       attributes:
//!         cidr:
//!           type: string
//!           required: true
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod legacy;
pub mod planner;
pub mod reconciler;
pub mod schema;
pub mod state;
pub mod value;
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ContentHasher, SchemaLoader, ToolConfig};
pub use error::{Result, SchemaPlanError};
pub use legacy::{InstanceDiff, InstanceState, ResourceAttrDiff};
pub use planner::{
    Action, Change, CustomizeDiffFn, PlanExecutor, Planner, ResourceDiffBuilder, ResourcePlan,
    proposed_new_object,
};
pub use reconciler::{DriftReport, Reconciler};
pub use schema::{Attribute, Block, NestedBlock, NestingMode, SchemaValidator};
pub use state::{LocalStateStore, StateFile, StateStore};
pub use value::{Path, Type, Value};

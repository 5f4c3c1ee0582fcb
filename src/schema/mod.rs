//! Schema model for resources.
//!
//! This module provides:
//! - Block, attribute and nested-block types
//! - Implied types and empty values
//! - Coercion of values to a block's implied type
//! - Path-indexed lookup and internal validation

mod block;
mod coerce;
mod implied;
mod lookup;
mod validator;

pub use block::{Attribute, Block, NestedBlock, NestingMode, StringKind};
pub use validator::{SchemaValidator, ValidationError, ValidationResult};

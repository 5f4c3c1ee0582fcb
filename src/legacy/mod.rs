//! Legacy flat diff model.
//!
//! This module handles the string-keyed representation of resource state
//! that predates structural values:
//! - Flatmap encoding and decoding of values
//! - Attribute diffs, their compatibility check and application
//! - Instance state and merging a diff onto it
//! - Mapping flat keys that force replacement to value paths

mod diff;
mod flatmap;
mod replace;
mod state;

pub use diff::{DiffAttrType, DiffChangeType, InstanceDiff, ResourceAttrDiff};
pub use flatmap::{
    FlatMap, attribute_for_key, block_value_from_flatmap, count_flatmap_container_values,
    flatmap_at, flatmap_from_block_value, flatmap_from_value, is_container_count, set_element_key,
    type_for_key, value_from_flatmap,
};
pub use replace::requires_replace;
pub use state::{InstanceState, SCHEMA_VERSION_KEY};

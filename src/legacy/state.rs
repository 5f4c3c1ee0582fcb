//! Flatmap state of one resource instance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::diff::InstanceDiff;
use super::flatmap::{FlatMap, block_value_from_flatmap, flatmap_from_block_value};
use crate::error::FlatmapError;
use crate::schema::Block;
use crate::value::{UNKNOWN_VALUE, Value};

/// Meta key holding the schema version the attributes were written with.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Recorded state of one resource instance in flatmap form.
///
/// Only replaced wholesale with [`InstanceState::set`] or derived with
/// [`InstanceState::merge_diff`]; attributes are never edited in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceState {
    /// Provider-assigned identifier; empty until created.
    #[serde(default)]
    pub id: String,
    /// Flat attributes.
    #[serde(default)]
    pub attributes: FlatMap,
    /// Opaque provider metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// The instance failed part-way through creation and must be replaced.
    #[serde(default)]
    pub tainted: bool,
}

impl InstanceState {
    /// Creates a state from a structural value of `block`.
    ///
    /// The identifier is taken from the `id` attribute when present.
    #[must_use]
    pub fn from_value(block: &Block, value: &Value, schema_version: u64) -> Self {
        let attributes = flatmap_from_block_value(value, block);
        let id = attributes
            .get("id")
            .filter(|id| id.as_str() != UNKNOWN_VALUE)
            .cloned()
            .unwrap_or_default();

        let mut meta = BTreeMap::new();
        meta.insert(
            SCHEMA_VERSION_KEY.to_string(),
            serde_json::Value::from(schema_version.to_string()),
        );

        Self {
            id,
            attributes,
            meta,
            tainted: false,
        }
    }

    /// Decodes the attributes as a value of `block`.
    ///
    /// # Errors
    ///
    /// Returns an error if the attributes do not match the schema.
    pub fn to_value(&self, block: &Block) -> Result<Value, FlatmapError> {
        block_value_from_flatmap(&self.attributes, block)
    }

    /// Returns the schema version recorded in meta, defaulting to 0.
    #[must_use]
    pub fn schema_version(&self) -> u64 {
        match self.meta.get(SCHEMA_VERSION_KEY) {
            Some(serde_json::Value::String(s)) => s.parse().unwrap_or(0),
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0),
            _ => 0,
        }
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.attributes.is_empty()
    }

    /// Replaces this state with `other`.
    pub fn set(&mut self, other: Self) {
        *self = other;
    }

    /// Returns a copy of this state with `diff` applied.
    ///
    /// Removed attributes are deleted, computed attributes are set to the
    /// unknown placeholder, and every other entry takes its new value.
    #[must_use]
    pub fn merge_diff(&self, diff: &InstanceDiff) -> Self {
        let mut result = self.clone();
        for (key, attr) in &diff.attributes {
            if attr.new_removed {
                result.attributes.remove(key);
            } else if attr.new_computed {
                result
                    .attributes
                    .insert(key.clone(), UNKNOWN_VALUE.to_string());
            } else {
                result.attributes.insert(key.clone(), attr.new.clone());
            }
        }
        result
    }
}

//! Schema types describing the shape of a resource.
//!
//! These map directly to the YAML/JSON schema documents read by
//! [`SchemaLoader`](crate::config::SchemaLoader).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::Type;

/// A schema node: typed attributes plus nested block types.
///
/// Attribute names and block-type names share one namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested block types by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub block_types: BTreeMap<String, NestedBlock>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Format of the description.
    #[serde(default)]
    pub description_kind: StringKind,
    /// Whether the block is deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

/// A typed leaf of a schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attribute {
    /// Structural type of the attribute.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Must be set in configuration.
    #[serde(default)]
    pub required: bool,
    /// May be set in configuration.
    #[serde(default)]
    pub optional: bool,
    /// Assigned by the provider when not configured.
    #[serde(default)]
    pub computed: bool,
    /// Value must be hidden from output.
    #[serde(default)]
    pub sensitive: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Format of the description.
    #[serde(default)]
    pub description_kind: StringKind,
    /// Whether the attribute is deprecated.
    #[serde(default)]
    pub deprecated: bool,
}

/// A nested block type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NestedBlock {
    /// Multiplicity and container shape of the block.
    pub nesting: NestingMode,
    /// Schema of each block instance.
    #[serde(default)]
    pub block: Block,
    /// Minimum number of instances, zero for no limit.
    #[serde(default)]
    pub min_items: u64,
    /// Maximum number of instances, zero for no limit.
    #[serde(default)]
    pub max_items: u64,
}

/// Nesting mode of a nested block type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NestingMode {
    /// At most one instance; absent is null.
    Single,
    /// Exactly one instance; absent is an empty object.
    Group,
    /// Ordered sequence of instances.
    List,
    /// Unordered collection of distinct instances.
    Set,
    /// Instances keyed by label.
    Map,
}

/// Format of a description string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StringKind {
    /// Plain text.
    #[default]
    Plain,
    /// Markdown.
    Markdown,
}

impl Block {
    /// Creates an empty block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Adds a nested block type.
    #[must_use]
    pub fn with_block_type(mut self, name: impl Into<String>, nested: NestedBlock) -> Self {
        self.block_types.insert(name.into(), nested);
        self
    }

    /// Returns true if any attribute at any depth is sensitive.
    #[must_use]
    pub fn contains_sensitive(&self) -> bool {
        self.attributes.values().any(|a| a.sensitive)
            || self
                .block_types
                .values()
                .any(|nb| nb.block.contains_sensitive())
    }
}

impl Attribute {
    fn with_flags(ty: Type, required: bool, optional: bool, computed: bool) -> Self {
        Self {
            ty,
            required,
            optional,
            computed,
            sensitive: false,
            description: String::new(),
            description_kind: StringKind::Plain,
            deprecated: false,
        }
    }

    /// A required attribute.
    #[must_use]
    pub fn required(ty: Type) -> Self {
        Self::with_flags(ty, true, false, false)
    }

    /// An optional attribute.
    #[must_use]
    pub fn optional(ty: Type) -> Self {
        Self::with_flags(ty, false, true, false)
    }

    /// A computed attribute.
    #[must_use]
    pub fn computed(ty: Type) -> Self {
        Self::with_flags(ty, false, false, true)
    }

    /// An optional attribute the provider fills in when unset.
    #[must_use]
    pub fn optional_computed(ty: Type) -> Self {
        Self::with_flags(ty, false, true, true)
    }

    /// Marks the attribute sensitive.
    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl NestedBlock {
    /// Creates a nested block type without item limits.
    #[must_use]
    pub const fn new(nesting: NestingMode, block: Block) -> Self {
        Self {
            nesting,
            block,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Sets the item limits.
    #[must_use]
    pub const fn with_items(mut self, min_items: u64, max_items: u64) -> Self {
        self.min_items = min_items;
        self.max_items = max_items;
        self
    }
}

impl std::fmt::Display for NestingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Group => write!(f, "group"),
            Self::List => write!(f, "list"),
            Self::Set => write!(f, "set"),
            Self::Map => write!(f, "map"),
        }
    }
}

//! Protocol message types.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A versioned resource schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema version of the resource.
    pub version: i64,
    /// Root block.
    pub block: Option<Block>,
}

/// A schema block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block version.
    pub version: i64,
    /// Attributes, sorted by name.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Nested block types, sorted by name.
    #[serde(default)]
    pub block_types: Vec<NestedBlock>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Description format.
    #[serde(default)]
    pub description_kind: StringKind,
    /// Deprecation flag.
    #[serde(default)]
    pub deprecated: bool,
}

/// A schema attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// JSON-encoded type.
    #[serde(rename = "type", serialize_with = "bytes_as_str", deserialize_with = "str_as_bytes")]
    pub type_: Vec<u8>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Must be configured.
    #[serde(default)]
    pub required: bool,
    /// May be configured.
    #[serde(default)]
    pub optional: bool,
    /// Provider-assigned.
    #[serde(default)]
    pub computed: bool,
    /// Hidden from output.
    #[serde(default)]
    pub sensitive: bool,
    /// Description format.
    #[serde(default)]
    pub description_kind: StringKind,
    /// Deprecation flag.
    #[serde(default)]
    pub deprecated: bool,
}

/// A nested block type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Block type name.
    pub type_name: String,
    /// Block schema.
    pub block: Option<Block>,
    /// Raw [`NestingMode`] value.
    pub nesting: i32,
    /// Minimum number of instances.
    #[serde(default)]
    pub min_items: i64,
    /// Maximum number of instances.
    #[serde(default)]
    pub max_items: i64,
}

/// Nesting modes as numbered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum NestingMode {
    /// Unset.
    Invalid = 0,
    /// Single.
    Single = 1,
    /// List.
    List = 2,
    /// Set.
    Set = 3,
    /// Map.
    Map = 4,
    /// Group.
    Group = 5,
}

/// Description formats as numbered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringKind {
    /// Plain text.
    #[default]
    Plain = 0,
    /// Markdown.
    Markdown = 1,
}

impl NestingMode {
    /// Decodes a raw value, mapping unknown values to `Invalid`.
    #[must_use]
    pub const fn from_i32(value: i32) -> Self {
        match value {
            1 => Self::Single,
            2 => Self::List,
            3 => Self::Set,
            4 => Self::Map,
            5 => Self::Group,
            _ => Self::Invalid,
        }
    }
}

fn bytes_as_str<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

fn str_as_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    Ok(s.into_bytes())
}

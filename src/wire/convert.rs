//! Conversion between schema blocks and protocol messages.

use std::collections::BTreeMap;

use tracing::debug;

use super::proto;
use crate::error::WireError;
use crate::schema::{Attribute, Block, NestedBlock, NestingMode, StringKind};
use crate::value::Type;

const fn kind_to_proto(kind: StringKind) -> proto::StringKind {
    match kind {
        StringKind::Plain => proto::StringKind::Plain,
        StringKind::Markdown => proto::StringKind::Markdown,
    }
}

const fn kind_from_proto(kind: proto::StringKind) -> StringKind {
    match kind {
        proto::StringKind::Plain => StringKind::Plain,
        proto::StringKind::Markdown => StringKind::Markdown,
    }
}

const fn nesting_to_proto(nesting: NestingMode) -> proto::NestingMode {
    match nesting {
        NestingMode::Single => proto::NestingMode::Single,
        NestingMode::Group => proto::NestingMode::Group,
        NestingMode::List => proto::NestingMode::List,
        NestingMode::Set => proto::NestingMode::Set,
        NestingMode::Map => proto::NestingMode::Map,
    }
}

fn count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn uncount(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// Encodes a schema with its version.
#[must_use]
pub fn schema_to_proto(block: &Block, version: i64) -> proto::Schema {
    proto::Schema {
        version,
        block: Some(block_to_proto(block)),
    }
}

/// Decodes a schema, returning the block and its version.
///
/// # Errors
///
/// Returns an error if the block is malformed.
pub fn proto_to_schema(schema: &proto::Schema) -> Result<(Block, i64), WireError> {
    let block = match &schema.block {
        Some(block) => proto_to_block(block)?,
        None => Block::new(),
    };
    Ok((block, schema.version))
}

/// Encodes a block. Attributes and block types are emitted in name order.
#[must_use]
pub fn block_to_proto(block: &Block) -> proto::Block {
    let attributes = block
        .attributes
        .iter()
        .map(|(name, attr)| proto::Attribute {
            name: name.clone(),
            type_: attr.ty.to_json().to_string().into_bytes(),
            description: attr.description.clone(),
            required: attr.required,
            optional: attr.optional,
            computed: attr.computed,
            sensitive: attr.sensitive,
            description_kind: kind_to_proto(attr.description_kind),
            deprecated: attr.deprecated,
        })
        .collect();

    let block_types = block
        .block_types
        .iter()
        .map(|(name, nested)| proto::NestedBlock {
            type_name: name.clone(),
            block: Some(block_to_proto(&nested.block)),
            nesting: nesting_to_proto(nested.nesting) as i32,
            min_items: count(nested.min_items),
            max_items: count(nested.max_items),
        })
        .collect();

    proto::Block {
        version: 0,
        attributes,
        block_types,
        description: block.description.clone(),
        description_kind: kind_to_proto(block.description_kind),
        deprecated: block.deprecated,
    }
}

/// Decodes a block.
///
/// # Errors
///
/// Returns an error if an attribute type cannot be decoded or a nested
/// block has an invalid nesting mode.
pub fn proto_to_block(block: &proto::Block) -> Result<Block, WireError> {
    let mut attributes = BTreeMap::new();
    for attr in &block.attributes {
        let invalid = |message: String| WireError::InvalidType {
            attribute: attr.name.clone(),
            message,
        };
        let json: serde_json::Value =
            serde_json::from_slice(&attr.type_).map_err(|e| invalid(e.to_string()))?;
        let ty = Type::from_json(&json).map_err(|e| invalid(e.to_string()))?;

        attributes.insert(
            attr.name.clone(),
            Attribute {
                ty,
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description: attr.description.clone(),
                description_kind: kind_from_proto(attr.description_kind),
                deprecated: attr.deprecated,
            },
        );
    }

    let mut block_types = BTreeMap::new();
    for nested in &block.block_types {
        let nesting = match proto::NestingMode::from_i32(nested.nesting) {
            proto::NestingMode::Single => NestingMode::Single,
            proto::NestingMode::Group => NestingMode::Group,
            proto::NestingMode::List => NestingMode::List,
            proto::NestingMode::Set => NestingMode::Set,
            proto::NestingMode::Map => NestingMode::Map,
            proto::NestingMode::Invalid => {
                return Err(WireError::InvalidNesting {
                    block: nested.type_name.clone(),
                    value: nested.nesting,
                });
            }
        };
        let inner = match &nested.block {
            Some(inner) => proto_to_block(inner)?,
            None => Block::new(),
        };
        block_types.insert(
            nested.type_name.clone(),
            NestedBlock {
                nesting,
                block: inner,
                min_items: uncount(nested.min_items),
                max_items: uncount(nested.max_items),
            },
        );
    }

    debug!(
        "Decoded wire block with {} attributes and {} block types",
        attributes.len(),
        block_types.len()
    );

    Ok(Block {
        attributes,
        block_types,
        description: block.description.clone(),
        description_kind: kind_from_proto(block.description_kind),
        deprecated: block.deprecated,
    })
}

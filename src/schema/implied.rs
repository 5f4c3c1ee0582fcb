//! Implied types and empty values of schema blocks.
//!
//! Both functions are total. An inconsistent schema (for example an
//! attribute and a block type sharing a name) still yields a usable result;
//! [`SchemaValidator`](super::SchemaValidator) reports the inconsistency.

use std::collections::BTreeMap;

use tracing::warn;

use super::{Block, NestedBlock, NestingMode};
use crate::value::{Type, Value};

impl Block {
    /// Returns the object type a value conforming to this block has.
    #[must_use]
    pub fn implied_type(&self) -> Type {
        let mut attrs: BTreeMap<String, Type> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.ty.clone()))
            .collect();

        for (name, nested) in &self.block_types {
            if attrs.contains_key(name) {
                warn!("Block type {} collides with an attribute, ignoring the block", name);
                continue;
            }
            attrs.insert(name.clone(), nested.implied_type());
        }

        Type::Object(attrs)
    }

    /// Returns the value representing "nothing configured" for this block.
    #[must_use]
    pub fn empty_value(&self) -> Value {
        let mut attrs: BTreeMap<String, Value> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), Value::Null(attr.ty.clone())))
            .collect();

        for (name, nested) in &self.block_types {
            if attrs.contains_key(name) {
                continue;
            }
            attrs.insert(name.clone(), nested.empty_value());
        }

        Value::Object(attrs)
    }
}

impl NestedBlock {
    /// Returns the type of this block type's slot in the parent object.
    ///
    /// Collections whose element type contains `Dynamic` cannot be
    /// homogeneous, so list, set and map nesting all degrade to `Dynamic`.
    /// Their values are then tuples for lists and sets (sets still drop
    /// duplicate elements) and plain objects for maps, so the value-level
    /// type of a dynamic map block is an object type.
    #[must_use]
    pub fn implied_type(&self) -> Type {
        let inner = self.block.implied_type();
        match self.nesting {
            NestingMode::Single | NestingMode::Group => inner,
            NestingMode::List | NestingMode::Set | NestingMode::Map
                if inner.has_dynamic_types() =>
            {
                Type::Dynamic
            }
            NestingMode::List => Type::list(inner),
            NestingMode::Set => Type::set(inner),
            NestingMode::Map => Type::map(inner),
        }
    }

    /// Returns the empty value of this block type's slot in the parent object.
    #[must_use]
    pub fn empty_value(&self) -> Value {
        let inner = self.block.implied_type();
        let dynamic = inner.has_dynamic_types();
        match self.nesting {
            NestingMode::Single => Value::Null(inner),
            NestingMode::Group => self.block.empty_value(),
            NestingMode::List | NestingMode::Set if dynamic => Value::Tuple(Vec::new()),
            NestingMode::Map if dynamic => Value::empty_object(),
            NestingMode::List => Value::List(inner, Vec::new()),
            NestingMode::Set => Value::Set(inner, Vec::new()),
            NestingMode::Map => Value::Map(inner, BTreeMap::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;

    fn nested(nesting: NestingMode, block: Block) -> NestedBlock {
        NestedBlock::new(nesting, block)
    }

    fn leaf() -> Block {
        Block::new().with_attribute("name", Attribute::optional(Type::String))
    }

    #[test]
    fn test_implied_type_per_nesting_mode() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_block_type("single", nested(NestingMode::Single, leaf()))
            .with_block_type("group", nested(NestingMode::Group, leaf()))
            .with_block_type("list", nested(NestingMode::List, leaf()))
            .with_block_type("set", nested(NestingMode::Set, leaf()))
            .with_block_type("map", nested(NestingMode::Map, leaf()));

        let obj = Type::object([("name", Type::String)]);
        assert_eq!(
            block.implied_type(),
            Type::object([
                ("id", Type::String),
                ("single", obj.clone()),
                ("group", obj.clone()),
                ("list", Type::list(obj.clone())),
                ("set", Type::set(obj.clone())),
                ("map", Type::map(obj)),
            ])
        );
    }

    #[test]
    fn test_dynamic_collections_degrade() {
        let dynamic_leaf = Block::new().with_attribute("any", Attribute::optional(Type::Dynamic));
        let block = Block::new()
            .with_block_type("list", nested(NestingMode::List, dynamic_leaf.clone()))
            .with_block_type("set", nested(NestingMode::Set, dynamic_leaf.clone()))
            .with_block_type("map", nested(NestingMode::Map, dynamic_leaf));

        assert_eq!(
            block.implied_type(),
            Type::object([
                ("list", Type::Dynamic),
                ("map", Type::Dynamic),
                ("set", Type::Dynamic),
            ])
        );
        assert_eq!(
            block.empty_value(),
            Value::object([
                ("list", Value::Tuple(Vec::new())),
                ("map", Value::empty_object()),
                ("set", Value::Tuple(Vec::new())),
            ])
        );
    }

    #[test]
    fn test_empty_value_per_nesting_mode() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_block_type("single", nested(NestingMode::Single, leaf()))
            .with_block_type("group", nested(NestingMode::Group, leaf()))
            .with_block_type("list", nested(NestingMode::List, leaf()));

        let obj = Type::object([("name", Type::String)]);
        let empty = block.empty_value();
        assert_eq!(empty.get_attr("id"), Some(&Value::null(Type::String)));
        assert_eq!(empty.get_attr("single"), Some(&Value::null(obj.clone())));
        assert_eq!(
            empty.get_attr("group"),
            Some(&Value::object([("name", Value::null(Type::String))]))
        );
        assert_eq!(empty.get_attr("list"), Some(&Value::list(obj, Vec::new())));
        assert!(empty.ty().conforms(&block.implied_type()));
    }

    #[test]
    fn test_collision_prefers_attribute() {
        let block = Block::new()
            .with_attribute("x", Attribute::optional(Type::String))
            .with_block_type("x", nested(NestingMode::List, leaf()));
        assert_eq!(block.implied_type(), Type::object([("x", Type::String)]));
        assert_eq!(
            block.empty_value(),
            Value::object([("x", Value::null(Type::String))])
        );
    }
}

//! Coercion of arbitrary values to a block's implied type.

use std::collections::BTreeMap;

use tracing::debug;

use super::{Block, NestedBlock, NestingMode};
use crate::error::SchemaError;
use crate::value::{Path, Type, Value, convert, index_of};

impl Block {
    /// Forces `value` to conform to this block's implied type.
    ///
    /// The attribute set is closed: undeclared attributes are rejected and
    /// required attributes must be present. Every error carries the path of
    /// the offending attribute, index or key.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Coerce`] for the first problem found.
    pub fn coerce_value(&self, value: &Value) -> Result<Value, SchemaError> {
        self.coerce_at(value, &Path::root())
    }

    fn coerce_at(&self, value: &Value, path: &Path) -> Result<Value, SchemaError> {
        match value {
            Value::Null(_) => return Ok(Value::Null(self.implied_type())),
            Value::Unknown(_) => return Ok(Value::Unknown(self.implied_type())),
            _ => {}
        }

        let Some(entries) = value.entries() else {
            return Err(SchemaError::coerce(path, "an object is required"));
        };

        if let Some(name) = entries
            .keys()
            .find(|k| !self.attributes.contains_key(*k) && !self.block_types.contains_key(*k))
        {
            return Err(SchemaError::coerce(
                path,
                format!("unexpected attribute {name:?}"),
            ));
        }

        let mut out = BTreeMap::new();

        for (name, attr) in &self.attributes {
            let coerced = match entries.get(name) {
                Some(given) => convert(given, &attr.ty, &path.get_attr(name.as_str()))?,
                None if attr.required => {
                    return Err(SchemaError::coerce(
                        path,
                        format!("attribute {name:?} is required"),
                    ));
                }
                None => Value::Null(attr.ty.clone()),
            };
            out.insert(name.clone(), coerced);
        }

        for (name, nested) in &self.block_types {
            if out.contains_key(name) {
                continue;
            }
            let given = entries.get(name).cloned().unwrap_or(Value::Null(Type::Dynamic));
            let coerced = nested.coerce_at(name, &given, &path.get_attr(name.as_str()))?;
            out.insert(name.clone(), coerced);
        }

        Ok(Value::Object(out))
    }
}

impl NestedBlock {
    fn coerce_at(&self, name: &str, value: &Value, path: &Path) -> Result<Value, SchemaError> {
        if let Value::Unknown(_) = value {
            return Ok(Value::Unknown(self.implied_type()));
        }

        match self.nesting {
            NestingMode::Single => self.block.coerce_at(value, path),
            NestingMode::Group if value.is_null() => Ok(self.block.empty_value()),
            NestingMode::Group => self.block.coerce_at(value, path),
            _ if value.is_null() => Ok(self.empty_value()),
            NestingMode::List => {
                let elems = self.coerce_elements(value, path, "a list is required")?;
                let inner = self.block.implied_type();
                if inner.has_dynamic_types() {
                    Ok(Value::Tuple(elems))
                } else {
                    Ok(Value::List(inner, elems))
                }
            }
            NestingMode::Set => {
                let elems = self.coerce_elements(value, path, "a set is required")?;
                let inner = self.block.implied_type();
                if inner.has_dynamic_types() {
                    Ok(Value::Tuple(Value::set_elements(elems)))
                } else {
                    Ok(Value::set(inner, elems))
                }
            }
            NestingMode::Map => {
                let Some(entries) = value.entries() else {
                    return Err(SchemaError::coerce(path, "a map is required"));
                };
                let mut elems = BTreeMap::new();
                for (key, item) in entries {
                    let coerced = self.block.coerce_at(item, &path.key(key.as_str()))?;
                    elems.insert(key.clone(), coerced);
                }

                let inner = self.block.implied_type();
                if inner.has_dynamic_types() || elems.values().any(|v| v.ty() != inner) {
                    debug!("Map block {} holds heterogeneous values, using an object", name);
                    Ok(Value::Object(elems))
                } else {
                    Ok(Value::Map(inner, elems))
                }
            }
        }
    }

    fn coerce_elements(
        &self,
        value: &Value,
        path: &Path,
        message: &str,
    ) -> Result<Vec<Value>, SchemaError> {
        let Some(items) = value.elements() else {
            return Err(SchemaError::coerce(path, message));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.block.coerce_at(item, &path.index(index_of(i))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    fn leaf() -> Block {
        Block::new()
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("port", Attribute::optional(Type::Number))
    }

    fn schema() -> Block {
        Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("region", Attribute::optional(Type::String))
            .with_block_type("single", NestedBlock::new(NestingMode::Single, leaf()))
            .with_block_type("group", NestedBlock::new(NestingMode::Group, leaf()))
            .with_block_type("list", NestedBlock::new(NestingMode::List, leaf()))
            .with_block_type("set", NestedBlock::new(NestingMode::Set, leaf()))
            .with_block_type("map", NestedBlock::new(NestingMode::Map, leaf()))
            .with_block_type(
                "any",
                NestedBlock::new(
                    NestingMode::List,
                    Block::new().with_attribute("v", Attribute::optional(Type::Dynamic)),
                ),
            )
    }

    #[test]
    fn test_empty_value_round_trip() {
        let block = schema();
        let empty = block.empty_value();
        let coerced = block.coerce_value(&empty).expect("coerce empty value");
        assert_eq!(coerced, empty);
        assert!(coerced.ty().conforms(&block.implied_type()));
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let block = schema();
        let input = Value::from_json_inferred(&json!({
            "region": "eu-west-1",
            "single": {"name": "a", "port": "80"},
            "list": [{"name": "b"}, {"name": "c", "port": 443}],
            "set": [{"name": "d"}, {"name": "d"}],
            "map": {"x": {"name": "e"}},
            "any": [{"v": 1}, {"v": "two"}],
        }));

        let once = block.coerce_value(&input).expect("first coercion");
        let twice = block.coerce_value(&once).expect("second coercion");
        assert_eq!(once, twice);
        assert!(once.ty().conforms(&block.implied_type()));

        let port = once.get_path(&Path::root().get_attr("single").get_attr("port"));
        assert_eq!(port, Some(&Value::number(80)));
        assert_eq!(once.get_attr("set").and_then(Value::length), Some(1));
        assert!(matches!(once.get_attr("any"), Some(Value::Tuple(items)) if items.len() == 2));
    }

    fn dynamic(nesting: NestingMode) -> Block {
        Block::new().with_block_type(
            "item",
            NestedBlock::new(
                nesting,
                Block::new().with_attribute("v", Attribute::optional(Type::Dynamic)),
            ),
        )
    }

    #[test]
    fn test_dynamic_set_deduplicates() {
        let block = dynamic(NestingMode::Set);
        let input = Value::from_json_inferred(&json!({
            "item": [{"v": "b"}, {"v": "a"}, {"v": "b"}],
        }));

        let once = block.coerce_value(&input).expect("first coercion");
        let item = once.get_attr("item").expect("item");
        assert!(matches!(item, Value::Tuple(items) if items.len() == 2));
        assert_eq!(block.coerce_value(&once).expect("second coercion"), once);
    }

    #[test]
    fn test_dynamic_set_keeps_unknown_elements() {
        let block = dynamic(NestingMode::Set);
        let unknown = Value::object([("v", Value::unknown(Type::Dynamic))]);
        let input = Value::object([("item", Value::Tuple(vec![unknown.clone(), unknown]))]);

        let coerced = block.coerce_value(&input).expect("coerce");
        assert_eq!(coerced.get_attr("item").and_then(Value::length), Some(2));
    }

    #[test]
    fn test_dynamic_map_widens_to_object() {
        let block = dynamic(NestingMode::Map);
        let input = Value::from_json_inferred(&json!({
            "item": {"a": {"v": 1}, "b": {"v": ["x", true]}},
        }));

        let once = block.coerce_value(&input).expect("first coercion");
        let Some(Value::Object(entries)) = once.get_attr("item") else {
            panic!("expected an object, got {:?}", once.get_attr("item"));
        };
        assert_eq!(entries["a"], Value::object([("v", Value::number(1))]));
        assert_eq!(
            entries["b"].get_attr("v"),
            Some(&Value::Tuple(vec![Value::string("x"), Value::Bool(true)]))
        );
        assert_eq!(block.coerce_value(&once).expect("second coercion"), once);
        assert!(once.ty().conforms(&block.implied_type()));
    }

    #[test]
    fn test_homogeneous_map_stays_a_map() {
        let input = Value::from_json_inferred(&json!({"map": {"x": {"name": "e"}}}));
        let coerced = schema().coerce_value(&input).expect("coerce");
        assert!(matches!(coerced.get_attr("map"), Some(Value::Map(_, entries)) if entries.len() == 1));
    }

    #[test]
    fn test_null_and_unknown_input() {
        let block = schema();
        assert_eq!(
            block.coerce_value(&Value::null(Type::Dynamic)).expect("null"),
            Value::null(block.implied_type())
        );
        assert_eq!(
            block.coerce_value(&Value::unknown(Type::Dynamic)).expect("unknown"),
            Value::unknown(block.implied_type())
        );
    }

    #[test]
    fn test_missing_blocks_take_empty_shapes() {
        let block = schema();
        let coerced = block
            .coerce_value(&Value::empty_object())
            .expect("coerce empty object");
        assert_eq!(coerced, block.empty_value());
    }

    #[test]
    fn test_unexpected_attribute() {
        let err = schema()
            .coerce_value(&Value::from_json_inferred(&json!({"bogus": true})))
            .expect_err("closed attribute set");
        assert_eq!(err.to_string(), r#"unexpected attribute "bogus""#);
    }

    #[test]
    fn test_required_attribute_path() {
        let err = schema()
            .coerce_value(&Value::from_json_inferred(&json!({"list": [{"port": 1}]})))
            .expect_err("name is required");
        assert_eq!(err.to_string(), r#".list[0]: attribute "name" is required"#);
    }

    #[test]
    fn test_wrong_container_shape() {
        let err = schema()
            .coerce_value(&Value::from_json_inferred(&json!({"list": {"name": "x"}})))
            .expect_err("list required");
        assert_eq!(err.to_string(), ".list: a list is required");

        let err = schema()
            .coerce_value(&Value::from_json_inferred(&json!({"map": [1]})))
            .expect_err("map required");
        assert_eq!(err.to_string(), ".map: a map is required");
    }

    #[test]
    fn test_map_key_path_in_errors() {
        let err = schema()
            .coerce_value(&Value::from_json_inferred(
                &json!({"map": {"k": {"name": "x", "port": "http"}}}),
            ))
            .expect_err("bad port");
        assert_eq!(err.to_string(), r#".map["k"].port: a number is required"#);
    }
}

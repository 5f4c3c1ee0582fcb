//! Flatmap encoding of structural values.
//!
//! A flatmap is a string-to-string map with dotted keys:
//!
//! - `name` for a top-level primitive attribute
//! - `ports.#` for the count of a list or set, `ports.0` for a list element
//! - `rule.1234567` for a set element keyed by its content hash, or
//!   `rule.~1234567` when the element is not yet wholly known
//! - `tags.%` for the count of a map, `tags.env` for a map entry
//!
//! Null values are omitted. Unknown primitives and unknown collection
//! counts are written as [`UNKNOWN_VALUE`]. A value whose declared type is
//! `Dynamic` has no fixed key layout, so it is stored whole as its JSON
//! encoding under its own key.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ContentHasher;
use crate::error::FlatmapError;
use crate::schema::{Attribute, Block, NestedBlock, NestingMode};
use crate::value::{Type, UNKNOWN_VALUE, Value, convert, Path};

/// A flat attribute map.
pub type FlatMap = BTreeMap<String, String>;

/// Flattens an object value into a flatmap.
#[must_use]
pub fn flatmap_from_value(value: &Value) -> FlatMap {
    let mut out = FlatMap::new();
    write_value(&mut out, "", value);
    out
}

/// Flattens a value of `block`, following its declared attribute types and
/// nesting modes. This is the inverse of [`block_value_from_flatmap`].
#[must_use]
pub fn flatmap_from_block_value(value: &Value, block: &Block) -> FlatMap {
    let mut out = FlatMap::new();
    write_block(&mut out, "", value, block);
    out
}

/// Flattens `value`, declared as `ty`, as the content of `key`.
#[must_use]
pub fn flatmap_at(key: &str, value: &Value, ty: &Type) -> FlatMap {
    let mut out = FlatMap::new();
    write_typed(&mut out, key, value, ty);
    out
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn write_value(out: &mut FlatMap, key: &str, value: &Value) {
    match value {
        Value::Null(_) => {}
        Value::Unknown(ty) => write_unknown(out, key, ty),
        Value::Bool(b) => {
            out.insert(key.to_string(), b.to_string());
        }
        Value::Number(n) => {
            out.insert(key.to_string(), n.to_string());
        }
        Value::String(s) => {
            out.insert(key.to_string(), s.clone());
        }
        Value::List(_, items) | Value::Tuple(items) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                write_value(out, &join(key, &i.to_string()), item);
            }
        }
        Value::Set(_, items) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (ordinal, item) in items.iter().enumerate() {
                write_value(out, &join(key, &set_element_key(item, ordinal)), item);
            }
        }
        Value::Map(_, entries) => {
            out.insert(join(key, "%"), entries.len().to_string());
            for (k, item) in entries {
                write_value(out, &join(key, k), item);
            }
        }
        Value::Object(attrs) => {
            for (name, item) in attrs {
                write_value(out, &join(key, name), item);
            }
        }
    }
}

fn write_block(out: &mut FlatMap, prefix: &str, value: &Value, block: &Block) {
    let Value::Object(attrs) = value else {
        write_value(out, prefix, value);
        return;
    };
    for (name, item) in attrs {
        let key = join(prefix, name);
        if let Some(attr) = block.attributes.get(name) {
            write_typed(out, &key, item, &attr.ty);
        } else if let Some(nested) = block.block_types.get(name) {
            write_nested(out, &key, item, nested);
        } else {
            write_value(out, &key, item);
        }
    }
}

fn write_nested(out: &mut FlatMap, key: &str, value: &Value, nested: &NestedBlock) {
    match (nested.nesting, value) {
        (NestingMode::Single | NestingMode::Group, _) => write_block(out, key, value, &nested.block),
        (NestingMode::List | NestingMode::Set, Value::Unknown(_)) => {
            out.insert(join(key, "#"), UNKNOWN_VALUE.to_string());
        }
        (NestingMode::Map, Value::Unknown(_)) => {
            out.insert(join(key, "%"), UNKNOWN_VALUE.to_string());
        }
        (NestingMode::List, Value::List(_, items) | Value::Tuple(items)) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                write_block(out, &join(key, &i.to_string()), item, &nested.block);
            }
        }
        (NestingMode::Set, Value::Set(_, items) | Value::Tuple(items)) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (ordinal, item) in items.iter().enumerate() {
                write_block(out, &join(key, &set_element_key(item, ordinal)), item, &nested.block);
            }
        }
        (NestingMode::Map, Value::Map(_, entries) | Value::Object(entries)) => {
            out.insert(join(key, "%"), entries.len().to_string());
            for (k, item) in entries {
                write_block(out, &join(key, k), item, &nested.block);
            }
        }
        _ => write_value(out, key, value),
    }
}

fn write_typed(out: &mut FlatMap, key: &str, value: &Value, ty: &Type) {
    if !ty.has_dynamic_types() {
        write_value(out, key, value);
        return;
    }

    match (ty, value) {
        (_, Value::Null(_)) => {}
        (Type::Dynamic, Value::Unknown(_)) => {
            out.insert(key.to_string(), UNKNOWN_VALUE.to_string());
        }
        (Type::Dynamic, _) => {
            out.insert(key.to_string(), value.to_json().to_string());
        }
        (_, Value::Unknown(_)) => write_unknown(out, key, ty),
        (Type::List(ety), Value::List(_, items) | Value::Tuple(items)) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                write_typed(out, &join(key, &i.to_string()), item, ety);
            }
        }
        (Type::Set(ety), Value::Set(_, items) | Value::Tuple(items)) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (ordinal, item) in items.iter().enumerate() {
                write_typed(out, &join(key, &set_element_key(item, ordinal)), item, ety);
            }
        }
        (Type::Map(ety), Value::Map(_, entries) | Value::Object(entries)) => {
            out.insert(join(key, "%"), entries.len().to_string());
            for (k, item) in entries {
                write_typed(out, &join(key, k), item, ety);
            }
        }
        (Type::Tuple(etys), Value::Tuple(items)) => {
            out.insert(join(key, "#"), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                let item_key = join(key, &i.to_string());
                match etys.get(i) {
                    Some(ety) => write_typed(out, &item_key, item, ety),
                    None => write_value(out, &item_key, item),
                }
            }
        }
        (Type::Object(atys), Value::Object(attrs)) => {
            for (name, item) in attrs {
                let item_key = join(key, name);
                match atys.get(name) {
                    Some(aty) => write_typed(out, &item_key, item, aty),
                    None => write_value(out, &item_key, item),
                }
            }
        }
        _ => write_value(out, key, value),
    }
}

fn write_unknown(out: &mut FlatMap, key: &str, ty: &Type) {
    match ty {
        Type::List(_) | Type::Set(_) | Type::Tuple(_) => {
            out.insert(join(key, "#"), UNKNOWN_VALUE.to_string());
        }
        Type::Map(_) => {
            out.insert(join(key, "%"), UNKNOWN_VALUE.to_string());
        }
        Type::Object(attrs) => {
            for (name, aty) in attrs {
                write_unknown(out, &join(key, name), aty);
            }
        }
        Type::Bool | Type::Number | Type::String | Type::Dynamic => {
            out.insert(key.to_string(), UNKNOWN_VALUE.to_string());
        }
    }
}

/// Returns the flatmap key segment of a set element.
///
/// Wholly known elements are keyed by their content hash. Elements that are
/// not yet wholly known get a `~`-prefixed hash that also covers their
/// position, so distinct unknown elements never share a key.
#[must_use]
pub fn set_element_key(element: &Value, ordinal: usize) -> String {
    let hasher = ContentHasher::new();
    let canonical = element.canonical_key();
    if element.is_wholly_known() {
        hasher.hash_code(&canonical).to_string()
    } else {
        format!("~{}", hasher.hash_code(&format!("{canonical}#{ordinal}")))
    }
}

/// Recomputes the count of a `.#` or `.%` container key from the entries
/// actually present, ignoring the stored count.
///
/// # Errors
///
/// Returns an error if `key` is not a container count key.
pub fn count_flatmap_container_values(key: &str, attrs: &FlatMap) -> Result<usize, FlatmapError> {
    if key.len() < 3 || !is_container_count(key) {
        return Err(FlatmapError::InvalidContainerKey {
            key: key.to_string(),
        });
    }

    let prefix = &key[..key.len() - 1];
    let items: BTreeSet<&str> = attrs
        .keys()
        .filter(|k| k.as_str() != key)
        .filter_map(|k| k.strip_prefix(prefix))
        .map(|suffix| suffix.split('.').next().unwrap_or(suffix))
        .collect();

    Ok(items.len())
}

/// Returns true for keys ending in `.#` or `.%`.
#[must_use]
pub fn is_container_count(key: &str) -> bool {
    key.ends_with(".#") || key.ends_with(".%")
}

/// Returns the distinct first segments of keys below `prefix`, excluding
/// the container count itself.
fn child_segments<'a>(attrs: &'a FlatMap, prefix: &str) -> BTreeSet<&'a str> {
    let dotted = format!("{prefix}.");
    attrs
        .range(dotted.clone()..)
        .map(|(k, _)| k)
        .take_while(|k| k.starts_with(&dotted))
        .map(|k| &k[dotted.len()..])
        .filter(|rest| *rest != "#" && *rest != "%")
        .map(|rest| rest.split('.').next().unwrap_or(rest))
        .collect()
}

/// Returns the remainders of keys below `prefix`, for maps of primitives
/// whose keys may themselves contain dots.
fn child_keys<'a>(attrs: &'a FlatMap, prefix: &str) -> Vec<&'a str> {
    let dotted = format!("{prefix}.");
    attrs
        .range(dotted.clone()..)
        .map(|(k, _)| k)
        .take_while(|k| k.starts_with(&dotted))
        .map(|k| &k[dotted.len()..])
        .filter(|rest| *rest != "%")
        .collect()
}

fn has_children(attrs: &FlatMap, prefix: &str) -> bool {
    let dotted = format!("{prefix}.");
    attrs
        .range(dotted.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&dotted))
}

/// Reads a value of type `ty` from a flatmap.
///
/// `ty` must be an object type.
///
/// # Errors
///
/// Returns an error if a stored value or count does not match the type.
pub fn value_from_flatmap(attrs: &FlatMap, ty: &Type) -> Result<Value, FlatmapError> {
    match ty {
        Type::Object(atys) => read_object(attrs, "", atys),
        other => Err(FlatmapError::UnsupportedType {
            key: String::new(),
            type_name: other.friendly_name(),
        }),
    }
}

fn read_object(
    attrs: &FlatMap,
    prefix: &str,
    atys: &BTreeMap<String, Type>,
) -> Result<Value, FlatmapError> {
    let mut out = BTreeMap::new();
    for (name, aty) in atys {
        out.insert(name.clone(), read_value(attrs, &join(prefix, name), aty)?);
    }
    Ok(Value::Object(out))
}

fn read_count(attrs: &FlatMap, key: &str, suffix: &str) -> Result<Option<Option<usize>>, FlatmapError> {
    let count_key = join(key, suffix);
    match attrs.get(&count_key) {
        None => Ok(None),
        Some(raw) if raw == UNKNOWN_VALUE => Ok(Some(None)),
        Some(raw) => raw
            .parse::<usize>()
            .map(|n| Some(Some(n)))
            .map_err(|e| FlatmapError::InvalidCount {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

fn read_value(attrs: &FlatMap, key: &str, ty: &Type) -> Result<Value, FlatmapError> {
    match ty {
        Type::Bool | Type::Number | Type::String => match attrs.get(key) {
            None => Ok(Value::Null(ty.clone())),
            Some(raw) if raw == UNKNOWN_VALUE => Ok(Value::Unknown(ty.clone())),
            Some(raw) => convert(&Value::String(raw.clone()), ty, &Path::root()).map_err(|e| {
                FlatmapError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }),
        },
        Type::Object(atys) => {
            if has_children(attrs, key) {
                read_object(attrs, key, atys)
            } else {
                Ok(Value::Null(ty.clone()))
            }
        }
        Type::List(ety) => match read_count(attrs, key, "#")? {
            None => Ok(Value::Null(ty.clone())),
            Some(None) => Ok(Value::Unknown(ty.clone())),
            Some(Some(n)) => {
                let items = (0..n)
                    .map(|i| read_value(attrs, &join(key, &i.to_string()), ety))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::List((**ety).clone(), items))
            }
        },
        Type::Set(ety) => match read_count(attrs, key, "#")? {
            None => Ok(Value::Null(ty.clone())),
            Some(None) => Ok(Value::Unknown(ty.clone())),
            Some(Some(_)) => {
                let items = child_segments(attrs, key)
                    .into_iter()
                    .map(|seg| read_value(attrs, &join(key, seg), ety))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::set((**ety).clone(), items))
            }
        },
        Type::Map(ety) => match read_count(attrs, key, "%")? {
            None => Ok(Value::Null(ty.clone())),
            Some(None) => Ok(Value::Unknown(ty.clone())),
            Some(Some(_)) => {
                let names: Vec<&str> = if ety.is_primitive() {
                    child_keys(attrs, key)
                } else {
                    child_segments(attrs, key).into_iter().collect()
                };
                let mut entries = BTreeMap::new();
                for name in names {
                    entries.insert(name.to_string(), read_value(attrs, &join(key, name), ety)?);
                }
                Ok(Value::Map((**ety).clone(), entries))
            }
        },
        Type::Tuple(etys) => match read_count(attrs, key, "#")? {
            None => Ok(Value::Null(ty.clone())),
            Some(None) => Ok(Value::Unknown(ty.clone())),
            Some(Some(n)) if n != etys.len() => Err(FlatmapError::WrongCount {
                key: key.to_string(),
                got: n,
                need: etys.len(),
            }),
            Some(Some(_)) => {
                let items = etys
                    .iter()
                    .enumerate()
                    .map(|(i, ety)| read_value(attrs, &join(key, &i.to_string()), ety))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(items))
            }
        },
        Type::Dynamic => match attrs.get(key) {
            None => Ok(Value::Null(Type::Dynamic)),
            Some(raw) if raw == UNKNOWN_VALUE => Ok(Value::Unknown(Type::Dynamic)),
            Some(raw) => serde_json::from_str::<serde_json::Value>(raw)
                .map(|json| Value::from_json_inferred(&json))
                .map_err(|e| FlatmapError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
        },
    }
}

/// Reads a block-shaped value from a flatmap.
///
/// Unlike [`value_from_flatmap`], this uses the nesting mode of each block
/// type: a group block is always present, and an absent collection block
/// reads as an empty collection. A single block whose attributes are all
/// null cannot be told apart from an absent one and reads back as null.
///
/// # Errors
///
/// Returns an error if a stored value or count does not match the schema.
pub fn block_value_from_flatmap(attrs: &FlatMap, block: &Block) -> Result<Value, FlatmapError> {
    read_block(attrs, "", block)
}

fn read_block(attrs: &FlatMap, prefix: &str, block: &Block) -> Result<Value, FlatmapError> {
    let mut out = BTreeMap::new();

    for (name, attr) in &block.attributes {
        out.insert(name.clone(), read_value(attrs, &join(prefix, name), &attr.ty)?);
    }

    for (name, nested) in &block.block_types {
        if out.contains_key(name) {
            continue;
        }
        let key = join(prefix, name);
        let inner = nested.block.implied_type();
        let dynamic = inner.has_dynamic_types();
        let value = match nested.nesting {
            NestingMode::Single if has_children(attrs, &key) => read_block(attrs, &key, &nested.block)?,
            NestingMode::Single => Value::Null(inner),
            NestingMode::Group => read_block(attrs, &key, &nested.block)?,
            NestingMode::List => match read_count(attrs, &key, "#")? {
                None => nested.empty_value(),
                Some(None) => Value::Unknown(nested.implied_type()),
                Some(Some(n)) => {
                    let items = (0..n)
                        .map(|i| read_block(attrs, &join(&key, &i.to_string()), &nested.block))
                        .collect::<Result<Vec<_>, _>>()?;
                    if dynamic {
                        Value::Tuple(items)
                    } else {
                        Value::List(inner, items)
                    }
                }
            },
            NestingMode::Set => match read_count(attrs, &key, "#")? {
                None => nested.empty_value(),
                Some(None) => Value::Unknown(nested.implied_type()),
                Some(Some(_)) => {
                    let items = child_segments(attrs, &key)
                        .into_iter()
                        .map(|seg| read_block(attrs, &join(&key, seg), &nested.block))
                        .collect::<Result<Vec<_>, _>>()?;
                    if dynamic {
                        Value::Tuple(Value::set_elements(items))
                    } else {
                        Value::set(inner, items)
                    }
                }
            },
            NestingMode::Map => match read_count(attrs, &key, "%")? {
                None => nested.empty_value(),
                Some(None) => Value::Unknown(nested.implied_type()),
                Some(Some(_)) => {
                    let mut entries = BTreeMap::new();
                    for seg in child_segments(attrs, &key) {
                        entries.insert(
                            seg.to_string(),
                            read_block(attrs, &join(&key, seg), &nested.block)?,
                        );
                    }
                    if dynamic || entries.values().any(|v| v.ty() != inner) {
                        Value::Object(entries)
                    } else {
                        Value::Map(inner, entries)
                    }
                }
            },
        };
        out.insert(name.clone(), value);
    }

    Ok(Value::Object(out))
}

/// Returns the schema attribute a flat key belongs to.
///
/// Keys below an attribute of collection or object type resolve to that
/// attribute. Count keys of nested blocks resolve to nothing.
#[must_use]
pub fn attribute_for_key<'a>(block: &'a Block, key: &str) -> Option<&'a Attribute> {
    resolve_attribute(block, key).map(|(attr, _)| attr)
}

/// Returns the declared type of the value stored at a flat key.
///
/// Anything below a `Dynamic` value is itself `Dynamic`. Count keys have
/// no declared type.
#[must_use]
pub fn type_for_key(block: &Block, key: &str) -> Option<Type> {
    let (attr, rest) = resolve_attribute(block, key)?;
    element_type(&attr.ty, rest)
}

/// Splits a flat key into the attribute it addresses and the remainder
/// below that attribute.
fn resolve_attribute<'a, 'k>(block: &'a Block, key: &'k str) -> Option<(&'a Attribute, &'k str)> {
    let mut block = block;
    let mut rest = key;

    loop {
        let (segment, tail) = rest.split_once('.').unwrap_or((rest, ""));
        if let Some(attr) = block.attributes.get(segment) {
            return Some((attr, tail));
        }
        let nested = block.block_types.get(segment)?;
        rest = tail;
        match nested.nesting {
            NestingMode::Single | NestingMode::Group => {}
            NestingMode::List | NestingMode::Set | NestingMode::Map => {
                let (element, tail) = rest.split_once('.').unwrap_or((rest, ""));
                if element.is_empty() || element == "#" || element == "%" {
                    return None;
                }
                rest = tail;
            }
        }
        if rest.is_empty() {
            return None;
        }
        block = &nested.block;
    }
}

fn element_type(ty: &Type, key: &str) -> Option<Type> {
    if key.is_empty() {
        return Some(ty.clone());
    }
    let (head, tail) = key.split_once('.').unwrap_or((key, ""));
    match ty {
        Type::Dynamic => Some(Type::Dynamic),
        Type::List(ety) | Type::Set(ety) if head != "#" => element_type(ety, tail),
        Type::Map(ety) if head != "%" && ety.is_primitive() => Some((**ety).clone()),
        Type::Map(ety) if head != "%" => element_type(ety, tail),
        Type::Object(atys) => element_type(atys.get(head)?, tail),
        Type::Tuple(etys) => element_type(etys.get(head.parse::<usize>().ok()?)?, tail),
        _ => None,
    }
}

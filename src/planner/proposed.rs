//! Proposed new object composition.
//!
//! Combines the prior state of a resource with its configuration to produce
//! the value the resource is expected to take after apply. Configuration
//! wins for everything the user can set; computed attributes the user left
//! unset keep their prior values.

use std::collections::BTreeMap;

use tracing::debug;

use crate::schema::{Block, NestedBlock, NestingMode};
use crate::value::{Type, Value};

/// Proposes the new object for `block` from `prior` and `config`.
///
/// Both inputs must conform to the implied type of `block`; `config` is
/// normally the output of [`Block::coerce_value`].
#[must_use]
pub fn proposed_new_object(block: &Block, prior: &Value, config: &Value) -> Value {
    // a resource removed from configuration proposes nothing, whatever
    // the prior state held
    if config.is_null() {
        return Value::Null(block.implied_type());
    }
    propose(block, prior, config)
}

fn propose(block: &Block, prior: &Value, config: &Value) -> Value {
    if config.is_null() || !config.is_known() {
        return config.clone();
    }
    if prior.is_null() {
        return propose_object(block, &block.empty_value(), config);
    }
    propose_object(block, prior, config)
}

fn prior_attr(prior: &Value, name: &str, ty: &Type) -> Value {
    match prior {
        Value::Unknown(_) => Value::Unknown(ty.clone()),
        _ => prior
            .get_attr(name)
            .cloned()
            .unwrap_or_else(|| Value::Null(ty.clone())),
    }
}

fn propose_object(block: &Block, prior: &Value, config: &Value) -> Value {
    let mut attrs = BTreeMap::new();

    for (name, attr) in &block.attributes {
        let config_v = config
            .get_attr(name)
            .cloned()
            .unwrap_or_else(|| Value::Null(attr.ty.clone()));
        let new_v = if !attr.computed || !config_v.is_null() {
            config_v
        } else {
            prior_attr(prior, name, &attr.ty)
        };
        attrs.insert(name.clone(), new_v);
    }

    for (name, nested) in &block.block_types {
        if block.attributes.contains_key(name) {
            continue;
        }
        let ty = nested.implied_type();
        let config_v = config
            .get_attr(name)
            .cloned()
            .unwrap_or_else(|| Value::Null(ty.clone()));
        let prior_v = prior_attr(prior, name, &ty);
        attrs.insert(name.clone(), propose_nested(name, nested, &prior_v, &config_v));
    }

    Value::Object(attrs)
}

fn propose_nested(name: &str, nested: &NestedBlock, prior: &Value, config: &Value) -> Value {
    if !config.is_known() {
        return config.clone();
    }
    match nested.nesting {
        NestingMode::Single => {
            if config.is_null() {
                return Value::Null(nested.block.implied_type());
            }
            propose(&nested.block, prior, config)
        }
        NestingMode::Group => {
            if config.is_null() {
                return nested.block.empty_value();
            }
            propose(&nested.block, prior, config)
        }
        NestingMode::List => propose_list(nested, prior, config),
        NestingMode::Map => propose_map(nested, prior, config),
        NestingMode::Set => propose_set(name, nested, prior, config),
    }
}

fn element_prior(prior: &Value, ty: &Type, found: Option<&Value>) -> Value {
    if !prior.is_known() {
        return Value::Unknown(ty.clone());
    }
    found.cloned().unwrap_or_else(|| Value::Null(ty.clone()))
}

fn propose_list(nested: &NestedBlock, prior: &Value, config: &Value) -> Value {
    let Some(items) = config.elements() else {
        return config.clone();
    };
    if items.is_empty() {
        return config.clone();
    }

    let ety = nested.block.implied_type();
    let prior_items = prior.elements().unwrap_or_default();
    let proposed: Vec<Value> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let prior_e = element_prior(prior, &ety, prior_items.get(i));
            propose(&nested.block, &prior_e, item)
        })
        .collect();

    match config {
        Value::Tuple(_) => Value::Tuple(proposed),
        _ => Value::List(ety, proposed),
    }
}

fn propose_map(nested: &NestedBlock, prior: &Value, config: &Value) -> Value {
    let Some(entries) = config.entries() else {
        return config.clone();
    };
    if entries.is_empty() {
        return config.clone();
    }

    let ety = nested.block.implied_type();
    let prior_entries = prior.entries();
    let proposed: BTreeMap<String, Value> = entries
        .iter()
        .map(|(key, item)| {
            let found = prior_entries.and_then(|e| e.get(key));
            let prior_e = element_prior(prior, &ety, found);
            (key.clone(), propose(&nested.block, &prior_e, item))
        })
        .collect();

    match config {
        Value::Object(_) => Value::Object(proposed),
        _ => Value::Map(ety, proposed),
    }
}

fn propose_set(name: &str, nested: &NestedBlock, prior: &Value, config: &Value) -> Value {
    let Some(items) = config.elements() else {
        return config.clone();
    };
    if items.is_empty() {
        return config.clone();
    }

    let ety = nested.block.implied_type();
    let candidates: Vec<(&Value, Value)> = if prior.is_known() && !prior.is_null() {
        prior
            .elements()
            .unwrap_or_default()
            .iter()
            .map(|p| (p, compare_value(&nested.block, p)))
            .collect()
    } else {
        Vec::new()
    };
    let mut used = vec![false; candidates.len()];

    let mut proposed = Vec::with_capacity(items.len());
    for (ordinal, item) in items.iter().enumerate() {
        let cmp = compare_value(&nested.block, item);
        let mut prior_e = Value::Null(ety.clone());
        if cmp.is_wholly_known() {
            let matched = candidates
                .iter()
                .enumerate()
                .find(|(i, (_, c))| !used[*i] && c.is_wholly_known() && *c == cmp);
            if let Some((i, (p, _))) = matched {
                debug!("Set block {} element {} correlated with prior element {}", name, ordinal, i);
                used[i] = true;
                prior_e = (*p).clone();
            }
        }
        if prior_e.is_null() {
            debug!("Set block {} element {} has no prior counterpart", name, ordinal);
        }
        proposed.push(propose(&nested.block, &prior_e, item));
    }

    match config {
        Value::Tuple(_) => Value::Tuple(proposed),
        _ => Value::set(ety, proposed),
    }
}

/// Returns `value` with every computed attribute nulled, recursively.
///
/// Two set elements describe the same object when their comparison values
/// are equal.
fn compare_value(block: &Block, value: &Value) -> Value {
    if value.is_null() || !value.is_known() {
        return value.clone();
    }
    let Value::Object(attrs) = value else {
        return value.clone();
    };

    let mut out = BTreeMap::new();
    for (name, attr) in &block.attributes {
        let v = if attr.computed {
            Value::Null(attr.ty.clone())
        } else {
            attrs
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::Null(attr.ty.clone()))
        };
        out.insert(name.clone(), v);
    }
    for (name, nested) in &block.block_types {
        if block.attributes.contains_key(name) {
            continue;
        }
        let Some(v) = attrs.get(name) else {
            continue;
        };
        out.insert(name.clone(), map_elements(v, |e| compare_value(&nested.block, e)));
    }
    Value::Object(out)
}

/// Applies `f` to each element of a nested block collection, or to the
/// value itself for single blocks.
fn map_elements(value: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::List(ety, items) => Value::List(ety.clone(), items.iter().map(&f).collect()),
        Value::Set(ety, items) => Value::set(ety.clone(), items.iter().map(&f).collect()),
        Value::Tuple(items) => Value::Tuple(items.iter().map(&f).collect()),
        Value::Map(ety, entries) => Value::Map(
            ety.clone(),
            entries.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
        ),
        Value::Null(_) | Value::Unknown(_) => value.clone(),
        _ => f(value),
    }
}

/// Marks every computed attribute that is still null as unknown.
///
/// A null object gains unknown computed attributes only when the block
/// declares at least one; otherwise it stays null. Nested collections are
/// walked element by element.
#[must_use]
pub fn set_unknowns(block: &Block, value: &Value) -> Value {
    if !value.is_known() {
        return value.clone();
    }
    if value.is_null() {
        if !block.attributes.values().any(|a| a.computed) {
            return value.clone();
        }
        return Value::object(block.attributes.iter().map(|(name, attr)| {
            let v = if attr.computed {
                Value::Unknown(attr.ty.clone())
            } else {
                Value::Null(attr.ty.clone())
            };
            (name.clone(), v)
        }));
    }
    let Value::Object(attrs) = value else {
        return value.clone();
    };

    let mut out = attrs.clone();
    for (name, attr) in &block.attributes {
        let v = attrs
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Null(attr.ty.clone()));
        if attr.computed && v.is_null() {
            out.insert(name.clone(), Value::Unknown(attr.ty.clone()));
        }
    }
    for (name, nested) in &block.block_types {
        if block.attributes.contains_key(name) {
            continue;
        }
        let Some(v) = attrs.get(name) else {
            continue;
        };
        if v.is_null() || !v.is_known() {
            continue;
        }
        let updated = match nested.nesting {
            NestingMode::Single | NestingMode::Group => set_unknowns(&nested.block, v),
            _ => map_collection(v, |e| set_unknowns(&nested.block, e)),
        };
        out.insert(name.clone(), updated);
    }
    Value::Object(out)
}

fn map_collection(value: &Value, f: impl Fn(&Value) -> Value) -> Value {
    match value {
        Value::Object(entries) => {
            Value::Object(entries.iter().map(|(k, v)| (k.clone(), f(v))).collect())
        }
        _ => map_elements(value, f),
    }
}

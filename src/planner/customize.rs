//! Plan customization hooks.
//!
//! A hook receives a [`ResourceDiffBuilder`] for one resource and may read
//! the pending change, override computed attributes, or force replacement.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::PlanError;
use crate::legacy::{FlatMap, InstanceDiff, InstanceState, attribute_for_key, flatmap_at, type_for_key};
use crate::schema::Block;
use crate::value::{Type, UNKNOWN_VALUE, Value};

/// A customization hook.
pub type CustomizeDiffFn =
    Arc<dyn Fn(&mut ResourceDiffBuilder<'_>) -> Result<(), PlanError> + Send + Sync>;

/// Wraps a closure as a [`CustomizeDiffFn`].
#[must_use]
pub fn hook<F>(f: F) -> CustomizeDiffFn
where
    F: Fn(&mut ResourceDiffBuilder<'_>) -> Result<(), PlanError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Mutable view of the pending diff of one resource.
pub struct ResourceDiffBuilder<'a> {
    block: &'a Block,
    state: &'a InstanceState,
    config: &'a FlatMap,
    diff: InstanceDiff,
    updated_keys: BTreeSet<String>,
}

pub(super) fn under(key: &str, prefix: &str) -> bool {
    key == prefix
        || key
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'))
}

impl<'a> ResourceDiffBuilder<'a> {
    /// Creates a builder around `diff`.
    #[must_use]
    pub const fn new(
        block: &'a Block,
        state: &'a InstanceState,
        config: &'a FlatMap,
        diff: InstanceDiff,
    ) -> Self {
        Self {
            block,
            state,
            config,
            diff,
            updated_keys: BTreeSet::new(),
        }
    }

    /// Returns the old and new value of a flat key.
    ///
    /// A computed new value is reported as the unknown placeholder.
    #[must_use]
    pub fn get_change(&self, key: &str) -> (Option<String>, Option<String>) {
        let old = self.state.attributes.get(key).cloned();
        let new = match self.diff.get_attribute(key) {
            Some(d) if d.new_removed => None,
            Some(d) if d.new_computed => Some(UNKNOWN_VALUE.to_string()),
            Some(d) => Some(d.new.clone()),
            None => old.clone(),
        };
        (old, new)
    }

    /// Returns the configured value of a flat key.
    #[must_use]
    pub fn get_config(&self, key: &str) -> Option<&str> {
        self.config.get(key).map(String::as_str)
    }

    /// Returns true if the key, or anything below it, changes.
    #[must_use]
    pub fn has_change(&self, key: &str) -> bool {
        self.diff
            .attributes
            .iter()
            .any(|(k, d)| under(k, key) && !d.is_empty())
    }

    /// Returns true if the new value of the key is known at plan time.
    #[must_use]
    pub fn new_value_known(&self, key: &str) -> bool {
        !self
            .diff
            .attributes
            .iter()
            .any(|(k, d)| under(k, key) && d.new_computed)
    }

    /// Returns the declared type at a key of a computed attribute.
    fn computed_type(&self, key: &str, operation: &str) -> Result<Type, PlanError> {
        let attr = attribute_for_key(self.block, key)
            .ok_or_else(|| PlanError::customize(operation, format!("invalid key: {key}")))?;
        if !attr.computed {
            return Err(PlanError::customize(
                operation,
                format!("only operates on computed keys - {key} is not one"),
            ));
        }
        Ok(type_for_key(self.block, key).unwrap_or_else(|| attr.ty.clone()))
    }

    fn replace_entries(&mut self, key: &str, value: &Value, ty: &Type) {
        let old: FlatMap = self
            .state
            .attributes
            .iter()
            .filter(|(k, _)| under(k, key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let new = flatmap_at(key, value, ty);
        let sub = InstanceDiff::between(self.block, &old, &new);

        self.diff.attributes.retain(|k, _| !under(k, key));
        self.diff.attributes.extend(sub.attributes);
        self.updated_keys.insert(key.to_string());
    }

    /// Overrides the planned value of a computed attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not name a computed attribute.
    pub fn set_new(&mut self, key: &str, value: &Value) -> Result<(), PlanError> {
        let ty = self.computed_type(key, "SetNew")?;
        debug!("Customize: setting new value of {}", key);
        self.replace_entries(key, value, &ty);
        Ok(())
    }

    /// Marks a computed attribute as known only after apply.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not name a computed attribute.
    pub fn set_new_computed(&mut self, key: &str) -> Result<(), PlanError> {
        let ty = self.computed_type(key, "SetNewComputed")?;
        debug!("Customize: marking {} as computed", key);
        self.replace_entries(key, &Value::Unknown(ty.clone()), &ty);
        Ok(())
    }

    /// Forces replacement of the resource because of a change to `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key has no pending change.
    pub fn force_new(&mut self, key: &str) -> Result<(), PlanError> {
        if !self.has_change(key) {
            return Err(PlanError::customize("ForceNew", format!("No changes for {key}")));
        }
        debug!("Customize: change to {} forces replacement", key);
        for (k, d) in &mut self.diff.attributes {
            if under(k, key) && !d.is_empty() {
                d.requires_new = true;
            }
        }
        self.updated_keys.insert(key.to_string());
        Ok(())
    }

    /// Drops every pending change to a computed attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the key does not name a computed attribute.
    pub fn clear(&mut self, key: &str) -> Result<(), PlanError> {
        self.computed_type(key, "Clear")?;
        self.diff.attributes.retain(|k, _| !under(k, key));
        self.updated_keys.insert(key.to_string());
        Ok(())
    }

    /// Keys changed by hooks so far.
    #[must_use]
    pub const fn updated_keys(&self) -> &BTreeSet<String> {
        &self.updated_keys
    }

    /// Returns the pending diff.
    #[must_use]
    pub const fn diff(&self) -> &InstanceDiff {
        &self.diff
    }

    /// Consumes the builder, returning the diff and the keys hooks changed.
    #[must_use]
    pub fn into_parts(self) -> (InstanceDiff, BTreeSet<String>) {
        (self.diff, self.updated_keys)
    }
}

/// Runs every hook, collecting all errors.
#[must_use]
pub fn all(hooks: Vec<CustomizeDiffFn>) -> CustomizeDiffFn {
    hook(move |d| {
        let mut errors: Vec<PlanError> = Vec::new();
        for h in &hooks {
            if let Err(e) = h(d) {
                errors.push(e);
            }
        }
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            n => Err(PlanError::customize(
                format!("{n} errors occurred"),
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )),
        }
    })
}

/// Runs hooks in order, stopping at the first error.
#[must_use]
pub fn sequence(hooks: Vec<CustomizeDiffFn>) -> CustomizeDiffFn {
    hook(move |d| hooks.iter().try_for_each(|h| h(d)))
}

/// Runs `then` only when `cond` holds for the old and new value of `key`.
#[must_use]
pub fn if_value_change<C>(key: impl Into<String>, cond: C, then: CustomizeDiffFn) -> CustomizeDiffFn
where
    C: Fn(Option<&str>, Option<&str>) -> bool + Send + Sync + 'static,
{
    let key = key.into();
    hook(move |d| {
        let (old, new) = d.get_change(&key);
        if cond(old.as_deref(), new.as_deref()) {
            then(d)
        } else {
            Ok(())
        }
    })
}

/// Forces replacement when `key` changes and `cond` holds for its old and
/// new value.
#[must_use]
pub fn force_new_if_change<C>(key: impl Into<String>, cond: C) -> CustomizeDiffFn
where
    C: Fn(Option<&str>, Option<&str>) -> bool + Send + Sync + 'static,
{
    let key = key.into();
    hook(move |d| {
        if !d.has_change(&key) {
            return Ok(());
        }
        let (old, new) = d.get_change(&key);
        if cond(old.as_deref(), new.as_deref()) {
            d.force_new(&key)
        } else {
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::ResourceAttrDiff;
    use crate::schema::Attribute;

    fn block() -> Block {
        Block::new()
            .with_attribute("name", Attribute::required(Type::String))
            .with_attribute("size", Attribute::optional(Type::Number))
            .with_attribute("arn", Attribute::computed(Type::String))
            .with_attribute("tags", Attribute::computed(Type::map(Type::String)))
    }

    fn state() -> InstanceState {
        let mut state = InstanceState::default();
        state.id = String::from("i-1");
        state.attributes.insert(String::from("name"), String::from("old"));
        state.attributes.insert(String::from("size"), String::from("1"));
        state.attributes.insert(String::from("arn"), String::from("arn:1"));
        state
    }

    fn diff() -> InstanceDiff {
        let mut diff = InstanceDiff::new();
        diff.set_attribute("name", ResourceAttrDiff::new("old", "new"));
        diff
    }

    #[test]
    fn test_get_and_has_change() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        assert_eq!(
            d.get_change("name"),
            (Some(String::from("old")), Some(String::from("new")))
        );
        assert!(d.has_change("name"));
        assert!(!d.has_change("size"));
        assert!(d.new_value_known("name"));
    }

    #[test]
    fn test_get_config() {
        let (block, state) = (block(), state());
        let config: FlatMap = [(String::from("name"), String::from("new"))].into_iter().collect();
        let d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        assert_eq!(d.get_config("name"), Some("new"));
        assert_eq!(d.get_config("size"), None);
    }

    #[test]
    fn test_set_new_computed_attribute() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        d.set_new("arn", &Value::string("arn:2")).expect("set new");
        assert_eq!(d.get_change("arn").1.as_deref(), Some("arn:2"));
        assert!(d.updated_keys().contains("arn"));

        d.set_new_computed("tags").expect("set computed");
        assert!(!d.new_value_known("tags"));
        assert!(d.diff().get_attribute("tags.%").is_some_and(|a| a.new_computed));
    }

    #[test]
    fn test_set_new_dynamic_attribute() {
        let block = block().with_attribute("meta", Attribute::computed(Type::Dynamic));
        let (state, config) = (state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        d.set_new("meta", &Value::object([("a", Value::number(1))]))
            .expect("set new");
        assert_eq!(d.get_change("meta").1.as_deref(), Some(r#"{"a":1}"#));
        assert!(d.diff().get_attribute("meta.a").is_none());
    }

    #[test]
    fn test_set_new_rejects_non_computed() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        let err = d.set_new("size", &Value::number(2)).expect_err("not computed");
        assert_eq!(
            err.to_string(),
            "SetNew: only operates on computed keys - size is not one"
        );
        let err = d.set_new("nope", &Value::number(2)).expect_err("unknown key");
        assert_eq!(err.to_string(), "SetNew: invalid key: nope");
    }

    #[test]
    fn test_force_new_requires_change() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        assert!(d.force_new("size").is_err());
        d.force_new("name").expect("force new");
        assert!(d.diff().requires_new());
    }

    #[test]
    fn test_clear() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut diff = diff();
        diff.set_attribute("arn", ResourceAttrDiff::computed("arn:1"));
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff);

        d.clear("arn").expect("clear");
        assert!(!d.has_change("arn"));
    }

    #[test]
    fn test_combinators() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        let customize = sequence(vec![
            force_new_if_change("name", |old, new| old != new),
            if_value_change(
                "name",
                |_, new| new == Some("new"),
                hook(|d| d.set_new("arn", &Value::string("arn:new"))),
            ),
        ]);
        customize(&mut d).expect("hooks");
        assert!(d.diff().requires_new());
        assert_eq!(d.get_change("arn").1.as_deref(), Some("arn:new"));
    }

    #[test]
    fn test_all_collects_errors() {
        let (block, state, config) = (block(), state(), FlatMap::new());
        let mut d = ResourceDiffBuilder::new(&block, &state, &config, diff());

        let failing = hook(|d| d.force_new("size"));
        let customize = all(vec![failing.clone(), failing]);
        let err = customize(&mut d).expect_err("two failures");
        assert!(err.to_string().starts_with("2 errors occurred"));
    }
}

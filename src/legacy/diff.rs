//! Flat, string-keyed instance diffs.
//!
//! An [`InstanceDiff`] records, per flatmap key, the old and new string
//! values together with flags for values that are computed at apply time,
//! removed, or force replacement of the whole instance.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::flatmap::{
    FlatMap, attribute_for_key, count_flatmap_container_values, flatmap_from_block_value,
    is_container_count,
};
use crate::schema::Block;
use crate::value::{UNKNOWN_VALUE, Value};

/// Whether an attribute is user-supplied or provider-assigned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DiffAttrType {
    /// Not determined.
    #[default]
    Unknown,
    /// Set in configuration.
    Input,
    /// Assigned by the provider.
    Output,
}

/// The diff of a single flat attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceAttrDiff {
    /// Value before the change.
    #[serde(default)]
    pub old: String,
    /// Value after the change.
    #[serde(default)]
    pub new: String,
    /// The new value is only known after apply.
    #[serde(default)]
    pub new_computed: bool,
    /// The attribute is removed.
    #[serde(default)]
    pub new_removed: bool,
    /// Extra data attached by customize-diff callbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_extra: Option<serde_json::Value>,
    /// Changing this attribute forces replacement.
    #[serde(default)]
    pub requires_new: bool,
    /// The value must be hidden from output.
    #[serde(default)]
    pub sensitive: bool,
    /// Input or output attribute.
    #[serde(default, rename = "type")]
    pub attr_type: DiffAttrType,
}

/// Kind of change an [`InstanceDiff`] describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiffChangeType {
    /// Nothing changes.
    None,
    /// A new instance is created.
    Create,
    /// The instance is updated in place.
    Update,
    /// The instance is destroyed.
    Destroy,
    /// The instance is destroyed and recreated.
    DestroyCreate,
}

/// Diff of one resource instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceDiff {
    /// Attribute diffs by flat key.
    #[serde(default)]
    pub attributes: BTreeMap<String, ResourceAttrDiff>,
    /// The instance is destroyed.
    #[serde(default)]
    pub destroy: bool,
    /// A deposed copy of the instance is destroyed.
    #[serde(default)]
    pub destroy_deposed: bool,
    /// The tainted instance is destroyed.
    #[serde(default)]
    pub destroy_tainted: bool,
    /// Opaque provider metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl ResourceAttrDiff {
    /// A change from `old` to `new`.
    #[must_use]
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
            ..Self::default()
        }
    }

    /// A change to a value known only after apply.
    #[must_use]
    pub fn computed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_computed: true,
            ..Self::default()
        }
    }

    /// Removal of the attribute.
    #[must_use]
    pub fn removed(old: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new_removed: true,
            ..Self::default()
        }
    }

    /// Marks the change as forcing replacement.
    #[must_use]
    pub const fn with_requires_new(mut self) -> Self {
        self.requires_new = true;
        self
    }

    /// Returns true if the entry changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.old == self.new && !self.new_computed && !self.new_removed
    }
}

impl InstanceDiff {
    /// Creates an empty diff.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the diff between two flatmaps of the same resource.
    ///
    /// Keys holding the unknown placeholder in `new` become computed; keys
    /// missing from `new` become removals, except below a container whose
    /// count is unknown. Sensitivity and input/output kind come from the
    /// schema.
    #[must_use]
    pub fn between(block: &Block, old: &FlatMap, new: &FlatMap) -> Self {
        let mut diff = Self::new();

        let unknown_containers: Vec<&str> = new
            .iter()
            .filter(|(k, v)| is_container_count(k) && v.as_str() == UNKNOWN_VALUE)
            .map(|(k, _)| &k[..k.len() - 1])
            .collect();

        for (key, new_value) in new {
            let old_value = old.get(key);
            let entry = if new_value == UNKNOWN_VALUE {
                if old_value.is_some_and(|v| v == UNKNOWN_VALUE) {
                    continue;
                }
                ResourceAttrDiff::computed(old_value.cloned().unwrap_or_default())
            } else if old_value != Some(new_value) {
                ResourceAttrDiff::new(old_value.cloned().unwrap_or_default(), new_value.clone())
            } else {
                continue;
            };
            diff.attributes.insert(key.clone(), entry);
        }

        for (key, old_value) in old {
            if new.contains_key(key) || unknown_containers.iter().any(|p| key.starts_with(p)) {
                continue;
            }
            diff.attributes
                .insert(key.clone(), ResourceAttrDiff::removed(old_value.clone()));
        }

        for (key, entry) in &mut diff.attributes {
            if let Some(attr) = attribute_for_key(block, key) {
                entry.sensitive = attr.sensitive;
                entry.attr_type = if attr.computed && !attr.optional {
                    DiffAttrType::Output
                } else {
                    DiffAttrType::Input
                };
            }
        }

        debug!("Computed flat diff with {} attribute changes", diff.attributes.len());
        diff
    }

    /// Computes the diff between two structural values of `block`.
    #[must_use]
    pub fn from_values(block: &Block, prior: &Value, planned: &Value) -> Self {
        Self::between(
            block,
            &flatmap_from_block_value(prior, block),
            &flatmap_from_block_value(planned, block),
        )
    }

    /// Returns true if the diff changes nothing.
    #[must_use]
    pub fn empty(&self) -> bool {
        !self.destroy && !self.destroy_tainted && !self.destroy_deposed && self.attributes.is_empty()
    }

    /// Returns true if any attribute change forces replacement.
    #[must_use]
    pub fn requires_new(&self) -> bool {
        self.attributes.values().any(|d| d.requires_new)
    }

    /// Returns the kind of change this diff describes.
    #[must_use]
    pub fn change_type(&self) -> DiffChangeType {
        if self.empty() {
            return DiffChangeType::None;
        }
        let requires_new = self.requires_new();
        if requires_new && (self.destroy || self.destroy_tainted) {
            return DiffChangeType::DestroyCreate;
        }
        if self.destroy || self.destroy_deposed {
            return DiffChangeType::Destroy;
        }
        if requires_new {
            return DiffChangeType::Create;
        }
        DiffChangeType::Update
    }

    /// Returns the diff of one attribute.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&ResourceAttrDiff> {
        self.attributes.get(key)
    }

    /// Sets the diff of one attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, attr: ResourceAttrDiff) {
        self.attributes.insert(key.into(), attr);
    }

    /// Removes the diff of one attribute.
    pub fn del_attribute(&mut self, key: &str) -> Option<ResourceAttrDiff> {
        self.attributes.remove(key)
    }

    /// Applies the diff to `attrs`, then recomputes every known container
    /// count from the entries actually present.
    #[must_use]
    pub fn apply(&self, attrs: &FlatMap) -> FlatMap {
        let mut result = attrs.clone();
        for (key, diff) in &self.attributes {
            if diff.new_removed {
                result.remove(key);
            } else if diff.new_computed {
                result.insert(key.clone(), UNKNOWN_VALUE.to_string());
            } else {
                result.insert(key.clone(), diff.new.clone());
            }
        }

        let mut count_keys: Vec<String> = result
            .iter()
            .filter(|(k, v)| is_container_count(k) && v.as_str() != UNKNOWN_VALUE)
            .map(|(k, _)| k.clone())
            .collect();
        count_keys.sort_unstable_by(|a, b| b.cmp(a));

        for key in count_keys {
            let Ok(count) = count_flatmap_container_values(&key, &result) else {
                continue;
            };
            let removed = self.attributes.get(&key).is_some_and(|d| d.new_removed);
            if removed && count == 0 {
                result.remove(&key);
            } else {
                result.insert(key, count.to_string());
            }
        }

        result
    }

    /// Checks whether `other`, computed later against the same
    /// configuration, is compatible with this diff.
    ///
    /// Entries of `self` that are computed, removed, below a computed
    /// container count, or keyed by a not-yet-known set hash are relaxed.
    /// Returns the reason for the first mismatch found.
    #[must_use]
    pub fn same(&self, other: &Self) -> (bool, String) {
        if self.destroy != other.destroy {
            return (
                false,
                format!("diff: Destroy; old: {}, new: {}", self.destroy, other.destroy),
            );
        }
        if self.destroy_tainted != other.destroy_tainted {
            return (
                false,
                format!(
                    "diff: DestroyTainted; old: {}, new: {}",
                    self.destroy_tainted, other.destroy_tainted
                ),
            );
        }

        // Prefixes of computed lists, sets and maps: anything below them may
        // resolve to any shape.
        let relaxed: Vec<&str> = self
            .attributes
            .iter()
            .filter(|(k, d)| d.new_computed && is_container_count(k))
            .map(|(k, _)| &k[..k.len() - 1])
            .collect();
        let is_relaxed = |k: &str| relaxed.iter().any(|p| k.starts_with(p));

        let requires_new = self.requires_new();
        let mut check_new: BTreeSet<&str> = other
            .attributes
            .keys()
            .map(String::as_str)
            .filter(|k| !is_relaxed(*k))
            .collect();

        for (key, old) in &self.attributes {
            if is_relaxed(key.as_str()) {
                continue;
            }
            check_new.remove(key.as_str());

            let Some(new) = other.attributes.get(key) else {
                if old.new_removed || old.new_computed {
                    continue;
                }
                if let Some(pattern) = HashPattern::parse(key) {
                    check_new.retain(|k| !pattern.matches(k));
                    continue;
                }
                if requires_new && is_container_count(key) {
                    continue;
                }
                return (false, format!("attribute mismatch: {key}"));
            };

            if old.new_computed {
                continue;
            }

            if new.new_computed
                || old.new_removed != new.new_removed
                || old.old != new.old
                || old.new != new.new
            {
                return (false, format!("value mismatch: {key}"));
            }

            if old.requires_new != new.requires_new {
                return (false, format!("RequiresNew mismatch: {key}"));
            }
        }

        if !check_new.is_empty() {
            let extras: Vec<&str> = check_new.into_iter().collect();
            return (false, format!("extra attributes: {}", extras.join(", ")));
        }

        (true, String::new())
    }
}

/// Matches keys sharing the prefix of a `~`-hashed set element, with any
/// hash in its place.
struct HashPattern<'a> {
    prefix: Vec<&'a str>,
}

impl<'a> HashPattern<'a> {
    fn parse(key: &'a str) -> Option<Self> {
        let parts: Vec<&str> = key.split('.').collect();
        let position = parts.iter().position(|part| {
            part.strip_prefix('~')
                .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        })?;
        Some(Self {
            prefix: parts[..position].to_vec(),
        })
    }

    fn matches(&self, key: &str) -> bool {
        let mut parts = key.split('.');
        for expected in &self.prefix {
            if parts.next() != Some(*expected) {
                return false;
            }
        }
        parts
            .next()
            .is_some_and(|hash| !hash.is_empty() && hash.bytes().all(|b| b.is_ascii_digit()))
    }
}

impl fmt::Display for DiffChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Destroy => write!(f, "destroy"),
            Self::DestroyCreate => write!(f, "destroy/create"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock, NestingMode};
    use crate::value::Type;

    fn diff(entries: &[(&str, ResourceAttrDiff)]) -> InstanceDiff {
        let mut d = InstanceDiff::new();
        for (k, v) in entries {
            d.set_attribute(*k, v.clone());
        }
        d
    }

    fn flat(pairs: &[(&str, &str)]) -> FlatMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_same_accepts_resolved_computed_list() {
        let planned = diff(&[
            ("foo.#", ResourceAttrDiff::computed("")),
            ("name", ResourceAttrDiff::new("", "web")),
        ]);
        let applied = diff(&[
            ("foo.#", ResourceAttrDiff::new("", "2")),
            ("foo.0", ResourceAttrDiff::new("", "a")),
            ("foo.1", ResourceAttrDiff::new("", "b").with_requires_new()),
            ("name", ResourceAttrDiff::new("", "web")),
        ]);
        assert_eq!(planned.same(&applied), (true, String::new()));

        let omitted = diff(&[("name", ResourceAttrDiff::new("", "web"))]);
        assert!(planned.same(&omitted).0);
    }

    #[test]
    fn test_same_rejects_changed_concrete_value() {
        let planned = diff(&[
            ("foo.#", ResourceAttrDiff::computed("")),
            ("name", ResourceAttrDiff::new("", "web")),
        ]);
        let applied = diff(&[
            ("foo.#", ResourceAttrDiff::new("", "1")),
            ("foo.0", ResourceAttrDiff::new("", "a")),
            ("name", ResourceAttrDiff::new("", "api")),
        ]);
        assert_eq!(
            planned.same(&applied),
            (false, String::from("value mismatch: name"))
        );
    }

    #[test]
    fn test_same_destroy_flags() {
        let mut a = InstanceDiff::new();
        a.destroy = true;
        let b = InstanceDiff::new();
        assert_eq!(
            a.same(&b),
            (false, String::from("diff: Destroy; old: true, new: false"))
        );

        let mut c = InstanceDiff::new();
        c.destroy_tainted = true;
        assert_eq!(
            b.same(&c),
            (false, String::from("diff: DestroyTainted; old: false, new: true"))
        );
    }

    #[test]
    fn test_same_missing_and_extra_attributes() {
        let planned = diff(&[
            ("a", ResourceAttrDiff::new("", "1")),
            ("gone", ResourceAttrDiff::removed("x")),
            ("id", ResourceAttrDiff::computed("")),
        ]);
        let missing = diff(&[]);
        assert_eq!(
            planned.same(&missing),
            (false, String::from("attribute mismatch: a"))
        );

        let extra = diff(&[
            ("a", ResourceAttrDiff::new("", "1")),
            ("z", ResourceAttrDiff::new("", "2")),
            ("b", ResourceAttrDiff::new("", "3")),
        ]);
        assert_eq!(
            planned.same(&extra),
            (false, String::from("extra attributes: b, z"))
        );
    }

    #[test]
    fn test_same_requires_new_mismatch() {
        let planned = diff(&[("a", ResourceAttrDiff::new("1", "2").with_requires_new())]);
        let applied = diff(&[("a", ResourceAttrDiff::new("1", "2"))]);
        assert_eq!(
            planned.same(&applied),
            (false, String::from("RequiresNew mismatch: a"))
        );
    }

    #[test]
    fn test_same_matches_unknown_set_hash() {
        let planned = diff(&[
            ("rule.#", ResourceAttrDiff::new("0", "1")),
            ("rule.~123.cidr", ResourceAttrDiff::new("", "10.0.0.0/8")),
        ]);
        let applied = diff(&[
            ("rule.#", ResourceAttrDiff::new("0", "1")),
            ("rule.98765.cidr", ResourceAttrDiff::new("", "10.0.0.0/8")),
            ("rule.98765.port", ResourceAttrDiff::new("", "22")),
        ]);
        assert!(planned.same(&applied).0);
    }

    #[test]
    fn test_change_type() {
        assert_eq!(InstanceDiff::new().change_type(), DiffChangeType::None);

        let update = diff(&[("a", ResourceAttrDiff::new("1", "2"))]);
        assert_eq!(update.change_type(), DiffChangeType::Update);

        let mut replace = diff(&[("a", ResourceAttrDiff::new("1", "2").with_requires_new())]);
        assert_eq!(replace.change_type(), DiffChangeType::Create);
        replace.destroy = true;
        assert_eq!(replace.change_type(), DiffChangeType::DestroyCreate);

        let mut destroy = InstanceDiff::new();
        destroy.destroy = true;
        assert_eq!(destroy.change_type(), DiffChangeType::Destroy);
    }

    #[test]
    fn test_between_flags_and_removals() {
        let block = Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("password", Attribute::optional(Type::String).sensitive())
            .with_attribute("ports", Attribute::optional(Type::list(Type::Number)))
            .with_block_type(
                "rule",
                NestedBlock::new(
                    NestingMode::List,
                    Block::new().with_attribute("cidr", Attribute::optional(Type::String)),
                ),
            );
        let old = flat(&[("password", "a"), ("ports.#", "1"), ("ports.0", "80"), ("rule.#", "0")]);
        let new = flat(&[
            ("id", UNKNOWN_VALUE),
            ("password", "b"),
            ("ports.#", UNKNOWN_VALUE),
            ("rule.#", "0"),
        ]);

        let d = InstanceDiff::between(&block, &old, &new);
        let keys: Vec<&str> = d.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "password", "ports.#"]);
        assert!(d.attributes["id"].new_computed);
        assert_eq!(d.attributes["id"].attr_type, DiffAttrType::Output);
        assert!(d.attributes["password"].sensitive);
        assert!(d.attributes["ports.#"].new_computed);
    }

    #[test]
    fn test_apply_recounts_containers() {
        let attrs = flat(&[("foo.#", "2"), ("foo.0", "a"), ("foo.1", "b"), ("name", "x")]);
        let d = diff(&[
            ("foo.1", ResourceAttrDiff::removed("b")),
            ("tags.%", ResourceAttrDiff::new("", "1")),
            ("tags.env", ResourceAttrDiff::new("", "prod")),
        ]);

        let applied = d.apply(&attrs);
        assert_eq!(
            applied,
            flat(&[
                ("foo.#", "1"),
                ("foo.0", "a"),
                ("name", "x"),
                ("tags.%", "1"),
                ("tags.env", "prod"),
            ])
        );
    }
}

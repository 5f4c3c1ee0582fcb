//! Structurally typed values.
//!
//! A [`Value`] is an immutable tree. Every node is either null, unknown
//! (type known, content not yet determined) or concrete. Collections keep
//! their element type so empty and null collections remain fully typed.

mod convert;
mod json;
mod path;
mod types;

pub use convert::{convert, parse_number};
pub(crate) use convert::index_of;
pub use path::{Path, PathSet, PathStep};
pub use types::Type;

use std::collections::BTreeMap;

pub use serde_json::Number;

/// Placeholder written in place of values that are not yet known.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A structurally typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value of the given type.
    Null(Type),
    /// Value of the given type that will only be known after apply.
    Unknown(Type),
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// String.
    String(String),
    /// List with its element type.
    List(Type, Vec<Value>),
    /// Canonically ordered set with its element type.
    Set(Type, Vec<Value>),
    /// Map with its element type.
    Map(Type, BTreeMap<String, Value>),
    /// Object.
    Object(BTreeMap<String, Value>),
    /// Tuple.
    Tuple(Vec<Value>),
}

impl Value {
    /// Creates a null value.
    #[must_use]
    pub const fn null(ty: Type) -> Self {
        Self::Null(ty)
    }

    /// Creates an unknown value.
    #[must_use]
    pub const fn unknown(ty: Type) -> Self {
        Self::Unknown(ty)
    }

    /// Creates a string value.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    /// Creates a number value from an integer.
    #[must_use]
    pub fn number(n: i64) -> Self {
        Self::Number(Number::from(n))
    }

    /// Creates a list value.
    #[must_use]
    pub const fn list(element: Type, items: Vec<Self>) -> Self {
        Self::List(element, items)
    }

    /// Creates a set value, sorting elements canonically and removing
    /// duplicates among wholly known elements.
    #[must_use]
    pub fn set(element: Type, items: Vec<Self>) -> Self {
        Self::Set(element, Self::set_elements(items))
    }

    /// Orders set elements canonically and drops wholly known duplicates.
    ///
    /// Elements that are not yet wholly known are always kept, since they
    /// may turn out to differ once known.
    #[must_use]
    pub fn set_elements(items: Vec<Self>) -> Vec<Self> {
        let mut keyed: Vec<(String, Self)> = items
            .into_iter()
            .map(|item| (item.canonical_key(), item))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out: Vec<Self> = Vec::with_capacity(keyed.len());
        for (_, item) in keyed {
            if item.is_wholly_known() && out.contains(&item) {
                continue;
            }
            out.push(item);
        }
        out
    }

    /// Creates a map value.
    #[must_use]
    pub fn map<I, K>(element: Type, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Map(
            element,
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )
    }

    /// Creates an object value.
    #[must_use]
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v))
                .collect(),
        )
    }

    /// The object value with no attributes.
    #[must_use]
    pub const fn empty_object() -> Self {
        Self::Object(BTreeMap::new())
    }

    /// Returns the type of this value.
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Self::Null(ty) | Self::Unknown(ty) => ty.clone(),
            Self::Bool(_) => Type::Bool,
            Self::Number(_) => Type::Number,
            Self::String(_) => Type::String,
            Self::List(ety, _) => Type::list(ety.clone()),
            Self::Set(ety, _) => Type::set(ety.clone()),
            Self::Map(ety, _) => Type::map(ety.clone()),
            Self::Object(attrs) => {
                Type::Object(attrs.iter().map(|(k, v)| (k.clone(), v.ty())).collect())
            }
            Self::Tuple(elems) => Type::Tuple(elems.iter().map(Self::ty).collect()),
        }
    }

    /// Returns true for null values.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// Returns true unless this value itself is unknown. Nested values may
    /// still be unknown.
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Returns true if neither this value nor anything nested within it is
    /// unknown.
    #[must_use]
    pub fn is_wholly_known(&self) -> bool {
        match self {
            Self::Unknown(_) => false,
            Self::Null(_) | Self::Bool(_) | Self::Number(_) | Self::String(_) => true,
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => {
                items.iter().all(Self::is_wholly_known)
            }
            Self::Map(_, entries) | Self::Object(entries) => {
                entries.values().all(Self::is_wholly_known)
            }
        }
    }

    /// Returns the string content of a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the named attribute of an object value.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Object(attrs) => attrs.get(name),
            _ => None,
        }
    }

    /// Returns the elements of a list, set or tuple.
    #[must_use]
    pub fn elements(&self) -> Option<&[Self]> {
        match self {
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the entries of a map or object.
    #[must_use]
    pub const fn entries(&self) -> Option<&BTreeMap<String, Self>> {
        match self {
            Self::Map(_, entries) | Self::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Returns the number of elements of a known collection or structure.
    #[must_use]
    pub fn length(&self) -> Option<usize> {
        self.elements()
            .map(<[Self]>::len)
            .or_else(|| self.entries().map(BTreeMap::len))
    }

    /// Follows `path` from this value.
    #[must_use]
    pub fn get_path(&self, path: &Path) -> Option<&Self> {
        let mut current = self;
        for step in path.steps() {
            current = match (step, current) {
                (PathStep::GetAttr(name), Self::Object(attrs)) => attrs.get(name)?,
                (PathStep::Key(key), Self::Map(_, entries) | Self::Object(entries)) => {
                    entries.get(key)?
                }
                (PathStep::Index(idx), Self::List(_, items) | Self::Tuple(items)) => {
                    items.get(usize::try_from(*idx).ok()?)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns a string that orders set elements deterministically.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Null(_) => out.push_str("null"),
            Self::Unknown(_) => out.push('?'),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Number(n) => {
                out.push('#');
                out.push_str(&n.to_string());
            }
            Self::String(s) => out.push_str(&format!("{s:?}")),
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_canonical(out);
                }
                out.push(']');
            }
            Self::Map(_, entries) | Self::Object(entries) => {
                out.push('{');
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&format!("{key:?}:"));
                    item.write_canonical(out);
                }
                out.push('}');
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

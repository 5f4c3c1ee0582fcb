//! Structural types.
//!
//! Every [`Value`](super::Value) carries enough information to recover its
//! [`Type`]. Types serialize to the compact JSON form used on the wire and in
//! plan files: primitives are bare strings (`"string"`), collections are
//! two-element arrays (`["list", "string"]`), and structural types carry their
//! members (`["object", {"name": "string"}]`, `["tuple", ["bool"]]`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchemaError;

/// A structural type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// `true` or `false`.
    Bool,
    /// Arbitrary-precision number.
    Number,
    /// UTF-8 string.
    String,
    /// Placeholder accepting any type; resolved per value.
    Dynamic,
    /// Ordered, homogeneous sequence.
    List(Box<Type>),
    /// Unordered, homogeneous collection without duplicates.
    Set(Box<Type>),
    /// String-keyed, homogeneous collection.
    Map(Box<Type>),
    /// Fixed set of named, heterogeneous attributes.
    Object(BTreeMap<String, Type>),
    /// Fixed-length, heterogeneous sequence.
    Tuple(Vec<Type>),
}

impl Type {
    /// Creates a list type.
    #[must_use]
    pub fn list(element: Self) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a set type.
    #[must_use]
    pub fn set(element: Self) -> Self {
        Self::Set(Box::new(element))
    }

    /// Creates a map type.
    #[must_use]
    pub fn map(element: Self) -> Self {
        Self::Map(Box::new(element))
    }

    /// Creates an object type from `(name, type)` pairs.
    #[must_use]
    pub fn object<I, K>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        Self::Object(
            attributes
                .into_iter()
                .map(|(name, ty)| (name.into(), ty))
                .collect(),
        )
    }

    /// Returns true for bool, number and string.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(self, Self::Bool | Self::Number | Self::String)
    }

    /// Returns true for list, set and map types.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self, Self::List(_) | Self::Set(_) | Self::Map(_))
    }

    /// Returns the element type of a collection.
    #[must_use]
    pub fn element_type(&self) -> Option<&Self> {
        match self {
            Self::List(ety) | Self::Set(ety) | Self::Map(ety) => Some(ety),
            _ => None,
        }
    }

    /// Returns the type of a named object attribute.
    #[must_use]
    pub fn attribute_type(&self, name: &str) -> Option<&Self> {
        match self {
            Self::Object(attrs) => attrs.get(name),
            _ => None,
        }
    }

    /// Returns true if `Dynamic` appears anywhere within this type.
    #[must_use]
    pub fn has_dynamic_types(&self) -> bool {
        match self {
            Self::Dynamic => true,
            Self::Bool | Self::Number | Self::String => false,
            Self::List(ety) | Self::Set(ety) | Self::Map(ety) => ety.has_dynamic_types(),
            Self::Object(attrs) => attrs.values().any(Self::has_dynamic_types),
            Self::Tuple(elems) => elems.iter().any(Self::has_dynamic_types),
        }
    }

    /// Returns true if a value of this type is acceptable where `want` is
    /// expected. `Dynamic` in `want` accepts anything.
    #[must_use]
    pub fn conforms(&self, want: &Self) -> bool {
        match (self, want) {
            (_, Self::Dynamic) => true,
            (Self::List(have), Self::List(want))
            | (Self::Set(have), Self::Set(want))
            | (Self::Map(have), Self::Map(want)) => have.conforms(want),
            (Self::Object(have), Self::Object(want)) => {
                have.len() == want.len()
                    && want
                        .iter()
                        .all(|(name, wty)| have.get(name).is_some_and(|hty| hty.conforms(wty)))
            }
            (Self::Tuple(have), Self::Tuple(want)) => {
                have.len() == want.len() && have.iter().zip(want).all(|(h, w)| h.conforms(w))
            }
            _ => self == want,
        }
    }

    /// Returns a short human-readable name, as used in error messages.
    #[must_use]
    pub fn friendly_name(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Number => "number".to_string(),
            Self::String => "string".to_string(),
            Self::Dynamic => "dynamic".to_string(),
            Self::List(ety) => format!("list of {}", ety.friendly_name()),
            Self::Set(ety) => format!("set of {}", ety.friendly_name()),
            Self::Map(ety) => format!("map of {}", ety.friendly_name()),
            Self::Object(_) => "object".to_string(),
            Self::Tuple(_) => "tuple".to_string(),
        }
    }

    /// Encodes this type in its compact JSON form.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;

        match self {
            Self::Bool => J::from("bool"),
            Self::Number => J::from("number"),
            Self::String => J::from("string"),
            Self::Dynamic => J::from("dynamic"),
            Self::List(ety) => J::Array(vec![J::from("list"), ety.to_json()]),
            Self::Set(ety) => J::Array(vec![J::from("set"), ety.to_json()]),
            Self::Map(ety) => J::Array(vec![J::from("map"), ety.to_json()]),
            Self::Object(attrs) => {
                let members = attrs
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.to_json()))
                    .collect();
                J::Array(vec![J::from("object"), J::Object(members)])
            }
            Self::Tuple(elems) => J::Array(vec![
                J::from("tuple"),
                J::Array(elems.iter().map(Self::to_json).collect()),
            ]),
        }
    }

    /// Decodes a type from its compact JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a type.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, SchemaError> {
        use serde_json::Value as J;

        let invalid = |message: String| SchemaError::InvalidType { message };

        match json {
            J::String(name) => match name.as_str() {
                "bool" => Ok(Self::Bool),
                "number" => Ok(Self::Number),
                "string" => Ok(Self::String),
                "dynamic" => Ok(Self::Dynamic),
                other => Err(invalid(format!("unknown primitive type {other:?}"))),
            },
            J::Array(parts) => {
                let [kind, arg] = parts.as_slice() else {
                    return Err(invalid(format!(
                        "type constructor must have 2 elements, got {}",
                        parts.len()
                    )));
                };
                let Some(kind) = kind.as_str() else {
                    return Err(invalid("type constructor kind must be a string".to_string()));
                };
                match (kind, arg) {
                    ("list", arg) => Ok(Self::list(Self::from_json(arg)?)),
                    ("set", arg) => Ok(Self::set(Self::from_json(arg)?)),
                    ("map", arg) => Ok(Self::map(Self::from_json(arg)?)),
                    ("object", J::Object(members)) => {
                        let mut attrs = BTreeMap::new();
                        for (name, ty) in members {
                            attrs.insert(name.clone(), Self::from_json(ty)?);
                        }
                        Ok(Self::Object(attrs))
                    }
                    ("tuple", J::Array(elems)) => Ok(Self::Tuple(
                        elems.iter().map(Self::from_json).collect::<Result<_, _>>()?,
                    )),
                    ("object" | "tuple", _) => {
                        Err(invalid(format!("malformed {kind} type arguments")))
                    }
                    (other, _) => Err(invalid(format!("unknown type constructor {other:?}"))),
                }
            }
            other => Err(invalid(format!("unexpected JSON {other} in type"))),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.friendly_name())
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_json_round_trip() {
        let ty = Type::object([
            ("name", Type::String),
            ("ports", Type::list(Type::Number)),
            ("tags", Type::map(Type::String)),
            ("rules", Type::set(Type::object([("cidr", Type::String)]))),
            ("pair", Type::Tuple(vec![Type::Bool, Type::Dynamic])),
        ]);

        let json = ty.to_json();
        let back = Type::from_json(&json).expect("valid type");
        assert_eq!(back, ty);
    }

    #[test]
    fn test_type_json_form() {
        assert_eq!(
            serde_json::to_string(&Type::list(Type::String)).expect("serialize"),
            r#"["list","string"]"#
        );
        let ty: Type = serde_json::from_str(r#"["object",{"a":"number"}]"#).expect("deserialize");
        assert_eq!(ty, Type::object([("a", Type::Number)]));
    }

    #[test]
    fn test_invalid_type_rejected() {
        assert!(Type::from_json(&serde_json::json!("integer")).is_err());
        assert!(Type::from_json(&serde_json::json!(["list"])).is_err());
        assert!(Type::from_json(&serde_json::json!(["object", []])).is_err());
    }

    #[test]
    fn test_has_dynamic_types() {
        assert!(!Type::list(Type::String).has_dynamic_types());
        assert!(Type::object([("x", Type::map(Type::Dynamic))]).has_dynamic_types());
    }

    #[test]
    fn test_conforms() {
        let want = Type::object([("a", Type::Dynamic)]);
        assert!(Type::object([("a", Type::String)]).conforms(&want));
        assert!(!Type::object([("b", Type::String)]).conforms(&want));
        assert!(Type::list(Type::Number).conforms(&Type::Dynamic));
        assert!(!Type::list(Type::Number).conforms(&Type::set(Type::Number)));
    }
}

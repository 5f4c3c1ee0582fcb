//! JSON encoding of values.
//!
//! Unknown values are written as [`UNKNOWN_VALUE`] and read back as unknown,
//! which keeps planned values representable in plain JSON documents.

use std::fmt;

use serde_json::Value as Json;

use super::{Path, Type, UNKNOWN_VALUE, Value, convert};
use crate::error::SchemaError;

impl Value {
    /// Encodes this value as JSON.
    #[must_use]
    pub fn to_json(&self) -> Json {
        match self {
            Self::Null(_) => Json::Null,
            Self::Unknown(_) => Json::String(UNKNOWN_VALUE.to_string()),
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => Json::Number(n.clone()),
            Self::String(s) => Json::String(s.clone()),
            Self::List(_, items) | Self::Set(_, items) | Self::Tuple(items) => {
                Json::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(_, entries) | Self::Object(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Decodes JSON without a type: arrays become tuples and objects become
    /// objects.
    #[must_use]
    pub fn from_json_inferred(json: &Json) -> Self {
        match json {
            Json::Null => Self::Null(Type::Dynamic),
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.clone()),
            Json::String(s) if s == UNKNOWN_VALUE => Self::Unknown(Type::Dynamic),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::Tuple(items.iter().map(Self::from_json_inferred).collect()),
            Json::Object(entries) => Self::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json_inferred(v)))
                    .collect(),
            ),
        }
    }

    /// Decodes JSON as a value of type `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be converted to `ty`.
    pub fn from_json(json: &Json, ty: &Type) -> Result<Self, SchemaError> {
        convert(&Self::from_json_inferred(json), ty, &Path::root())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => write!(f, "null"),
            Self::Unknown(_) => write!(f, "(known after apply)"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

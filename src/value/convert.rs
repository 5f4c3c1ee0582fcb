//! Safe conversion of values between types.
//!
//! Conversions never lose information: numbers and bools may become strings,
//! strings may become numbers or bools only when they parse, and structural
//! values convert element-wise. Null and unknown values keep their nature at
//! the target type.

use std::collections::BTreeMap;

use super::{Number, Path, Type, Value};
use crate::error::SchemaError;

/// Converts `value` to type `want`. Errors are reported against `path`.
///
/// # Errors
///
/// Returns [`SchemaError::Coerce`] at the innermost failing location.
pub fn convert(value: &Value, want: &Type, path: &Path) -> Result<Value, SchemaError> {
    if *want == Type::Dynamic {
        return Ok(value.clone());
    }

    match value {
        Value::Null(_) => return Ok(Value::Null(want.clone())),
        Value::Unknown(_) => return Ok(Value::Unknown(want.clone())),
        _ => {}
    }

    match want {
        Type::Bool => to_bool(value, path),
        Type::Number => to_number(value, path),
        Type::String => to_string(value, path),
        Type::List(ety) => {
            let items = sequence(value, path, "a list is required")?;
            let converted = convert_each(items, ety, path)?;
            Ok(Value::List((**ety).clone(), converted))
        }
        Type::Set(ety) => {
            let items = sequence(value, path, "a set is required")?;
            let converted = convert_each(items, ety, path)?;
            Ok(Value::set((**ety).clone(), converted))
        }
        Type::Map(ety) => {
            let Some(entries) = value.entries() else {
                return Err(SchemaError::coerce(path, "a map is required"));
            };
            let mut out = BTreeMap::new();
            for (key, item) in entries {
                out.insert(key.clone(), convert(item, ety, &path.key(key.as_str()))?);
            }
            Ok(Value::Map((**ety).clone(), out))
        }
        Type::Object(attrs) => to_object(value, attrs, path),
        Type::Tuple(etys) => {
            let items = sequence(value, path, "a tuple is required")?;
            if items.len() != etys.len() {
                return Err(SchemaError::coerce(
                    path,
                    format!("a tuple of {} elements is required", etys.len()),
                ));
            }
            let mut out = Vec::with_capacity(items.len());
            for (i, (item, ety)) in items.iter().zip(etys).enumerate() {
                out.push(convert(item, ety, &path.index(index_of(i)))?);
            }
            Ok(Value::Tuple(out))
        }
        Type::Dynamic => Ok(value.clone()),
    }
}

fn to_bool(value: &Value, path: &Path) -> Result<Value, SchemaError> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(s) if s == "true" => Ok(Value::Bool(true)),
        Value::String(s) if s == "false" => Ok(Value::Bool(false)),
        _ => Err(SchemaError::coerce(path, "a bool is required")),
    }
}

fn to_number(value: &Value, path: &Path) -> Result<Value, SchemaError> {
    match value {
        Value::Number(_) => Ok(value.clone()),
        Value::String(s) => parse_number(s)
            .map(Value::Number)
            .ok_or_else(|| SchemaError::coerce(path, "a number is required")),
        _ => Err(SchemaError::coerce(path, "a number is required")),
    }
}

fn to_string(value: &Value, path: &Path) -> Result<Value, SchemaError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        _ => Err(SchemaError::coerce(path, "a string is required")),
    }
}

fn to_object(
    value: &Value,
    attrs: &BTreeMap<String, Type>,
    path: &Path,
) -> Result<Value, SchemaError> {
    let Some(entries) = value.entries() else {
        return Err(SchemaError::coerce(path, "an object is required"));
    };

    if let Some(extra) = entries.keys().find(|k| !attrs.contains_key(*k)) {
        return Err(SchemaError::coerce(
            path,
            format!("unexpected attribute {extra:?}"),
        ));
    }

    let mut out = BTreeMap::new();
    for (name, aty) in attrs {
        let Some(item) = entries.get(name) else {
            return Err(SchemaError::coerce(
                path,
                format!("attribute {name:?} is required"),
            ));
        };
        out.insert(name.clone(), convert(item, aty, &path.get_attr(name.as_str()))?);
    }
    Ok(Value::Object(out))
}

fn sequence<'v>(value: &'v Value, path: &Path, message: &str) -> Result<&'v [Value], SchemaError> {
    value
        .elements()
        .ok_or_else(|| SchemaError::coerce(path, message))
}

fn convert_each(items: &[Value], ety: &Type, path: &Path) -> Result<Vec<Value>, SchemaError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| convert(item, ety, &path.index(index_of(i))))
        .collect()
}

/// Parses a decimal string into a number, preferring integer forms.
#[must_use]
pub fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u64>() {
        return Some(Number::from(n));
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(Number::from(n));
    }
    s.parse::<f64>().ok().and_then(Number::from_f64)
}

pub(crate) fn index_of(i: usize) -> i64 {
    i64::try_from(i).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_conversions() {
        let root = Path::root();
        assert_eq!(
            convert(&Value::number(8080), &Type::String, &root).expect("number to string"),
            Value::string("8080")
        );
        assert_eq!(
            convert(&Value::string("42"), &Type::Number, &root).expect("string to number"),
            Value::number(42)
        );
        assert_eq!(
            convert(&Value::string("true"), &Type::Bool, &root).expect("string to bool"),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unparseable_number_is_rejected() {
        let err = convert(&Value::string("eighty"), &Type::Number, &Path::root().get_attr("port"))
            .expect_err("must fail");
        assert_eq!(err.to_string(), ".port: a number is required");
    }

    #[test]
    fn test_null_and_unknown_are_retyped() {
        let want = Type::list(Type::String);
        assert_eq!(
            convert(&Value::null(Type::Dynamic), &want, &Path::root()).expect("null"),
            Value::null(want.clone())
        );
        assert_eq!(
            convert(&Value::unknown(Type::Dynamic), &want, &Path::root()).expect("unknown"),
            Value::unknown(want)
        );
    }

    #[test]
    fn test_tuple_to_list_converts_elements() {
        let input = Value::Tuple(vec![Value::number(1), Value::string("2")]);
        let out = convert(&input, &Type::list(Type::String), &Path::root()).expect("convert");
        assert_eq!(
            out,
            Value::list(Type::String, vec![Value::string("1"), Value::string("2")])
        );
    }

    #[test]
    fn test_object_requires_exact_attributes() {
        let want = Type::object([("a", Type::String)]);
        let extra = Value::object([("a", Value::string("x")), ("b", Value::string("y"))]);
        let err = convert(&extra, &want, &Path::root()).expect_err("extra attribute");
        assert_eq!(err.to_string(), r#"unexpected attribute "b""#);

        let missing = Value::empty_object();
        let err = convert(&missing, &want, &Path::root()).expect_err("missing attribute");
        assert_eq!(err.to_string(), r#"attribute "a" is required"#);
    }

    #[test]
    fn test_nested_error_path() {
        let want = Type::map(Type::list(Type::Number));
        let input = Value::object([(
            "ports",
            Value::Tuple(vec![Value::number(1), Value::string("x")]),
        )]);
        let err = convert(&input, &want, &Path::root()).expect_err("bad element");
        assert_eq!(err.to_string(), r#"["ports"][1]: a number is required"#);
    }
}

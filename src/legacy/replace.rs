//! Conversion of flat keys that force replacement into value paths.

use crate::error::FlatmapError;
use crate::value::{Path, PathSet, PathStep, Type};

/// Converts flat keys into the set of attribute paths whose change forces
/// replacement.
///
/// Count keys contribute nothing, a path stops at the first set (set
/// elements have no stable address) or dynamic value (stored whole), and
/// trailing index or key steps are trimmed because only attributes can
/// require replacement.
///
/// # Errors
///
/// Returns an error if a key does not address anything in `ty`.
pub fn requires_replace<'a, I>(keys: I, ty: &Type) -> Result<PathSet, FlatmapError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut paths = PathSet::new();
    for key in keys {
        if key.is_empty() {
            continue;
        }
        let mut path = Path::root();
        object_path(key, ty, &mut path).map_err(|message| FlatmapError::InvalidKey {
            key: key.to_string(),
            message,
        })?;
        while let Some(step) = path.last() {
            if matches!(step, PathStep::GetAttr(_)) {
                break;
            }
            path.pop();
        }
        if !path.is_empty() {
            paths.insert(path);
        }
    }
    Ok(paths)
}

fn split(key: &str) -> (&str, &str) {
    key.split_once('.').unwrap_or((key, ""))
}

fn object_path(key: &str, ty: &Type, path: &mut Path) -> Result<(), String> {
    let Type::Object(atys) = ty else {
        return Err(format!("expected an object, found {}", ty.friendly_name()));
    };
    let (name, rest) = split(key);
    path.push(PathStep::GetAttr(name.to_string()));
    let Some(aty) = atys.get(name) else {
        return Err(format!("attribute {name:?} not found"));
    };
    if rest.is_empty() {
        return Ok(());
    }
    value_path(rest, aty, path)
}

fn value_path(key: &str, ty: &Type, path: &mut Path) -> Result<(), String> {
    match ty {
        Type::Bool | Type::Number | Type::String => {
            Err(format!("invalid step {key:?} with type {}", ty.friendly_name()))
        }
        Type::Object(_) => object_path(key, ty, path),
        Type::Set(_) | Type::Dynamic => Ok(()),
        Type::List(ety) => {
            let (head, rest) = split(key);
            if head == "#" {
                return Ok(());
            }
            let idx: i64 = head.parse().map_err(|_| format!("invalid index {head:?}"))?;
            path.push(PathStep::Index(idx));
            if rest.is_empty() {
                return Ok(());
            }
            value_path(rest, ety, path)
        }
        Type::Tuple(etys) => {
            let (head, rest) = split(key);
            if head == "#" {
                return Ok(());
            }
            let idx: usize = head.parse().map_err(|_| format!("invalid index {head:?}"))?;
            let Some(ety) = etys.get(idx) else {
                return Err(format!("index {idx} out of range"));
            };
            path.push(PathStep::Index(i64::try_from(idx).unwrap_or(i64::MAX)));
            if rest.is_empty() {
                return Ok(());
            }
            value_path(rest, ety, path)
        }
        Type::Map(ety) => {
            let (head, rest) = if ety.is_primitive() {
                (key, "")
            } else {
                split(key)
            };
            if head == "%" {
                return Ok(());
            }
            path.push(PathStep::Key(head.to_string()));
            if rest.is_empty() {
                return Ok(());
            }
            value_path(rest, ety, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty() -> Type {
        Type::object([
            ("name", Type::String),
            ("ports", Type::list(Type::Number)),
            ("tags", Type::map(Type::String)),
            (
                "disk",
                Type::list(Type::object([("size", Type::Number), ("kind", Type::String)])),
            ),
            ("rule", Type::set(Type::object([("cidr", Type::String)]))),
            ("any", Type::Dynamic),
            ("item", Type::Dynamic),
        ])
    }

    fn render(paths: &PathSet) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_attribute_paths() {
        let paths = requires_replace(["name", "disk.0.size", "disk.1.kind"], &ty()).expect("paths");
        assert_eq!(render(&paths), vec![".disk[0].size", ".disk[1].kind", ".name"]);
    }

    #[test]
    fn test_counts_and_indexes_are_trimmed() {
        let paths = requires_replace(["ports.#", "ports.0", "tags.%", "tags.a.b"], &ty())
            .expect("paths");
        assert_eq!(render(&paths), vec![".ports", ".tags"]);
    }

    #[test]
    fn test_set_stops_path() {
        let paths = requires_replace(["rule.1234.cidr", "rule.~99.cidr", "rule.#"], &ty())
            .expect("paths");
        assert_eq!(render(&paths), vec![".rule"]);
    }

    #[test]
    fn test_dynamic_stops_path() {
        let paths = requires_replace(["any", "item.0.v", "item.#"], &ty()).expect("paths");
        assert_eq!(render(&paths), vec![".any", ".item"]);
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let err = requires_replace(["nope"], &ty()).expect_err("missing attribute");
        assert_eq!(err.to_string(), r#"[nope] attribute "nope" not found"#);
    }
}

//! Change descriptors.
//!
//! A [`Change`] records what will happen to one resource instance: the
//! action, and the object before and after. [`ChangeSrc`] is the same
//! record with both objects encoded as JSON, suitable for plan files.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::legacy::{DiffChangeType, InstanceDiff};
use crate::value::{PathSet, Type, Value};

/// The action planned for a resource instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Nothing changes.
    NoOp,
    /// The instance is created.
    Create,
    /// The instance is read.
    Read,
    /// The instance is updated in place.
    Update,
    /// The instance is destroyed and then created again.
    DeleteThenCreate,
    /// The instance is destroyed.
    Delete,
}

impl Action {
    /// Maps a legacy diff onto an action.
    #[must_use]
    pub fn from_diff(diff: &InstanceDiff) -> Self {
        match diff.change_type() {
            DiffChangeType::None => Self::NoOp,
            DiffChangeType::Create => Self::Create,
            DiffChangeType::Update => Self::Update,
            DiffChangeType::Destroy => Self::Delete,
            DiffChangeType::DestroyCreate => Self::DeleteThenCreate,
        }
    }

    /// Returns true if the action destroys the existing instance.
    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Delete | Self::DeleteThenCreate)
    }

    /// Symbol used in plan output.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::NoOp => " ",
            Self::Create => "+",
            Self::Read => "<=",
            Self::Update => "~",
            Self::DeleteThenCreate => "-/+",
            Self::Delete => "-",
        }
    }
}

/// A planned change to one resource instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// What will happen.
    pub action: Action,
    /// Object before the change; null when creating.
    pub before: Value,
    /// Object after the change; null when deleting. May contain unknowns.
    pub after: Value,
}

/// A [`Change`] with both objects encoded as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSrc {
    /// What will happen.
    pub action: Action,
    /// Type both objects conform to.
    #[serde(rename = "type")]
    pub ty: Type,
    /// Encoded object before the change.
    pub before: serde_json::Value,
    /// Encoded object after the change.
    pub after: serde_json::Value,
}

/// A change together with the resource it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceInstanceChange {
    /// Resource instance address.
    pub addr: String,
    /// The change.
    pub change: Change,
    /// Attribute paths whose change forces replacement.
    pub required_replace: PathSet,
}

/// A [`ResourceInstanceChange`] in its encoded form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstanceChangeSrc {
    /// Resource instance address.
    pub addr: String,
    /// The encoded change.
    pub change: ChangeSrc,
    /// Attribute paths whose change forces replacement.
    #[serde(default)]
    pub required_replace: PathSet,
}

impl Change {
    /// Creates a change.
    #[must_use]
    pub const fn new(action: Action, before: Value, after: Value) -> Self {
        Self {
            action,
            before,
            after,
        }
    }

    /// Derives the action from the objects themselves.
    ///
    /// Any path in `required_replace` turns an update into a replacement.
    #[must_use]
    pub fn from_values(before: Value, after: Value, required_replace: &PathSet) -> Self {
        let action = match (before.is_null(), after.is_null()) {
            (true, true) => Action::NoOp,
            (true, false) => Action::Create,
            (false, true) => Action::Delete,
            (false, false) if before == after => Action::NoOp,
            (false, false) if !required_replace.is_empty() => Action::DeleteThenCreate,
            (false, false) => Action::Update,
        };
        Self::new(action, before, after)
    }

    /// Encodes both objects as JSON of type `ty`.
    #[must_use]
    pub fn encode(&self, ty: &Type) -> ChangeSrc {
        ChangeSrc {
            action: self.action,
            ty: ty.clone(),
            before: self.before.to_json(),
            after: self.after.to_json(),
        }
    }
}

impl ChangeSrc {
    /// Decodes both objects.
    ///
    /// # Errors
    ///
    /// Returns an error if either object does not conform to the recorded
    /// type.
    pub fn decode(&self) -> Result<Change, SchemaError> {
        Ok(Change {
            action: self.action,
            before: Value::from_json(&self.before, &self.ty)?,
            after: Value::from_json(&self.after, &self.ty)?,
        })
    }
}

impl ResourceInstanceChange {
    /// Encodes the change as JSON of type `ty`.
    #[must_use]
    pub fn encode(&self, ty: &Type) -> ResourceInstanceChangeSrc {
        ResourceInstanceChangeSrc {
            addr: self.addr.clone(),
            change: self.change.encode(ty),
            required_replace: self.required_replace.clone(),
        }
    }
}

impl ResourceInstanceChangeSrc {
    /// Decodes the change.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoded objects are malformed.
    pub fn decode(&self) -> Result<ResourceInstanceChange, SchemaError> {
        Ok(ResourceInstanceChange {
            addr: self.addr.clone(),
            change: self.change.decode()?,
            required_replace: self.required_replace.clone(),
        })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::DeleteThenCreate => "replace",
            Self::Delete => "delete",
        };
        write!(f, "{action}")
    }
}

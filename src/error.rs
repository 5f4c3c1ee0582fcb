//! Error types for the schemaplan reconciliation engine.
//!
//! This module provides the error hierarchy for every stage of the plan
//! lifecycle: configuration loading, schema coercion, flatmap conversion,
//! planning, state persistence and wire-schema conversion.

use std::path::PathBuf;
use thiserror::Error;

use crate::value::Path;

/// The main error type for schemaplan.
#[derive(Debug, Error)]
pub enum SchemaPlanError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Schema and coercion errors.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Flatmap encoding or decoding errors.
    #[error("Flatmap error: {0}")]
    Flatmap(#[from] FlatmapError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Wire-protocol schema conversion errors.
    #[error("Wire schema error: {0}")]
    Wire(#[from] WireError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration or input file was not found.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// A configuration or input file could not be parsed.
    #[error("Failed to parse {}: {message}", location.as_deref().unwrap_or("input"))]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Schema errors: coercion failures, invalid types and inconsistent schemas.
///
/// Every variant that concerns a value carries the path of the offending
/// attribute, index or key.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A value could not be coerced to the schema's implied type.
    #[error("{}", render_path_message(.path, .message))]
    Coerce {
        /// Location of the failure within the value.
        path: Path,
        /// What went wrong.
        message: String,
    },

    /// A serialized type could not be decoded.
    #[error("invalid type specification: {message}")]
    InvalidType {
        /// Description of the problem.
        message: String,
    },

    /// The schema itself is inconsistent.
    #[error("{}", render_path_message(.path, .message))]
    Invalid {
        /// Location of the offending attribute or block type.
        path: Path,
        /// Description of the inconsistency.
        message: String,
    },
}

/// Flatmap encoding or decoding errors.
#[derive(Debug, Error)]
pub enum FlatmapError {
    /// A container key did not end in `.#` or `.%`.
    #[error("invalid container key {key:?}")]
    InvalidContainerKey {
        /// The offending key.
        key: String,
    },

    /// A stored value could not be converted to its schema type.
    #[error("invalid value for {key:?} in state: {message}")]
    InvalidValue {
        /// The flat key.
        key: String,
        /// Conversion failure.
        message: String,
    },

    /// A stored count could not be parsed.
    #[error("invalid count value for {key:?} in state: {message}")]
    InvalidCount {
        /// The flat key prefix.
        key: String,
        /// Parse failure.
        message: String,
    },

    /// A tuple count did not match its type.
    #[error("wrong number of values for {key:?} in state: got {got}, but need {need}")]
    WrongCount {
        /// The flat key prefix.
        key: String,
        /// Stored count.
        got: usize,
        /// Count implied by the type.
        need: usize,
    },

    /// The type cannot be represented in flatmap form.
    #[error("cannot decode {type_name} from flatmap at {key:?}")]
    UnsupportedType {
        /// The flat key.
        key: String,
        /// Friendly name of the type.
        type_name: String,
    },

    /// A flat key does not address anything in the type.
    #[error("[{key}] {message}")]
    InvalidKey {
        /// The flat key.
        key: String,
        /// Description of the problem.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The diff recomputed at apply time is incompatible with the planned one.
    #[error("diffs didn't match during apply; the resource changed outside schemaplan: {reason}")]
    DiffChanged {
        /// First mismatch found.
        reason: String,
    },

    /// The plan was produced against a different schema.
    #[error("plan was created for schema {expected}, current schema is {found}")]
    SchemaMismatch {
        /// Hash recorded in the plan.
        expected: String,
        /// Hash of the current schema.
        found: String,
    },

    /// A customize-diff callback rejected an operation.
    #[error("{operation}: {message}")]
    Customize {
        /// Builder operation that failed.
        operation: String,
        /// Description of the failure.
        message: String,
    },

    /// The resource address is not present in the plan or state.
    #[error("resource not found: {addr}")]
    ResourceNotFound {
        /// Resource address.
        addr: String,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the write failure.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Wire-protocol schema conversion errors.
#[derive(Debug, Error)]
pub enum WireError {
    /// A nested block carried an unknown or unset nesting mode.
    #[error("block type {block:?} has invalid nesting mode {value}")]
    InvalidNesting {
        /// Block type name.
        block: String,
        /// Raw protocol value.
        value: i32,
    },

    /// An attribute's encoded type could not be decoded.
    #[error("attribute {attribute:?} has invalid type: {message}")]
    InvalidType {
        /// Attribute name.
        attribute: String,
        /// Decoding failure.
        message: String,
    },
}

/// Result type alias for schemaplan operations.
pub type Result<T> = std::result::Result<T, SchemaPlanError>;

fn render_path_message(path: &Path, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{path}: {message}")
    }
}

impl SchemaPlanError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::State(StateError::LockFailed { .. } | StateError::LockedByOther { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::State(StateError::LockFailed { .. }) => Some(2),
            Self::State(StateError::LockedByOther { .. }) => Some(10),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a parse error for a named source.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }

    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl SchemaError {
    /// Creates a coercion error at the given path.
    #[must_use]
    pub fn coerce(path: &Path, message: impl Into<String>) -> Self {
        Self::Coerce {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Creates a schema inconsistency error at the given path.
    #[must_use]
    pub fn invalid(path: &Path, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Returns the path carried by this error, if any.
    #[must_use]
    pub const fn path(&self) -> Option<&Path> {
        match self {
            Self::Coerce { path, .. } | Self::Invalid { path, .. } => Some(path),
            Self::InvalidType { .. } => None,
        }
    }
}

impl StateError {
    /// Creates a write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl PlanError {
    /// Creates a customize-diff error for the named builder operation.
    #[must_use]
    pub fn customize(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Customize {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_error_is_path_qualified() {
        let path = Path::root().get_attr("rule").index(2).get_attr("port");
        let err = SchemaError::coerce(&path, "a number is required");
        assert_eq!(err.to_string(), ".rule[2].port: a number is required");
    }

    #[test]
    fn test_root_error_has_no_path_prefix() {
        let err = SchemaError::coerce(&Path::root(), "an object is required");
        assert_eq!(err.to_string(), "an object is required");
    }

    #[test]
    fn test_only_lock_errors_are_retryable() {
        let lock = SchemaPlanError::State(StateError::LockFailed {
            message: String::from("busy"),
        });
        let diff = SchemaPlanError::Plan(PlanError::DiffChanged {
            reason: String::from("attribute mismatch: foo"),
        });
        assert!(lock.is_retryable());
        assert_eq!(lock.retry_delay_secs(), Some(2));
        assert!(!diff.is_retryable());
        assert_eq!(diff.retry_delay_secs(), None);
    }
}

//! Internal consistency checks for schemas.
//!
//! Schema-driven algorithms never fail on an inconsistent schema; they
//! degrade to a best-effort result. This validator is where inconsistencies
//! are reported, so schemas should pass through it once when loaded.

use tracing::debug;

use super::{Attribute, Block, NestedBlock, NestingMode};
use crate::error::{Result, SchemaError, SchemaPlanError};
use crate::value::Path;

/// Default limit on nested block depth.
const DEFAULT_MAX_DEPTH: usize = 32;

/// Validator for resource schemas.
#[derive(Debug)]
pub struct SchemaValidator {
    /// Deepest nesting of block types accepted.
    max_depth: usize,
}

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// Location of the offending attribute or block type.
    pub path: Path,
    /// The error message.
    pub message: String,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    /// Creates a new validator with the default depth limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Sets the deepest nesting of block types accepted.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validates a schema, collecting every problem found.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, block: &Block) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        self.validate_block(block, &Path::root(), 0, &mut result);

        if result.errors.is_empty() {
            debug!("Schema validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(SchemaPlanError::Schema(SchemaError::invalid(
                &first_error.path,
                first_error.message.clone(),
            )))
        }
    }

    /// Validates a block and everything nested within it.
    fn validate_block(
        &self,
        block: &Block,
        path: &Path,
        depth: usize,
        result: &mut ValidationResult,
    ) {
        if depth > self.max_depth {
            result.push_error(
                path,
                format!("Block nesting exceeds the maximum depth of {}", self.max_depth),
            );
            return;
        }

        for (name, attr) in &block.attributes {
            let attr_path = path.get_attr(name.as_str());
            if !is_valid_name(name) {
                result.push_error(
                    &attr_path,
                    format!("Attribute name '{name}' is invalid. Must be lowercase alphanumeric with underscores."),
                );
            }
            if block.block_types.contains_key(name) {
                result.push_error(
                    &attr_path,
                    format!("Name '{name}' is used by both an attribute and a block type"),
                );
            }
            Self::validate_attribute(attr, &attr_path, result);
        }

        for (name, nested) in &block.block_types {
            let block_path = path.get_attr(name.as_str());
            if !is_valid_name(name) {
                result.push_error(
                    &block_path,
                    format!("Block type name '{name}' is invalid. Must be lowercase alphanumeric with underscores."),
                );
            }
            Self::validate_nesting(nested, &block_path, result);
            if nested.block.deprecated {
                result.warnings.push(format!("{block_path}: Block type is deprecated"));
            }
            self.validate_block(&nested.block, &block_path, depth + 1, result);
        }
    }

    /// Validates attribute flag combinations.
    fn validate_attribute(attr: &Attribute, path: &Path, result: &mut ValidationResult) {
        if !attr.required && !attr.optional && !attr.computed {
            result.push_error(path, "Attribute must set one of required, optional or computed");
        }

        if attr.required && attr.optional {
            result.push_error(path, "Attribute cannot be both required and optional");
        }

        if attr.required && attr.computed {
            result.push_error(path, "Attribute cannot be both required and computed");
        }

        if attr.deprecated {
            result.warnings.push(format!("{path}: Attribute is deprecated"));
        }
    }

    /// Validates item limits against the nesting mode.
    fn validate_nesting(nested: &NestedBlock, path: &Path, result: &mut ValidationResult) {
        match nested.nesting {
            NestingMode::Single => {
                if nested.min_items != nested.max_items {
                    result.push_error(path, "min_items and max_items must match in single mode");
                }
                if nested.min_items > 1 || nested.max_items > 1 {
                    result.push_error(path, "min_items and max_items must be 0 or 1 in single mode");
                }
            }
            NestingMode::Group => {
                if nested.min_items != 0 || nested.max_items != 0 {
                    result.push_error(path, "min_items and max_items cannot be used in group mode");
                }
            }
            NestingMode::List | NestingMode::Set => {
                if nested.max_items != 0 && nested.min_items > nested.max_items {
                    result.push_error(
                        path,
                        format!(
                            "min_items ({}) is greater than max_items ({})",
                            nested.min_items, nested.max_items
                        ),
                    );
                }
                if nested.nesting == NestingMode::Set
                    && nested.block.implied_type().has_dynamic_types()
                {
                    result.push_error(path, "Set blocks may not contain dynamically-typed attributes");
                }
            }
            NestingMode::Map => {
                if nested.min_items != 0 || nested.max_items != 0 {
                    result.push_error(path, "min_items and max_items must both be 0 in map mode");
                }
            }
        }
    }
}

/// Validates that a name is lowercase alphanumeric with underscores.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl ValidationResult {
    fn push_error(&mut self, path: &Path, message: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.clone(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Type;

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("ingress_rule"));
        assert!(is_valid_name("v2"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Ingress"));
        assert!(!is_valid_name("ingress-rule"));
    }

    #[test]
    fn test_valid_schema_passes() {
        let mut deprecated = Attribute::optional(Type::String);
        deprecated.deprecated = true;
        let block = Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_attribute("old_name", deprecated)
            .with_block_type(
                "rule",
                NestedBlock::new(
                    NestingMode::List,
                    Block::new().with_attribute("port", Attribute::required(Type::Number)),
                )
                .with_items(1, 3),
            );

        let result = SchemaValidator::new().validate(&block).expect("valid schema");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_attribute_flag_combinations() {
        let mut bad = Attribute::required(Type::String);
        bad.computed = true;
        let mut none = Attribute::optional(Type::String);
        none.optional = false;
        let block = Block::new()
            .with_attribute("bad", bad)
            .with_attribute("none", none);

        let mut result = ValidationResult::default();
        SchemaValidator::new().validate_block(&block, &Path::root(), 0, &mut result);
        assert_eq!(result.error_count(), 2);
        assert_eq!(
            result.errors[0].to_string(),
            ".bad: Attribute cannot be both required and computed"
        );
    }

    #[test]
    fn test_nesting_limits() {
        let leaf = Block::new().with_attribute("x", Attribute::optional(Type::String));
        let block = Block::new()
            .with_block_type("s", NestedBlock::new(NestingMode::Single, leaf.clone()).with_items(0, 1))
            .with_block_type("g", NestedBlock::new(NestingMode::Group, leaf.clone()).with_items(1, 1))
            .with_block_type("l", NestedBlock::new(NestingMode::List, leaf.clone()).with_items(3, 2))
            .with_block_type("m", NestedBlock::new(NestingMode::Map, leaf).with_items(0, 5));

        let mut result = ValidationResult::default();
        SchemaValidator::new().validate_block(&block, &Path::root(), 0, &mut result);
        let paths: Vec<String> = result.errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec![".g", ".l", ".m", ".s"]);
    }

    #[test]
    fn test_collision_and_dynamic_set_rejected() {
        let block = Block::new()
            .with_attribute("x", Attribute::optional(Type::String))
            .with_block_type(
                "x",
                NestedBlock::new(
                    NestingMode::Set,
                    Block::new().with_attribute("v", Attribute::optional(Type::Dynamic)),
                ),
            );

        let err = SchemaValidator::new().validate(&block).expect_err("invalid schema");
        assert!(err.to_string().contains("used by both an attribute and a block type"));

        let mut result = ValidationResult::default();
        SchemaValidator::new().validate_block(&block, &Path::root(), 0, &mut result);
        assert!(result
            .errors
            .iter()
            .any(|e| e.message.contains("dynamically-typed")));
    }

    #[test]
    fn test_depth_limit() {
        let mut block = Block::new().with_attribute("x", Attribute::optional(Type::String));
        for _ in 0..4 {
            block = Block::new().with_block_type("n", NestedBlock::new(NestingMode::Group, block));
        }
        assert!(SchemaValidator::new().with_max_depth(2).validate(&block).is_err());
        assert!(SchemaValidator::new().validate(&block).is_ok());
    }
}

//! Schema and value document loading.
//!
//! Schemas are YAML or JSON documents mapping onto [`Block`]. Value
//! documents are plain JSON (or YAML) objects decoded against a type.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::schema::Block;
use crate::value::{Type, Value};

/// Document encodings understood by [`SchemaLoader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl DocumentFormat {
    /// Picks the format from a file extension; anything but `.json` is YAML.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Loader for schema, value and state documents.
#[derive(Debug, Default)]
pub struct SchemaLoader;

impl SchemaLoader {
    /// Creates a new loader.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn read(path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Ok(std::fs::read_to_string(path)?)
    }

    fn parse<T: DeserializeOwned>(content: &str, format: DocumentFormat, location: &str) -> Result<T> {
        let parsed = match format {
            DocumentFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::parse(message, location).into())
    }

    /// Loads a schema document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a schema.
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<Block> {
        let path = path.as_ref();
        info!("Loading schema from: {}", path.display());
        let content = Self::read(path)?;
        self.parse_schema(&content, DocumentFormat::from_path(path), &path.display().to_string())
    }

    /// Parses a schema document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a schema.
    pub fn parse_schema(&self, content: &str, format: DocumentFormat, location: &str) -> Result<Block> {
        let block: Block = Self::parse(content, format, location)?;
        debug!(
            "Parsed schema with {} attributes and {} block types",
            block.attributes.len(),
            block.block_types.len()
        );
        Ok(block)
    }

    /// Loads a value document and decodes it as `ty`.
    ///
    /// The unknown placeholder string decodes to an unknown value.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not conform.
    pub fn load_value(&self, path: impl AsRef<Path>, ty: &Type) -> Result<Value> {
        let path = path.as_ref();
        debug!("Loading value from: {}", path.display());
        let content = Self::read(path)?;
        self.parse_value(&content, DocumentFormat::from_path(path), &path.display().to_string(), ty)
    }

    /// Parses a value document as `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or does not conform.
    pub fn parse_value(
        &self,
        content: &str,
        format: DocumentFormat,
        location: &str,
        ty: &Type,
    ) -> Result<Value> {
        let json: serde_json::Value = Self::parse(content, format, location)?;
        Ok(Value::from_json(&json, ty)?)
    }

    /// Loads any serialized document, such as a plan file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_document<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let content = Self::read(path)?;
        Self::parse(&content, DocumentFormat::from_path(path), &path.display().to_string())
    }
}

//! Content hashing for schemas, values and set elements.
//!
//! Schema and configuration hashes are recorded in plans so that apply can
//! detect a schema change between plan and apply. Set-element hash codes
//! become flatmap keys, so they must stay stable across releases.

use sha2::{Digest, Sha256};

use crate::schema::{Attribute, Block, NestedBlock};
use crate::value::Value;

/// Hasher for schemas and values.
#[derive(Debug, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Creates a new content hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of a whole schema.
    ///
    /// Descriptions are excluded; they do not affect planning.
    #[must_use]
    pub fn hash_block(&self, block: &Block) -> String {
        let mut hasher = Sha256::new();
        Self::update_block(&mut hasher, block);
        hex::encode(hasher.finalize())
    }

    fn update_block(hasher: &mut Sha256, block: &Block) {
        // Attributes (BTreeMap iteration is sorted)
        for (name, attr) in &block.attributes {
            hasher.update(b"attr:");
            hasher.update(name.as_bytes());
            Self::update_attribute(hasher, attr);
        }

        // Nested block types
        for (name, nested) in &block.block_types {
            hasher.update(b"block:");
            hasher.update(name.as_bytes());
            Self::update_nested(hasher, nested);
        }

        hasher.update(b"end");
    }

    fn update_attribute(hasher: &mut Sha256, attr: &Attribute) {
        hasher.update(attr.ty.to_json().to_string().as_bytes());
        hasher.update([
            u8::from(attr.required),
            u8::from(attr.optional),
            u8::from(attr.computed),
            u8::from(attr.sensitive),
        ]);
    }

    fn update_nested(hasher: &mut Sha256, nested: &NestedBlock) {
        hasher.update(nested.nesting.to_string().as_bytes());
        hasher.update(nested.min_items.to_be_bytes());
        hasher.update(nested.max_items.to_be_bytes());
        Self::update_block(hasher, &nested.block);
    }

    /// Computes a hash of a value, including its type.
    #[must_use]
    pub fn hash_value(&self, value: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(value.ty().to_json().to_string().as_bytes());
        hasher.update(value.canonical_key().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes the non-negative 31-bit hash code used to key set elements.
    #[must_use]
    pub fn hash_code(&self, input: &str) -> u32 {
        let digest = Sha256::digest(input.as_bytes());
        let code = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        code & 0x7fff_ffff
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes to determine if they are equal.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NestingMode;
    use crate::value::Type;

    fn create_test_block(computed: bool) -> Block {
        let mut id = Attribute::optional(Type::String);
        id.computed = computed;
        Block::new().with_attribute("id", id).with_block_type(
            "rule",
            NestedBlock::new(
                NestingMode::Set,
                Block::new().with_attribute("port", Attribute::required(Type::Number)),
            ),
        )
    }

    #[test]
    fn test_block_hash_deterministic() {
        let hasher = ContentHasher::new();
        let block = create_test_block(false);
        assert_eq!(hasher.hash_block(&block), hasher.hash_block(&block.clone()));
    }

    #[test]
    fn test_block_hash_ignores_descriptions() {
        let hasher = ContentHasher::new();
        let mut described = create_test_block(false);
        described.description = String::from("A firewall");
        assert_eq!(
            hasher.hash_block(&described),
            hasher.hash_block(&create_test_block(false))
        );
    }

    #[test]
    fn test_flag_change_changes_hash() {
        let hasher = ContentHasher::new();
        assert_ne!(
            hasher.hash_block(&create_test_block(false)),
            hasher.hash_block(&create_test_block(true))
        );
    }

    #[test]
    fn test_hash_code_is_stable_and_non_negative() {
        let hasher = ContentHasher::new();
        let code = hasher.hash_code("\"80\"");
        assert_eq!(code, hasher.hash_code("\"80\""));
        assert!(code <= 0x7fff_ffff);
        assert_ne!(code, hasher.hash_code("\"443\""));
    }

    #[test]
    fn test_value_hash_includes_type() {
        let hasher = ContentHasher::new();
        assert_ne!(
            hasher.hash_value(&Value::null(Type::String)),
            hasher.hash_value(&Value::null(Type::Number))
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = ContentHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(ContentHasher::hashes_match("abc123", "abc123"));
        assert!(!ContentHasher::hashes_match("abc123", "abc124"));
        assert!(!ContentHasher::hashes_match("abc123", "abc12"));
    }
}

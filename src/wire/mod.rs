//! Provider protocol schema messages.
//!
//! The protocol carries schemas as flat messages with attributes and block
//! types in name order, and attribute types as JSON-encoded bytes.

mod convert;
pub mod proto;

pub use convert::{block_to_proto, proto_to_block, proto_to_schema, schema_to_proto};

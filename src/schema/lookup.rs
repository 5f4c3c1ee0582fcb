//! Path-indexed schema lookup.

use super::{Attribute, Block, NestingMode};
use crate::value::{Path, PathStep};

enum Target<'a> {
    Attribute(&'a Attribute),
    Block(&'a Block),
}

impl Block {
    /// Returns the attribute addressed by `path`, or `None` if the path does
    /// not end exactly at an attribute.
    ///
    /// Index and key steps may only follow a list, set or map block step.
    #[must_use]
    pub fn attribute_by_path(&self, path: &Path) -> Option<&Attribute> {
        match self.walk(path)? {
            Target::Attribute(attr) => Some(attr),
            Target::Block(_) => None,
        }
    }

    /// Returns the block addressed by `path`, or `None` if the path does not
    /// end exactly at a nested block. The root path addresses `self`.
    #[must_use]
    pub fn block_by_path(&self, path: &Path) -> Option<&Block> {
        match self.walk(path)? {
            Target::Block(block) => Some(block),
            Target::Attribute(_) => None,
        }
    }

    fn walk(&self, path: &Path) -> Option<Target<'_>> {
        let mut block = self;
        let mut steps = path.steps().iter().peekable();

        while let Some(step) = steps.next() {
            let PathStep::GetAttr(name) = step else {
                return None;
            };

            if let Some(attr) = block.attributes.get(name) {
                return steps.peek().is_none().then_some(Target::Attribute(attr));
            }

            let nested = block.block_types.get(name)?;
            if let Some(PathStep::Index(_) | PathStep::Key(_)) = steps.peek() {
                match nested.nesting {
                    NestingMode::List | NestingMode::Set | NestingMode::Map => {
                        steps.next();
                    }
                    NestingMode::Single | NestingMode::Group => return None,
                }
            }
            block = &nested.block;
        }

        Some(Target::Block(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NestedBlock;
    use crate::value::Type;

    fn schema() -> Block {
        let disk = Block::new().with_attribute("size", Attribute::optional(Type::Number));
        let network = Block::new()
            .with_attribute("cidr", Attribute::required(Type::String))
            .with_block_type("disk", NestedBlock::new(NestingMode::List, disk));
        Block::new()
            .with_attribute("id", Attribute::computed(Type::String))
            .with_block_type("network", NestedBlock::new(NestingMode::Single, network))
    }

    #[test]
    fn test_attribute_by_path() {
        let block = schema();
        let size = Path::root()
            .get_attr("network")
            .get_attr("disk")
            .index(0)
            .get_attr("size");
        assert_eq!(
            block.attribute_by_path(&size).map(|a| &a.ty),
            Some(&Type::Number)
        );
        assert!(block.attribute_by_path(&Path::root().get_attr("id")).is_some());
    }

    #[test]
    fn test_attribute_must_be_last_step() {
        let block = schema();
        assert!(block
            .attribute_by_path(&Path::root().get_attr("id").get_attr("x"))
            .is_none());
        assert!(block.attribute_by_path(&Path::root().get_attr("network")).is_none());
        assert!(block.attribute_by_path(&Path::root().get_attr("nope")).is_none());
    }

    #[test]
    fn test_block_by_path() {
        let block = schema();
        let disk = block
            .block_by_path(&Path::root().get_attr("network").get_attr("disk").index(1))
            .expect("disk block");
        assert!(disk.attributes.contains_key("size"));
        assert!(block.block_by_path(&Path::root().get_attr("id")).is_none());
        assert!(block
            .block_by_path(&Path::root().get_attr("network").index(0))
            .is_none());
    }
}

//! Paths addressing a location within a value or schema.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStep {
    /// Object attribute or nested block name.
    GetAttr(String),
    /// List or tuple position.
    Index(i64),
    /// Map key.
    Key(String),
}

/// A sequence of steps from the root of a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<PathStep>);

/// An ordered, duplicate-free collection of paths.
pub type PathSet = BTreeSet<Path>;

impl Path {
    /// The empty path, addressing the root value.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Builds a path from steps.
    #[must_use]
    pub const fn from_steps(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Returns a copy of this path extended by an attribute step.
    #[must_use]
    pub fn get_attr(&self, name: impl Into<String>) -> Self {
        self.child(PathStep::GetAttr(name.into()))
    }

    /// Returns a copy of this path extended by an index step.
    #[must_use]
    pub fn index(&self, index: i64) -> Self {
        self.child(PathStep::Index(index))
    }

    /// Returns a copy of this path extended by a key step.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        self.child(PathStep::Key(key.into()))
    }

    fn child(&self, step: PathStep) -> Self {
        let mut steps = Vec::with_capacity(self.0.len() + 1);
        steps.extend_from_slice(&self.0);
        steps.push(step);
        Self(steps)
    }

    /// Appends a step in place.
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    /// Removes and returns the last step.
    pub fn pop(&mut self) -> Option<PathStep> {
        self.0.pop()
    }

    /// Returns the steps of this path.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Returns the last step, if any.
    #[must_use]
    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetAttr(name) => write!(f, ".{name}"),
            Self::Index(idx) => write!(f, "[{idx}]"),
            Self::Key(key) => write!(f, "[{key:?}]"),
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

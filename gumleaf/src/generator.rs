//! The contract for turning source text into trees.

use crate::tree::Tree;

/// Parses source text of one language into a [`Tree`].
///
/// Implementations either return a complete tree or fail; the matching
/// core never sees a partially built one. Empty input may yield
/// [`Tree::empty`].
pub trait TreeGenerator {
    /// Why parsing failed.
    type Error: core::error::Error;

    /// Parse `source` into a tree.
    fn generate_from_str(&self, source: &str) -> Result<Tree, Self::Error>;
}

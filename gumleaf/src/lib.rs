//! # Gumleaf
//!
//! GumTree-style AST matching with Chawathe edit script generation.
//!
//! ## Algorithm Overview
//!
//! Gumleaf implements a tree diff algorithm based on:
//! - **GumTree** (Falleri et al., ASE 2014) for node matching
//! - **Chawathe algorithm** (1996) for edit script generation
//!
//! The algorithm works in phases:
//!
//! 1. **Top-down matching**: Map the tallest isomorphic subtrees (Merkle-tree
//!    hashes, then a full comparison), resolving ambiguous candidates by
//!    their parents' similarity
//! 2. **Bottom-up matching**: Map containers whose descendants are largely
//!    mapped together (Dice coefficient), then recover finer mappings inside
//!    them with an optimal edit distance or a child alignment
//! 3. **Edit script generation**: Produce `insert-node`, `delete-node`,
//!    `update-node` and `move-node` actions, optionally grouped into
//!    `insert-tree`/`delete-tree`
//!
//! Trees are parsed by a [`TreeGenerator`]; the engine itself never reads
//! source text.
//!
//! ## Usage
//!
//! ```
//! use gumleaf::{DiffOptions, NodeData, TreeBuilder, diff_trees};
//!
//! let mut src = TreeBuilder::new();
//! let root = src.set_root(NodeData::new("Expr"));
//! src.add_child(root, NodeData::new("Name").with_value("i"));
//! src.add_child(root, NodeData::new("Op").with_value("++"));
//! let src = src.build();
//!
//! let mut dst = TreeBuilder::new();
//! let root = dst.set_root(NodeData::new("Expr"));
//! dst.add_child(root, NodeData::new("Name").with_value("i"));
//! dst.add_child(root, NodeData::new("Op").with_value("--"));
//! let dst = dst.build();
//!
//! let diff = diff_trees(&src, &dst, &DiffOptions::default());
//! assert_eq!(diff.mappings.len(), 3);
//! assert_eq!(diff.script.len(), 1);
//! assert_eq!(diff.script.count("update-node"), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;
pub(crate) use tracing_macros::{debug, trace};

/// Batch diffing on the rayon pool
pub mod batch;
mod chawathe;
/// Tuning options
pub mod config;
mod generator;
mod lcs;
/// Node correspondence between two trees
pub mod mapping;
/// GumTree matching phases and strategies
pub mod matching;
mod replay;
mod simplify;
/// Tree representation with metrics and metadata
pub mod tree;
mod working;

#[cfg(test)]
mod test_util;

pub use chawathe::*;
pub use config::{Config, ConfigError, ConfigOption, Configurable, MatcherDescriptor, OptionValue};
pub use generator::TreeGenerator;
pub use mapping::MappingStore;
pub use matching::{CompositeMatcher, Matcher, Strategy, compute_mappings};
pub use replay::{ReplayError, replay};
pub use tree::{Metadata, NodeData, NodePath, Tree, TreeBuilder};

/// How [`diff_trees`] matches and which script it writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffOptions {
    /// Matcher pipeline.
    pub strategy: Strategy,
    /// Options for the pipeline.
    pub config: Config,
    /// Script generator.
    pub script: ScriptKind,
}

impl DiffOptions {
    /// Options named by a matcher descriptor such as
    /// `ClassicGumtree@GT_BUM_SMT@0.1`, with the classic script generator.
    pub fn from_descriptor(descriptor: &str) -> Result<Self, ConfigError> {
        let descriptor: MatcherDescriptor = descriptor.parse()?;
        let (strategy, config) = Strategy::from_descriptor(&descriptor)?;
        Ok(Self {
            strategy,
            config,
            script: ScriptKind::Classic,
        })
    }
}

/// Result of [`diff_trees`].
#[derive(Debug, Clone)]
pub struct Diff {
    /// Node correspondence found by the matcher.
    pub mappings: MappingStore,
    /// Actions turning the source into the destination.
    pub script: EditScript,
}

/// Compute a diff between two trees.
///
/// This is the main entry point for tree diffing. It:
/// 1. Computes mappings between nodes with the configured strategy
/// 2. Generates an edit script from them with the configured generator
///
/// Total over any two trees, empty ones included.
pub fn diff_trees(src: &Tree, dst: &Tree, options: &DiffOptions) -> Diff {
    let mappings = compute_mappings(src, dst, options.strategy, &options.config);
    let script = options.script.generate(src, dst, &mappings);
    debug!(
        mapped = mappings.len(),
        actions = script.len(),
        "diff_trees done"
    );
    Diff { mappings, script }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{n, tree};
    use facet_testhelpers::test;

    #[test]
    fn self_diff_is_empty() {
        let t = tree(n("Unit").c([
            n("Import").c([n("Name").v("a")]),
            n("Class").v("A").c([n("Field").v("x"), n("Method").v("m").c([n("Block")])]),
        ]));
        for strategy in Strategy::ALL {
            for script in [ScriptKind::Classic, ScriptKind::Simplified] {
                let options = DiffOptions {
                    strategy,
                    script,
                    ..DiffOptions::default()
                };
                let diff = diff_trees(&t, &t, &options);
                assert!(diff.script.is_empty(), "{}", diff.script);
                assert!(t.pre_order().all(|id| diff.mappings.has(id, id)));
            }
        }
    }

    #[test]
    fn empty_trees_are_fine() {
        let t = tree(n("A").c([n("B")]));
        let empty = Tree::empty();
        let options = DiffOptions::default();
        assert!(diff_trees(&empty, &empty, &options).script.is_empty());
        assert_eq!(diff_trees(&empty, &t, &options).script.len(), 2);
        assert_eq!(diff_trees(&t, &empty, &options).script.len(), 2);
    }

    #[test]
    fn options_from_descriptor() {
        let options = DiffOptions::from_descriptor("SimpleGumtree@GT_STM_MH@2").unwrap();
        assert_eq!(options.strategy, Strategy::SimpleGumtree);
        assert_eq!(options.config.st_minheight(), 2);
        assert!(DiffOptions::from_descriptor("ClassicGumtree@GT_BUM_SMT@7").is_err());
    }
}

//! Bidirectional node correspondence between a source and a destination tree.

use crate::tree::Tree;
use indextree::NodeId;

/// A strict partial bijection between source and destination nodes.
///
/// Uses `Vec` for O(1) lookups indexed by `NodeId`. Grows monotonically:
/// matchers only ever add pairs.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    /// Indexed by source `NodeId`
    src_to_dst: Vec<Option<NodeId>>,
    /// Indexed by destination `NodeId`
    dst_to_src: Vec<Option<NodeId>>,
    /// Pairs in insertion order
    pairs: Vec<(NodeId, NodeId)>,
}

impl MappingStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store sized for the given trees.
    pub fn for_trees(src: &Tree, dst: &Tree) -> Self {
        Self {
            src_to_dst: vec![None; src.arena().count() + 1],
            dst_to_src: vec![None; dst.arena().count() + 1],
            pairs: Vec::with_capacity(src.len().min(dst.len())),
        }
    }

    /// Map `src` to `dst`.
    ///
    /// # Panics
    ///
    /// If either node is already mapped. A matcher that does this is broken.
    pub fn add(&mut self, src: NodeId, dst: NodeId) {
        let src_idx = usize::from(src);
        let dst_idx = usize::from(dst);
        assert!(
            !self.is_src_mapped(src),
            "source node {src_idx} is already mapped"
        );
        assert!(
            !self.is_dst_mapped(dst),
            "destination node {dst_idx} is already mapped"
        );

        if src_idx >= self.src_to_dst.len() {
            self.src_to_dst.resize(src_idx + 1, None);
        }
        if dst_idx >= self.dst_to_src.len() {
            self.dst_to_src.resize(dst_idx + 1, None);
        }

        self.src_to_dst[src_idx] = Some(dst);
        self.dst_to_src[dst_idx] = Some(src);
        self.pairs.push((src, dst));
    }

    /// Map two isomorphic subtrees node for node, in pre-order.
    pub fn add_recursively(&mut self, src_tree: &Tree, src: NodeId, dst_tree: &Tree, dst: NodeId) {
        for (s, d) in src_tree.subtree(src).zip(dst_tree.subtree(dst)) {
            self.add(s, d);
        }
    }

    /// Whether a source node is mapped.
    #[inline(always)]
    pub fn is_src_mapped(&self, src: NodeId) -> bool {
        self.dst_for(src).is_some()
    }

    /// Whether a destination node is mapped.
    #[inline(always)]
    pub fn is_dst_mapped(&self, dst: NodeId) -> bool {
        self.src_for(dst).is_some()
    }

    /// Destination partner of a source node.
    #[inline(always)]
    pub fn dst_for(&self, src: NodeId) -> Option<NodeId> {
        self.src_to_dst.get(usize::from(src)).copied().flatten()
    }

    /// Source partner of a destination node.
    #[inline(always)]
    pub fn src_for(&self, dst: NodeId) -> Option<NodeId> {
        self.dst_to_src.get(usize::from(dst)).copied().flatten()
    }

    /// Whether exactly this pair is mapped.
    pub fn has(&self, src: NodeId, dst: NodeId) -> bool {
        self.dst_for(src) == Some(dst)
    }

    /// Neither node is mapped yet.
    pub fn are_both_unmapped(&self, src: NodeId, dst: NodeId) -> bool {
        !self.is_src_mapped(src) && !self.is_dst_mapped(dst)
    }

    /// The pair may be added: both unmapped and of the same kind.
    pub fn is_mapping_allowed(
        &self,
        src_tree: &Tree,
        src: NodeId,
        dst_tree: &Tree,
        dst: NodeId,
    ) -> bool {
        src_tree.kind(src) == dst_tree.kind(dst) && self.are_both_unmapped(src, dst)
    }

    /// All pairs in the order they were added.
    pub fn pairs(&self) -> impl ExactSizeIterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pair has been added.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Many-to-many candidate store used while collecting isomorphic subtrees.
///
/// Keeps insertion order so that iteration stays deterministic.
#[derive(Debug, Default)]
pub(crate) struct MultiMappingStore {
    pairs: Vec<(NodeId, NodeId)>,
    src_count: rapidhash::RapidHashMap<NodeId, usize>,
    dst_count: rapidhash::RapidHashMap<NodeId, usize>,
}

impl MultiMappingStore {
    pub(crate) fn add(&mut self, src: NodeId, dst: NodeId) {
        self.pairs.push((src, dst));
        *self.src_count.entry(src).or_default() += 1;
        *self.dst_count.entry(dst).or_default() += 1;
    }

    /// Source nodes, first-seen order, deduplicated.
    pub(crate) fn srcs(&self) -> Vec<NodeId> {
        let mut seen = rapidhash::RapidHashSet::default();
        self.pairs
            .iter()
            .filter(|(s, _)| seen.insert(*s))
            .map(|(s, _)| *s)
            .collect()
    }

    pub(crate) fn dsts_of(&self, src: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.pairs
            .iter()
            .filter(move |(s, _)| *s == src)
            .map(|(_, d)| *d)
    }

    /// The source has one candidate, and that candidate has one source.
    pub(crate) fn is_unique(&self, src: NodeId) -> bool {
        self.src_count.get(&src) == Some(&1)
            && self
                .dsts_of(src)
                .all(|d| self.dst_count.get(&d) == Some(&1))
    }

    pub(crate) fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

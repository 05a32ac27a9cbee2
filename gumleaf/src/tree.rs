//! Labeled ordered trees.
//!
//! A [`Tree`] is built once through a [`TreeBuilder`] and is read-only
//! afterwards. Building computes every structural metric (Merkle hashes,
//! size, height, depth, sibling position, traversal indices) in two passes so
//! matchers can treat them as O(1) lookups.

mod metadata;
mod path;

pub use metadata::{IDENTITY_KEY, Metadata, MetadataValue};
pub use path::{NodePath, PathError};

use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::VecDeque;

use indextree::{Arena, NodeEdge, NodeId};
use rapidhash::RapidHasher;

/// Merkle hash of a subtree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHash(pub u64);

/// Structural metrics of a node, computed by [`TreeBuilder::build`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Hash of kind, value and children hashes.
    pub hash: NodeHash,
    /// Hash of kinds and shape only; values are ignored.
    pub structure_hash: NodeHash,
    /// Number of nodes in the subtree, self included.
    pub size: usize,
    /// Longest downward path to a leaf. Leaves have height 0.
    pub height: usize,
    /// Distance from the root.
    pub depth: usize,
    /// Index among the parent's children.
    pub position: usize,
    /// Index in a pre-order walk of the whole tree.
    pub preorder: usize,
    /// Index in a post-order walk of the whole tree.
    pub postorder: usize,
}

/// A node: a kind, an optional value and metadata.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// Syntactic category (e.g. `MethodDeclaration`).
    pub kind: String,
    /// Token text, identifier, literal...
    pub value: Option<String>,
    /// Annotations that never take part in matching.
    pub metadata: Metadata,
    metrics: Metrics,
}

impl NodeData {
    /// A node of the given kind with no value.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
            metadata: Metadata::new(),
            metrics: Metrics::default(),
        }
    }

    /// Set the value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata<V: core::any::Any + Send + Sync>(
        mut self,
        key: impl Into<String>,
        value: V,
    ) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Metrics computed when the owning tree was built.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The value, or `""` when there is none.
    pub fn label(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// Same kind and same value.
    pub fn has_same_label(&self, other: &NodeData) -> bool {
        self.kind == other.kind && self.value == other.value
    }

    /// Copy of kind, value and metadata without metrics.
    pub(crate) fn detached(&self) -> NodeData {
        NodeData {
            kind: self.kind.clone(),
            value: self.value.clone(),
            metadata: self.metadata.clone(),
            metrics: Metrics::default(),
        }
    }
}

impl fmt::Display for NodeData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}: {}", self.kind, value),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Mutable staging area for a [`Tree`].
#[derive(Debug, Default)]
pub struct TreeBuilder {
    arena: Arena<NodeData>,
    root: Option<NodeId>,
}

impl TreeBuilder {
    /// An empty builder. Building it without a root yields an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root, discarding any previous root and its subtree.
    pub fn set_root(&mut self, data: NodeData) -> NodeId {
        if let Some(old) = self.root.take() {
            old.remove_subtree(&mut self.arena);
        }
        let id = self.arena.new_node(data);
        self.root = Some(id);
        id
    }

    /// Append a child to `parent`.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.arena.new_node(data);
        parent.append(id, &mut self.arena);
        id
    }

    /// The current root.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Mutable access to a node's metadata.
    pub fn metadata_mut(&mut self, id: NodeId) -> &mut Metadata {
        &mut self.arena[id].get_mut().metadata
    }

    /// Freeze the tree, computing all metrics.
    pub fn build(self) -> Tree {
        let Self { mut arena, root } = self;
        let Some(root) = root else {
            return Tree::empty();
        };

        let preorder: Vec<NodeId> = root.descendants(&arena).collect();
        let postorder: Vec<NodeId> = root
            .traverse(&arena)
            .filter_map(|edge| match edge {
                NodeEdge::End(id) => Some(id),
                NodeEdge::Start(_) => None,
            })
            .collect();

        // Top-down: depth, position, pre-order index.
        for (index, &id) in preorder.iter().enumerate() {
            let depth = arena[id]
                .parent()
                .map_or(0, |p| arena[p].get().metrics.depth + 1);
            let metrics = &mut arena[id].get_mut().metrics;
            metrics.preorder = index;
            metrics.depth = depth;

            let children: Vec<NodeId> = id.children(&arena).collect();
            for (position, child) in children.into_iter().enumerate() {
                arena[child].get_mut().metrics.position = position;
            }
        }

        // Bottom-up: size, height, hashes, post-order index.
        for (index, &id) in postorder.iter().enumerate() {
            let children: Vec<NodeId> = id.children(&arena).collect();
            let data = arena[id].get();

            let mut hasher = RapidHasher::default();
            data.kind.hash(&mut hasher);
            data.value.hash(&mut hasher);
            children.len().hash(&mut hasher);

            let mut shape = RapidHasher::default();
            data.kind.hash(&mut shape);
            children.len().hash(&mut shape);

            let mut size = 1;
            let mut height = 0;
            for &child in &children {
                let child_metrics = arena[child].get().metrics;
                size += child_metrics.size;
                height = height.max(child_metrics.height + 1);
                child_metrics.hash.0.hash(&mut hasher);
                child_metrics.structure_hash.0.hash(&mut shape);
            }

            let metrics = &mut arena[id].get_mut().metrics;
            metrics.size = size;
            metrics.height = height;
            metrics.hash = NodeHash(hasher.finish());
            metrics.structure_hash = NodeHash(shape.finish());
            metrics.postorder = index;
        }

        Tree {
            arena,
            root: Some(root),
            preorder,
            postorder,
        }
    }
}

/// An immutable labeled ordered tree with precomputed metrics.
///
/// Node ids are local to the tree's arena: ids from a source tree and a
/// destination tree are unrelated even when numerically equal.
#[derive(Debug, Clone)]
pub struct Tree {
    arena: Arena<NodeData>,
    root: Option<NodeId>,
    preorder: Vec<NodeId>,
    postorder: Vec<NodeId>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::empty()
    }
}

impl Tree {
    /// A tree with zero nodes.
    pub fn empty() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            preorder: Vec::new(),
            postorder: Vec::new(),
        }
    }

    /// The root, or `None` for an empty tree.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// The backing arena.
    pub fn arena(&self) -> &Arena<NodeData> {
        &self.arena
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.preorder.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.preorder.is_empty()
    }

    /// Node payload.
    #[inline]
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Node kind.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &str {
        &self.get(id).kind
    }

    /// Node value.
    #[inline]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.get(id).value.as_deref()
    }

    /// Node metrics.
    #[inline]
    pub fn metrics(&self, id: NodeId) -> &Metrics {
        &self.get(id).metrics
    }

    /// Merkle hash of the subtree rooted at `id`.
    #[inline]
    pub fn hash(&self, id: NodeId) -> NodeHash {
        self.metrics(id).hash
    }

    /// Subtree size, self included.
    #[inline]
    pub fn size(&self, id: NodeId) -> usize {
        self.metrics(id).size
    }

    /// Subtree height (leaves are 0).
    #[inline]
    pub fn height(&self, id: NodeId) -> usize {
        self.metrics(id).height
    }

    /// Index among siblings.
    #[inline]
    pub fn position(&self, id: NodeId) -> usize {
        self.metrics(id).position
    }

    /// Parent, or `None` for the root.
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Whether `id` has no children.
    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.arena[id].first_child().is_none()
    }

    /// Children in order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// The `index`-th child.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    /// Number of children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// The subtree rooted at `id` in pre-order, `id` first.
    pub fn subtree(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Proper descendants of `id` in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.subtree(id).skip(1)
    }

    /// The subtree rooted at `id` in post-order, `id` last.
    pub fn subtree_post_order(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.traverse(&self.arena).filter_map(|edge| match edge {
            NodeEdge::End(n) => Some(n),
            NodeEdge::Start(_) => None,
        })
    }

    /// Proper ancestors of `id`, closest first.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena).skip(1)
    }

    /// All nodes in pre-order.
    pub fn pre_order(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.preorder.iter().copied()
    }

    /// All nodes in post-order.
    pub fn post_order(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.postorder.iter().copied()
    }

    /// All nodes level by level.
    pub fn breadth_first(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len());
        let mut queue: VecDeque<NodeId> = self.root.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            out.push(id);
            queue.extend(self.children(id));
        }
        out
    }

    /// Node with the given pre-order index.
    pub fn node_at_preorder(&self, index: usize) -> Option<NodeId> {
        self.preorder.get(index).copied()
    }

    /// Positional address of `id`.
    pub fn path_of(&self, id: NodeId) -> NodePath {
        let mut steps: smallvec::SmallVec<[u32; 16]> = id
            .ancestors(&self.arena)
            .filter(|&n| self.parent(n).is_some())
            .map(|n| self.position(n) as u32)
            .collect();
        steps.reverse();
        NodePath(steps)
    }

    /// Resolve a positional address.
    pub fn node_at(&self, path: &NodePath) -> Option<NodeId> {
        let mut current = self.root?;
        for &step in path.0.iter() {
            current = self.child(current, step as usize)?;
        }
        Some(current)
    }

    /// Whether the subtree at `a` and the subtree at `b` in `other` have the
    /// same kinds, values and shape. Metadata is ignored.
    pub fn is_isomorphic(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        if self.hash(a) != other.hash(b) {
            return false;
        }
        self.same_shape(a, other, b, NodeData::has_same_label)
    }

    /// Like [`Tree::is_isomorphic`] but values are ignored.
    pub fn is_structurally_isomorphic(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        if self.metrics(a).structure_hash != other.metrics(b).structure_hash {
            return false;
        }
        self.same_shape(a, other, b, |x, y| x.kind == y.kind)
    }

    /// Whole-tree isomorphism. Two empty trees are isomorphic.
    pub fn is_isomorphic_to(&self, other: &Tree) -> bool {
        match (self.root, other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => self.is_isomorphic(a, other, b),
            _ => false,
        }
    }

    fn same_shape(
        &self,
        a: NodeId,
        other: &Tree,
        b: NodeId,
        same: impl Fn(&NodeData, &NodeData) -> bool,
    ) -> bool {
        let mut stack = vec![(a, b)];
        while let Some((x, y)) = stack.pop() {
            if !same(self.get(x), other.get(y)) || self.size(x) != other.size(y) {
                return false;
            }
            let xs: Vec<NodeId> = self.children(x).collect();
            let ys: Vec<NodeId> = other.children(y).collect();
            if xs.len() != ys.len() {
                return false;
            }
            stack.extend(xs.into_iter().zip(ys));
        }
        true
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.get(id), indent = indent * 4)?;
        for child in self.children(id) {
            self.fmt_node(f, child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => self.fmt_node(f, root, 0),
            None => writeln!(f, "<empty>"),
        }
    }
}

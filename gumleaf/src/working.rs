//! Mutable copy of a source tree that edit actions are applied to.
//!
//! The copy hangs under a synthetic root so that the real root can be
//! replaced, moved or deleted like any other node.

use indextree::{Arena, NodeEdge, NodeError, NodeId};
use rapidhash::RapidHashMap as HashMap;

use crate::chawathe::NodeRef;
use crate::tree::{NodeData, Tree, TreeBuilder};

pub(crate) struct WorkNode {
    pub(crate) origin: NodeRef,
    pub(crate) data: NodeData,
}

pub(crate) struct WorkingTree {
    arena: Arena<WorkNode>,
    root: NodeId,
    of_src: HashMap<NodeId, NodeId>,
    of_inserted: HashMap<NodeId, NodeId>,
}

impl WorkingTree {
    pub(crate) fn from_source(src: &Tree) -> Self {
        let mut arena = Arena::with_capacity(src.len() + 1);
        let root = arena.new_node(WorkNode {
            origin: NodeRef::Root,
            data: NodeData::new("<root>"),
        });

        let mut of_src: HashMap<NodeId, NodeId> = HashMap::default();
        for s in src.pre_order() {
            let parent = src.parent(s).map_or(root, |p| of_src[&p]);
            let id = arena.new_node(WorkNode {
                origin: NodeRef::Source(s),
                data: src.get(s).detached(),
            });
            parent.append(id, &mut arena);
            of_src.insert(s, id);
        }

        Self {
            arena,
            root,
            of_src,
            of_inserted: HashMap::default(),
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    /// Working node for a reference, unless it was never created or has
    /// been removed.
    pub(crate) fn resolve(&self, node: NodeRef) -> Option<NodeId> {
        let id = match node {
            NodeRef::Root => Some(self.root),
            NodeRef::Source(s) => self.of_src.get(&s).copied(),
            NodeRef::Inserted(d) => self.of_inserted.get(&d).copied(),
        }?;
        (!self.arena[id].is_removed()).then_some(id)
    }

    pub(crate) fn origin(&self, id: NodeId) -> NodeRef {
        self.arena[id].get().origin
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.arena[id].get().data
    }

    pub(crate) fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.arena[id].get_mut().data
    }

    pub(crate) fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    pub(crate) fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub(crate) fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    pub(crate) fn position(&self, id: NodeId) -> usize {
        id.preceding_siblings(&self.arena).count() - 1
    }

    /// Create a node and attach it at `position` under `parent`.
    pub(crate) fn insert_new(
        &mut self,
        parent: NodeId,
        position: usize,
        origin: NodeRef,
        data: NodeData,
    ) -> Result<NodeId, NodeError> {
        let id = self.arena.new_node(WorkNode { origin, data });
        self.attach(parent, id, position)?;
        if let NodeRef::Inserted(d) = origin {
            self.of_inserted.insert(d, id);
        }
        Ok(id)
    }

    /// Attach a detached node so it ends up at index `position` among
    /// `parent`'s children. Positions past the end append.
    pub(crate) fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        position: usize,
    ) -> Result<(), NodeError> {
        match parent.children(&self.arena).nth(position) {
            Some(next) => next.checked_insert_before(child, &mut self.arena),
            None => parent.checked_append(child, &mut self.arena),
        }
    }

    pub(crate) fn detach(&mut self, id: NodeId) {
        id.detach(&mut self.arena);
    }

    pub(crate) fn remove_subtree(&mut self, id: NodeId) {
        id.remove_subtree(&mut self.arena);
    }

    /// Every node under the synthetic root, children before parents.
    pub(crate) fn post_order(&self) -> Vec<NodeId> {
        self.root
            .traverse(&self.arena)
            .filter_map(|edge| match edge {
                NodeEdge::End(id) if id != self.root => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Freeze the subtree at `top` into a new tree.
    pub(crate) fn to_tree(&self, top: NodeId) -> Tree {
        let mut builder = TreeBuilder::new();
        let mut stack = vec![(top, None)];
        while let Some((id, parent)) = stack.pop() {
            let data = self.data(id).detached();
            let copy = match parent {
                None => builder.set_root(data),
                Some(p) => builder.add_child(p, data),
            };
            // reversed so children pop, and get appended, in order
            stack.extend(id.children(&self.arena).rev().map(|c| (c, Some(copy))));
        }
        builder.build()
    }
}

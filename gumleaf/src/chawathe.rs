//! Chawathe edit script generation.
//!
//! Turns a mapping into an ordered, replayable list of actions. Based on
//! "Change Detection in Hierarchically Structured Information" (Chawathe et
//! al., 1996), in the formulation GumTree uses.
//!
//! The destination tree is walked breadth-first while a working copy of the
//! source is edited to follow it:
//! 1. Unmapped destination nodes are inserted under the partner of their
//!    parent (`insert-node`)
//! 2. Mapped nodes whose value differs are updated (`update-node`), and moved
//!    when they hang under the wrong parent (`move-node`)
//! 3. The children of every processed pair are aligned: mapped children
//!    outside the longest common subsequence are moved into place
//! 4. Source nodes still unmapped are deleted, children first
//!    (`delete-node`)

use core::fmt;

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use crate::lcs::lcs;
use crate::mapping::MappingStore;
use crate::simplify::simplify;
use crate::tree::Tree;
use crate::working::WorkingTree;
use crate::{debug, trace};

/// Where an action attaches a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A node of the source tree.
    Source(NodeId),
    /// A node created by an earlier insert action, named by the destination
    /// node it was copied from.
    Inserted(NodeId),
    /// Above the root: the parent of whatever node is (or becomes) the root.
    Root,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Source(id) => write!(f, "s:{}", usize::from(*id)),
            NodeRef::Inserted(id) => write!(f, "d:{}", usize::from(*id)),
            NodeRef::Root => f.write_str("root"),
        }
    }
}

/// One edit action.
///
/// Positions are child indices in the parent at the time the action is
/// applied. A move detaches the node first and then counts the position in
/// the remaining children.
#[derive(Clone, PartialEq, Eq)]
pub enum Action {
    /// Insert a copy of a single destination node, without its children.
    InsertNode {
        /// Destination node to copy.
        node: NodeId,
        /// New parent.
        parent: NodeRef,
        /// Index among the parent's children.
        position: usize,
    },

    /// Insert a copy of a whole destination subtree.
    InsertTree {
        /// Root of the destination subtree to copy.
        node: NodeId,
        /// New parent.
        parent: NodeRef,
        /// Index among the parent's children.
        position: usize,
    },

    /// Delete a source leaf.
    DeleteNode {
        /// Source node.
        node: NodeId,
    },

    /// Delete a whole source subtree.
    DeleteTree {
        /// Root of the source subtree.
        node: NodeId,
    },

    /// Replace the value of a source node.
    UpdateNode {
        /// Source node.
        node: NodeId,
        /// New value.
        value: Option<String>,
    },

    /// Move a source node, with its current children, under a new parent.
    MoveNode {
        /// Source node.
        node: NodeId,
        /// New parent.
        parent: NodeRef,
        /// Index among the parent's children, after the node was detached.
        position: usize,
    },
}

impl Action {
    /// The action's name in the fixed vocabulary: `insert-node`,
    /// `insert-tree`, `delete-node`, `delete-tree`, `update-node`,
    /// `move-node`.
    pub fn name(&self) -> &'static str {
        match self {
            Action::InsertNode { .. } => "insert-node",
            Action::InsertTree { .. } => "insert-tree",
            Action::DeleteNode { .. } => "delete-node",
            Action::DeleteTree { .. } => "delete-tree",
            Action::UpdateNode { .. } => "update-node",
            Action::MoveNode { .. } => "move-node",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Action::InsertNode {
                node,
                parent,
                position,
            }
            | Action::InsertTree {
                node,
                parent,
                position,
            } => write!(
                f,
                "{name}(d:{} @{position} under {parent})",
                usize::from(*node)
            ),
            Action::DeleteNode { node } | Action::DeleteTree { node } => {
                write!(f, "{name}(s:{})", usize::from(*node))
            }
            Action::UpdateNode { node, value } => match value {
                Some(value) => write!(f, "{name}(s:{} → {value:?})", usize::from(*node)),
                None => write!(f, "{name}(s:{} → none)", usize::from(*node)),
            },
            Action::MoveNode {
                node,
                parent,
                position,
            } => write!(
                f,
                "{name}(s:{} @{position} under {parent})",
                usize::from(*node)
            ),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An ordered list of actions transforming a source tree into a tree
/// isomorphic to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    actions: Vec<Action>,
}

impl EditScript {
    /// Wrap a list of actions.
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the script does nothing.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions in application order.
    pub fn iter(&self) -> core::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    /// Number of actions with the given [`Action::name`].
    pub fn count(&self, name: &str) -> usize {
        self.actions.iter().filter(|a| a.name() == name).count()
    }

    /// The actions.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Unwrap into the actions.
    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

impl fmt::Display for EditScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{action}")?;
        }
        Ok(())
    }
}

impl IntoIterator for EditScript {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a EditScript {
    type Item = &'a Action;
    type IntoIter = core::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Builds an edit script from a mapping.
pub trait EditScriptGenerator {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    /// Actions turning `src` into `dst` under `mappings`.
    ///
    /// Total over any mapping between the two trees. Pairs whose kinds
    /// differ are treated as unmapped.
    fn compute_actions(&self, src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript;
}

/// Node-level actions only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChawatheScriptGenerator;

impl EditScriptGenerator for ChawatheScriptGenerator {
    fn name(&self) -> &'static str {
        "chawathe"
    }

    fn compute_actions(&self, src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript {
        let ops = Chawathe::new(src, dst, mappings).run();
        EditScript::new(ops.into_iter().map(|e| e.action).collect())
    }
}

/// [`ChawatheScriptGenerator`] followed by simplification: fully inserted
/// or deleted subtrees become one `insert-tree`/`delete-tree`, and a
/// `move-node` that leaves an updated node where it was is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifiedChawatheScriptGenerator;

impl EditScriptGenerator for SimplifiedChawatheScriptGenerator {
    fn name(&self) -> &'static str {
        "simplified-chawathe"
    }

    fn compute_actions(&self, src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript {
        let ops = Chawathe::new(src, dst, mappings).run();
        EditScript::new(simplify(ops, src, dst))
    }
}

/// Which generator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptKind {
    /// [`ChawatheScriptGenerator`].
    #[default]
    Classic,
    /// [`SimplifiedChawatheScriptGenerator`].
    Simplified,
}

impl ScriptKind {
    /// Both generators.
    pub const ALL: [ScriptKind; 2] = [ScriptKind::Classic, ScriptKind::Simplified];

    /// Run the selected generator.
    pub fn generate(self, src: &Tree, dst: &Tree, mappings: &MappingStore) -> EditScript {
        match self {
            ScriptKind::Classic => ChawatheScriptGenerator.compute_actions(src, dst, mappings),
            ScriptKind::Simplified => {
                SimplifiedChawatheScriptGenerator.compute_actions(src, dst, mappings)
            }
        }
    }
}

/// An action plus what the working copy knew when emitting it.
pub(crate) struct Emitted {
    pub(crate) action: Action,
    /// For moves: the node ended up at the index it left, under the same
    /// parent.
    pub(crate) in_place: bool,
}

/// Collects actions, tracing each one.
struct Ops {
    inner: Vec<Emitted>,
}

impl Ops {
    fn push(&mut self, action: Action) {
        self.push_move(action, false);
    }

    fn push_move(&mut self, action: Action, in_place: bool) {
        debug!(%action, in_place, "emit");
        self.inner.push(Emitted { action, in_place });
    }
}

struct Chawathe<'a> {
    src: &'a Tree,
    dst: &'a Tree,
    work: WorkingTree,
    /// Working node -> destination node.
    dst_of: HashMap<NodeId, NodeId>,
    /// Destination node -> working node.
    work_of: HashMap<NodeId, NodeId>,
    /// Destination nodes whose partner is known to sit at the right index.
    in_order: HashSet<NodeId>,
    ops: Ops,
}

impl<'a> Chawathe<'a> {
    fn new(src: &'a Tree, dst: &'a Tree, mappings: &MappingStore) -> Self {
        let work = WorkingTree::from_source(src);
        let mut this = Self {
            src,
            dst,
            work,
            dst_of: HashMap::default(),
            work_of: HashMap::default(),
            in_order: HashSet::default(),
            ops: Ops { inner: Vec::new() },
        };

        for (s, d) in mappings.pairs() {
            if src.kind(s) != dst.kind(d) {
                trace!(
                    src = usize::from(s),
                    dst = usize::from(d),
                    "chawathe: ignoring pair of different kinds"
                );
                continue;
            }
            if let Some(w) = this.work.resolve(NodeRef::Source(s)) {
                this.link(w, d);
            }
        }
        this
    }

    fn link(&mut self, w: NodeId, d: NodeId) {
        self.dst_of.insert(w, d);
        self.work_of.insert(d, w);
    }

    fn run(mut self) -> Vec<Emitted> {
        trace!(
            src_nodes = self.src.len(),
            dst_nodes = self.dst.len(),
            mapped = self.dst_of.len(),
            "chawathe start"
        );

        for x in self.dst.breadth_first() {
            let z = match self.dst.parent(x) {
                Some(y) => self.partner(y),
                None => self.work.root(),
            };

            let w = match self.work_of.get(&x).copied() {
                None => self.insert(x, z),
                Some(w) => {
                    self.update(w, x);
                    if self.work.parent(w) != Some(z) {
                        self.move_node(w, x, z);
                    }
                    w
                }
            };

            self.in_order.insert(x);
            self.align_children(w, x);
        }

        for w in self.work.post_order() {
            if self.dst_of.contains_key(&w) {
                continue;
            }
            if let NodeRef::Source(node) = self.work.origin(w) {
                self.ops.push(Action::DeleteNode { node });
            }
        }

        debug!(total_ops = self.ops.inner.len(), "chawathe done");
        self.ops.inner
    }

    /// Working partner of an already processed destination node.
    fn partner(&self, d: NodeId) -> NodeId {
        let Some(&w) = self.work_of.get(&d) else {
            unreachable!("destination parents are processed before their children")
        };
        w
    }

    fn source_of(&self, w: NodeId) -> NodeId {
        let NodeRef::Source(s) = self.work.origin(w) else {
            unreachable!("only source nodes are updated or moved")
        };
        s
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, position: usize) {
        if let Err(e) = self.work.attach(parent, child, position) {
            panic!("working copy out of sync: {e}");
        }
    }

    fn insert(&mut self, x: NodeId, z: NodeId) -> NodeId {
        let k = self.find_pos(x);
        let origin = NodeRef::Inserted(x);
        let w = match self.work.insert_new(z, k, origin, self.dst.get(x).detached()) {
            Ok(w) => w,
            Err(e) => panic!("working copy out of sync: {e}"),
        };
        self.ops.push(Action::InsertNode {
            node: x,
            parent: self.work.origin(z),
            position: k,
        });
        self.link(w, x);
        w
    }

    fn update(&mut self, w: NodeId, x: NodeId) {
        let value = &self.dst.get(x).value;
        if self.work.data(w).value == *value {
            return;
        }
        let value = value.clone();
        let node = self.source_of(w);
        self.work.data_mut(w).value = value.clone();
        self.ops.push(Action::UpdateNode { node, value });
    }

    fn move_node(&mut self, w: NodeId, x: NodeId, z: NodeId) {
        self.work.detach(w);
        let k = self.find_pos(x);
        self.attach(z, w, k);
        let action = Action::MoveNode {
            node: self.source_of(w),
            parent: self.work.origin(z),
            position: k,
        };
        self.ops.push(action);
    }

    /// Reorder the mapped children of `w` to follow the children of `x`.
    fn align_children(&mut self, w: NodeId, x: NodeId) {
        let dst = self.dst;
        let s1: Vec<NodeId> = self
            .work
            .children(w)
            .filter(|c| self.dst_of.get(c).is_some_and(|&d| dst.parent(d) == Some(x)))
            .collect();
        let s2: Vec<NodeId> = dst
            .children(x)
            .filter(|c| {
                self.work_of
                    .get(c)
                    .is_some_and(|&p| self.work.parent(p) == Some(w))
            })
            .collect();
        if s2.is_empty() {
            return;
        }

        let dst_of = &self.dst_of;
        let common = lcs(&s1, &s2, |a, b| dst_of.get(&a) == Some(&b));
        let stable: HashSet<NodeId> = common.iter().map(|&(_, b)| b).collect();
        self.in_order.extend(stable.iter().copied());

        for b in s2 {
            if stable.contains(&b) {
                continue;
            }
            let a = self.partner(b);
            let old = self.work.position(a);
            self.work.detach(a);
            let k = self.find_pos(b);
            self.attach(w, a, k);

            let action = Action::MoveNode {
                node: self.source_of(a),
                parent: self.work.origin(w),
                position: k,
            };
            self.ops.push_move(action, old == k);
            self.in_order.insert(b);
        }
    }

    /// Index under the partner of `x`'s parent that keeps `x` right after
    /// its closest in-order left sibling.
    fn find_pos(&self, x: NodeId) -> usize {
        let Some(y) = self.dst.parent(x) else {
            return 0;
        };
        let left = self
            .dst
            .children(y)
            .take_while(|&c| c != x)
            .filter(|c| self.in_order.contains(c))
            .last();
        match left {
            Some(v) => self.work.position(self.partner(v)) + 1,
            None => 0,
        }
    }
}

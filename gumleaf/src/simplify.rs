//! Edit script simplification.
//!
//! Consolidates redundant actions to produce cleaner diffs:
//! - When a whole subtree is inserted, report one `insert-tree` instead of
//!   an `insert-node` per node
//! - When a whole subtree is deleted, report one `delete-tree`
//! - When a node is updated and its move leaves it where it was, drop the
//!   move

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use crate::chawathe::{Action, Emitted};
use crate::tree::Tree;
use crate::{debug, trace};

/// Nodes of `tree` whose whole subtree is in `marked`, keeping only the
/// topmost one of each such subtree, and only when it has children.
fn subtree_roots(tree: &Tree, marked: &HashSet<NodeId>) -> (HashSet<NodeId>, HashSet<NodeId>) {
    let mut full: HashSet<NodeId> = HashSet::default();
    for id in tree.post_order() {
        if marked.contains(&id) && tree.children(id).all(|c| full.contains(&c)) {
            full.insert(id);
        }
    }

    let roots: HashSet<NodeId> = full
        .iter()
        .copied()
        .filter(|&id| !tree.is_leaf(id))
        .filter(|&id| tree.parent(id).is_none_or(|p| !full.contains(&p)))
        .collect();

    // nodes folded into some root's tree action
    let covered: HashSet<NodeId> = roots
        .iter()
        .flat_map(|&root| tree.descendants(root))
        .collect();

    (roots, covered)
}

/// Simplify a classic Chawathe script. The result replays to the same tree.
pub(crate) fn simplify(ops: Vec<Emitted>, src: &Tree, dst: &Tree) -> Vec<Action> {
    debug!(ops_count = ops.len(), "simplify start");

    let mut inserted: HashSet<NodeId> = HashSet::default();
    let mut deleted: HashSet<NodeId> = HashSet::default();
    let mut updated: HashSet<NodeId> = HashSet::default();
    for op in &ops {
        match op.action {
            Action::InsertNode { node, .. } => {
                inserted.insert(node);
            }
            Action::DeleteNode { node } => {
                deleted.insert(node);
            }
            Action::UpdateNode { node, .. } => {
                updated.insert(node);
            }
            _ => {}
        }
    }

    let (insert_roots, insert_covered) = subtree_roots(dst, &inserted);
    let (delete_roots, delete_covered) = subtree_roots(src, &deleted);
    debug!(
        insert_trees = insert_roots.len(),
        delete_trees = delete_roots.len(),
        "found subtree actions"
    );

    let result: Vec<Action> = ops
        .into_iter()
        .filter_map(|Emitted { action, in_place }| match action {
            Action::InsertNode { node, .. } if insert_covered.contains(&node) => None,
            Action::InsertNode {
                node,
                parent,
                position,
            } if insert_roots.contains(&node) => Some(Action::InsertTree {
                node,
                parent,
                position,
            }),
            Action::DeleteNode { node } if delete_covered.contains(&node) => None,
            Action::DeleteNode { node } if delete_roots.contains(&node) => {
                Some(Action::DeleteTree { node })
            }
            Action::MoveNode { node, .. } if in_place && updated.contains(&node) => {
                trace!(node = usize::from(node), "simplify: dropping in-place move");
                None
            }
            action => Some(action),
        })
        .collect();

    debug!(after = result.len(), "simplify done");
    result
}

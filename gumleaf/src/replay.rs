//! Applying an edit script to a source tree.

use facet::Facet;
use indextree::NodeId;

use crate::chawathe::{Action, EditScript, NodeRef};
use crate::tree::Tree;
use crate::working::WorkingTree;
use crate::{debug, trace};

/// Why a script could not be applied.
#[derive(Facet, Debug, PartialEq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ReplayError {
    /// action {index} (`{action}`) refers to `{node}`, which does not exist at that point
    UnknownNode {
        index: usize,
        action: String,
        node: String,
    },

    /// action {index} (`{action}`) uses position {position}, but the parent has {children} children
    PositionOutOfRange {
        index: usize,
        action: String,
        position: usize,
        children: usize,
    },

    /// action {index} (`{action}`) deletes a node that still has {children} children
    NotALeaf {
        index: usize,
        action: String,
        children: usize,
    },

    /// action {index} (`{action}`) cannot attach there: {reason}
    InvalidAttach {
        index: usize,
        action: String,
        reason: String,
    },

    /// the script leaves {count} nodes at the top level
    MultipleRoots { count: usize },
}

/// Apply `script` to a copy of `src`.
///
/// Inserted nodes are copied from `dst` (kind, value and metadata). The
/// result is a new tree; `src` is left alone.
///
/// # Panics
///
/// If the script names destination nodes that are not in `dst`.
pub fn replay(src: &Tree, dst: &Tree, script: &EditScript) -> Result<Tree, ReplayError> {
    debug!(actions = script.len(), "replay start");
    let mut work = WorkingTree::from_source(src);

    for (index, action) in script.iter().enumerate() {
        trace!(index, %action, "replay");
        let ctx = Context { index, action };
        match *action {
            Action::InsertNode {
                node,
                parent,
                position,
            } => {
                let parent = ctx.resolve(&work, parent)?;
                ctx.check_position(&work, parent, position)?;
                work.insert_new(
                    parent,
                    position,
                    NodeRef::Inserted(node),
                    dst.get(node).detached(),
                )
                .map_err(|e| ctx.invalid_attach(e))?;
            }
            Action::InsertTree {
                node,
                parent,
                position,
            } => {
                let parent = ctx.resolve(&work, parent)?;
                ctx.check_position(&work, parent, position)?;
                insert_subtree(&mut work, dst, node, parent, position)
                    .map_err(|e| ctx.invalid_attach(e))?;
            }
            Action::DeleteNode { node } => {
                let id = ctx.resolve(&work, NodeRef::Source(node))?;
                let children = work.child_count(id);
                if children > 0 {
                    return Err(ReplayError::NotALeaf {
                        index,
                        action: action.to_string(),
                        children,
                    });
                }
                work.remove_subtree(id);
            }
            Action::DeleteTree { node } => {
                let id = ctx.resolve(&work, NodeRef::Source(node))?;
                work.remove_subtree(id);
            }
            Action::UpdateNode { node, ref value } => {
                let id = ctx.resolve(&work, NodeRef::Source(node))?;
                work.data_mut(id).value = value.clone();
            }
            Action::MoveNode {
                node,
                parent,
                position,
            } => {
                let id = ctx.resolve(&work, NodeRef::Source(node))?;
                let parent = ctx.resolve(&work, parent)?;
                work.detach(id);
                ctx.check_position(&work, parent, position)?;
                work.attach(parent, id, position)
                    .map_err(|e| ctx.invalid_attach(e))?;
            }
        }
    }

    let top: Vec<NodeId> = work.children(work.root()).collect();
    let tree = match top.as_slice() {
        [] => Tree::empty(),
        [root] => work.to_tree(*root),
        _ => return Err(ReplayError::MultipleRoots { count: top.len() }),
    };
    debug!(nodes = tree.len(), "replay done");
    Ok(tree)
}

fn insert_subtree(
    work: &mut WorkingTree,
    dst: &Tree,
    top: NodeId,
    parent: NodeId,
    position: usize,
) -> Result<(), indextree::NodeError> {
    let mut stack = vec![(top, parent, position)];
    while let Some((d, parent, position)) = stack.pop() {
        let id = work.insert_new(parent, position, NodeRef::Inserted(d), dst.get(d).detached())?;
        // children pop in order and are appended
        let children: Vec<NodeId> = dst.children(d).collect();
        stack.extend(children.into_iter().rev().map(|c| (c, id, usize::MAX)));
    }
    Ok(())
}

struct Context<'a> {
    index: usize,
    action: &'a Action,
}

impl Context<'_> {
    fn resolve(&self, work: &WorkingTree, node: NodeRef) -> Result<NodeId, ReplayError> {
        work.resolve(node).ok_or_else(|| ReplayError::UnknownNode {
            index: self.index,
            action: self.action.to_string(),
            node: node.to_string(),
        })
    }

    fn check_position(
        &self,
        work: &WorkingTree,
        parent: NodeId,
        position: usize,
    ) -> Result<(), ReplayError> {
        let children = work.child_count(parent);
        if position > children {
            return Err(ReplayError::PositionOutOfRange {
                index: self.index,
                action: self.action.to_string(),
                position,
                children,
            });
        }
        Ok(())
    }

    fn invalid_attach(&self, e: indextree::NodeError) -> ReplayError {
        ReplayError::InvalidAttach {
            index: self.index,
            action: self.action.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{at, n, tree};
    use facet_testhelpers::test;

    #[test]
    fn applies_in_order() {
        let src = tree(n("A").c([n("B").v("1"), n("C")]));
        let dst = tree(n("A").c([n("D").c([n("B").v("2")])]));
        let script = EditScript::new(vec![
            Action::InsertNode {
                node: at(&dst, "0"),
                parent: NodeRef::Source(at(&src, "")),
                position: 0,
            },
            Action::UpdateNode {
                node: at(&src, "0"),
                value: Some("2".into()),
            },
            Action::MoveNode {
                node: at(&src, "0"),
                parent: NodeRef::Inserted(at(&dst, "0")),
                position: 0,
            },
            Action::DeleteNode { node: at(&src, "1") },
        ]);
        let out = replay(&src, &dst, &script).unwrap();
        assert!(out.is_isomorphic_to(&dst));
        // src untouched
        assert_eq!(src.value(at(&src, "0")), Some("1"));
    }

    #[test]
    fn insert_tree_copies_metadata() {
        let src = tree(n("A"));
        let dst = tree(n("A").c([n("F").meta("id", "f()").c([n("X"), n("Y")])]));
        let script = EditScript::new(vec![Action::InsertTree {
            node: at(&dst, "0"),
            parent: NodeRef::Source(at(&src, "")),
            position: 0,
        }]);
        let out = replay(&src, &dst, &script).unwrap();
        assert!(out.is_isomorphic_to(&dst));
        let f = at(&out, "0");
        assert_eq!(
            out.get(f).metadata.get::<String>("id").map(String::as_str),
            Some("f()")
        );
    }

    #[test]
    fn rejects_deleted_references() {
        let src = tree(n("A").c([n("B")]));
        let script = EditScript::new(vec![
            Action::DeleteNode { node: at(&src, "0") },
            Action::UpdateNode {
                node: at(&src, "0"),
                value: None,
            },
        ]);
        let err = replay(&src, &src, &script).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownNode { index: 1, .. }));
    }

    #[test]
    fn rejects_non_leaf_delete_and_bad_positions() {
        let src = tree(n("A").c([n("B")]));
        let script = EditScript::new(vec![Action::DeleteNode { node: at(&src, "") }]);
        assert!(matches!(
            replay(&src, &src, &script),
            Err(ReplayError::NotALeaf { children: 1, .. })
        ));

        let script = EditScript::new(vec![Action::InsertNode {
            node: at(&src, "0"),
            parent: NodeRef::Source(at(&src, "")),
            position: 5,
        }]);
        assert!(matches!(
            replay(&src, &src, &script),
            Err(ReplayError::PositionOutOfRange { children: 1, .. })
        ));
    }

    #[test]
    fn cannot_move_into_own_subtree() {
        let src = tree(n("A").c([n("B").c([n("C")])]));
        let script = EditScript::new(vec![Action::MoveNode {
            node: at(&src, "0"),
            parent: NodeRef::Source(at(&src, "0.0")),
            position: 0,
        }]);
        assert!(matches!(
            replay(&src, &src, &script),
            Err(ReplayError::InvalidAttach { .. })
        ));
    }

    #[test]
    fn two_top_level_nodes_is_an_error() {
        let src = tree(n("A"));
        let dst = tree(n("B"));
        let script = EditScript::new(vec![Action::InsertNode {
            node: at(&dst, ""),
            parent: NodeRef::Root,
            position: 1,
        }]);
        assert_eq!(
            replay(&src, &dst, &script).unwrap_err(),
            ReplayError::MultipleRoots { count: 2 }
        );
    }
}

//! Child-alignment recovery: cheap, unbounded alternative to edit distance.

use indextree::NodeId;

use crate::lcs::lcs;
use crate::mapping::MappingStore;
use crate::trace;
use crate::tree::Tree;

/// Recover mappings under an already-mapped pair `(s, d)` by aligning their
/// unmapped children, in three passes:
///
/// 1. longest common subsequence of isomorphic children;
/// 2. longest common subsequence of structurally isomorphic children
///    (same kinds and shape, values may differ);
/// 3. children whose kind occurs exactly once among the unmapped children
///    on both sides are paired, then recovered recursively.
pub fn recover_by_alignment(
    src: &Tree,
    s: NodeId,
    dst: &Tree,
    d: NodeId,
    mappings: &mut MappingStore,
) {
    let mut pending = vec![(s, d)];
    while let Some((s, d)) = pending.pop() {
        align_isomorphic(src, s, dst, d, mappings, Tree::is_isomorphic);
        align_isomorphic(src, s, dst, d, mappings, Tree::is_structurally_isomorphic);
        // reversed so the stack processes them in child order
        let mut unique = unique_kind_pairs(src, s, dst, d, mappings);
        unique.reverse();
        pending.extend(unique);
    }
}

fn unmapped_children(tree: &Tree, id: NodeId, mapped: impl Fn(NodeId) -> bool) -> Vec<NodeId> {
    tree.children(id).filter(|&c| !mapped(c)).collect()
}

fn align_isomorphic(
    src: &Tree,
    s: NodeId,
    dst: &Tree,
    d: NodeId,
    mappings: &mut MappingStore,
    same: fn(&Tree, NodeId, &Tree, NodeId) -> bool,
) {
    let src_children = unmapped_children(src, s, |c| mappings.is_src_mapped(c));
    let dst_children = unmapped_children(dst, d, |c| mappings.is_dst_mapped(c));
    if src_children.is_empty() || dst_children.is_empty() {
        return;
    }

    for (x, y) in lcs(&src_children, &dst_children, |x, y| same(src, x, dst, y)) {
        for (a, b) in src.subtree(x).zip(dst.subtree(y)) {
            if mappings.is_mapping_allowed(src, a, dst, b) {
                mappings.add(a, b);
            }
        }
        trace!(
            src = usize::from(x),
            dst = usize::from(y),
            "alignment: children paired"
        );
    }
}

/// Map children whose kind is unique on both sides; returns the new pairs.
fn unique_kind_pairs(
    src: &Tree,
    s: NodeId,
    dst: &Tree,
    d: NodeId,
    mappings: &mut MappingStore,
) -> Vec<(NodeId, NodeId)> {
    let src_children = unmapped_children(src, s, |c| mappings.is_src_mapped(c));
    let dst_children = unmapped_children(dst, d, |c| mappings.is_dst_mapped(c));

    let only = |tree: &Tree, children: &[NodeId], kind: &str| -> Option<NodeId> {
        let mut same_kind = children.iter().filter(|&&c| tree.kind(c) == kind);
        let first = same_kind.next().copied();
        if same_kind.next().is_some() { None } else { first }
    };

    let mut pairs = Vec::new();
    for &x in &src_children {
        let kind = src.kind(x);
        if only(src, &src_children, kind) != Some(x) {
            continue;
        }
        if let Some(y) = only(dst, &dst_children, kind)
            && mappings.is_mapping_allowed(src, x, dst, y)
        {
            mappings.add(x, y);
            pairs.push((x, y));
        }
    }
    pairs
}

//! Zhang–Shasha optimal tree edit distance, used to recover fine-grained
//! mappings inside a pair of subtrees.

use indextree::NodeId;

use super::Matcher;
use super::similarity::label_similarity;
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};

/// Maps two whole trees along an optimal edit script.
///
/// Cost is cubic-ish in tree size; on its own it is only sensible for small
/// trees. The bottom-up matcher uses it on bounded subtree pairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZsMatcher;

impl Matcher for ZsMatcher {
    fn name(&self) -> &'static str {
        "zhang-shasha"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mut mappings: MappingStore) -> MappingStore {
        if let (Some(s), Some(d)) = (src.root(), dst.root()) {
            for (x, y) in optimal_mappings(src, s, dst, d) {
                if mappings.is_mapping_allowed(src, x, dst, y) {
                    mappings.add(x, y);
                }
            }
        }
        mappings
    }
}

/// Pairs of an optimal edit script between the subtrees at `s` and `d`.
/// Only nodes of the same kind are ever paired.
pub fn optimal_mappings(src: &Tree, s: NodeId, dst: &Tree, d: NodeId) -> Vec<(NodeId, NodeId)> {
    #[cfg(feature = "matching-stats")]
    super::similarity::count_zs_run();

    let a = Forest::new(src, s);
    let b = Forest::new(dst, d);
    trace!(src_size = a.len(), dst_size = b.len(), "zs start");

    let mut zs = ZhangShasha {
        tree_dist: vec![vec![0.0; b.len() + 1]; a.len() + 1],
        forest_dist: vec![vec![0.0; b.len() + 1]; a.len() + 1],
        a,
        b,
    };
    zs.compute_all();
    let pairs = zs.backtrack();
    debug!(pairs = pairs.len(), "zs done");
    pairs
}

/// A subtree numbered in post-order, 1-based.
struct Forest<'t> {
    tree: &'t Tree,
    nodes: Vec<NodeId>,
    /// `lld[i]`: post-order number of the leftmost leaf under node `i`
    lld: Vec<usize>,
    keyroots: Vec<usize>,
}

impl<'t> Forest<'t> {
    fn new(tree: &'t Tree, root: NodeId) -> Self {
        // slot 0 is a placeholder so indices match the textbook formulation
        let mut nodes = vec![root];
        nodes.extend(tree.subtree_post_order(root));
        let n = nodes.len() - 1;

        let mut lld = vec![0; n + 1];
        for i in 1..=n {
            // in post-order a subtree's first node is its leftmost leaf
            lld[i] = i + 1 - tree.size(nodes[i]);
        }

        let mut seen = vec![false; n + 1];
        let mut keyroots = Vec::new();
        for i in (1..=n).rev() {
            if !seen[lld[i]] {
                seen[lld[i]] = true;
                keyroots.push(i);
            }
        }
        keyroots.reverse();

        Self {
            tree,
            nodes,
            lld,
            keyroots,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len() - 1
    }
}

struct ZhangShasha<'t> {
    a: Forest<'t>,
    b: Forest<'t>,
    tree_dist: Vec<Vec<f64>>,
    forest_dist: Vec<Vec<f64>>,
}

const INSERT_COST: f64 = 1.0;
const DELETE_COST: f64 = 1.0;

impl ZhangShasha<'_> {
    fn update_cost(&self, i: usize, j: usize) -> f64 {
        let x = self.a.tree.get(self.a.nodes[i]);
        let y = self.b.tree.get(self.b.nodes[j]);
        if x.kind != y.kind {
            return f64::INFINITY;
        }
        if x.value == y.value {
            return 0.0;
        }
        match (x.value.as_deref(), y.value.as_deref()) {
            (Some(l), Some(r)) if !l.is_empty() && !r.is_empty() => 1.0 - label_similarity(l, r),
            _ => 1.0,
        }
    }

    fn compute_all(&mut self) {
        for ki in 0..self.a.keyroots.len() {
            for kj in 0..self.b.keyroots.len() {
                let (i, j) = (self.a.keyroots[ki], self.b.keyroots[kj]);
                self.forest(i, j);
            }
        }
    }

    /// Fill `forest_dist` for the forests under keyroots `i` and `j`,
    /// recording subtree distances along the way.
    fn forest(&mut self, i: usize, j: usize) {
        let (li, lj) = (self.a.lld[i], self.b.lld[j]);
        let fd = &mut self.forest_dist;

        fd[li - 1][lj - 1] = 0.0;
        for di in li..=i {
            fd[di][lj - 1] = fd[di - 1][lj - 1] + DELETE_COST;
        }
        for dj in lj..=j {
            fd[li - 1][dj] = fd[li - 1][dj - 1] + INSERT_COST;
        }

        for di in li..=i {
            for dj in lj..=j {
                let delete = self.forest_dist[di - 1][dj] + DELETE_COST;
                let insert = self.forest_dist[di][dj - 1] + INSERT_COST;
                if self.a.lld[di] == li && self.b.lld[dj] == lj {
                    let update = self.forest_dist[di - 1][dj - 1] + self.update_cost(di, dj);
                    let best = delete.min(insert).min(update);
                    self.forest_dist[di][dj] = best;
                    self.tree_dist[di][dj] = best;
                } else {
                    let subtree = self.forest_dist[self.a.lld[di] - 1][self.b.lld[dj] - 1]
                        + self.tree_dist[di][dj];
                    self.forest_dist[di][dj] = delete.min(insert).min(subtree);
                }
            }
        }
    }

    /// Walk the distance tables back from the roots, collecting the pairs
    /// the optimal script keeps.
    fn backtrack(&mut self) -> Vec<(NodeId, NodeId)> {
        let mut pairs = Vec::new();
        if self.a.len() == 0 || self.b.len() == 0 {
            return pairs;
        }

        let mut stack = vec![(self.a.len(), self.b.len())];
        let mut roots = true;
        while let Some((last_row, last_col)) = stack.pop() {
            // the root pair's table is the last one compute_all filled
            if !roots {
                self.forest(last_row, last_col);
            }
            roots = false;

            let first_row = self.a.lld[last_row] - 1;
            let first_col = self.b.lld[last_col] - 1;
            let (mut row, mut col) = (last_row, last_col);

            while row > first_row || col > first_col {
                let here = self.forest_dist[row][col];
                if row > first_row && self.forest_dist[row - 1][col] + DELETE_COST == here {
                    row -= 1;
                } else if col > first_col && self.forest_dist[row][col - 1] + INSERT_COST == here {
                    col -= 1;
                } else if self.a.lld[row] == self.a.lld[last_row]
                    && self.b.lld[col] == self.b.lld[last_col]
                {
                    let (x, y) = (self.a.nodes[row], self.b.nodes[col]);
                    if self.a.tree.kind(x) == self.b.tree.kind(y) {
                        pairs.push((x, y));
                    }
                    row -= 1;
                    col -= 1;
                } else {
                    stack.push((row, col));
                    row = self.a.lld[row] - 1;
                    col = self.b.lld[col] - 1;
                }
            }
        }
        pairs
    }
}

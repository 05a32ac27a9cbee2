//! Similarity measures shared by the matchers.

use crate::mapping::MappingStore;
use crate::tree::Tree;
use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;

#[cfg(feature = "matching-stats")]
use core::cell::RefCell;

#[cfg(feature = "matching-stats")]
thread_local! {
    static DICE_CALLS: RefCell<usize> = const { RefCell::new(0) };
    static ZS_RUNS: RefCell<usize> = const { RefCell::new(0) };
}

/// Reset matching statistics (call before a matching run).
#[cfg(feature = "matching-stats")]
pub fn reset_stats() {
    DICE_CALLS.with(|c| *c.borrow_mut() = 0);
    ZS_RUNS.with(|c| *c.borrow_mut() = 0);
}

/// Matching statistics for this thread: (dice evaluations, edit distance recoveries).
#[cfg(feature = "matching-stats")]
pub fn get_stats() -> (usize, usize) {
    (
        DICE_CALLS.with(|c| *c.borrow()),
        ZS_RUNS.with(|c| *c.borrow()),
    )
}

#[cfg(feature = "matching-stats")]
pub(crate) fn count_zs_run() {
    ZS_RUNS.with(|c| *c.borrow_mut() += 1);
}

/// Whether `node` lies strictly inside the subtree rooted at `ancestor`.
///
/// Pre-order indices of a subtree are contiguous, so this is a range check.
#[inline]
pub(crate) fn is_descendant(tree: &Tree, node: NodeId, ancestor: NodeId) -> bool {
    let n = tree.metrics(node).preorder;
    let a = tree.metrics(ancestor);
    n > a.preorder && n < a.preorder + a.size
}

/// Number of descendants of `src` whose partner is a descendant of `dst`.
pub fn common_descendants(
    src_tree: &Tree,
    src: NodeId,
    dst_tree: &Tree,
    dst: NodeId,
    mappings: &MappingStore,
) -> usize {
    src_tree
        .descendants(src)
        .filter(|&s| {
            mappings
                .dst_for(s)
                .is_some_and(|d| is_descendant(dst_tree, d, dst))
        })
        .count()
}

/// Dice coefficient over mapped descendants.
///
/// dice(A, B) = 2 × |common| / (|descendants_A| + |descendants_B|)
pub fn dice(
    src_tree: &Tree,
    src: NodeId,
    dst_tree: &Tree,
    dst: NodeId,
    mappings: &MappingStore,
) -> f64 {
    #[cfg(feature = "matching-stats")]
    DICE_CALLS.with(|c| *c.borrow_mut() += 1);

    let desc_src = src_tree.size(src) - 1;
    let desc_dst = dst_tree.size(dst) - 1;
    if desc_src == 0 && desc_dst == 0 {
        return 1.0; // both leaves
    }
    let common = common_descendants(src_tree, src, dst_tree, dst, mappings);
    2.0 * common as f64 / (desc_src + desc_dst) as f64
}

/// Similarity of two labels in `[0, 1]`: Dice over character bigrams,
/// with the string boundaries padded so single characters still compare.
pub fn label_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let grams_a = bigrams(a);
    let grams_b = bigrams(b);

    let mut counts: HashMap<(char, char), usize> = HashMap::default();
    for gram in &grams_a {
        *counts.entry(*gram).or_default() += 1;
    }
    let mut common = 0;
    for gram in &grams_b {
        if let Some(count) = counts.get_mut(gram)
            && *count > 0
        {
            *count -= 1;
            common += 1;
        }
    }
    2.0 * common as f64 / (grams_a.len() + grams_b.len()) as f64
}

fn bigrams(s: &str) -> Vec<(char, char)> {
    let padded: Vec<char> = core::iter::once('\u{2}')
        .chain(s.chars())
        .chain(core::iter::once('\u{3}'))
        .collect();
    padded.windows(2).map(|w| (w[0], w[1])).collect()
}

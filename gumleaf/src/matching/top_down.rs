//! Greedy top-down matching of isomorphic subtrees.

use std::collections::BTreeMap;

use indextree::NodeId;
use rapidhash::{RapidHashMap as HashMap, RapidHashSet as HashSet};

use super::Matcher;
use super::similarity::dice;
use crate::config::{Config, ConfigOption, Configurable};
use crate::mapping::{MappingStore, MultiMappingStore};
use crate::tree::{NodeHash, Tree};
use crate::{debug, trace};

/// Maps maximal isomorphic subtrees, tallest first.
///
/// Both trees are walked through height-keyed queues that are opened lazily
/// from the roots: a node enters the queue only once its parent was popped
/// without finding an isomorphic partner. When the tallest pending heights of
/// both queues agree, every isomorphic pair at that height becomes a
/// candidate. Candidates that are unique on both sides are mapped with their
/// whole subtrees. Ambiguous candidates are ranked by context and mapped
/// greedily, but only when their height reaches `st_minprio`.
#[derive(Debug, Clone)]
pub struct GreedySubtreeMatcher {
    min_height: usize,
    min_priority: usize,
}

impl Default for GreedySubtreeMatcher {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl GreedySubtreeMatcher {
    /// Matcher reading `st_minheight` and `st_minprio` from `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            min_height: config.st_minheight(),
            min_priority: config.st_minprio(),
        }
    }

    /// Current `st_minheight`.
    pub fn min_height(&self) -> usize {
        self.min_height
    }

    /// Current `st_minprio`.
    pub fn min_priority(&self) -> usize {
        self.min_priority
    }

    fn collect_candidates(&self, src: &Tree, dst: &Tree, mappings: &MappingStore) -> MultiMappingStore {
        let mut candidates = MultiMappingStore::default();
        let (Some(src_root), Some(dst_root)) = (src.root(), dst.root()) else {
            return candidates;
        };

        let mut src_queue = HeightQueue::new(src, src_root, self.min_height);
        let mut dst_queue = HeightQueue::new(dst, dst_root, self.min_height);

        while synchronize(&mut src_queue, &mut dst_queue) {
            let src_level = src_queue.pop();
            let dst_level = dst_queue.pop();

            let mut dst_by_hash: HashMap<NodeHash, Vec<NodeId>> = HashMap::default();
            for &d in &dst_level {
                dst_by_hash.entry(dst.hash(d)).or_default().push(d);
            }

            let mut src_found = vec![false; src_level.len()];
            let mut dst_found: HashSet<NodeId> = HashSet::default();
            for (i, &s) in src_level.iter().enumerate() {
                let Some(same_hash) = dst_by_hash.get(&src.hash(s)) else {
                    continue;
                };
                for &d in same_hash {
                    if mappings.are_both_unmapped(s, d) && src.is_isomorphic(s, dst, d) {
                        trace!(
                            src = usize::from(s),
                            dst = usize::from(d),
                            kind = src.kind(s),
                            height = src.height(s),
                            "top_down: isomorphic candidate"
                        );
                        candidates.add(s, d);
                        src_found[i] = true;
                        dst_found.insert(d);
                    }
                }
            }

            for (s, found) in src_level.into_iter().zip(src_found) {
                if !found {
                    src_queue.open(s);
                }
            }
            for d in dst_level {
                if !dst_found.contains(&d) {
                    dst_queue.open(d);
                }
            }
        }
        candidates
    }

    /// Order ambiguous candidate pairs, best first:
    /// 1. taller subtrees first;
    /// 2. higher Dice similarity of the two parents under the current mapping;
    /// 3. closer relative position among siblings;
    /// 4. closer pre-order index;
    /// 5. earlier pre-order indices.
    fn rank_ambiguous(
        &self,
        src: &Tree,
        dst: &Tree,
        mappings: &MappingStore,
        pairs: Vec<(NodeId, NodeId)>,
    ) -> Vec<(NodeId, NodeId)> {
        let mut scored: Vec<(AmbiguityScore, (NodeId, NodeId))> = pairs
            .into_iter()
            .map(|(s, d)| (AmbiguityScore::new(src, s, dst, d, mappings), (s, d)))
            .collect();
        scored.sort_by(|a, b| a.0.cmp(&b.0));
        scored.into_iter().map(|(_, pair)| pair).collect()
    }
}

impl Matcher for GreedySubtreeMatcher {
    fn name(&self) -> &'static str {
        "greedy-subtree"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mut mappings: MappingStore) -> MappingStore {
        debug!(
            src_nodes = src.len(),
            dst_nodes = dst.len(),
            min_height = self.min_height,
            min_priority = self.min_priority,
            "top_down start"
        );
        let candidates = self.collect_candidates(src, dst, &mappings);
        if candidates.is_empty() {
            debug!(matched = mappings.len(), "top_down done: no candidates");
            return mappings;
        }

        let mut ambiguous = Vec::new();
        for s in candidates.srcs() {
            if candidates.is_unique(s) {
                if let Some(d) = candidates.dsts_of(s).next() {
                    add_subtree_if_free(src, s, dst, d, &mut mappings);
                }
            } else if src.height(s) >= self.min_priority {
                ambiguous.extend(candidates.dsts_of(s).map(|d| (s, d)));
            } else {
                trace!(
                    src = usize::from(s),
                    height = src.height(s),
                    "top_down: ambiguous group below st_minprio, skipped"
                );
            }
        }

        for (s, d) in self.rank_ambiguous(src, dst, &mappings, ambiguous) {
            if mappings.are_both_unmapped(s, d) {
                add_subtree_if_free(src, s, dst, d, &mut mappings);
            }
        }

        debug!(matched = mappings.len(), "top_down done");
        mappings
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }
}

impl Configurable for GreedySubtreeMatcher {
    fn applicable_options(&self) -> &'static [ConfigOption] {
        &[ConfigOption::StMinHeight, ConfigOption::StMinPrio]
    }

    fn configure(&mut self, config: &Config) {
        self.min_height = config.st_minheight();
        self.min_priority = config.st_minprio();
    }

    fn settings(&self) -> Config {
        Config {
            st_minheight: self.min_height,
            st_minprio: self.min_priority,
            ..Config::default()
        }
    }
}

/// Map two isomorphic subtrees unless some node in either is already mapped.
fn add_subtree_if_free(src: &Tree, s: NodeId, dst: &Tree, d: NodeId, mappings: &mut MappingStore) {
    let free = src.subtree(s).all(|n| !mappings.is_src_mapped(n))
        && dst.subtree(d).all(|n| !mappings.is_dst_mapped(n));
    if free {
        trace!(
            src = usize::from(s),
            dst = usize::from(d),
            size = src.size(s),
            "top_down: map subtree"
        );
        mappings.add_recursively(src, s, dst, d);
    }
}

#[derive(Debug, PartialEq)]
struct AmbiguityScore {
    height: usize,
    parent_dice: f64,
    position_gap: f64,
    preorder_gap: usize,
    src_preorder: usize,
    dst_preorder: usize,
}

impl AmbiguityScore {
    fn new(src: &Tree, s: NodeId, dst: &Tree, d: NodeId, mappings: &MappingStore) -> Self {
        let parent_dice = match (src.parent(s), dst.parent(d)) {
            (Some(ps), Some(pd)) => dice(src, ps, dst, pd, mappings),
            (None, None) => 1.0,
            _ => 0.0,
        };
        let src_pre = src.metrics(s).preorder;
        let dst_pre = dst.metrics(d).preorder;
        Self {
            height: src.height(s),
            parent_dice,
            position_gap: (relative_position(src, s) - relative_position(dst, d)).abs(),
            preorder_gap: src_pre.abs_diff(dst_pre),
            src_preorder: src_pre,
            dst_preorder: dst_pre,
        }
    }

    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        other
            .height
            .cmp(&self.height)
            .then(other.parent_dice.total_cmp(&self.parent_dice))
            .then(self.position_gap.total_cmp(&other.position_gap))
            .then(self.preorder_gap.cmp(&other.preorder_gap))
            .then(self.src_preorder.cmp(&other.src_preorder))
            .then(self.dst_preorder.cmp(&other.dst_preorder))
    }
}

/// Position among siblings scaled to `[0, 1]`.
fn relative_position(tree: &Tree, id: NodeId) -> f64 {
    let siblings = tree.parent(id).map_or(1, |p| tree.child_count(p));
    if siblings <= 1 {
        0.0
    } else {
        tree.position(id) as f64 / (siblings - 1) as f64
    }
}

/// Nodes of one tree bucketed by height, tallest popped first.
struct HeightQueue<'t> {
    tree: &'t Tree,
    buckets: BTreeMap<usize, Vec<NodeId>>,
    min_height: usize,
}

impl<'t> HeightQueue<'t> {
    fn new(tree: &'t Tree, root: NodeId, min_height: usize) -> Self {
        let mut queue = Self {
            tree,
            buckets: BTreeMap::new(),
            min_height,
        };
        queue.push(root);
        queue
    }

    fn push(&mut self, id: NodeId) {
        let height = self.tree.height(id);
        if height >= self.min_height {
            self.buckets.entry(height).or_default().push(id);
        }
    }

    fn peek_height(&self) -> Option<usize> {
        self.buckets.keys().next_back().copied()
    }

    fn pop(&mut self) -> Vec<NodeId> {
        self.buckets
            .pop_last()
            .map(|(_, nodes)| nodes)
            .unwrap_or_default()
    }

    /// Queue the children of `id`.
    fn open(&mut self, id: NodeId) {
        let tree = self.tree;
        for child in tree.children(id) {
            self.push(child);
        }
    }

    /// Pop the tallest bucket and queue its children.
    fn open_tallest(&mut self) {
        for id in self.pop() {
            self.open(id);
        }
    }
}

/// Open the taller queue until both agree on their tallest height.
/// Returns false once either queue runs dry.
fn synchronize(src: &mut HeightQueue<'_>, dst: &mut HeightQueue<'_>) -> bool {
    loop {
        match (src.peek_height(), dst.peek_height()) {
            (Some(hs), Some(hd)) if hs == hd => return true,
            (Some(hs), Some(hd)) if hs > hd => src.open_tallest(),
            (Some(_), Some(_)) => dst.open_tallest(),
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, OptionValue};
    use crate::test_util::{at, n, tree};
    use facet_testhelpers::test;

    fn import(name: &str) -> crate::test_util::N {
        n("ImportDeclaration").c([n("QualifiedName").v(name)])
    }

    #[test]
    fn maps_identical_trees_entirely() {
        let t = tree(n("A").c([n("B").c([n("C").v("x")]), n("D").c([n("E")])]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&t, &t, MappingStore::new());
        assert_eq!(mappings.len(), t.len());
        for id in t.pre_order() {
            assert!(mappings.has(id, id));
        }
    }

    #[test]
    fn maps_moved_subtree() {
        let src = tree(n("R").c([
            n("Method").c([n("Name").v("a"), n("Body").c([n("Stmt").v("1")])]),
            n("Method").c([n("Name").v("b"), n("Body").c([n("Stmt").v("2")])]),
        ]));
        let dst = tree(n("R").c([
            n("Method").c([n("Name").v("b"), n("Body").c([n("Stmt").v("2")])]),
            n("Field").v("f"),
            n("Method").c([n("Name").v("a"), n("Body").c([n("Stmt").v("1")])]),
        ]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        assert!(mappings.has(at(&src, "0"), at(&dst, "2")));
        assert!(mappings.has(at(&src, "1"), at(&dst, "0")));
        assert!(mappings.has(at(&src, "1.1.0"), at(&dst, "0.1.0")));
        assert!(!mappings.is_src_mapped(at(&src, "")));
    }

    #[test]
    fn leaves_are_below_default_min_height() {
        let src = tree(n("R").c([n("Leaf").v("x")]));
        let dst = tree(n("S").c([n("Leaf").v("x")]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        assert!(mappings.is_empty());

        let config = Config::default().with(ConfigOption::StMinHeight, 0).unwrap();
        let mappings = GreedySubtreeMatcher::new(&config).match_trees(&src, &dst, MappingStore::new());
        assert!(mappings.has(at(&src, "0"), at(&dst, "0")));
    }

    #[test]
    fn ambiguous_groups_respect_min_priority() {
        let src = tree(n("CompilationUnit").c([
            import("java.util.List"),
            import("java.util.List"),
            n("TypeDeclaration").v("A"),
        ]));
        let dst = tree(n("CompilationUnit").c([
            import("java.util.List"),
            import("java.util.List"),
            n("TypeDeclaration").v("B"),
        ]));

        let default = GreedySubtreeMatcher::default();
        assert_eq!(default.min_priority(), 2);
        let mappings = default.match_trees(&src, &dst, MappingStore::new());
        assert!(!mappings.is_src_mapped(at(&src, "0")));
        assert!(!mappings.is_src_mapped(at(&src, "1")));

        let mut eager = GreedySubtreeMatcher::default();
        eager.configure(&Config::default().with(ConfigOption::StMinPrio, 1).unwrap());
        let mappings = eager.match_trees(&src, &dst, MappingStore::new());
        // position breaks the tie
        assert!(mappings.has(at(&src, "0"), at(&dst, "0")));
        assert!(mappings.has(at(&src, "1"), at(&dst, "1")));
        assert!(mappings.has(at(&src, "1.0"), at(&dst, "1.0")));
    }

    #[test]
    fn set_option_reports_rejections() {
        let mut matcher = GreedySubtreeMatcher::default();
        matcher
            .set_option(ConfigOption::StMinPrio, OptionValue::Int(1))
            .unwrap();
        assert_eq!(matcher.min_priority(), 1);

        assert!(matches!(
            matcher.set_option(ConfigOption::StMinHeight, OptionValue::Int(-3)),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert_eq!(
            matcher.set_option(ConfigOption::BuMinSize, OptionValue::Int(5)),
            Err(ConfigError::NotApplicable {
                key: "bu_minsize".to_string()
            })
        );
        assert_eq!(matcher.settings().st_minheight(), 1);
        assert_eq!(matcher.min_priority(), 1);
    }

    #[test]
    fn wide_levels_map_every_unique_sibling() {
        let stmt = |i: usize| n("Stmt").c([n("Lit").v(&i.to_string())]);
        let src = tree(n("Block").c((0..2000).map(stmt)));
        // one statement changed, the rest shifted by an insertion
        let dst = tree(n("Block").c(
            [n("Stmt").c([n("Lit").v("new")])]
                .into_iter()
                .chain((0..2000).map(|i| if i == 7 { n("Stmt").c([n("Lit").v("seven")]) } else { stmt(i) })),
        ));

        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        assert_eq!(mappings.len(), 2 * 1999);
        assert!(mappings.has(at(&src, "0"), at(&dst, "1")));
        assert!(mappings.has(at(&src, "1999.0"), at(&dst, "2000.0")));
        assert!(!mappings.is_src_mapped(at(&src, "7")));
    }

    #[test]
    fn parent_context_breaks_ties() {
        let stmt = || n("Return").c([n("Call").c([n("Name").v("x")])]);
        let src = tree(n("Class").c([
            n("Method").v("m").c([n("Sig").c([n("Type").v("int")]), stmt()]),
            n("Method").v("n").c([n("Sig").c([n("Type").v("bool")]), stmt()]),
        ]));
        let dst = tree(n("Class").c([
            n("Method").v("n2").c([n("Sig").c([n("Type").v("bool")]), stmt()]),
            n("Method").v("m2").c([n("Sig").c([n("Type").v("int")]), stmt()]),
        ]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        // signatures are unique and map first
        assert!(mappings.has(at(&src, "0.0"), at(&dst, "1.0")));
        // the return statements follow their signatures' methods
        assert!(mappings.has(at(&src, "0.1"), at(&dst, "1.1")));
        assert!(mappings.has(at(&src, "1.1"), at(&dst, "0.1")));
    }

    #[test]
    fn empty_trees_map_nothing() {
        let t = tree(n("A").c([n("B").c([n("C")])]));
        let empty = Tree::empty();
        let matcher = GreedySubtreeMatcher::default();
        assert!(matcher.match_trees(&empty, &t, MappingStore::new()).is_empty());
        assert!(matcher.match_trees(&t, &empty, MappingStore::new()).is_empty());
        assert!(matcher.match_trees(&empty, &empty, MappingStore::new()).is_empty());
    }
}

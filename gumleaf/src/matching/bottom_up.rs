//! Greedy bottom-up matching of similar containers.

use indextree::NodeId;
use rapidhash::RapidHashSet as HashSet;

use super::Matcher;
use super::similarity::dice;
use super::simple::recover_by_alignment;
use super::zs::optimal_mappings;
use crate::config::{Config, ConfigOption, Configurable};
use crate::mapping::MappingStore;
use crate::tree::Tree;
use crate::{debug, trace};

/// How a candidate's Dice score is judged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimilarityThreshold {
    /// Accept pairs scoring above this value (`bu_minsim`).
    Fixed(f64),
    /// Accept pairs scoring above `1 / (1 + ln(|desc(a)| + |desc(b)|))`,
    /// which grows more lenient as subtrees get larger.
    Adaptive,
}

impl SimilarityThreshold {
    fn for_pair(self, src_descendants: usize, dst_descendants: usize) -> f64 {
        match self {
            SimilarityThreshold::Fixed(t) => t,
            SimilarityThreshold::Adaptive => {
                1.0 / (1.0 + ((src_descendants + dst_descendants) as f64).ln())
            }
        }
    }
}

/// Secondary pass run inside every pair the bottom-up matcher accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recovery {
    /// Accepted pairs only map themselves.
    None,
    /// Optimal edit distance, skipped when both subtrees reach `max_size`
    /// nodes (`bu_maxsize`).
    EditDistance {
        /// Size bound.
        max_size: usize,
    },
    /// Child alignment; unbounded.
    Alignment,
}

impl Recovery {
    fn recover(self, src: &Tree, s: NodeId, dst: &Tree, d: NodeId, mappings: &mut MappingStore) {
        match self {
            Recovery::None => {}
            Recovery::EditDistance { max_size } => {
                if src.size(s) < max_size || dst.size(d) < max_size {
                    for (x, y) in optimal_mappings(src, s, dst, d) {
                        if mappings.is_mapping_allowed(src, x, dst, y) {
                            mappings.add(x, y);
                        }
                    }
                } else {
                    trace!(
                        src_size = src.size(s),
                        dst_size = dst.size(d),
                        max_size,
                        "bottom_up: recovery skipped, subtrees too large"
                    );
                }
            }
            Recovery::Alignment => recover_by_alignment(src, s, dst, d, mappings),
        }
    }
}

/// Maps containers whose descendants are already largely mapped together.
///
/// Source nodes are visited in post-order. For an unmapped inner node with
/// at least `bu_minsize` descendants, the candidates are the unmapped,
/// non-root destination ancestors of the partners of its mapped descendants
/// that share its kind. The candidate with the highest Dice score is
/// accepted when the score exceeds the threshold; the pair is then handed to
/// the [`Recovery`] pass. The two roots are mapped last, when they share a
/// kind, and recovered the same way.
#[derive(Debug, Clone)]
pub struct GreedyBottomUpMatcher {
    min_size: usize,
    threshold: SimilarityThreshold,
    recovery: Recovery,
}

impl GreedyBottomUpMatcher {
    /// Fixed `bu_minsim` threshold and edit distance recovery bounded by
    /// `bu_maxsize`.
    pub fn classic(config: &Config) -> Self {
        Self {
            min_size: config.bu_minsize(),
            threshold: SimilarityThreshold::Fixed(config.bu_minsim()),
            recovery: Recovery::EditDistance {
                max_size: config.bu_maxsize(),
            },
        }
    }

    /// Adaptive threshold and alignment recovery.
    pub fn simple(config: &Config) -> Self {
        Self {
            min_size: config.bu_minsize(),
            threshold: SimilarityThreshold::Adaptive,
            recovery: Recovery::Alignment,
        }
    }

    /// Replace the recovery pass.
    pub fn with_recovery(mut self, recovery: Recovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// Current `bu_minsize`.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Current threshold mode.
    pub fn threshold(&self) -> SimilarityThreshold {
        self.threshold
    }

    /// Current recovery pass.
    pub fn recovery(&self) -> Recovery {
        self.recovery
    }

    fn dst_candidates(&self, src: &Tree, s: NodeId, dst: &Tree, mappings: &MappingStore) -> Vec<NodeId> {
        let kind = src.kind(s);
        let mut visited: HashSet<NodeId> = HashSet::default();
        let mut candidates = Vec::new();
        for seed in src.descendants(s).filter_map(|c| mappings.dst_for(c)) {
            for ancestor in dst.ancestors(seed) {
                if !visited.insert(ancestor) {
                    break;
                }
                if dst.kind(ancestor) == kind
                    && !mappings.is_dst_mapped(ancestor)
                    && dst.parent(ancestor).is_some()
                {
                    candidates.push(ancestor);
                }
            }
        }
        candidates
    }
}

impl Matcher for GreedyBottomUpMatcher {
    fn name(&self) -> &'static str {
        "greedy-bottom-up"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mut mappings: MappingStore) -> MappingStore {
        let (Some(src_root), Some(dst_root)) = (src.root(), dst.root()) else {
            return mappings;
        };
        debug!(
            min_size = self.min_size,
            threshold = ?self.threshold,
            recovery = ?self.recovery,
            matched = mappings.len(),
            "bottom_up start"
        );

        for s in src.post_order() {
            if s == src_root {
                break;
            }
            let descendants = src.size(s) - 1;
            if mappings.is_src_mapped(s) || src.is_leaf(s) || descendants < self.min_size {
                continue;
            }

            let mut best: Option<(NodeId, f64)> = None;
            for d in self.dst_candidates(src, s, dst, &mappings) {
                let score = dice(src, s, dst, d, &mappings);
                let threshold = self.threshold.for_pair(descendants, dst.size(d) - 1);
                trace!(
                    src = usize::from(s),
                    dst = usize::from(d),
                    kind = src.kind(s),
                    score,
                    threshold,
                    "bottom_up: candidate"
                );
                if score > threshold && best.is_none_or(|(_, max)| score > max) {
                    best = Some((d, score));
                }
            }

            if let Some((d, _)) = best {
                trace!(src = usize::from(s), dst = usize::from(d), "bottom_up: map");
                mappings.add(s, d);
                self.recovery.recover(src, s, dst, d, &mut mappings);
            }
        }

        if mappings.is_mapping_allowed(src, src_root, dst, dst_root) {
            mappings.add(src_root, dst_root);
            self.recovery
                .recover(src, src_root, dst, dst_root, &mut mappings);
        }

        debug!(matched = mappings.len(), "bottom_up done");
        mappings
    }

    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        Some(self)
    }
}

impl Configurable for GreedyBottomUpMatcher {
    fn applicable_options(&self) -> &'static [ConfigOption] {
        &[
            ConfigOption::BuMinSize,
            ConfigOption::BuMinSim,
            ConfigOption::BuMaxSize,
        ]
    }

    fn configure(&mut self, config: &Config) {
        self.min_size = config.bu_minsize();
        if let SimilarityThreshold::Fixed(_) = self.threshold {
            self.threshold = SimilarityThreshold::Fixed(config.bu_minsim());
        }
        if let Recovery::EditDistance { .. } = self.recovery {
            self.recovery = Recovery::EditDistance {
                max_size: config.bu_maxsize(),
            };
        }
    }

    fn settings(&self) -> Config {
        let mut settings = Config {
            bu_minsize: self.min_size,
            ..Config::default()
        };
        if let SimilarityThreshold::Fixed(t) = self.threshold {
            settings.bu_minsim = t;
        }
        if let Recovery::EditDistance { max_size } = self.recovery {
            settings.bu_maxsize = max_size;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, OptionValue};
    use crate::matching::GreedySubtreeMatcher;
    use crate::test_util::{N, at, n, tree};
    use facet_testhelpers::test;

    fn method(name: &str, stmts: impl IntoIterator<Item = N>) -> N {
        n("Method").v(name).c([n("Body").c(stmts)])
    }

    fn call(name: &str) -> N {
        n("Call").c([n("Name").v(name), n("Args").c([n("Lit").v("1")])])
    }

    #[test]
    fn renamed_container_is_matched_by_its_content() {
        let src = tree(n("Class").c([method("run", [call("a"), call("b"), call("c")])]));
        let dst = tree(n("Class").c([method("start", [call("a"), call("b"), call("c")])]));

        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        assert!(!mappings.is_src_mapped(at(&src, "0")));

        let matcher = GreedyBottomUpMatcher::classic(&Config::default());
        let mappings = matcher.match_trees(&src, &dst, mappings);
        assert!(mappings.has(at(&src, "0"), at(&dst, "0")));
        assert!(mappings.has(at(&src, "0.0"), at(&dst, "0.0")));
        assert!(mappings.has(at(&src, ""), at(&dst, "")));
        assert_eq!(mappings.len(), src.len());
    }

    #[test]
    fn roots_of_different_kinds_stay_apart() {
        let src = tree(n("A").c([call("a")]));
        let dst = tree(n("B").c([call("a")]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        let mappings =
            GreedyBottomUpMatcher::classic(&Config::default()).match_trees(&src, &dst, mappings);
        assert!(!mappings.is_src_mapped(at(&src, "")));
        assert!(mappings.has(at(&src, "0"), at(&dst, "0")));
    }

    #[test]
    fn dissimilar_containers_stay_apart() {
        let src = tree(n("Class").c([
            method("m", [call("a"), call("b"), call("c")]),
            method("other", [call("x")]),
        ]));
        let dst = tree(n("Class").c([
            method("m", [call("a"), call("y"), call("z")]),
            method("else", [call("x")]),
        ]));
        let mappings = GreedySubtreeMatcher::default().match_trees(&src, &dst, MappingStore::new());
        let matcher = GreedyBottomUpMatcher::classic(&Config::default())
            .with_recovery(Recovery::None);
        let mappings = matcher.match_trees(&src, &dst, mappings);
        // Body(m): only Call(a) is shared, 4 of 12 descendants
        assert!(!mappings.is_src_mapped(at(&src, "0.0")));
        // Body(other) holds a single mapped call: dice 1.0
        assert!(mappings.has(at(&src, "1.0"), at(&dst, "1.0")));
    }

    #[test]
    fn adaptive_threshold_shrinks_with_size() {
        let small = SimilarityThreshold::Adaptive.for_pair(1, 1);
        let large = SimilarityThreshold::Adaptive.for_pair(500, 500);
        assert!(small > large);
        assert!((small - 1.0 / (1.0 + 2f64.ln())).abs() < 1e-12);
        assert_eq!(SimilarityThreshold::Fixed(0.5).for_pair(1, 1), 0.5);
    }

    #[test]
    fn configure_keeps_modes() {
        let config = Config::default()
            .with(ConfigOption::BuMinSim, 0.2)
            .unwrap()
            .with(ConfigOption::BuMaxSize, 10)
            .unwrap()
            .with(ConfigOption::BuMinSize, 1)
            .unwrap();

        let mut classic = GreedyBottomUpMatcher::classic(&Config::default());
        classic.configure(&config);
        assert_eq!(classic.min_size(), 1);
        assert_eq!(classic.threshold(), SimilarityThreshold::Fixed(0.2));
        assert_eq!(classic.recovery(), Recovery::EditDistance { max_size: 10 });

        let mut simple = GreedyBottomUpMatcher::simple(&Config::default());
        simple.configure(&config);
        assert_eq!(simple.threshold(), SimilarityThreshold::Adaptive);
        assert_eq!(simple.recovery(), Recovery::Alignment);
    }

    #[test]
    fn set_option_validates_before_applying() {
        let mut classic = GreedyBottomUpMatcher::classic(&Config::default());
        classic.set_option(ConfigOption::BuMaxSize, OptionValue::Int(10)).unwrap();
        assert_eq!(classic.recovery(), Recovery::EditDistance { max_size: 10 });
        // the other options keep their current values
        classic.set_option(ConfigOption::BuMinSim, OptionValue::Float(0.3)).unwrap();
        assert_eq!(classic.threshold(), SimilarityThreshold::Fixed(0.3));
        assert_eq!(classic.recovery(), Recovery::EditDistance { max_size: 10 });
        assert_eq!(classic.settings().bu_maxsize(), 10);

        assert!(matches!(
            classic.set_option(ConfigOption::BuMinSim, OptionValue::Float(1.5)),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            classic.set_option(ConfigOption::StMinPrio, OptionValue::Int(1)),
            Err(ConfigError::NotApplicable { .. })
        ));
        assert_eq!(classic.threshold(), SimilarityThreshold::Fixed(0.3));
        assert_eq!(classic.min_size(), 2);
    }
}

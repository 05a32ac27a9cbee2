//! Diffing many independent tree pairs at once.

use rayon::prelude::*;

use crate::tree::Tree;
use crate::{Diff, DiffOptions, debug, diff_trees};

/// Diff every `(src, dst)` pair on the rayon thread pool.
///
/// Pairs share nothing but the read-only options, so results are exactly
/// what [`diff_trees`] gives for each pair, in input order.
pub fn diff_pairs(pairs: &[(Tree, Tree)], options: &DiffOptions) -> Vec<Diff> {
    debug!(pairs = pairs.len(), "diff_pairs start");
    pairs
        .par_iter()
        .map(|(src, dst)| diff_trees(src, dst, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptKind;
    use crate::matching::Strategy;
    use crate::test_util::{n, tree};
    use facet_testhelpers::test;

    #[test]
    fn matches_sequential_results() {
        let pairs: Vec<(Tree, Tree)> = (0..16)
            .map(|i| {
                let v = i.to_string();
                let src = tree(n("Unit").c([
                    n("Fn").v("f").c([n("Ret").c([n("Lit").v(&v)])]),
                    n("Fn").v("g").c([n("Ret")]),
                ]));
                let dst = tree(n("Unit").c([
                    n("Fn").v("g").c([n("Ret")]),
                    n("Fn").v("f").c([n("Ret").c([n("Lit").v("0")])]),
                ]));
                (src, dst)
            })
            .collect();

        for strategy in Strategy::ALL {
            let options = DiffOptions {
                strategy,
                script: ScriptKind::Simplified,
                ..DiffOptions::default()
            };
            let parallel = diff_pairs(&pairs, &options);
            assert_eq!(parallel.len(), pairs.len());
            for ((src, dst), got) in pairs.iter().zip(parallel) {
                let expected = diff_trees(src, dst, &options);
                assert_eq!(got.script, expected.script);
                assert_eq!(
                    got.mappings.pairs().collect::<Vec<_>>(),
                    expected.mappings.pairs().collect::<Vec<_>>()
                );
            }
        }
    }
}

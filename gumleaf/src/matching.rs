//! GumTree node matching.
//!
//! Matching runs in phases that each extend the mappings of the previous one:
//! 1. Top-down: map the tallest isomorphic subtrees ([`GreedySubtreeMatcher`])
//! 2. Bottom-up: map containers whose content is already largely mapped
//!    ([`GreedyBottomUpMatcher`]), recovering mappings inside every accepted
//!    pair
//!
//! A [`Strategy`] names a ready-made pipeline of phases.

use core::fmt;
use core::str::FromStr;

use crate::config::{Config, ConfigError, ConfigOption, Configurable, MatcherDescriptor, OptionValue};
use crate::debug;
use crate::mapping::MappingStore;
use crate::tree::Tree;

mod bottom_up;
mod simple;
mod similarity;
mod top_down;
mod zs;

pub use bottom_up::{GreedyBottomUpMatcher, Recovery, SimilarityThreshold};
pub use similarity::{common_descendants, dice, label_similarity};
#[cfg(feature = "matching-stats")]
pub use similarity::{get_stats, reset_stats};
pub use simple::recover_by_alignment;
pub use top_down::GreedySubtreeMatcher;
pub use zs::{ZsMatcher, optimal_mappings};

/// One matching phase.
///
/// A phase receives the mappings found so far and returns them extended.
/// It never removes or changes a mapping it was given.
pub trait Matcher: Send + Sync {
    /// Short name, used in logs.
    fn name(&self) -> &'static str;

    /// Extend `mappings` between `src` and `dst`.
    fn match_trees(&self, src: &Tree, dst: &Tree, mappings: MappingStore) -> MappingStore;

    /// Tuning options, for phases that have some.
    fn configurable(&mut self) -> Option<&mut dyn Configurable> {
        None
    }
}

/// Phases run in order, each seeded with the previous phase's mappings.
#[derive(Default)]
pub struct CompositeMatcher {
    phases: Vec<Box<dyn Matcher>>,
}

impl CompositeMatcher {
    /// Pipeline of the given phases.
    pub fn new(phases: Vec<Box<dyn Matcher>>) -> Self {
        Self { phases }
    }

    /// Append a phase.
    pub fn push(&mut self, phase: impl Matcher + 'static) {
        self.phases.push(Box::new(phase));
    }

    /// Names of the phases, in order.
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    /// Hand `config` to every phase that reads options.
    pub fn configure(&mut self, config: &Config) {
        for phase in &mut self.phases {
            if let Some(c) = phase.configurable() {
                c.configure(config);
            }
        }
    }

    /// Set one option on every phase that reads it.
    ///
    /// Fails without touching any phase when the value is outside the
    /// option's domain or no phase reads the option.
    pub fn set_option(&mut self, option: ConfigOption, value: OptionValue) -> Result<(), ConfigError> {
        Config::default().try_set(option, value)?;
        let mut applied = false;
        for phase in &mut self.phases {
            let Some(c) = phase.configurable() else {
                continue;
            };
            if c.applicable_options().contains(&option) {
                c.set_option(option, value)?;
                applied = true;
            }
        }
        if applied {
            Ok(())
        } else {
            Err(ConfigError::NotApplicable {
                key: option.key().to_string(),
            })
        }
    }
}

impl fmt::Debug for CompositeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.phase_names()).finish()
    }
}

impl Matcher for CompositeMatcher {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn match_trees(&self, src: &Tree, dst: &Tree, mut mappings: MappingStore) -> MappingStore {
        for phase in &self.phases {
            #[cfg(feature = "tracing")]
            let before = mappings.len();
            mappings = phase.match_trees(src, dst, mappings);
            debug!(
                phase = phase.name(),
                added = mappings.len() - before,
                total = mappings.len(),
                "phase done"
            );
        }
        mappings
    }
}

/// Ready-made matcher pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Top-down, then bottom-up with a fixed `bu_minsim` threshold and
    /// edit distance recovery bounded by `bu_maxsize`.
    #[default]
    ClassicGumtree,
    /// Top-down, then bottom-up with an adaptive threshold and child
    /// alignment recovery. Ignores `bu_minsim` and `bu_maxsize`.
    SimpleGumtree,
}

impl Strategy {
    /// Every strategy.
    pub const ALL: [Strategy; 2] = [Strategy::ClassicGumtree, Strategy::SimpleGumtree];

    /// Name used in matcher descriptors.
    pub fn name(self) -> &'static str {
        match self {
            Strategy::ClassicGumtree => "ClassicGumtree",
            Strategy::SimpleGumtree => "SimpleGumtree",
        }
    }

    /// The pipeline for this strategy, configured with `config`.
    pub fn matcher(self, config: &Config) -> CompositeMatcher {
        let mut matcher = CompositeMatcher::default();
        matcher.push(GreedySubtreeMatcher::new(config));
        match self {
            Strategy::ClassicGumtree => matcher.push(GreedyBottomUpMatcher::classic(config)),
            Strategy::SimpleGumtree => matcher.push(GreedyBottomUpMatcher::simple(config)),
        }
        matcher
    }

    /// Strategy and configuration named by a descriptor.
    pub fn from_descriptor(descriptor: &MatcherDescriptor) -> Result<(Strategy, Config), ConfigError> {
        let strategy = descriptor.strategy.parse()?;
        Ok((strategy, descriptor.config()?))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownStrategy {
                name: s.to_string(),
            })
    }
}

/// Map `src` onto `dst` with the given strategy and options.
pub fn compute_mappings(src: &Tree, dst: &Tree, strategy: Strategy, config: &Config) -> MappingStore {
    debug!(
        %strategy,
        src_nodes = src.len(),
        dst_nodes = dst.len(),
        "compute_mappings start"
    );

    #[cfg(feature = "matching-stats")]
    reset_stats();

    let mappings = strategy
        .matcher(config)
        .match_trees(src, dst, MappingStore::for_trees(src, dst));

    #[cfg(feature = "matching-stats")]
    {
        let (_dice_calls, _zs_runs) = get_stats();
        debug!(dice_calls = _dice_calls, zs_runs = _zs_runs, "matching stats");
    }

    debug!(mapped = mappings.len(), "compute_mappings done");
    mappings
}

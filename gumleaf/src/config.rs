//! Tuning options for the matchers.
//!
//! A [`Config`] is a plain value passed into every matching run. There is no
//! global configuration: two runs with different tunings can share threads
//! and trees without coordination.

use core::fmt;
use core::str::FromStr;

use facet::Facet;

/// A named tuning option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigOption {
    /// Minimum subtree height for the top-down phase. Default 1.
    StMinHeight,
    /// Minimum height at which ambiguous top-down candidate groups are
    /// resolved; shorter ambiguous groups are left to the bottom-up phase.
    /// Default 2.
    StMinPrio,
    /// Minimum number of descendants for a bottom-up candidate. Default 2.
    BuMinSize,
    /// Dice threshold a bottom-up pair must exceed. Default 0.5.
    BuMinSim,
    /// Recovery by optimal edit distance only runs on pairs where one of the
    /// two subtrees is smaller than this. Default 1000.
    BuMaxSize,
}

impl ConfigOption {
    /// Every option.
    pub const ALL: [ConfigOption; 5] = [
        ConfigOption::StMinHeight,
        ConfigOption::StMinPrio,
        ConfigOption::BuMinSize,
        ConfigOption::BuMinSim,
        ConfigOption::BuMaxSize,
    ];

    /// Canonical key, e.g. `bu_minsim`.
    pub fn key(self) -> &'static str {
        match self {
            ConfigOption::StMinHeight => "st_minheight",
            ConfigOption::StMinPrio => "st_minprio",
            ConfigOption::BuMinSize => "bu_minsize",
            ConfigOption::BuMinSim => "bu_minsim",
            ConfigOption::BuMaxSize => "bu_maxsize",
        }
    }

    /// Legacy descriptor alias used by tuning harnesses, if any.
    pub fn alias(self) -> Option<&'static str> {
        match self {
            ConfigOption::StMinHeight => Some("GT_STM_MH"),
            ConfigOption::BuMinSim => Some("GT_BUM_SMT"),
            ConfigOption::BuMaxSize => Some("GT_BUM_SZT"),
            ConfigOption::StMinPrio | ConfigOption::BuMinSize => None,
        }
    }

    /// Look up an option by canonical key or alias.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|o| o.key() == key || o.alias() == Some(key))
    }

    /// Compiled-in default.
    pub fn default_value(self) -> OptionValue {
        match self {
            ConfigOption::StMinHeight => OptionValue::Int(1),
            ConfigOption::StMinPrio => OptionValue::Int(2),
            ConfigOption::BuMinSize => OptionValue::Int(2),
            ConfigOption::BuMinSim => OptionValue::Float(0.5),
            ConfigOption::BuMaxSize => OptionValue::Int(1000),
        }
    }

    fn is_float(self) -> bool {
        matches!(self, ConfigOption::BuMinSim)
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A typed option value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionValue {
    /// Integer options. Signed so negative input can be rejected.
    Int(i64),
    /// Real-valued options.
    Float(f64),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v.into())
    }
}

impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

/// Errors from setting options or parsing matcher descriptors.
#[derive(Facet, Debug, PartialEq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum ConfigError {
    /// unknown option `{key}`
    UnknownOption { key: String },

    /// value {value} is out of range for `{key}` (expected {domain})
    OutOfRange {
        key: String,
        value: String,
        domain: String,
    },

    /// `{key}` expects {expected}, got `{value}`
    InvalidValue {
        key: String,
        expected: String,
        value: String,
    },

    /// unknown matcher strategy `{name}`
    UnknownStrategy { name: String },

    /// malformed matcher descriptor `{descriptor}`
    MalformedDescriptor { descriptor: String },

    /// option `{key}` is not read by this matcher
    NotApplicable { key: String },
}

/// Option values for one matching run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) st_minheight: usize,
    pub(crate) st_minprio: usize,
    pub(crate) bu_minsize: usize,
    pub(crate) bu_minsim: f64,
    pub(crate) bu_maxsize: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            st_minheight: 1,
            st_minprio: 2,
            bu_minsize: 2,
            bu_minsim: 0.5,
            bu_maxsize: 1000,
        }
    }
}

impl Config {
    /// All options at their defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option. Out-of-domain values are rejected and leave the
    /// config unchanged.
    pub fn try_set(
        &mut self,
        option: ConfigOption,
        value: impl Into<OptionValue>,
    ) -> Result<(), ConfigError> {
        let value = value.into();
        let slot = match option {
            ConfigOption::StMinHeight => &mut self.st_minheight,
            ConfigOption::StMinPrio => &mut self.st_minprio,
            ConfigOption::BuMinSize => &mut self.bu_minsize,
            ConfigOption::BuMaxSize => &mut self.bu_maxsize,
            ConfigOption::BuMinSim => {
                let v = match value {
                    OptionValue::Float(v) => v,
                    OptionValue::Int(v) => v as f64,
                };
                if !(0.0..=1.0).contains(&v) {
                    return Err(out_of_range(option, value, "a number in [0, 1]"));
                }
                self.bu_minsim = v;
                return Ok(());
            }
        };

        let OptionValue::Int(v) = value else {
            return Err(ConfigError::InvalidValue {
                key: option.key().to_string(),
                expected: "an integer".to_string(),
                value: value.to_string(),
            });
        };
        *slot =
            usize::try_from(v).map_err(|_| out_of_range(option, value, "a non-negative integer"))?;
        Ok(())
    }

    /// Set an option from text, by canonical key or alias.
    pub fn try_set_str(&mut self, key: &str, text: &str) -> Result<(), ConfigError> {
        let option = ConfigOption::from_key(key).ok_or_else(|| ConfigError::UnknownOption {
            key: key.to_string(),
        })?;
        let value = parse_value(option, text)?;
        self.try_set(option, value)
    }

    /// Builder-style [`Config::try_set`].
    pub fn with(
        mut self,
        option: ConfigOption,
        value: impl Into<OptionValue>,
    ) -> Result<Self, ConfigError> {
        self.try_set(option, value)?;
        Ok(self)
    }

    /// Current value of an option.
    pub fn get(&self, option: ConfigOption) -> OptionValue {
        match option {
            ConfigOption::StMinHeight => self.st_minheight.into(),
            ConfigOption::StMinPrio => self.st_minprio.into(),
            ConfigOption::BuMinSize => self.bu_minsize.into(),
            ConfigOption::BuMinSim => self.bu_minsim.into(),
            ConfigOption::BuMaxSize => self.bu_maxsize.into(),
        }
    }

    /// See [`ConfigOption::StMinHeight`].
    pub fn st_minheight(&self) -> usize {
        self.st_minheight
    }

    /// See [`ConfigOption::StMinPrio`].
    pub fn st_minprio(&self) -> usize {
        self.st_minprio
    }

    /// See [`ConfigOption::BuMinSize`].
    pub fn bu_minsize(&self) -> usize {
        self.bu_minsize
    }

    /// See [`ConfigOption::BuMinSim`].
    pub fn bu_minsim(&self) -> f64 {
        self.bu_minsim
    }

    /// See [`ConfigOption::BuMaxSize`].
    pub fn bu_maxsize(&self) -> usize {
        self.bu_maxsize
    }
}

fn out_of_range(option: ConfigOption, value: OptionValue, domain: &str) -> ConfigError {
    ConfigError::OutOfRange {
        key: option.key().to_string(),
        value: value.to_string(),
        domain: domain.to_string(),
    }
}

fn parse_value(option: ConfigOption, text: &str) -> Result<OptionValue, ConfigError> {
    let text = text.trim();
    let invalid = |expected: &str| ConfigError::InvalidValue {
        key: option.key().to_string(),
        expected: expected.to_string(),
        value: text.to_string(),
    };
    if option.is_float() {
        text.parse::<f64>()
            .map(OptionValue::Float)
            .map_err(|_| invalid("a number"))
    } else {
        text.parse::<i64>()
            .map(OptionValue::Int)
            .map_err(|_| invalid("an integer"))
    }
}

/// Matcher component implemented by phases that read tuning options.
pub trait Configurable {
    /// Options this phase reads.
    fn applicable_options(&self) -> &'static [ConfigOption];

    /// Adopt the values of the applicable options.
    fn configure(&mut self, config: &Config);

    /// Current settings. Options this phase does not read are at their
    /// defaults.
    fn settings(&self) -> Config;

    /// Set one option. Options this phase does not read and out-of-domain
    /// values are rejected, leaving the phase unchanged.
    fn set_option(&mut self, option: ConfigOption, value: OptionValue) -> Result<(), ConfigError> {
        if !self.applicable_options().contains(&option) {
            return Err(ConfigError::NotApplicable {
                key: option.key().to_string(),
            });
        }
        let mut settings = self.settings();
        settings.try_set(option, value)?;
        self.configure(&settings);
        Ok(())
    }
}

/// Strategy name plus option overrides, in the
/// `ClassicGumtree@GT_BUM_SMT@0.1@GT_STM_MH@1` form used by tuning harnesses.
///
/// Option keys may be aliases or canonical keys. Overrides keep their
/// original order so the descriptor displays back as written.
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherDescriptor {
    /// Strategy name, e.g. `ClassicGumtree`.
    pub strategy: String,
    /// Overrides, in descriptor order.
    pub overrides: Vec<(ConfigOption, OptionValue)>,
}

impl MatcherDescriptor {
    /// The defaults with every override applied.
    pub fn config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for &(option, value) in &self.overrides {
            config.try_set(option, value)?;
        }
        Ok(config)
    }
}

impl FromStr for MatcherDescriptor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedDescriptor {
            descriptor: s.to_string(),
        };
        let mut parts = s.trim().split('@');
        let strategy = parts.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;

        let rest: Vec<&str> = parts.collect();
        if rest.len() % 2 != 0 {
            return Err(malformed());
        }

        let mut overrides = Vec::with_capacity(rest.len() / 2);
        for pair in rest.chunks_exact(2) {
            let option =
                ConfigOption::from_key(pair[0]).ok_or_else(|| ConfigError::UnknownOption {
                    key: pair[0].to_string(),
                })?;
            let value = parse_value(option, pair[1])?;
            // validate now so a bad descriptor fails at parse time
            Config::default().try_set(option, value)?;
            overrides.push((option, value));
        }

        Ok(Self {
            strategy: strategy.to_string(),
            overrides,
        })
    }
}

impl fmt::Display for MatcherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.strategy)?;
        for (option, value) in &self.overrides {
            write!(f, "@{}@{}", option.alias().unwrap_or(option.key()), value)?;
        }
        Ok(())
    }
}

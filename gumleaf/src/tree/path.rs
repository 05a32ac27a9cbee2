use core::fmt;
use core::str::FromStr;

use facet::Facet;
use smallvec::SmallVec;

/// Positional address of a node: the child index taken at each level,
/// starting below the root.
///
/// The root is the empty path. Displays as dotted indices (`"0.2"`), the
/// same form accepted by [`FromStr`]. Uses `SmallVec<[u32; 16]>` since
/// syntax trees are rarely deeper than that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(pub SmallVec<[u32; 16]>);

impl NodePath {
    /// The path of the root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps below the root.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Path of the `index`-th child of the node at this path.
    pub fn child(&self, index: u32) -> Self {
        let mut steps = self.0.clone();
        steps.push(index);
        Self(steps)
    }

    /// Path of the parent, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(SmallVec::from_slice(rest)))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

/// Errors produced when parsing a [`NodePath`].
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum PathError {
    /// path segment `{segment}` is not a child index
    InvalidSegment { segment: String },
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::root());
        }
        s.split('.')
            .map(|segment| {
                segment.parse::<u32>().map_err(|_| PathError::InvalidSegment {
                    segment: segment.to_string(),
                })
            })
            .collect::<Result<SmallVec<_>, _>>()
            .map(Self)
    }
}

impl From<&[u32]> for NodePath {
    fn from(steps: &[u32]) -> Self {
        Self(SmallVec::from_slice(steps))
    }
}

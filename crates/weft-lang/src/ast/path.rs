use std::fmt::{self, Display, Formatter};

use smallvec::SmallVec;
use smol_str::SmolStr;

/// Document-order index of a scope, assigned by the compiler starting at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ScopeIndex(pub u32);

impl Display for ScopeIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ScopeIndex {
    fn from(index: u32) -> Self {
        ScopeIndex(index)
    }
}

/// A resolved reference to a declared value.
///
/// `anchor` is the scope the lookup landed on, `aliases` the chain of aliased
/// child scopes walked from there, and `name` the declared value in the last
/// scope of that chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepPath {
    pub anchor: ScopeIndex,
    pub aliases: SmallVec<[SmolStr; 2]>,
    pub name: SmolStr,
}

impl DepPath {
    pub fn new(anchor: ScopeIndex, name: impl Into<SmolStr>) -> Self {
        Self {
            anchor,
            aliases: SmallVec::new(),
            name: name.into(),
        }
    }

    pub fn with_aliases(
        anchor: ScopeIndex,
        aliases: impl IntoIterator<Item = SmolStr>,
        name: impl Into<SmolStr>,
    ) -> Self {
        Self {
            anchor,
            aliases: aliases.into_iter().collect(),
            name: name.into(),
        }
    }
}

impl Display for DepPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.anchor)?;
        for alias in &self.aliases {
            write!(f, ".{}", alias)?;
        }
        write!(f, ".{}", self.name)
    }
}

//! Combine requests - closed builder types describing what to combine

use super::proxy::RelationProxy;
use crate::relationships::metadata::{Cardinality, KeyMapping};

/// One child of a combine request
#[derive(Debug, Clone)]
pub enum CombineEntry {
    /// Child described by a declared association, optionally combined further
    Association {
        name: String,
        nested: Option<CombineSpec>,
    },
    /// Ad-hoc child with explicit cardinality and optional keys
    Explicit {
        cardinality: Cardinality,
        name: String,
        target: RelationProxy,
        keys: Option<KeyMapping>,
    },
}

impl CombineEntry {
    /// Name nested results are attached under
    pub fn name(&self) -> &str {
        match self {
            Self::Association { name, .. } | Self::Explicit { name, .. } => name,
        }
    }
}

/// Ordered list of combine entries
///
/// ```ignore
/// users.combine(&CombineSpec::new().association("tasks").many("posts", posts))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct CombineSpec {
    entries: Vec<CombineEntry>,
}

impl CombineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spec made of association names only
    pub fn associations<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .fold(Self::new(), |spec, name| spec.association(name))
    }

    pub fn association(self, name: impl Into<String>) -> Self {
        self.push(CombineEntry::Association {
            name: name.into(),
            nested: None,
        })
    }

    /// Association whose target is itself combined with `nested`
    pub fn association_with(self, name: impl Into<String>, nested: CombineSpec) -> Self {
        self.push(CombineEntry::Association {
            name: name.into(),
            nested: Some(nested),
        })
    }

    pub fn one(self, name: impl Into<String>, target: RelationProxy) -> Self {
        self.explicit(Cardinality::One, name, target, None)
    }

    pub fn many(self, name: impl Into<String>, target: RelationProxy) -> Self {
        self.explicit(Cardinality::Many, name, target, None)
    }

    pub fn one_with_keys(self, name: impl Into<String>, target: RelationProxy, keys: KeyMapping) -> Self {
        self.explicit(Cardinality::One, name, target, Some(keys))
    }

    pub fn many_with_keys(self, name: impl Into<String>, target: RelationProxy, keys: KeyMapping) -> Self {
        self.explicit(Cardinality::Many, name, target, Some(keys))
    }

    pub fn explicit(
        self,
        cardinality: Cardinality,
        name: impl Into<String>,
        target: RelationProxy,
        keys: Option<KeyMapping>,
    ) -> Self {
        self.push(CombineEntry::Explicit {
            cardinality,
            name: name.into(),
            target,
            keys,
        })
    }

    pub fn push(mut self, entry: CombineEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entries(&self) -> &[CombineEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Targets of `combine_parents` / `combine_children` for one cardinality
#[derive(Debug, Clone)]
pub enum Targets {
    /// Attached under the target's conventional tuple key
    Single(RelationProxy),
    List(Vec<RelationProxy>),
    /// Attached under explicit names
    Named(Vec<(String, RelationProxy)>),
}

impl Targets {
    /// Pair each target with the name it is attached under
    pub fn named(&self, cardinality: Cardinality) -> Vec<(String, RelationProxy)> {
        match self {
            Self::Single(target) => vec![(target.combine_tuple_key(cardinality), target.clone())],
            Self::List(targets) => targets
                .iter()
                .map(|target| (target.combine_tuple_key(cardinality), target.clone()))
                .collect(),
            Self::Named(targets) => targets.clone(),
        }
    }
}

impl From<RelationProxy> for Targets {
    fn from(target: RelationProxy) -> Self {
        Self::Single(target)
    }
}

impl From<Vec<RelationProxy>> for Targets {
    fn from(targets: Vec<RelationProxy>) -> Self {
        Self::List(targets)
    }
}

impl<S: Into<String>> From<Vec<(S, RelationProxy)>> for Targets {
    fn from(targets: Vec<(S, RelationProxy)>) -> Self {
        Self::Named(targets.into_iter().map(|(name, target)| (name.into(), target)).collect())
    }
}

/// Options of the key-inferring combine shortcuts, grouped by cardinality
#[derive(Debug, Clone, Default)]
pub struct CombineOptions {
    entries: Vec<(Cardinality, Targets)>,
}

impl CombineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn one(mut self, targets: impl Into<Targets>) -> Self {
        self.entries.push((Cardinality::One, targets.into()));
        self
    }

    pub fn many(mut self, targets: impl Into<Targets>) -> Self {
        self.entries.push((Cardinality::Many, targets.into()));
        self
    }

    pub fn entries(&self) -> &[(Cardinality, Targets)] {
        &self.entries
    }
}

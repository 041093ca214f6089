//! Relationship Metadata System - cardinality, join keys and associations

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::relation::Container;

/// Whether a combined relation contributes one value or a sequence per parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

impl Cardinality {
    /// Returns true if nested results are collections
    pub fn is_collection(self) -> bool {
        matches!(self, Self::Many)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Many => "many",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join keys from the parent side of a combine to the child side
///
/// `{"id": "user_id"}` on a `tasks` node under `users` reads as
/// `users.id = tasks.user_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMapping(BTreeMap<String, String>);

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping with a single key pair
    pub fn single(left: impl Into<String>, right: impl Into<String>) -> Self {
        let mut keys = Self::new();
        keys.insert(left, right);
        keys
    }

    pub fn insert(&mut self, left: impl Into<String>, right: impl Into<String>) {
        self.0.insert(left.into(), right.into());
    }

    pub fn get(&self, left: &str) -> Option<&str> {
        self.0.get(left).map(String::as_str)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, r)| (l.as_str(), r.as_str()))
    }

    /// Same pairs with both sides swapped
    pub fn invert(&self) -> KeyMapping {
        self.0.iter().map(|(l, r)| (r.clone(), l.clone())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<L: Into<String>, R: Into<String>> FromIterator<(L, R)> for KeyMapping {
    fn from_iter<I: IntoIterator<Item = (L, R)>>(iter: I) -> Self {
        KeyMapping(iter.into_iter().map(|(l, r)| (l.into(), r.into())).collect())
    }
}

impl fmt::Display for KeyMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self.pairs().map(|(l, r)| format!("{} => {}", l, r)).collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

/// Structural combine information carried by a relation proxy
///
/// `combine_type` is `None` only for the root of a combine tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombineMeta {
    pub keys: KeyMapping,
    pub combine_type: Option<Cardinality>,
    pub combine_name: Option<String>,
}

impl CombineMeta {
    pub fn new(name: impl Into<String>, keys: KeyMapping, cardinality: Cardinality) -> Self {
        Self {
            keys,
            combine_type: Some(cardinality),
            combine_name: Some(name.into()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.combine_type.is_none()
    }
}

/// Kind of a declared association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationKind {
    /// has-many: the target holds a foreign key to the source
    OneToMany,
    /// has-one: like one-to-many but yields a single tuple
    OneToOne,
    /// belongs-to: the source holds a foreign key to the target
    ManyToOne,
}

impl AssociationKind {
    pub fn result(self) -> Cardinality {
        match self {
            Self::OneToMany => Cardinality::Many,
            Self::OneToOne | Self::ManyToOne => Cardinality::One,
        }
    }
}

/// A named, pre-declared relationship between two relations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    pub name: String,
    /// Relation declaring the association
    pub source: String,
    pub target: String,
    pub kind: AssociationKind,
    /// Overrides the conventional foreign key column
    pub foreign_key: Option<String>,
    /// Zero-argument view applied to the target when combining
    pub view: Option<String>,
}

impl Association {
    fn new(kind: AssociationKind, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: String::new(),
            target: target.into(),
            kind,
            foreign_key: None,
            view: None,
        }
    }

    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(AssociationKind::OneToMany, name, target)
    }

    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(AssociationKind::OneToOne, name, target)
    }

    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(AssociationKind::ManyToOne, name, target)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = Some(column.into());
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Cardinality of the combined result
    pub fn result(&self) -> Cardinality {
        self.kind.result()
    }

    /// Join keys from the source side to the target side
    pub fn combine_keys(&self, container: &Container) -> GraphResult<KeyMapping> {
        let source = container.relation(&self.source)?;
        let target = container.relation(&self.target)?;

        let keys = match self.kind {
            AssociationKind::OneToMany | AssociationKind::OneToOne => {
                let primary_key = source.primary_key().ok_or_else(|| {
                    GraphError::key_inference(&self.source, &self.target, "source has no primary key")
                })?;
                let foreign_key = self
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| target.foreign_key_for(source.name()));
                KeyMapping::single(primary_key, foreign_key)
            }
            AssociationKind::ManyToOne => {
                let primary_key = target.primary_key().ok_or_else(|| {
                    GraphError::key_inference(&self.source, &self.target, "target has no primary key")
                })?;
                let foreign_key = self
                    .foreign_key
                    .clone()
                    .unwrap_or_else(|| source.foreign_key_for(target.name()));
                KeyMapping::single(foreign_key, primary_key)
            }
        };

        Ok(keys)
    }
}

/// Associations of one relation, keyed by association name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationSet {
    associations: BTreeMap<String, Association>,
}

impl AssociationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, association: Association) {
        self.associations.insert(association.name.clone(), association);
    }

    pub fn get(&self, name: &str) -> Option<&Association> {
        self.associations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.associations.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Association> {
        self.associations.values()
    }

    pub fn len(&self) -> usize {
        self.associations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associations.is_empty()
    }
}

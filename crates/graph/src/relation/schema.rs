//! Relation schema - declarative description of a single relation

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Criteria, RelationName};
use crate::error::{GraphError, GraphResult};
use crate::relationships::inference::ForeignKeyConvention;
use crate::relationships::metadata::{Association, AssociationSet};

/// Named restriction on a relation, e.g. `by_id(id)` or `priority`
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub name: String,
    /// Columns bound positionally to the view arguments
    pub columns: Vec<String>,
    /// Conditions applied regardless of arguments
    pub fixed: Criteria,
}

impl View {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            fixed: Criteria::new(),
        }
    }

    /// View restricting by equality on the given columns
    pub fn by<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            fixed: Criteria::new(),
        }
    }

    pub fn with_fixed(mut self, criteria: Criteria) -> Self {
        self.fixed = criteria;
        self
    }

    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Build the criteria for a call of this view
    pub fn criteria_for(&self, args: &[Value]) -> GraphResult<Criteria> {
        if args.len() != self.columns.len() {
            return Err(GraphError::invalid_input(format!(
                "view '{}' expects {} argument(s), got {}",
                self.name,
                self.columns.len(),
                args.len()
            )));
        }

        let bound = self
            .columns
            .iter()
            .zip(args)
            .fold(Criteria::new(), |criteria, (column, arg)| {
                criteria.eq(column.clone(), arg.clone())
            });

        Ok(self.fixed.clone().merge(bound))
    }
}

/// Schema of a relation: keys, associations, views and its gateway
#[derive(Debug, Clone)]
pub struct RelationSchema {
    pub name: RelationName,
    /// Primary key column; filled from config on registration unless keyless
    pub primary_key: Option<String>,
    /// Declared relations without a primary key never receive the default
    pub keyless: bool,
    /// Explicit foreign keys keyed by the referenced relation name
    pub foreign_keys: BTreeMap<String, String>,
    /// Known columns, in declaration order
    pub attributes: Vec<String>,
    pub associations: AssociationSet,
    pub views: BTreeMap<String, View>,
    /// Name of the gateway storing the dataset
    pub gateway: String,
    pub foreign_key_convention: ForeignKeyConvention,
}

impl RelationSchema {
    pub fn new(relation: impl Into<String>) -> Self {
        Self::with_name(RelationName::new(relation))
    }

    pub fn with_name(name: RelationName) -> Self {
        Self {
            name,
            primary_key: None,
            keyless: false,
            foreign_keys: BTreeMap::new(),
            attributes: Vec::new(),
            associations: AssociationSet::new(),
            views: BTreeMap::new(),
            gateway: "default".to_string(),
            foreign_key_convention: ForeignKeyConvention::Underscore,
        }
    }

    /// Read from a dataset whose name differs from the relation name
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.name.dataset = dataset.into();
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self.keyless = false;
        self
    }

    pub fn without_primary_key(mut self) -> Self {
        self.primary_key = None;
        self.keyless = true;
        self
    }

    /// Declare the column on this relation that references `relation`
    pub fn foreign_key(mut self, relation: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_keys.insert(relation.into(), column.into());
        self
    }

    pub fn attributes<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn view(mut self, view: View) -> Self {
        self.views.insert(view.name.clone(), view);
        self
    }

    pub fn association(mut self, association: Association) -> Self {
        let association = association.with_source(self.name.relation.clone());
        self.associations.insert(association);
        self
    }

    /// One-to-many association whose target is named like the association
    pub fn has_many(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.association(Association::one_to_many(name.clone(), name))
    }

    pub fn has_one(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.association(Association::one_to_one(name, target))
    }

    pub fn belongs_to(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.association(Association::many_to_one(name, target))
    }

    /// Foreign key on this relation referencing `other`, explicit or by convention
    pub fn foreign_key_for(&self, other: &RelationName) -> String {
        self.foreign_keys
            .get(&other.relation)
            .cloned()
            .unwrap_or_else(|| self.foreign_key_convention.foreign_key_for(&other.relation))
    }
}

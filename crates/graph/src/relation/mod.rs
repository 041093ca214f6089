//! Relations - the atomic data sources the graph layer composes
//!
//! A [`Relation`] is a [`RelationSchema`] bound to the [`Gateway`] that stores
//! its dataset, plus the criteria accumulated by restrictions and views.

pub mod gateway;
pub mod registry;
pub mod schema;

pub use gateway::*;
pub use registry::*;
pub use schema::*;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GraphError, GraphResult};
use crate::relationships::metadata::AssociationSet;

/// A single row as loaded from or written to a dataset
pub type Tuple = serde_json::Map<String, Value>;

/// Logical relation name plus the physical dataset it reads from
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationName {
    /// Name the relation is registered under
    pub relation: String,
    /// Dataset (table) name in the gateway
    pub dataset: String,
}

impl RelationName {
    /// Name whose dataset matches the relation name
    pub fn new(relation: impl Into<String>) -> Self {
        let relation = relation.into();
        Self {
            dataset: relation.clone(),
            relation,
        }
    }

    pub fn with_dataset(relation: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            dataset: dataset.into(),
        }
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relation)
    }
}

/// A single column condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
}

impl Condition {
    /// Check a column value against this condition; missing columns read as null
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Condition::Eq(expected) => expected == value,
            Condition::In(candidates) => candidates.iter().any(|c| c == value),
        }
    }
}

/// Conjunction of column conditions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    conditions: Vec<(String, Condition)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), Condition::Eq(value.into())));
        self
    }

    /// Add a membership condition
    pub fn in_values(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push((column.into(), Condition::In(values)));
        self
    }

    /// Combine two criteria; a tuple must satisfy both
    pub fn merge(mut self, other: Criteria) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(column, condition)| (column.as_str(), condition))
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.conditions
            .iter()
            .all(|(column, condition)| condition.matches(tuple.get(column)))
    }
}

/// A relation schema bound to its gateway, possibly restricted
#[derive(Debug, Clone)]
pub struct Relation {
    schema: Arc<RelationSchema>,
    gateway: Arc<dyn Gateway>,
    criteria: Criteria,
}

impl Relation {
    pub fn new(schema: Arc<RelationSchema>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            schema,
            gateway,
            criteria: Criteria::new(),
        }
    }

    pub fn name(&self) -> &RelationName {
        &self.schema.name
    }

    pub fn schema(&self) -> &RelationSchema {
        &self.schema
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// Adapter identifier of the backing gateway
    pub fn adapter(&self) -> &str {
        self.gateway.adapter()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.schema.primary_key.as_deref()
    }

    /// Foreign key column on this relation that references `other`
    pub fn foreign_key_for(&self, other: &RelationName) -> String {
        self.schema.foreign_key_for(other)
    }

    pub fn associations(&self) -> &AssociationSet {
        &self.schema.associations
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    /// Whether this relation was narrowed by a restriction or view
    pub fn is_restricted(&self) -> bool {
        !self.criteria.is_empty()
    }

    /// Narrow this relation; the receiver is left untouched
    pub fn restrict(&self, criteria: Criteria) -> Relation {
        Relation {
            schema: Arc::clone(&self.schema),
            gateway: Arc::clone(&self.gateway),
            criteria: self.criteria.clone().merge(criteria),
        }
    }

    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> Relation {
        self.restrict(Criteria::new().eq(column, value))
    }

    /// Apply a named view with its arguments
    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<Relation> {
        let view = self.schema.views.get(name).ok_or_else(|| GraphError::ViewNotFound {
            relation: self.name().relation.clone(),
            view: name.to_string(),
        })?;
        Ok(self.restrict(view.criteria_for(args)?))
    }

    /// Load every tuple matching the current criteria
    pub fn to_a(&self) -> GraphResult<Vec<Tuple>> {
        self.gateway.fetch(&self.schema.name.dataset, &self.criteria)
    }

    /// Load exactly zero or one tuple
    pub fn one(&self) -> GraphResult<Option<Tuple>> {
        let mut tuples = self.to_a()?;
        if tuples.len() > 1 {
            return Err(GraphError::invalid_input(format!(
                "expected at most one tuple from '{}', got {}",
                self.name(),
                tuples.len()
            )));
        }
        Ok(tuples.pop())
    }

    pub fn first(&self) -> GraphResult<Option<Tuple>> {
        Ok(self.to_a()?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tuple(value: Value) -> Tuple {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_condition_matching() {
        let row = tuple(json!({"id": 1, "name": "Jane"}));

        assert!(Condition::Eq(json!(1)).matches(row.get("id")));
        assert!(Condition::In(vec![json!(2), json!(1)]).matches(row.get("id")));
        assert!(!Condition::In(vec![]).matches(row.get("id")));
        assert!(Condition::Eq(Value::Null).matches(row.get("missing")));
    }

    #[test]
    fn test_criteria_is_conjunctive() {
        let row = tuple(json!({"id": 1, "name": "Jane"}));

        let criteria = Criteria::new().eq("id", 1).merge(Criteria::new().eq("name", "Joe"));
        assert!(!criteria.matches(&row));

        let criteria = Criteria::new()
            .in_values("id", vec![json!(1), json!(2)])
            .eq("name", "Jane");
        assert!(criteria.matches(&row));
    }

    #[test]
    fn test_relation_name_display() {
        let name = RelationName::with_dataset("accounts", "user_accounts");
        assert_eq!(name.to_string(), "accounts");
        assert_eq!(RelationName::new("users").dataset, "users");
    }
}

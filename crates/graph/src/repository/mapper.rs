//! Structs and the mappers producing them from loaded tuples

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::ast::{PlanNode, RelationNode};
use crate::error::{GraphError, GraphResult};
use crate::relation::Tuple;
use crate::relationships::metadata::Cardinality;

/// Attribute value of a [`Struct`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Attr {
    Value(Value),
    One(Option<Box<Struct>>),
    Many(Vec<Struct>),
}

impl Attr {
    fn to_value(&self) -> Value {
        match self {
            Attr::Value(value) => value.clone(),
            Attr::One(Some(nested)) => Value::Object(nested.to_hash()),
            Attr::One(None) => Value::Null,
            Attr::Many(nested) => Value::Array(nested.iter().map(|s| Value::Object(s.to_hash())).collect()),
        }
    }
}

/// Immutable value with a fixed attribute list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Struct {
    #[serde(skip)]
    name: String,
    #[serde(flatten)]
    attributes: indexed::Attributes,
}

mod indexed {
    use super::Attr;
    use serde::ser::{Serialize, SerializeMap, Serializer};

    /// Attribute pairs in declaration order
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Attributes(pub Vec<(String, Attr)>);

    impl Serialize for Attributes {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut map = serializer.serialize_map(Some(self.0.len()))?;
            for (name, attr) in &self.0 {
                map.serialize_entry(name, attr)?;
            }
            map.end()
        }
    }
}

impl Struct {
    pub fn new(name: impl Into<String>, attributes: Vec<(String, Attr)>) -> Self {
        Self {
            name: name.into(),
            attributes: indexed::Attributes(attributes),
        }
    }

    /// Relation name the struct was mapped from
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Attr> {
        self.attributes
            .0
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value)
    }

    /// Plain attribute value
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.get(name)? {
            Attr::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Nested single struct
    pub fn one(&self, name: &str) -> Option<&Struct> {
        match self.get(name)? {
            Attr::One(nested) => nested.as_deref(),
            _ => None,
        }
    }

    /// Nested struct collection
    pub fn many(&self, name: &str) -> &[Struct] {
        match self.get(name) {
            Some(Attr::Many(nested)) => nested,
            _ => &[],
        }
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.0.is_empty()
    }

    /// Convert back into a tuple, recursively
    pub fn to_hash(&self) -> Tuple {
        self.attributes
            .0
            .iter()
            .map(|(name, attr)| (name.clone(), attr.to_value()))
            .collect()
    }
}

/// Mapped result of a read or a command
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    One(Option<Struct>),
    Many(Vec<Struct>),
}

impl Mapped {
    /// Single struct; the first one for collections
    pub fn into_one(self) -> Option<Struct> {
        match self {
            Mapped::One(one) => one,
            Mapped::Many(many) => many.into_iter().next(),
        }
    }

    pub fn into_many(self) -> Vec<Struct> {
        match self {
            Mapped::One(one) => one.into_iter().collect(),
            Mapped::Many(many) => many,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Mapped::One(one) => one.is_none(),
            Mapped::Many(many) => many.is_empty(),
        }
    }
}

/// Maps tuples of one plan node (and its combined children) into structs
#[derive(Debug, Clone, PartialEq)]
pub struct StructMapper {
    name: String,
    /// Declared attributes; empty means "take whatever the tuple has"
    attributes: Vec<String>,
    nodes: Vec<(String, Cardinality, StructMapper)>,
}

impl StructMapper {
    pub fn from_plan(plan: &PlanNode) -> GraphResult<Self> {
        let node = plan
            .as_relation()
            .ok_or_else(|| GraphError::malformed_plan("struct mappers are built from relation nodes"))?;
        Ok(Self::from_node(node))
    }

    fn from_node(node: &RelationNode) -> Self {
        Self {
            name: node.name.clone(),
            attributes: node.attributes().into_iter().map(str::to_string).collect(),
            nodes: node
                .relations()
                .into_iter()
                .map(|child| {
                    let cardinality = child.meta.combine.combine_type.unwrap_or(Cardinality::One);
                    (child.name.clone(), cardinality, Self::from_node(child))
                })
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map_tuple(&self, tuple: &Tuple) -> GraphResult<Struct> {
        let mut attributes: Vec<(String, Attr)> = if self.attributes.is_empty() {
            tuple
                .iter()
                .filter(|(name, _)| !self.nodes.iter().any(|(node, _, _)| node == *name))
                .map(|(name, value)| (name.clone(), Attr::Value(value.clone())))
                .collect()
        } else {
            self.attributes
                .iter()
                .map(|name| (name.clone(), Attr::Value(tuple.get(name).cloned().unwrap_or(Value::Null))))
                .collect()
        };

        for (name, cardinality, mapper) in &self.nodes {
            let nested = match (tuple.get(name), cardinality) {
                (Some(Value::Array(items)), _) => Attr::Many(mapper.map_all(items)?),
                (Some(Value::Object(item)), _) => Attr::One(Some(Box::new(mapper.map_tuple(item)?))),
                (None | Some(Value::Null), Cardinality::One) => Attr::One(None),
                (None | Some(Value::Null), Cardinality::Many) => Attr::Many(Vec::new()),
                (Some(other), _) => {
                    return Err(GraphError::invalid_input(format!(
                        "cannot map '{}' value {} into a struct",
                        name, other
                    )))
                }
            };
            attributes.push((name.clone(), nested));
        }

        Ok(Struct::new(self.name.clone(), attributes))
    }

    fn map_all(&self, items: &[Value]) -> GraphResult<Vec<Struct>> {
        items
            .iter()
            .map(|item| match item {
                Value::Object(tuple) => self.map_tuple(tuple),
                other => Err(GraphError::invalid_input(format!(
                    "expected an object in '{}' collection, got {}",
                    self.name, other
                ))),
            })
            .collect()
    }

    /// Map a command or loader output value
    pub fn map(&self, value: Value) -> GraphResult<Mapped> {
        match value {
            Value::Object(tuple) => Ok(Mapped::One(Some(self.map_tuple(&tuple)?))),
            Value::Array(items) => Ok(Mapped::Many(self.map_all(&items)?)),
            Value::Null => Ok(Mapped::One(None)),
            other => Err(GraphError::invalid_input(format!(
                "cannot map {} into '{}' structs",
                other, self.name
            ))),
        }
    }
}

/// Struct mappers cached per plan
#[derive(Debug, Default)]
pub struct MapperBuilder {
    mappers: DashMap<PlanNode, Arc<StructMapper>>,
}

impl MapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, plan: &PlanNode) -> GraphResult<Arc<StructMapper>> {
        if let Some(mapper) = self.mappers.get(plan) {
            return Ok(Arc::clone(mapper.value()));
        }

        trace!("Building struct mapper for plan {:x}", plan.signature());
        let mapper = Arc::new(StructMapper::from_plan(plan)?);
        Ok(Arc::clone(
            self.mappers.entry(plan.clone()).or_insert(mapper).value(),
        ))
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

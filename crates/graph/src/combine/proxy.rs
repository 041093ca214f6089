//! Relation proxy - an immutable relation node carrying combine metadata

use serde_json::Value;
use tracing::debug;

use super::loader;
use super::spec::{CombineEntry, CombineOptions, CombineSpec};
use crate::ast::{PlanMeta, PlanNode};
use crate::error::{GraphError, GraphResult};
use crate::relation::{Container, Criteria, Relation, RelationName, Tuple};
use crate::relationships::inference::{infer_keys, singularize, KeyDirection};
use crate::relationships::metadata::{Association, Cardinality, CombineMeta, KeyMapping};

/// Relation wrapper that composes into combine trees
///
/// Every operation returns a new proxy; the receiver is never modified, so
/// equal requests always produce structurally equal trees.
#[derive(Debug, Clone)]
pub struct RelationProxy {
    relation: Relation,
    /// Name results are returned under
    name: String,
    meta: CombineMeta,
    nodes: Vec<RelationProxy>,
    container: Container,
}

impl RelationProxy {
    pub fn new(relation: Relation, container: Container) -> Self {
        Self {
            name: relation.name().relation.clone(),
            relation,
            meta: CombineMeta::default(),
            nodes: Vec::new(),
            container,
        }
    }

    /// Proxy for a relation registered in `container`
    pub fn from_container(container: &Container, name: &str) -> GraphResult<Self> {
        Ok(Self::new(container.relation(name)?, container.clone()))
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> &RelationName {
        self.relation.name()
    }

    pub fn meta(&self) -> &CombineMeta {
        &self.meta
    }

    /// Combined children
    pub fn nodes(&self) -> &[RelationProxy] {
        &self.nodes
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Whether the underlying relation was already restricted by the caller
    pub fn is_curried(&self) -> bool {
        self.relation.is_restricted()
    }

    fn with_relation(&self, relation: Relation) -> RelationProxy {
        RelationProxy {
            relation,
            ..self.clone()
        }
    }

    pub fn restrict(&self, criteria: Criteria) -> RelationProxy {
        self.with_relation(self.relation.restrict(criteria))
    }

    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> RelationProxy {
        self.with_relation(self.relation.where_eq(column, value))
    }

    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<RelationProxy> {
        Ok(self.with_relation(self.relation.view(name, args)?))
    }

    /// This proxy annotated as a combined child
    pub fn combined(&self, name: impl Into<String>, keys: KeyMapping, cardinality: Cardinality) -> RelationProxy {
        let name = name.into();
        RelationProxy {
            meta: CombineMeta::new(name.clone(), keys, cardinality),
            name,
            ..self.clone()
        }
    }

    /// Key a combined relation is loaded under when no name was given
    pub fn combine_tuple_key(&self, cardinality: Cardinality) -> String {
        match cardinality {
            Cardinality::One => singularize(&self.base_name().relation),
            Cardinality::Many => self.base_name().relation.clone(),
        }
    }

    /// Combine with children described by `spec`
    pub fn combine(&self, spec: &CombineSpec) -> GraphResult<RelationProxy> {
        let mut nodes = self.nodes.clone();

        for entry in spec.entries() {
            let node = self.combine_node(entry)?;
            if node.meta.keys.is_empty() {
                return Err(GraphError::key_inference(
                    &self.base_name().relation,
                    &node.base_name().relation,
                    "combine keys resolved to an empty mapping",
                ));
            }

            debug!(
                "Combining '{}' with '{}' as {} on {}",
                self.name,
                node.name,
                node.meta.combine_type.map(Cardinality::as_str).unwrap_or("root"),
                node.meta.keys
            );

            match nodes.iter_mut().find(|existing| existing.name == node.name) {
                Some(existing) => *existing = node,
                None => nodes.push(node),
            }
        }

        Ok(RelationProxy {
            nodes,
            ..self.clone()
        })
    }

    /// Shortcut combining with association names only
    pub fn combine_with<I, S>(&self, names: I) -> GraphResult<RelationProxy>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.combine(&CombineSpec::associations(names))
    }

    /// Combine with relations this one points at; keys are inferred
    ///
    /// `tasks.combine_parents(CombineOptions::new().one(users))` nests each
    /// task's owner under `user`.
    pub fn combine_parents(&self, options: CombineOptions) -> GraphResult<RelationProxy> {
        self.combine_inferred(options, KeyDirection::Parent)
    }

    /// Combine with relations pointing at this one; keys are inferred
    pub fn combine_children(&self, options: CombineOptions) -> GraphResult<RelationProxy> {
        self.combine_inferred(options, KeyDirection::Children)
    }

    fn combine_inferred(&self, options: CombineOptions, direction: KeyDirection) -> GraphResult<RelationProxy> {
        let mut spec = CombineSpec::new();

        for (cardinality, targets) in options.entries() {
            for (name, target) in targets.named(*cardinality) {
                let keys = match direction {
                    KeyDirection::Parent => {
                        infer_keys(&self.container, target.relation(), &self.relation, direction)?
                    }
                    KeyDirection::Children => {
                        infer_keys(&self.container, &self.relation, target.relation(), direction)?
                    }
                };
                spec = spec.explicit(*cardinality, name, target, Some(keys));
            }
        }

        self.combine(&spec)
    }

    fn combine_node(&self, entry: &CombineEntry) -> GraphResult<RelationProxy> {
        match entry {
            CombineEntry::Association { name, nested } => {
                let association = self.association(name)?;
                let mut target = RelationProxy::from_container(&self.container, &association.target)?
                    .for_association(association)?;
                if let Some(nested) = nested {
                    target = target.combine(nested)?;
                }
                let keys = association.combine_keys(&self.container)?;
                Ok(target.combined(name.clone(), keys, association.result()))
            }
            CombineEntry::Explicit {
                cardinality,
                name,
                target,
                keys,
            } => {
                let association = self.relation.associations().get(name);

                let child = match association {
                    Some(association) if !target.is_curried() => target.for_association(association)?,
                    _ => target.clone(),
                };

                let keys = match (keys, association) {
                    (Some(keys), _) => keys.clone(),
                    (None, Some(association)) => association.combine_keys(&self.container)?,
                    (None, None) => match cardinality {
                        Cardinality::Many => infer_keys(
                            &self.container,
                            &self.relation,
                            target.relation(),
                            KeyDirection::Children,
                        )?,
                        Cardinality::One => {
                            return Err(GraphError::unresolved_association(
                                &self.base_name().relation,
                                name,
                            ))
                        }
                    },
                };

                Ok(child.combined(name.clone(), keys, *cardinality))
            }
        }
    }

    fn association(&self, name: &str) -> GraphResult<&Association> {
        self.relation
            .associations()
            .get(name)
            .ok_or_else(|| GraphError::unresolved_association(&self.base_name().relation, name))
    }

    /// Apply the association's view, if it declares one
    fn for_association(&self, association: &Association) -> GraphResult<RelationProxy> {
        match &association.view {
            Some(view) => self.view(view, &[]),
            None => Ok(self.clone()),
        }
    }

    /// Structural description of this tree
    pub fn to_ast(&self) -> PlanNode {
        let mut header: Vec<PlanNode> = self
            .relation
            .schema()
            .attributes
            .iter()
            .map(PlanNode::attribute)
            .collect();
        header.extend(self.nodes.iter().map(RelationProxy::to_ast));

        PlanNode::relation(
            self.name.clone(),
            PlanMeta {
                base_name: self.base_name().clone(),
                combine: self.meta.clone(),
            },
            header,
        )
    }

    /// Load every root tuple with its combined children nested
    pub fn to_a(&self) -> GraphResult<Vec<Tuple>> {
        loader::load(self)
    }

    /// Load zero or one root tuple; more than one is an error
    pub fn one(&self) -> GraphResult<Option<Tuple>> {
        let mut tuples = self.to_a()?;
        if tuples.len() > 1 {
            return Err(GraphError::invalid_input(format!(
                "expected at most one tuple from '{}', got {}",
                self.name,
                tuples.len()
            )));
        }
        Ok(tuples.pop())
    }

    pub fn first(&self) -> GraphResult<Option<Tuple>> {
        Ok(self.to_a()?.into_iter().next())
    }
}

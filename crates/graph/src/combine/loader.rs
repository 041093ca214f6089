//! Read path for combine trees
//!
//! Each level is fetched once: children are restricted to the key values of
//! every loaded parent and then distributed back to their parents.

use serde_json::Value;
use tracing::trace;

use super::proxy::RelationProxy;
use crate::error::GraphResult;
use crate::relation::{Criteria, Tuple};
use crate::relationships::metadata::Cardinality;

pub(crate) fn load(proxy: &RelationProxy) -> GraphResult<Vec<Tuple>> {
    let mut tuples = proxy.relation().to_a()?;
    nest(&mut tuples, proxy.nodes())?;
    Ok(tuples)
}

fn nest(parents: &mut [Tuple], nodes: &[RelationProxy]) -> GraphResult<()> {
    for node in nodes {
        let children = if parents.is_empty() {
            Vec::new()
        } else {
            let mut children = node.relation().restrict(for_combine(parents, node)).to_a()?;
            nest(&mut children, node.nodes())?;
            children
        };

        trace!(
            "Loaded {} '{}' tuple(s) for {} parent(s)",
            children.len(),
            node.name(),
            parents.len()
        );

        let many = node.meta().combine_type == Some(Cardinality::Many);
        for parent in parents.iter_mut() {
            let nested = {
                let mut matching = children.iter().filter(|child| joins(parent, child, node));
                if many {
                    Value::Array(matching.cloned().map(Value::Object).collect())
                } else {
                    matching.next().cloned().map(Value::Object).unwrap_or(Value::Null)
                }
            };
            parent.insert(node.name().to_string(), nested);
        }
    }

    Ok(())
}

/// Restrict a child relation to the key values present in `parents`
fn for_combine(parents: &[Tuple], node: &RelationProxy) -> Criteria {
    node.meta()
        .keys
        .pairs()
        .fold(Criteria::new(), |criteria, (parent_attr, child_attr)| {
            let mut values: Vec<Value> = Vec::new();
            for value in parents.iter().filter_map(|parent| parent.get(parent_attr)) {
                if !value.is_null() && !values.contains(value) {
                    values.push(value.clone());
                }
            }
            criteria.in_values(child_attr, values)
        })
}

fn joins(parent: &Tuple, child: &Tuple, node: &RelationProxy) -> bool {
    node.meta().keys.pairs().all(|(parent_attr, child_attr)| {
        matches!(
            (parent.get(parent_attr), child.get(child_attr)),
            (Some(p), Some(c)) if !p.is_null() && p == c
        )
    })
}

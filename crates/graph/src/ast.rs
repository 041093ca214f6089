//! Plan AST - structural description of a combined relation tree
//!
//! A [`PlanNode`] tree is what a [`RelationProxy`](crate::combine::RelationProxy)
//! realizes into and what the command compiler walks. Equal trees hash equally,
//! which is what makes compilation caching by structure possible.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::relation::RelationName;
use crate::relationships::metadata::CombineMeta;

/// Node of a plan tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanNode {
    Relation(RelationNode),
    Header { nodes: Vec<PlanNode> },
    Attribute { name: String },
}

/// Metadata of a relation node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanMeta {
    /// Registered relation the node is backed by
    pub base_name: RelationName,
    #[serde(flatten)]
    pub combine: CombineMeta,
}

/// A relation with its attributes and combined children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationNode {
    /// Name results are returned under
    pub name: String,
    pub meta: PlanMeta,
    pub header: Vec<PlanNode>,
}

impl RelationNode {
    /// Relation children, with nested headers flattened
    pub fn relations(&self) -> Vec<&RelationNode> {
        fn collect<'a>(nodes: &'a [PlanNode], out: &mut Vec<&'a RelationNode>) {
            for node in nodes {
                match node {
                    PlanNode::Relation(relation) => out.push(relation),
                    PlanNode::Header { nodes } => collect(nodes, out),
                    PlanNode::Attribute { .. } => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.header, &mut out);
        out
    }

    /// Attribute names declared directly on this node
    pub fn attributes(&self) -> Vec<&str> {
        self.header
            .iter()
            .filter_map(|node| match node {
                PlanNode::Attribute { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PlanNode {
    pub fn relation(name: impl Into<String>, meta: PlanMeta, header: Vec<PlanNode>) -> Self {
        PlanNode::Relation(RelationNode {
            name: name.into(),
            meta,
            header,
        })
    }

    pub fn attribute(name: impl Into<String>) -> Self {
        PlanNode::Attribute { name: name.into() }
    }

    pub fn as_relation(&self) -> Option<&RelationNode> {
        match self {
            PlanNode::Relation(relation) => Some(relation),
            _ => None,
        }
    }

    /// Number of relation levels below and including this node
    pub fn depth(&self) -> usize {
        match self {
            PlanNode::Relation(relation) => {
                1 + relation
                    .relations()
                    .into_iter()
                    .map(|child| PlanNode::Relation(child.clone()).depth())
                    .max()
                    .unwrap_or(0)
            }
            PlanNode::Header { nodes } => nodes.iter().map(PlanNode::depth).max().unwrap_or(0),
            PlanNode::Attribute { .. } => 0,
        }
    }

    /// Structural hash; equal trees produce equal signatures
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    pub fn to_json(&self) -> GraphResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Visitor dispatched over plan node kinds
pub trait PlanVisitor {
    type Output;

    fn visit_relation(&mut self, node: &RelationNode, depth: usize) -> GraphResult<Self::Output>;

    /// Visit header nodes; nested headers are flattened into the result
    fn visit_header(&mut self, nodes: &[PlanNode], depth: usize) -> GraphResult<Vec<Self::Output>> {
        let mut out = Vec::new();
        for node in nodes {
            match node {
                PlanNode::Relation(relation) => out.push(self.visit_relation(relation, depth)?),
                PlanNode::Header { nodes } => out.extend(self.visit_header(nodes, depth)?),
                PlanNode::Attribute { name } => out.extend(self.visit_attribute(name)),
            }
        }
        Ok(out)
    }

    /// Attributes carry nothing for most visitors
    fn visit_attribute(&mut self, _name: &str) -> Option<Self::Output> {
        None
    }
}

/// Walk a plan from its root, which must be a relation
pub fn walk<V: PlanVisitor>(visitor: &mut V, root: &PlanNode) -> GraphResult<V::Output> {
    match root {
        PlanNode::Relation(relation) => visitor.visit_relation(relation, 0),
        PlanNode::Header { .. } => Err(GraphError::malformed_plan(
            "plan root must be a relation node, found a header",
        )),
        PlanNode::Attribute { name } => Err(GraphError::malformed_plan(format!(
            "plan root must be a relation node, found attribute '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::metadata::{Cardinality, KeyMapping};

    fn users_with_tasks() -> PlanNode {
        let tasks = PlanNode::relation(
            "tasks",
            PlanMeta {
                base_name: RelationName::new("tasks"),
                combine: CombineMeta::new("tasks", KeyMapping::single("id", "user_id"), Cardinality::Many),
            },
            vec![PlanNode::attribute("id"), PlanNode::attribute("title")],
        );

        PlanNode::relation(
            "users",
            PlanMeta {
                base_name: RelationName::new("users"),
                combine: CombineMeta::default(),
            },
            vec![PlanNode::attribute("id"), PlanNode::Header { nodes: vec![tasks] }],
        )
    }

    struct NameCollector;

    impl PlanVisitor for NameCollector {
        type Output = String;

        fn visit_relation(&mut self, node: &RelationNode, depth: usize) -> GraphResult<String> {
            let children = self.visit_header(&node.header, depth + 1)?;
            Ok(format!("{}[{}]", node.name, children.join(",")))
        }

        fn visit_attribute(&mut self, name: &str) -> Option<String> {
            Some(name.to_string())
        }
    }

    #[test]
    fn test_structurally_equal_plans_share_signature() {
        let a = users_with_tasks();
        let b = users_with_tasks();

        assert_eq!(a, b);
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_different_keys_change_signature() {
        let a = users_with_tasks();
        let mut b = users_with_tasks();
        if let PlanNode::Relation(root) = &mut b {
            root.name = "people".to_string();
        }

        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_visitor_flattens_headers() {
        let rendered = walk(&mut NameCollector, &users_with_tasks()).unwrap();
        assert_eq!(rendered, "users[id,tasks[id,title]]");
    }

    #[test]
    fn test_walk_rejects_non_relation_root() {
        let err = walk(&mut NameCollector, &PlanNode::attribute("id")).unwrap_err();
        assert!(err.is_malformed_plan());
    }

    #[test]
    fn test_relations_and_depth() {
        let plan = users_with_tasks();
        let root = plan.as_relation().unwrap();

        assert_eq!(root.relations().len(), 1);
        assert_eq!(root.attributes(), vec!["id"]);
        assert_eq!(plan.depth(), 2);
    }

    #[test]
    fn test_plan_serializes_with_kind_tags() {
        let json = users_with_tasks().to_json().unwrap();
        assert!(json.starts_with(r#"{"kind":"relation","name":"users""#));
        assert!(json.contains(r#""combine_type":"many""#));

        let back: PlanNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, users_with_tasks());
    }
}

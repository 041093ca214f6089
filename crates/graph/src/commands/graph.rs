//! Command graphs - trees of commands executing nested writes

use serde_json::Value;
use tracing::debug;

use super::command::{into_tuple, Command, CommandType};
use crate::error::{GraphError, GraphResult};
use crate::relation::Tuple;

/// A command plus the children it feeds with its stored tuples
#[derive(Debug, Clone)]
pub struct CommandGraph {
    /// Input key this node reads its payload from
    key: String,
    command: Command,
    nodes: Vec<CommandGraph>,
}

impl CommandGraph {
    pub fn new(key: impl Into<String>, command: Command, nodes: Vec<CommandGraph>) -> Self {
        Self {
            key: key.into(),
            command,
            nodes,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn nodes(&self) -> &[CommandGraph] {
        &self.nodes
    }

    pub fn is_graph(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Node count including this one
    pub fn size(&self) -> usize {
        1 + self.nodes.iter().map(CommandGraph::size).sum::<usize>()
    }

    /// Same graph with the root command replaced, e.g. restricted by a view
    pub fn with_root(&self, command: Command) -> CommandGraph {
        CommandGraph {
            key: self.key.clone(),
            command,
            nodes: self.nodes.clone(),
        }
    }

    /// Execute against `{key => payload}`
    pub fn call(&self, input: Value) -> GraphResult<Value> {
        let mut input = into_tuple(input)?;
        let payload = input.remove(&self.key).ok_or_else(|| {
            GraphError::invalid_input(format!("command graph input has no '{}' key", self.key))
        })?;

        self.validate(&payload)?;

        debug!(
            "Invoking command graph '{}' with {} node(s)",
            self.key,
            self.size()
        );
        self.execute(payload, None)
    }

    /// Check the shape of the whole payload tree before anything is written
    fn validate(&self, payload: &Value) -> GraphResult<()> {
        match payload {
            Value::Array(items) if self.command.command_type() == CommandType::Create => {
                items.iter().try_for_each(|item| self.validate_entry(item))
            }
            payload => self.validate_entry(payload),
        }
    }

    fn validate_entry(&self, entry: &Value) -> GraphResult<()> {
        match entry {
            Value::Null => Ok(()),
            Value::Object(tuple) => self
                .nodes
                .iter()
                .filter_map(|node| tuple.get(&node.key).map(|payload| (node, payload)))
                .try_for_each(|(node, payload)| node.validate(payload)),
            other => Err(GraphError::invalid_input(format!(
                "expected an object as '{}' input, got {}",
                self.key, other
            ))),
        }
    }

    fn execute(&self, payload: Value, parent: Option<&Tuple>) -> GraphResult<Value> {
        match payload {
            Value::Array(items) if self.command.command_type() == CommandType::Create => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.extend(self.execute_entry(item, parent)?.into_iter().map(Value::Object));
                }
                Ok(Value::Array(out))
            }
            payload => {
                let tuples = self.execute_entry(payload, parent)?;
                Ok(self.command.shape(tuples))
            }
        }
    }

    /// Run this node for one input entry, then every child whose key is present
    fn execute_entry(&self, entry: Value, parent: Option<&Tuple>) -> GraphResult<Vec<Tuple>> {
        let mut tuple = into_tuple(entry)?;
        let children: Vec<(&CommandGraph, Value)> = self
            .nodes
            .iter()
            .filter_map(|node| tuple.remove(&node.key).map(|payload| (node, payload)))
            .collect();

        let mut stored = self.command.run(tuple, parent)?;

        for row in stored.iter_mut() {
            for (node, payload) in &children {
                let nested = node.execute(payload.clone(), Some(&*row))?;
                row.insert(node.key.clone(), nested);
            }
        }

        Ok(stored)
    }
}

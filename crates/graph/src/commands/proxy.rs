//! Invocation wrapper normalizing the input convention of command graphs

use std::ops::Shr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use super::command::{apply_pipeline, Command, Mapper};
use super::graph::CommandGraph;
use crate::error::GraphResult;

/// Wraps a command graph so callers pass the root payload directly
///
/// `call({"name": "Jane"})` invokes the graph with `{"users": {"name": "Jane"}}`.
#[derive(Debug, Clone)]
pub struct CommandProxy {
    graph: Arc<CommandGraph>,
    pipeline: Vec<Mapper>,
}

impl CommandProxy {
    pub fn new(graph: CommandGraph) -> Self {
        Self {
            graph: Arc::new(graph),
            pipeline: Vec::new(),
        }
    }

    pub fn graph(&self) -> &CommandGraph {
        &self.graph
    }

    /// Input key of the root command
    pub fn root_name(&self) -> &str {
        self.graph.key()
    }

    pub fn call(&self, input: Value) -> GraphResult<Value> {
        let mut wrapped = Map::new();
        wrapped.insert(self.root_name().to_string(), input);
        trace!("Wrapping command graph input under '{}'", self.root_name());

        let output = self.graph.call(Value::Object(wrapped))?;
        apply_pipeline(&self.pipeline, output)
    }

    /// New wrapper whose output also runs through `mapper`
    pub fn then(&self, mapper: Mapper) -> CommandProxy {
        let mut proxy = self.clone();
        proxy.pipeline.push(mapper);
        proxy
    }

    /// Restrict the root command by a named view
    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<CommandProxy> {
        let root = self.graph.command().view(name, args)?;
        Ok(CommandProxy {
            graph: Arc::new(self.graph.with_root(root)),
            pipeline: self.pipeline.clone(),
        })
    }
}

impl Shr<Mapper> for CommandProxy {
    type Output = CommandProxy;

    fn shr(self, mapper: Mapper) -> CommandProxy {
        self.then(mapper)
    }
}

/// Result of compilation: a bare command for flat plans, a wrapped graph otherwise
#[derive(Debug, Clone)]
pub enum CompiledCommand {
    Command(Command),
    Graph(CommandProxy),
}

impl CompiledCommand {
    pub fn is_graph(&self) -> bool {
        matches!(self, Self::Graph(_))
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Command(command) => Some(command),
            Self::Graph(_) => None,
        }
    }

    pub fn as_graph(&self) -> Option<&CommandProxy> {
        match self {
            Self::Graph(proxy) => Some(proxy),
            Self::Command(_) => None,
        }
    }

    /// Root command of the compiled plan
    pub fn root(&self) -> &Command {
        match self {
            Self::Command(command) => command,
            Self::Graph(proxy) => proxy.graph().command(),
        }
    }

    pub fn call(&self, input: Value) -> GraphResult<Value> {
        match self {
            Self::Command(command) => command.call(input),
            Self::Graph(proxy) => proxy.call(input),
        }
    }

    pub fn then(&self, mapper: Mapper) -> CompiledCommand {
        match self {
            Self::Command(command) => Self::Command(command.then(mapper)),
            Self::Graph(proxy) => Self::Graph(proxy.then(mapper)),
        }
    }

    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<CompiledCommand> {
        Ok(match self {
            Self::Command(command) => Self::Command(command.view(name, args)?),
            Self::Graph(proxy) => Self::Graph(proxy.view(name, args)?),
        })
    }
}

impl Shr<Mapper> for CompiledCommand {
    type Output = CompiledCommand;

    fn shr(self, mapper: Mapper) -> CompiledCommand {
        self.then(mapper)
    }
}

//! Command graph compiler
//!
//! Walks a [`PlanNode`] tree and emits a matching tree of commands. Compiled
//! results are memoized by `(container, type, adapter, plan, customization)` so equal
//! requests return the same instance and adapter registration hooks run once
//! per distinct request.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, info, trace};

use super::cache::{CacheStats, CompilationCache};
use super::command::{Command, CommandSpec, CommandType};
use super::graph::CommandGraph;
use super::proxy::{CommandProxy, CompiledCommand};
use crate::ast::{walk, PlanNode, PlanVisitor, RelationNode};
use crate::error::{GraphError, GraphResult};
use crate::relation::Container;
use crate::relationships::metadata::Cardinality;

/// Configuration hook run against every command spec of a compilation
///
/// Identity is the allocation: clones of one customization share a cache
/// entry, two separately built closures never do.
#[derive(Clone)]
pub struct Customization(Arc<dyn Fn(&mut CommandSpec) -> GraphResult<()> + Send + Sync>);

impl Customization {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut CommandSpec) -> GraphResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Customization enabling a registered plugin
    pub fn plugin(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |spec| spec.use_plugin(&name).map(|_| ()))
    }

    pub fn apply(&self, spec: &mut CommandSpec) -> GraphResult<()> {
        (self.0)(spec)
    }

    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Customization {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Customization {}

impl Hash for Customization {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Customization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Customization({:#x})", self.id())
    }
}

/// Structural signature of a compilation request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileKey {
    /// Identity of the container the commands are bound to
    pub container: usize,
    pub command_type: CommandType,
    pub adapter: String,
    pub plan: PlanNode,
    pub customization: Option<Customization>,
}

pub type CommandCache = CompilationCache<CompileKey, Arc<CompiledCommand>>;

/// Compiles plans into commands against a container
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    container: Container,
    cache: Arc<CommandCache>,
}

impl CommandCompiler {
    pub fn new(container: Container) -> Self {
        Self::with_cache(container, Arc::new(CompilationCache::new()))
    }

    /// Compiler sharing an existing cache
    pub fn with_cache(container: Container, cache: Arc<CommandCache>) -> Self {
        Self { container, cache }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn cache(&self) -> &Arc<CommandCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Compile a plan for a command type given by name
    ///
    /// Unsupported type names fail before the cache or the plan is touched.
    pub fn compile(
        &self,
        command_type: &str,
        adapter: &str,
        plan: &PlanNode,
        customization: Option<&Customization>,
    ) -> GraphResult<Arc<CompiledCommand>> {
        let command_type = CommandType::parse(command_type)?;
        self.compile_type(command_type, adapter, plan, customization)
    }

    pub fn compile_type(
        &self,
        command_type: CommandType,
        adapter: &str,
        plan: &PlanNode,
        customization: Option<&Customization>,
    ) -> GraphResult<Arc<CompiledCommand>> {
        if !*self.container.config().get_cache_compiled_commands() {
            debug!("Compiling {} command for '{}' without cache", command_type, adapter);
            return self.build(command_type, adapter, plan, customization);
        }

        let key = CompileKey {
            container: self.container.id(),
            command_type,
            adapter: adapter.to_string(),
            plan: plan.clone(),
            customization: customization.cloned(),
        };

        if self.cache.contains(&key) {
            trace!("Compilation cache hit for {} command", command_type);
        }

        self.cache
            .get_or_compile(key, || self.build(command_type, adapter, plan, customization))
    }

    fn build(
        &self,
        command_type: CommandType,
        adapter: &str,
        plan: &PlanNode,
        customization: Option<&Customization>,
    ) -> GraphResult<Arc<CompiledCommand>> {
        debug!(
            "Compiling {} command graph for adapter '{}' (signature {:x})",
            command_type,
            adapter,
            plan.signature()
        );

        let mut visitor = CompileVisitor {
            container: &self.container,
            command_type,
            adapter,
            customization,
            max_depth: *self.container.config().get_max_plan_depth(),
            registered: 0,
        };
        let graph = walk(&mut visitor, plan)?;

        let compiled = if graph.is_graph() {
            info!(
                "Compiled {} command graph '{}' with {} commands",
                command_type,
                graph.key(),
                graph.size()
            );
            CompiledCommand::Graph(CommandProxy::new(graph))
        } else {
            debug!("Compiled flat {} command for '{}'", command_type, graph.key());
            CompiledCommand::Command(graph.command().clone())
        };

        Ok(Arc::new(compiled))
    }
}

/// Builds one command per relation node straight into the graph; nodes sharing a relation get separate commands
struct CompileVisitor<'a> {
    container: &'a Container,
    command_type: CommandType,
    adapter: &'a str,
    customization: Option<&'a Customization>,
    max_depth: usize,
    /// Commands registered so far in this compilation
    registered: usize,
}

impl CompileVisitor<'_> {
    fn register_command(&mut self, node: &RelationNode, depth: usize) -> GraphResult<Command> {
        let relation = self.container.relation(&node.meta.base_name.relation)?;
        let mut spec = CommandSpec::create_class(
            relation.name(),
            self.command_type,
            self.adapter,
            self.container.plugins().clone(),
        );

        if depth > 0 {
            spec.associates(node.meta.combine.keys.invert());
        }

        relation
            .gateway()
            .extend_command(&mut spec, &relation.name().dataset);

        spec.result(node.meta.combine.combine_type.unwrap_or(Cardinality::One));

        if let Some(customization) = self.customization {
            customization.apply(&mut spec)?;
        }

        self.registered += 1;
        trace!("Registered {} for '{}' (#{})", spec.class_name, node.name, self.registered);
        Ok(spec.build(relation))
    }
}

impl PlanVisitor for CompileVisitor<'_> {
    type Output = CommandGraph;

    fn visit_relation(&mut self, node: &RelationNode, depth: usize) -> GraphResult<CommandGraph> {
        if depth > self.max_depth {
            return Err(GraphError::malformed_plan(format!(
                "plan is deeper than the configured limit of {}",
                self.max_depth
            )));
        }

        if depth > 0 {
            if node.meta.combine.combine_type.is_none() {
                return Err(GraphError::malformed_plan(format!(
                    "nested relation '{}' has no combine type",
                    node.name
                )));
            }
            if node.meta.combine.keys.is_empty() {
                return Err(GraphError::malformed_plan(format!(
                    "nested relation '{}' has no combine keys",
                    node.name
                )));
            }
        }

        let command = self.register_command(node, depth)?;
        let nodes = self.visit_header(&node.header, depth + 1)?;

        let key = if depth == 0 {
            node.meta.base_name.relation.clone()
        } else {
            node.name.clone()
        };

        Ok(CommandGraph::new(key, command, nodes))
    }
}

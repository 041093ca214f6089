//! Repositories - relation proxies, compiled commands and struct mapping
//!
//! A [`Repository`] is the entry point applications use: it hands out relation
//! proxies for building combine trees, loads them into [`Struct`]s and compiles
//! commands for them. Compiled commands are cached per repository on top of
//! the compiler's own cache.

pub mod mapper;
pub mod model;
pub mod root;

pub use mapper::{Attr, MapperBuilder, Mapped, Struct, StructMapper};
pub use model::ModelRepository;
pub use root::{CommandDefinition, RootRepository};

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::ast::PlanNode;
use crate::combine::RelationProxy;
use crate::commands::{
    CacheStats, CommandCompiler, CommandType, CompilationCache, CompiledCommand, Customization,
};
use crate::error::{GraphError, GraphResult};
use crate::relation::Container;

/// A compiled command whose output is mapped into structs
#[derive(Debug, Clone)]
pub struct MappedCommand {
    command: Arc<CompiledCommand>,
    mapper: Arc<StructMapper>,
}

impl MappedCommand {
    pub fn new(command: Arc<CompiledCommand>, mapper: Arc<StructMapper>) -> Self {
        Self { command, mapper }
    }

    /// The compiled command, shared with the compiler cache
    pub fn command(&self) -> &Arc<CompiledCommand> {
        &self.command
    }

    pub fn is_graph(&self) -> bool {
        self.command.is_graph()
    }

    pub fn call(&self, input: Value) -> GraphResult<Mapped> {
        let output = self.command.call(input)?;
        self.mapper.map(output)
    }

    /// Restrict the root command by a named view
    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<MappedCommand> {
        Ok(MappedCommand {
            command: Arc::new(self.command.view(name, args)?),
            mapper: Arc::clone(&self.mapper),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RepositoryCommandKey {
    command_type: CommandType,
    plan: PlanNode,
    customization: Option<Customization>,
}

/// Repository over a fixed set of relations
#[derive(Debug)]
pub struct Repository {
    container: Container,
    relations: BTreeMap<String, RelationProxy>,
    compiler: CommandCompiler,
    mappers: MapperBuilder,
    commands: CompilationCache<RepositoryCommandKey, MappedCommand>,
}

impl Repository {
    /// Repository exposing the given relations
    pub fn new<I, S>(container: Container, relations: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiler = CommandCompiler::new(container.clone());
        Self::with_compiler(compiler, relations)
    }

    /// Repository sharing a compiler (and its cache) with others
    pub fn with_compiler<I, S>(compiler: CommandCompiler, relations: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let container = compiler.container().clone();
        let relations = relations
            .into_iter()
            .map(|name| {
                let proxy = RelationProxy::from_container(&container, name.as_ref())?;
                Ok((name.as_ref().to_string(), proxy))
            })
            .collect::<GraphResult<BTreeMap<_, _>>>()?;

        debug!("Repository initialized with relations {:?}", relations.keys().collect::<Vec<_>>());

        Ok(Self {
            container,
            relations,
            compiler,
            mappers: MapperBuilder::new(),
            commands: CompilationCache::new(),
        })
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn compiler(&self) -> &CommandCompiler {
        &self.compiler
    }

    pub fn mappers(&self) -> &MapperBuilder {
        &self.mappers
    }

    /// Proxy of a relation declared on this repository
    pub fn relation(&self, name: &str) -> GraphResult<&RelationProxy> {
        self.relations
            .get(name)
            .ok_or_else(|| GraphError::relation_not_found(name))
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Compile a command for a relation tree, mapped into structs
    ///
    /// `repo.command("create", &users.combine_with(["tasks"])?, None)` returns a
    /// graph creating a user and its tasks from one nested payload.
    pub fn command(
        &self,
        command_type: &str,
        relation: &RelationProxy,
        customization: Option<&Customization>,
    ) -> GraphResult<MappedCommand> {
        let command_type = CommandType::parse(command_type)?;
        let plan = relation.to_ast();
        let compile = || -> GraphResult<MappedCommand> {
            let adapter = relation.relation().adapter();
            let compiled = self
                .compiler
                .compile_type(command_type, adapter, &plan, customization)?;
            Ok(MappedCommand::new(compiled, self.mappers.get(&plan)?))
        };

        if !*self.container.config().get_cache_compiled_commands() {
            return compile();
        }

        let key = RepositoryCommandKey {
            command_type,
            plan: plan.clone(),
            customization: customization.cloned(),
        };
        self.commands.get_or_compile(key, compile)
    }

    /// Command for a relation declared on this repository, by name
    pub fn command_for(
        &self,
        command_type: &str,
        relation: &str,
        customization: Option<&Customization>,
    ) -> GraphResult<MappedCommand> {
        let proxy = self.relation(relation)?.clone();
        self.command(command_type, &proxy, customization)
    }

    /// Load a relation tree into structs
    pub fn to_structs(&self, relation: &RelationProxy) -> GraphResult<Vec<Struct>> {
        let mapper = self.mappers.get(&relation.to_ast())?;
        relation
            .to_a()?
            .iter()
            .map(|tuple| mapper.map_tuple(tuple))
            .collect()
    }

    /// Load zero or one struct; more than one tuple is an error
    pub fn one(&self, relation: &RelationProxy) -> GraphResult<Option<Struct>> {
        let mapper = self.mappers.get(&relation.to_ast())?;
        relation.one()?.map(|tuple| mapper.map_tuple(&tuple)).transpose()
    }

    pub fn first(&self, relation: &RelationProxy) -> GraphResult<Option<Struct>> {
        let mapper = self.mappers.get(&relation.to_ast())?;
        relation.first()?.map(|tuple| mapper.map_tuple(&tuple)).transpose()
    }

    /// Statistics of this repository's command cache
    pub fn command_cache_stats(&self) -> CacheStats {
        self.commands.stats()
    }
}

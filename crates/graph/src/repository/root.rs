//! Root repositories - a repository centered on one relation with declared commands

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::{Mapped, MappedCommand, Repository};
use crate::combine::RelationProxy;
use crate::commands::{CommandCompiler, CommandType, Customization};
use crate::error::{GraphError, GraphResult};
use crate::relation::Container;

/// Declaration of a command method on a root repository
///
/// `update` with views `["by_id", "by_name"]` defines `update_by_id` and
/// `update_by_name`; with a single view the method is just `update`.
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    command_type: CommandType,
    views: Vec<String>,
    customization: Option<Customization>,
}

impl CommandDefinition {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            views: Vec::new(),
            customization: None,
        }
    }

    pub fn create() -> Self {
        Self::new(CommandType::Create)
    }

    pub fn update<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandType::Update).views(views)
    }

    pub fn delete<I, S>(views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandType::Delete).views(views)
    }

    pub fn views<I, S>(mut self, views: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.views = views.into_iter().map(Into::into).collect();
        self
    }

    /// Customize every command this definition compiles
    pub fn customize(mut self, customization: Customization) -> Self {
        self.customization = Some(customization);
        self
    }

    /// Method names paired with the view each one applies
    pub fn methods(&self) -> Vec<(String, Option<String>)> {
        let command = self.command_type.as_str();
        match self.views.as_slice() {
            [] => vec![(command.to_string(), None)],
            [view] => vec![(command.to_string(), Some(view.clone()))],
            views => views
                .iter()
                .map(|view| (format!("{}_{}", command, view), Some(view.clone())))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct CommandMethod {
    command_type: CommandType,
    view: Option<String>,
    customization: Option<Customization>,
}

/// Repository whose commands target one root relation
#[derive(Debug)]
pub struct RootRepository {
    repository: Repository,
    root: String,
    methods: BTreeMap<String, CommandMethod>,
}

impl RootRepository {
    pub fn new(
        container: Container,
        root: impl Into<String>,
        definitions: Vec<CommandDefinition>,
    ) -> GraphResult<Self> {
        Self::with_compiler(CommandCompiler::new(container), root, definitions)
    }

    pub fn with_compiler(
        compiler: CommandCompiler,
        root: impl Into<String>,
        definitions: Vec<CommandDefinition>,
    ) -> GraphResult<Self> {
        let root = root.into();
        let repository = Repository::with_compiler(compiler, [root.as_str()])?;

        let mut methods = BTreeMap::new();
        for definition in definitions {
            for (name, view) in definition.methods() {
                debug!("Defining command method '{}' on '{}' repository", name, root);
                let method = CommandMethod {
                    command_type: definition.command_type,
                    view,
                    customization: definition.customization.clone(),
                };
                if methods.insert(name.clone(), method).is_some() {
                    return Err(GraphError::configuration(format!(
                        "command method '{}' is defined twice",
                        name
                    )));
                }
            }
        }

        Ok(Self {
            repository,
            root,
            methods,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Proxy of the root relation
    pub fn root(&self) -> GraphResult<&RelationProxy> {
        self.repository.relation(&self.root)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn create(&self, input: Value) -> GraphResult<Mapped> {
        self.call_method("create", &[], input)
    }

    /// Update through the `update` method, passing its view arguments
    pub fn update(&self, view_args: &[Value], input: Value) -> GraphResult<Mapped> {
        self.call_method("update", view_args, input)
    }

    pub fn delete(&self, view_args: &[Value]) -> GraphResult<Mapped> {
        self.call_method("delete", view_args, Value::Null)
    }

    /// The compiled command behind a method, restricted by its view
    pub fn method_command(&self, name: &str, view_args: &[Value]) -> GraphResult<MappedCommand> {
        let method = self.methods.get(name).ok_or_else(|| {
            GraphError::invalid_input(format!(
                "'{}' repository has no command method '{}'",
                self.root, name
            ))
        })?;

        let command = self.repository.command(
            method.command_type.as_str(),
            self.root()?,
            method.customization.as_ref(),
        )?;

        match &method.view {
            Some(view) => command.view(view, view_args),
            None => Ok(command),
        }
    }

    /// Invoke a declared command method
    pub fn call_method(&self, name: &str, view_args: &[Value], input: Value) -> GraphResult<Mapped> {
        self.method_command(name, view_args)?.call(input)
    }
}

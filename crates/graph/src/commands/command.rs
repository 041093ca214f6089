//! Commands - mutation operations bound to a single relation
//!
//! A [`CommandSpec`] plays the role of a command class: it is configured once
//! (extensions, plugins, associated parent keys, result cardinality) and then
//! built into a [`Command`] bound to a concrete [`Relation`]. Built commands are
//! stateless and can be invoked any number of times.

use std::collections::HashMap;
use std::fmt;
use std::ops::Shr;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{GraphError, GraphResult};
use crate::relation::{Criteria, Relation, RelationName, Tuple};
use crate::relationships::metadata::{Cardinality, KeyMapping};

/// Supported mutation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    Create,
    Update,
    Delete,
}

impl CommandType {
    pub const ALL: [CommandType; 3] = [CommandType::Create, CommandType::Update, CommandType::Delete];

    /// Parse a command type name; anything outside create/update/delete is rejected
    pub fn parse(name: &str) -> GraphResult<Self> {
        match name {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(GraphError::unsupported_command_type(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the command operates on an existing, restrictable set of tuples
    pub fn is_restrictable(self) -> bool {
        !matches!(self, Self::Create)
    }
}

impl FromStr for CommandType {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-tuple input transformation applied before a command executes
pub trait CommandExtension: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Transform one input tuple; `parent` is the stored parent tuple for nested writes
    fn before(&self, tuple: Tuple, parent: Option<&Tuple>) -> GraphResult<Tuple>;
}

/// Copies parent key values into a child tuple
///
/// Keys map child attribute to parent attribute, e.g. `{user_id => id}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Associates {
    keys: KeyMapping,
}

impl Associates {
    pub fn new(keys: KeyMapping) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &KeyMapping {
        &self.keys
    }

    /// Criteria selecting the children of `parent`
    pub fn criteria_for(&self, parent: &Tuple) -> GraphResult<Criteria> {
        let mut criteria = Criteria::new();
        for (child, parent_attr) in self.keys.pairs() {
            criteria = criteria.eq(child, parent_value(parent, parent_attr)?);
        }
        Ok(criteria)
    }
}

fn parent_value(parent: &Tuple, attr: &str) -> GraphResult<Value> {
    parent.get(attr).cloned().ok_or_else(|| {
        GraphError::invalid_input(format!("parent tuple has no '{}' attribute to associate", attr))
    })
}

impl CommandExtension for Associates {
    fn name(&self) -> &str {
        "associates"
    }

    fn before(&self, mut tuple: Tuple, parent: Option<&Tuple>) -> GraphResult<Tuple> {
        let Some(parent) = parent else {
            return Ok(tuple);
        };

        for (child, parent_attr) in self.keys.pairs() {
            tuple.insert(child.to_string(), parent_value(parent, parent_attr)?);
        }
        Ok(tuple)
    }
}

/// Named command plugins available to customizations
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn CommandExtension>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, plugin: Arc<dyn CommandExtension>) {
        self.plugins.insert(name.into(), plugin);
    }

    pub fn get(&self, name: &str) -> GraphResult<Arc<dyn CommandExtension>> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::PluginNotFound {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Configurable description of a command, built into a [`Command`]
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Display name, e.g. `Create[memory](users)`
    pub class_name: String,
    pub relation: RelationName,
    pub command_type: CommandType,
    pub adapter: String,
    pub result: Cardinality,
    extensions: Vec<Arc<dyn CommandExtension>>,
    associates: Option<Associates>,
    plugins: PluginRegistry,
}

impl CommandSpec {
    /// Fresh command class for a relation, type and adapter
    pub fn create_class(
        relation: &RelationName,
        command_type: CommandType,
        adapter: impl Into<String>,
        plugins: PluginRegistry,
    ) -> Self {
        let adapter = adapter.into();
        let class_name = format!(
            "{}[{}]({})",
            capitalize(command_type.as_str()),
            adapter,
            relation.relation
        );
        trace!("Created command class {}", class_name);

        Self {
            class_name,
            relation: relation.clone(),
            command_type,
            adapter,
            result: Cardinality::One,
            extensions: Vec::new(),
            associates: None,
            plugins,
        }
    }

    pub fn use_extension(&mut self, extension: Arc<dyn CommandExtension>) -> &mut Self {
        self.extensions.push(extension);
        self
    }

    /// Use a plugin registered on the container by name
    pub fn use_plugin(&mut self, name: &str) -> GraphResult<&mut Self> {
        let plugin = self.plugins.get(name)?;
        Ok(self.use_extension(plugin))
    }

    /// Propagate parent key values into this command's input (child attr -> parent attr)
    pub fn associates(&mut self, keys: KeyMapping) -> &mut Self {
        self.associates = Some(Associates::new(keys));
        self
    }

    pub fn result(&mut self, result: Cardinality) -> &mut Self {
        self.result = result;
        self
    }

    pub fn extensions(&self) -> &[Arc<dyn CommandExtension>] {
        &self.extensions
    }

    pub fn associated_keys(&self) -> Option<&KeyMapping> {
        self.associates.as_ref().map(Associates::keys)
    }

    /// Bind this spec to a relation
    pub fn build(self, relation: Relation) -> Command {
        debug!("Building {} with result {}", self.class_name, self.result);
        Command {
            spec: Arc::new(self),
            relation,
            pipeline: Vec::new(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Post-processing stage applied to a command's output
#[derive(Clone)]
pub struct Mapper(Arc<dyn Fn(Value) -> GraphResult<Value> + Send + Sync>);

impl Mapper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> GraphResult<Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, value: Value) -> GraphResult<Value> {
        (self.0)(value)
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Mapper(..)")
    }
}

pub(crate) fn apply_pipeline(pipeline: &[Mapper], value: Value) -> GraphResult<Value> {
    pipeline.iter().try_fold(value, |value, mapper| mapper.call(value))
}

/// A command bound to a relation, ready to invoke
#[derive(Debug, Clone)]
pub struct Command {
    spec: Arc<CommandSpec>,
    relation: Relation,
    pipeline: Vec<Mapper>,
}

impl Command {
    pub fn name(&self) -> &RelationName {
        self.relation.name()
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    pub fn command_type(&self) -> CommandType {
        self.spec.command_type
    }

    pub fn result(&self) -> Cardinality {
        self.spec.result
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Same command restricted by a named relation view
    pub fn view(&self, name: &str, args: &[Value]) -> GraphResult<Command> {
        Ok(self.with_relation(self.relation.view(name, args)?))
    }

    /// Same command restricted by criteria
    pub fn restrict(&self, criteria: Criteria) -> Command {
        self.with_relation(self.relation.restrict(criteria))
    }

    fn with_relation(&self, relation: Relation) -> Command {
        Command {
            spec: Arc::clone(&self.spec),
            relation,
            pipeline: self.pipeline.clone(),
        }
    }

    /// Chain a post-processing stage onto the output
    pub fn then(&self, mapper: Mapper) -> Command {
        let mut command = self.clone();
        command.pipeline.push(mapper);
        command
    }

    /// Invoke with an input payload
    ///
    /// Create takes an object or an array of objects, update takes the changes
    /// object, delete ignores its input.
    pub fn call(&self, input: Value) -> GraphResult<Value> {
        let output = self.execute(input, None)?;
        apply_pipeline(&self.pipeline, output)
    }

    /// Execute without the output pipeline, as a child of `parent` when given
    pub fn execute(&self, input: Value, parent: Option<&Tuple>) -> GraphResult<Value> {
        match (self.command_type(), input) {
            (CommandType::Create, Value::Array(items)) => {
                let mut created = Vec::with_capacity(items.len());
                for item in items {
                    let tuple = into_tuple(item)?;
                    created.extend(self.run(tuple, parent)?.into_iter().map(Value::Object));
                }
                Ok(Value::Array(created))
            }
            (CommandType::Create, input) => {
                let tuples = self.run(into_tuple(input)?, parent)?;
                Ok(self.shape(tuples))
            }
            (CommandType::Update, input) => {
                let tuples = self.run(into_tuple(input)?, parent)?;
                Ok(self.shape(tuples))
            }
            (CommandType::Delete, _) => {
                let tuples = self.run(Tuple::new(), parent)?;
                Ok(self.shape(tuples))
            }
        }
    }

    /// Run against a single input tuple, returning every affected tuple as stored
    pub(crate) fn run(&self, tuple: Tuple, parent: Option<&Tuple>) -> GraphResult<Vec<Tuple>> {
        let gateway = self.relation.gateway();
        let dataset = &self.relation.name().dataset;

        match self.command_type() {
            CommandType::Create => {
                let tuple = self.prepare(tuple, parent)?;
                trace!("{} inserting into '{}'", self.spec.class_name, dataset);
                let stored = gateway.insert(dataset, self.relation.primary_key(), tuple)?;
                Ok(vec![stored])
            }
            CommandType::Update => {
                let criteria = self.criteria(parent)?;
                let changes = self.apply_extensions(tuple, parent)?;
                trace!("{} updating '{}'", self.spec.class_name, dataset);
                gateway.update(dataset, &criteria, &changes)
            }
            CommandType::Delete => {
                let criteria = self.criteria(parent)?;
                trace!("{} deleting from '{}'", self.spec.class_name, dataset);
                gateway.delete(dataset, &criteria)
            }
        }
    }

    /// Shape affected tuples by the result cardinality
    pub(crate) fn shape(&self, mut tuples: Vec<Tuple>) -> Value {
        match self.result() {
            Cardinality::Many => Value::Array(tuples.into_iter().map(Value::Object).collect()),
            Cardinality::One => {
                if tuples.is_empty() {
                    Value::Null
                } else {
                    Value::Object(tuples.swap_remove(0))
                }
            }
        }
    }

    fn prepare(&self, tuple: Tuple, parent: Option<&Tuple>) -> GraphResult<Tuple> {
        let tuple = match &self.spec.associates {
            Some(associates) => associates.before(tuple, parent)?,
            None => tuple,
        };
        self.apply_extensions(tuple, parent)
    }

    fn apply_extensions(&self, tuple: Tuple, parent: Option<&Tuple>) -> GraphResult<Tuple> {
        self.spec
            .extensions
            .iter()
            .try_fold(tuple, |tuple, extension| extension.before(tuple, parent))
    }

    /// Relation criteria, narrowed to the children of `parent` for nested writes
    fn criteria(&self, parent: Option<&Tuple>) -> GraphResult<Criteria> {
        let criteria = self.relation.criteria().clone();
        match (&self.spec.associates, parent) {
            (Some(associates), Some(parent)) => Ok(criteria.merge(associates.criteria_for(parent)?)),
            _ => Ok(criteria),
        }
    }
}

impl Shr<Mapper> for Command {
    type Output = Command;

    fn shr(self, mapper: Mapper) -> Command {
        self.then(mapper)
    }
}

pub(crate) fn into_tuple(value: Value) -> GraphResult<Tuple> {
    match value {
        Value::Object(tuple) => Ok(tuple),
        Value::Null => Ok(Tuple::new()),
        other => Err(GraphError::invalid_input(format!(
            "expected an object as command input, got {}",
            other
        ))),
    }
}

//! Model repositories - create, update and delete by primary key on one relation

use serde_json::Value;

use super::Repository;
use crate::combine::RelationProxy;
use crate::commands::{Command, CommandSpec, CommandType};
use crate::error::{GraphError, GraphResult};
use crate::relation::{Container, Criteria, Relation, Tuple};
use crate::relationships::metadata::Cardinality;

/// Repository with bare single-tuple commands for one relation
#[derive(Debug)]
pub struct ModelRepository {
    repository: Repository,
    relation: Relation,
    create_command: Command,
    update_command: Command,
    delete_command: Command,
}

impl ModelRepository {
    pub fn new(container: Container, relation: &str) -> GraphResult<Self> {
        let repository = Repository::new(container, [relation])?;
        let relation = repository.relation(relation)?.relation().clone();

        let build = |command_type: CommandType| {
            let mut spec = CommandSpec::create_class(
                relation.name(),
                command_type,
                relation.adapter(),
                repository.container().plugins().clone(),
            );
            relation
                .gateway()
                .extend_command(&mut spec, &relation.name().dataset);
            spec.result(Cardinality::One);
            spec.build(relation.clone())
        };

        Ok(Self {
            create_command: build(CommandType::Create),
            update_command: build(CommandType::Update),
            delete_command: build(CommandType::Delete),
            repository,
            relation,
        })
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Proxy of the model relation, for reads
    pub fn relation(&self) -> GraphResult<&RelationProxy> {
        self.repository.relation(&self.relation.name().relation)
    }

    pub fn create(&self, attributes: Value) -> GraphResult<Tuple> {
        match self.create_command.call(attributes)? {
            Value::Object(tuple) => Ok(tuple),
            other => Err(GraphError::invalid_input(format!(
                "create expects a single tuple, got {}",
                other
            ))),
        }
    }

    /// Update the tuple with primary key `pk`
    pub fn update(&self, pk: impl Into<Value>, attributes: Value) -> GraphResult<Option<Tuple>> {
        let command = self.by_pk(&self.update_command, pk.into())?;
        Ok(into_optional(command.call(attributes)?))
    }

    pub fn delete(&self, pk: impl Into<Value>) -> GraphResult<Option<Tuple>> {
        let command = self.by_pk(&self.delete_command, pk.into())?;
        Ok(into_optional(command.call(Value::Null)?))
    }

    fn by_pk(&self, command: &Command, pk: Value) -> GraphResult<Command> {
        let primary_key = self.relation.primary_key().ok_or_else(|| {
            GraphError::configuration(format!(
                "relation '{}' has no primary key",
                self.relation.name()
            ))
        })?;
        Ok(command.restrict(Criteria::new().eq(primary_key, pk)))
    }
}

fn into_optional(value: Value) -> Option<Tuple> {
    match value {
        Value::Object(tuple) => Some(tuple),
        _ => None,
    }
}

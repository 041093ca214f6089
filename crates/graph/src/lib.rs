//! # elif-graph: Relation Graphs for elif.rs
//!
//! Composes independent relations into nested loading trees and compiles
//! those trees into command graphs for nested writes.
//!
//! - [`combine`]: relation proxies, association/convention key inference and
//!   the combine builders producing structural [`ast::PlanNode`] trees
//! - [`commands`]: create/update/delete commands, the compiler turning plans
//!   into command graphs, and its compute-once compilation cache
//! - [`repository`]: repositories tying proxies, commands and struct mapping
//!   together
//!
//! Storage stays behind the [`relation::Gateway`] trait; [`relation::MemoryGateway`]
//! keeps datasets in memory.

pub mod ast;
pub mod combine;
pub mod commands;
pub mod config;
pub mod error;
pub mod relation;
pub mod relationships;
pub mod repository;

pub use ast::{PlanMeta, PlanNode, PlanVisitor, RelationNode};
pub use combine::{CombineEntry, CombineOptions, CombineSpec, RelationProxy, Targets};
pub use commands::{
    CacheStats, Command, CommandCompiler, CommandExtension, CommandGraph, CommandProxy, CommandSpec,
    CommandType, CompiledCommand, Customization, Mapper,
};
pub use config::{GraphConfig, GraphConfigBuilder};
pub use error::{GraphError, GraphResult};
pub use relation::{
    Condition, Container, ContainerBuilder, Criteria, Gateway, MemoryGateway, Relation, RelationName,
    RelationSchema, Tuple, View,
};
pub use relationships::{
    infer_keys, Association, AssociationKind, Cardinality, CombineMeta, ForeignKeyConvention,
    KeyDirection, KeyMapping,
};
pub use repository::{
    CommandDefinition, MappedCommand, Mapped, ModelRepository, Repository, RootRepository, Struct,
};

//! Relation Container - runtime registry of relations, gateways and command plugins

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::{Gateway, Relation, RelationSchema};
use crate::commands::command::{CommandExtension, PluginRegistry};
use crate::config::GraphConfig;
use crate::error::{GraphError, GraphResult};

/// Finalized set of relations bound to their gateways
///
/// Cloning is cheap; every clone shares the same registry.
#[derive(Debug, Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

#[derive(Debug)]
struct ContainerInner {
    config: GraphConfig,
    relations: HashMap<String, Relation>,
    gateways: HashMap<String, Arc<dyn Gateway>>,
    plugins: PluginRegistry,
}

impl Container {
    pub fn builder(config: GraphConfig) -> ContainerBuilder {
        ContainerBuilder::new(config)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.inner.config
    }

    /// Identity shared by every clone of this container
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Look up a relation by its registered name
    pub fn relation(&self, name: &str) -> GraphResult<Relation> {
        self.inner
            .relations
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::relation_not_found(name))
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.inner.relations.contains_key(name)
    }

    /// All registered relation names, sorted
    pub fn relation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.relations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn gateway(&self, name: &str) -> GraphResult<Arc<dyn Gateway>> {
        self.inner
            .gateways
            .get(name)
            .cloned()
            .ok_or_else(|| GraphError::GatewayNotFound {
                name: name.to_string(),
            })
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }
}

/// Collects gateways, relation schemas and plugins before finalization
#[derive(Debug)]
pub struct ContainerBuilder {
    config: GraphConfig,
    gateways: HashMap<String, Arc<dyn Gateway>>,
    schemas: Vec<RelationSchema>,
    plugins: PluginRegistry,
}

impl ContainerBuilder {
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            gateways: HashMap::new(),
            schemas: Vec::new(),
            plugins: PluginRegistry::new(),
        }
    }

    pub fn gateway(mut self, name: impl Into<String>, gateway: Arc<dyn Gateway>) -> Self {
        self.gateways.insert(name.into(), gateway);
        self
    }

    pub fn relation(mut self, schema: RelationSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Register a command plugin usable from customizations by name
    pub fn plugin(mut self, name: impl Into<String>, plugin: Arc<dyn CommandExtension>) -> Self {
        self.plugins.register(name, plugin);
        self
    }

    /// Resolve defaults, bind gateways and validate associations
    pub fn build(self) -> GraphResult<Container> {
        let mut relations = HashMap::new();

        for mut schema in self.schemas {
            if schema.primary_key.is_none() && !schema.keyless {
                schema.primary_key = Some(self.config.get_default_primary_key().clone());
            }
            schema.foreign_key_convention = self.config.get_foreign_key_convention().clone();

            let gateway = self
                .gateways
                .get(&schema.gateway)
                .cloned()
                .ok_or_else(|| GraphError::GatewayNotFound {
                    name: schema.gateway.clone(),
                })?;

            let name = schema.name.relation.clone();
            if relations.contains_key(&name) {
                return Err(GraphError::configuration(format!(
                    "relation '{}' is registered twice",
                    name
                )));
            }

            debug!("Registering relation '{}' on gateway '{}'", name, schema.gateway);
            relations.insert(name, Relation::new(Arc::new(schema), gateway));
        }

        // Association targets must be registered relations
        for relation in relations.values() {
            for association in relation.associations().iter() {
                if !relations.contains_key(&association.target) {
                    return Err(GraphError::configuration(format!(
                        "association '{}' on '{}' targets unknown relation '{}'",
                        association.name,
                        relation.name(),
                        association.target
                    )));
                }
            }
        }

        info!(
            "Container finalized with {} relations and {} gateways",
            relations.len(),
            self.gateways.len()
        );

        Ok(Container {
            inner: Arc::new(ContainerInner {
                config: self.config,
                relations,
                gateways: self.gateways,
                plugins: self.plugins,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::MemoryGateway;
    use crate::relationships::inference::ForeignKeyConvention;
    use crate::config::GraphConfigBuilder;

    fn gateway() -> Arc<dyn Gateway> {
        Arc::new(MemoryGateway::new())
    }

    #[test]
    fn test_primary_key_defaults_from_config() {
        let container = Container::builder(GraphConfig::default())
            .gateway("default", gateway())
            .relation(RelationSchema::new("users"))
            .relation(RelationSchema::new("logs").without_primary_key())
            .relation(RelationSchema::new("accounts").primary_key("account_id"))
            .build()
            .unwrap();

        assert_eq!(container.relation("users").unwrap().primary_key(), Some("id"));
        assert_eq!(container.relation("logs").unwrap().primary_key(), None);
        assert_eq!(container.relation("accounts").unwrap().primary_key(), Some("account_id"));
    }

    #[test]
    fn test_foreign_key_convention_comes_from_config() {
        let config = GraphConfigBuilder::new()
            .foreign_key_convention(ForeignKeyConvention::CamelCase)
            .build()
            .unwrap();
        let container = Container::builder(config)
            .gateway("default", gateway())
            .relation(RelationSchema::new("users"))
            .relation(RelationSchema::new("tasks"))
            .build()
            .unwrap();

        let users = container.relation("users").unwrap();
        let tasks = container.relation("tasks").unwrap();
        assert_eq!(tasks.foreign_key_for(users.name()), "userId");
    }

    #[test]
    fn test_container_identity() {
        let a = Container::builder(GraphConfig::default()).build().unwrap();
        let b = Container::builder(GraphConfig::default()).build().unwrap();

        assert_eq!(a.id(), a.clone().id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_unknown_relation_lookup_fails() {
        let container = Container::builder(GraphConfig::default())
            .gateway("default", gateway())
            .build()
            .unwrap();

        let err = container.relation("users").unwrap_err();
        assert!(err.is_relation_not_found());
    }

    #[test]
    fn test_missing_gateway_is_rejected() {
        let err = Container::builder(GraphConfig::default())
            .relation(RelationSchema::new("users").gateway("sql"))
            .build()
            .unwrap_err();

        assert!(matches!(err, GraphError::GatewayNotFound { ref name } if name == "sql"));
    }

    #[test]
    fn test_association_to_unknown_relation_is_rejected() {
        let err = Container::builder(GraphConfig::default())
            .gateway("default", gateway())
            .relation(RelationSchema::new("users").has_many("tasks"))
            .build()
            .unwrap_err();

        assert!(matches!(err, GraphError::Configuration { .. }));
    }
}

//! Graph configuration types and builders

use serde::{Deserialize, Serialize};
use service_builder::builder;

use crate::relationships::inference::ForeignKeyConvention;

/// Configuration shared by the container, the combination engine and the compiler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[builder]
pub struct GraphConfig {
    /// Primary key assumed for relations that do not declare one
    #[builder(default = "\"id\".to_string()", getter)]
    pub default_primary_key: String,

    /// Naming convention used when a foreign key has to be inferred
    #[builder(default = "ForeignKeyConvention::Underscore", getter)]
    pub foreign_key_convention: ForeignKeyConvention,

    /// Deepest plan the compiler accepts (root is depth 0)
    #[builder(default = "16", getter)]
    pub max_plan_depth: usize,

    /// Reuse compiled command graphs for structurally equal requests
    #[builder(default = "true", getter)]
    pub cache_compiled_commands: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            default_primary_key: "id".to_string(),
            foreign_key_convention: ForeignKeyConvention::Underscore,
            max_plan_depth: 16,
            cache_compiled_commands: true,
        }
    }
}

impl GraphConfigBuilder {
    /// Create a development configuration that recompiles on every request
    pub fn development() -> Self {
        GraphConfigBuilder::new()
            .cache_compiled_commands(false)
            .max_plan_depth(32)
    }

    /// Create a testing configuration with a shallow depth limit
    pub fn testing() -> Self {
        GraphConfigBuilder::new().max_plan_depth(4)
    }
}

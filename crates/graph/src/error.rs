//! Error types for the relation graph system
//!
//! Every failure surfaced by combination, compilation or invocation is a
//! distinct variant so callers can discriminate the cause without matching
//! on message text.

use thiserror::Error;

/// Result type alias for graph operations
pub type GraphResult<T> = Result<T, GraphError>;

/// Error types for relation combination and command compilation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// Requested command type is not one of create, update or delete
    #[error("{command_type:?} is not a supported command type")]
    UnsupportedCommandType { command_type: String },

    /// Combine referenced an association that does not exist
    #[error("Relation '{relation}' has no association named '{name}' and no keys were given")]
    UnresolvedAssociation { relation: String, name: String },

    /// Plan tree has a shape the compiler cannot walk
    #[error("Malformed plan: {message}")]
    MalformedPlan { message: String },

    /// Neither an association nor naming conventions produced usable keys
    #[error("Cannot infer combine keys from '{source_relation}' to '{target_relation}': {reason}")]
    KeyInferenceFailure {
        source_relation: String,
        target_relation: String,
        reason: String,
    },

    #[error("Relation '{name}' is not registered")]
    RelationNotFound { name: String },

    #[error("Gateway '{name}' is not registered")]
    GatewayNotFound { name: String },

    #[error("Relation '{relation}' has no view named '{view}'")]
    ViewNotFound { relation: String, view: String },

    #[error("Command plugin '{name}' is not registered")]
    PluginNotFound { name: String },

    /// Input payload does not have the shape the command expects
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Failure reported by the storage gateway
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl GraphError {
    /// Create an unsupported command type error
    pub fn unsupported_command_type(command_type: impl Into<String>) -> Self {
        Self::UnsupportedCommandType {
            command_type: command_type.into(),
        }
    }

    /// Create an unresolved association error
    pub fn unresolved_association(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedAssociation {
            relation: relation.into(),
            name: name.into(),
        }
    }

    /// Create a malformed plan error
    pub fn malformed_plan(message: impl Into<String>) -> Self {
        Self::MalformedPlan {
            message: message.into(),
        }
    }

    /// Create a key inference error
    pub fn key_inference(
        source_relation: impl Into<String>,
        target_relation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::KeyInferenceFailure {
            source_relation: source_relation.into(),
            target_relation: target_relation.into(),
            reason: reason.into(),
        }
    }

    /// Create a relation lookup error
    pub fn relation_not_found(name: impl Into<String>) -> Self {
        Self::RelationNotFound { name: name.into() }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn is_unsupported_command_type(&self) -> bool {
        matches!(self, Self::UnsupportedCommandType { .. })
    }

    pub fn is_unresolved_association(&self) -> bool {
        matches!(self, Self::UnresolvedAssociation { .. })
    }

    pub fn is_malformed_plan(&self) -> bool {
        matches!(self, Self::MalformedPlan { .. })
    }

    pub fn is_key_inference_failure(&self) -> bool {
        matches!(self, Self::KeyInferenceFailure { .. })
    }

    pub fn is_relation_not_found(&self) -> bool {
        matches!(self, Self::RelationNotFound { .. })
    }
}

// Convert from serde_json errors
impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}

// Adapters report storage failures through anyhow
impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        GraphError::Gateway(err.to_string())
    }
}

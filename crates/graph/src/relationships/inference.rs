//! Key Inference - deriving combine keys from associations or naming conventions

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::metadata::KeyMapping;
use crate::error::{GraphError, GraphResult};
use crate::relation::{Container, Relation};

/// Foreign key naming conventions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForeignKeyConvention {
    /// model_id (e.g., user_id)
    Underscore,
    /// modelId (camelCase)
    CamelCase,
    /// modelID (PascalCase with ID suffix)
    PascalCase,
    /// Custom pattern with {model} placeholder
    Custom(String),
}

impl ForeignKeyConvention {
    /// Foreign key name referencing a relation, e.g. `users` -> `user_id`
    pub fn foreign_key_for(&self, relation: &str) -> String {
        let singular = singularize(relation);

        match self {
            ForeignKeyConvention::Underscore => format!("{}_id", singular),
            ForeignKeyConvention::CamelCase => format!("{}Id", to_camel_case(&singular)),
            ForeignKeyConvention::PascalCase => format!("{}ID", to_pascal_case(&singular)),
            ForeignKeyConvention::Custom(pattern) => pattern.replace("{model}", &singular),
        }
    }
}

/// Which side of the combine the inference source sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDirection {
    /// Source is the parent (one side) loaded into a child target
    Parent,
    /// Source is the parent whose children are the target
    Children,
}

/// Infer combine keys between two relations
///
/// An association on `source` named after `target` wins over naming
/// conventions. Association keys run source -> target, so they are inverted
/// when the source is combined into the target as a parent.
pub fn infer_keys(
    container: &Container,
    source: &Relation,
    target: &Relation,
    direction: KeyDirection,
) -> GraphResult<KeyMapping> {
    if let Some(association) = source.associations().get(&target.name().relation) {
        trace!(
            "Using association '{}' on '{}' for combine keys",
            association.name,
            source.name()
        );
        let keys = association.combine_keys(container)?;
        return Ok(match direction {
            KeyDirection::Children => keys,
            KeyDirection::Parent => keys.invert(),
        });
    }

    infer_combine_keys(source, target, direction)
}

/// Convention fallback: primary key of the one side, foreign key of the many side
pub fn infer_combine_keys(
    source: &Relation,
    target: &Relation,
    direction: KeyDirection,
) -> GraphResult<KeyMapping> {
    let primary_key = source.primary_key().ok_or_else(|| {
        GraphError::key_inference(
            &source.name().relation,
            &target.name().relation,
            "source relation has no primary key",
        )
    })?;
    let foreign_key = target.foreign_key_for(source.name());
    if foreign_key.is_empty() {
        return Err(GraphError::key_inference(
            &source.name().relation,
            &target.name().relation,
            "no foreign key could be derived",
        ));
    }

    Ok(match direction {
        KeyDirection::Parent => KeyMapping::single(foreign_key, primary_key),
        KeyDirection::Children => KeyMapping::single(primary_key, foreign_key),
    })
}

/// Simple singularization (English-centric)
pub fn singularize(name: &str) -> String {
    if name.ends_with("ies") {
        format!("{}y", &name[..name.len() - 3])
    } else if name.ends_with("ses")
        || name.ends_with("ches")
        || name.ends_with("shes")
        || name.ends_with("xes")
        || name.ends_with("zes")
    {
        name[..name.len() - 2].to_string()
    } else if name.ends_with('s') && !name.ends_with("ss") && name.len() > 1 {
        name[..name.len() - 1].to_string()
    } else {
        name.to_string()
    }
}

/// Convert to camelCase
pub fn to_camel_case(s: &str) -> String {
    let mut parts = s.split('_');
    let mut result = parts.next().unwrap_or_default().to_lowercase();

    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            result.extend(first.to_uppercase());
            result.extend(chars.flat_map(char::to_lowercase));
        }
    }

    result
}

/// Convert to PascalCase
pub fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => camel,
    }
}

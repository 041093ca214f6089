//! Gateways - storage adapters executing atomic reads and writes
//!
//! The graph layer never talks to storage directly; every load and mutation
//! goes through a [`Gateway`]. [`MemoryGateway`] keeps datasets in process
//! memory and is what tests and benchmarks run against.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use dashmap::DashMap;
use serde_json::Value;

use super::{Criteria, Tuple};
use crate::commands::command::CommandSpec;
use crate::error::GraphResult;

/// Storage adapter for one or more datasets
pub trait Gateway: Send + Sync + fmt::Debug {
    /// Adapter identifier, part of every compilation signature
    fn adapter(&self) -> &str;

    /// Load every tuple of `dataset` matching `criteria`
    fn fetch(&self, dataset: &str, criteria: &Criteria) -> GraphResult<Vec<Tuple>>;

    /// Insert a tuple and return it as stored (with generated keys)
    fn insert(&self, dataset: &str, primary_key: Option<&str>, tuple: Tuple) -> GraphResult<Tuple>;

    /// Apply `changes` to matching tuples and return them as stored
    fn update(&self, dataset: &str, criteria: &Criteria, changes: &Tuple) -> GraphResult<Vec<Tuple>>;

    /// Remove matching tuples and return them
    fn delete(&self, dataset: &str, criteria: &Criteria) -> GraphResult<Vec<Tuple>>;

    /// Adapter hook run once when a command spec is registered for `dataset`
    fn extend_command(&self, _spec: &mut CommandSpec, _dataset: &str) {}
}

#[derive(Debug, Default)]
struct MemoryDataset {
    rows: Vec<Tuple>,
    next_id: i64,
}

/// In-memory gateway with auto-incrementing integer keys
#[derive(Debug)]
pub struct MemoryGateway {
    adapter: String,
    datasets: DashMap<String, MemoryDataset>,
    registrations: AtomicUsize,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::with_adapter("memory")
    }

    pub fn with_adapter(adapter: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            datasets: DashMap::new(),
            registrations: AtomicUsize::new(0),
        }
    }

    /// Number of command specs this gateway has extended
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Number of tuples currently stored in `dataset`
    pub fn count(&self, dataset: &str) -> usize {
        self.datasets.get(dataset).map(|d| d.rows.len()).unwrap_or(0)
    }

    /// Every tuple in `dataset`, in insertion order
    pub fn rows(&self, dataset: &str) -> Vec<Tuple> {
        self.datasets
            .get(dataset)
            .map(|d| d.rows.clone())
            .unwrap_or_default()
    }
}

impl Gateway for MemoryGateway {
    fn adapter(&self) -> &str {
        &self.adapter
    }

    fn fetch(&self, dataset: &str, criteria: &Criteria) -> GraphResult<Vec<Tuple>> {
        let Some(data) = self.datasets.get(dataset) else {
            return Ok(Vec::new());
        };

        Ok(data
            .rows
            .iter()
            .filter(|row| criteria.matches(row))
            .cloned()
            .collect())
    }

    fn insert(&self, dataset: &str, primary_key: Option<&str>, mut tuple: Tuple) -> GraphResult<Tuple> {
        let mut data = self.datasets.entry(dataset.to_string()).or_default();

        if let Some(pk) = primary_key {
            match tuple.get(pk).cloned().unwrap_or(Value::Null) {
                Value::Null => {
                    data.next_id += 1;
                    tuple.insert(pk.to_string(), Value::from(data.next_id));
                }
                given => {
                    if data.rows.iter().any(|row| row.get(pk) == Some(&given)) {
                        return Err(anyhow!("duplicate primary key {} in '{}'", given, dataset).into());
                    }
                    if let Some(id) = given.as_i64() {
                        data.next_id = data.next_id.max(id);
                    }
                }
            }
        }

        data.rows.push(tuple.clone());
        Ok(tuple)
    }

    fn update(&self, dataset: &str, criteria: &Criteria, changes: &Tuple) -> GraphResult<Vec<Tuple>> {
        let Some(mut data) = self.datasets.get_mut(dataset) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in data.rows.iter_mut().filter(|row| criteria.matches(row)) {
            for (column, value) in changes {
                row.insert(column.clone(), value.clone());
            }
            updated.push(row.clone());
        }

        Ok(updated)
    }

    fn delete(&self, dataset: &str, criteria: &Criteria) -> GraphResult<Vec<Tuple>> {
        let Some(mut data) = self.datasets.get_mut(dataset) else {
            return Ok(Vec::new());
        };

        let (deleted, kept): (Vec<Tuple>, Vec<Tuple>) = data
            .rows
            .drain(..)
            .partition(|row| criteria.matches(row));
        data.rows = kept;

        Ok(deleted)
    }

    fn extend_command(&self, _spec: &mut CommandSpec, _dataset: &str) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tuple(value: Value) -> Tuple {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_generates_primary_keys() {
        let gateway = MemoryGateway::new();

        let jane = gateway.insert("users", Some("id"), tuple(json!({"name": "Jane"}))).unwrap();
        let joe = gateway.insert("users", Some("id"), tuple(json!({"name": "Joe"}))).unwrap();

        assert_eq!(jane["id"], json!(1));
        assert_eq!(joe["id"], json!(2));
        assert_eq!(gateway.count("users"), 2);
    }

    #[test]
    fn test_insert_respects_given_keys() {
        let gateway = MemoryGateway::new();

        gateway.insert("users", Some("id"), tuple(json!({"id": 10, "name": "Jane"}))).unwrap();
        let next = gateway.insert("users", Some("id"), tuple(json!({"name": "Joe"}))).unwrap();
        assert_eq!(next["id"], json!(11));

        let err = gateway
            .insert("users", Some("id"), tuple(json!({"id": 10, "name": "Dup"})))
            .unwrap_err();
        assert!(matches!(err, crate::error::GraphError::Gateway(_)));
    }

    #[test]
    fn test_update_and_delete_by_criteria() {
        let gateway = MemoryGateway::new();
        gateway.insert("users", Some("id"), tuple(json!({"name": "Jane"}))).unwrap();
        gateway.insert("users", Some("id"), tuple(json!({"name": "Joe"}))).unwrap();

        let updated = gateway
            .update("users", &Criteria::new().eq("id", 1), &tuple(json!({"name": "Jane Doe"})))
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["name"], json!("Jane Doe"));

        let deleted = gateway.delete("users", &Criteria::new().eq("name", "Joe")).unwrap();
        assert_eq!(deleted.len(), 1);
        assert_eq!(gateway.count("users"), 1);
    }

    #[test]
    fn test_fetch_unknown_dataset_is_empty() {
        let gateway = MemoryGateway::new();
        assert!(gateway.fetch("nothing", &Criteria::new()).unwrap().is_empty());
    }
}

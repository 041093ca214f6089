//! Shared fixture: users, tasks, tags and accounts on one in-memory gateway

#![allow(dead_code)]

use std::sync::Arc;

use elif_graph::{
    Association, CommandExtension, Container, Gateway, GraphConfig, GraphResult, MemoryGateway,
    RelationSchema, Tuple, View,
};
use serde_json::{json, Value};

/// Uppercases the `name` attribute of every input tuple
#[derive(Debug)]
pub struct UpcaseName;

impl CommandExtension for UpcaseName {
    fn name(&self) -> &str {
        "upcase_name"
    }

    fn before(&self, mut tuple: Tuple, _parent: Option<&Tuple>) -> GraphResult<Tuple> {
        if let Some(Value::String(name)) = tuple.get("name") {
            let upcased = name.to_uppercase();
            tuple.insert("name".to_string(), Value::String(upcased));
        }
        Ok(tuple)
    }
}

pub struct Env {
    pub gateway: Arc<MemoryGateway>,
    pub container: Container,
}

pub fn env() -> Env {
    env_with(GraphConfig::default())
}

pub fn env_with(config: GraphConfig) -> Env {
    let gateway = Arc::new(MemoryGateway::new());

    let container = Container::builder(config)
        .gateway("default", gateway.clone())
        .relation(
            RelationSchema::new("users")
                .attributes(["id", "name"])
                .has_many("tasks")
                .association(Association::one_to_many("accounts", "accounts").with_foreign_key("owner_id"))
                .view(View::by("by_id", ["id"]))
                .view(View::by("by_name", ["name"])),
        )
        .relation(
            RelationSchema::new("tasks")
                .attributes(["id", "user_id", "title"])
                .belongs_to("user", "users")
                .has_many("tags")
                .view(View::by("by_title", ["title"])),
        )
        .relation(RelationSchema::new("tags").attributes(["id", "task_id", "name"]))
        .relation(
            RelationSchema::new("accounts")
                .dataset("user_accounts")
                .primary_key("account_id")
                .foreign_key("users", "owner_id")
                .attributes(["account_id", "owner_id", "account_no"]),
        )
        .plugin("upcase_name", Arc::new(UpcaseName))
        .build()
        .expect("fixture container builds");

    Env { gateway, container }
}

fn insert(gateway: &MemoryGateway, dataset: &str, pk: &str, row: Value) -> Tuple {
    let tuple = row.as_object().cloned().expect("seed rows are objects");
    gateway.insert(dataset, Some(pk), tuple).expect("seed insert")
}

/// Jane (1) with "Jane Task" (2) tagged red; Joe (2) with "Joe Task" (1); Jane owns account A-645
pub fn seed(env: &Env) {
    let gateway = env.gateway.as_ref();
    insert(gateway, "users", "id", json!({"name": "Jane"}));
    insert(gateway, "users", "id", json!({"name": "Joe"}));
    insert(gateway, "tasks", "id", json!({"user_id": 2, "title": "Joe Task"}));
    insert(gateway, "tasks", "id", json!({"user_id": 1, "title": "Jane Task"}));
    insert(gateway, "tags", "id", json!({"task_id": 2, "name": "red"}));
    insert(gateway, "user_accounts", "account_id", json!({"owner_id": 1, "account_no": "A-645"}));
}

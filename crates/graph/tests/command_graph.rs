//! Compiling combine trees into command graphs and invoking them

mod common;

use std::sync::Arc;

use elif_graph::{
    infer_keys, Cardinality, CombineOptions, CommandCompiler, CommandType, Customization,
    GraphConfigBuilder, KeyDirection, KeyMapping, Mapper, PlanNode, RelationProxy,
};
use serde_json::{json, Value};

fn proxy(env: &common::Env, name: &str) -> RelationProxy {
    RelationProxy::from_container(&env.container, name).unwrap()
}

fn users_with_tasks(env: &common::Env) -> PlanNode {
    proxy(env, "users")
        .combine_children(CombineOptions::new().many(proxy(env, "tasks")))
        .unwrap()
        .to_ast()
}

#[test]
fn test_same_request_returns_identical_instance() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let plan = users_with_tasks(&env);

    let first = compiler.compile("create", "memory", &plan, None).unwrap();
    let registrations = env.gateway.registrations();
    let second = compiler.compile("create", "memory", &plan, None).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registrations, 2);
    assert_eq!(env.gateway.registrations(), 2);
    assert_eq!(compiler.cache_stats().hits, 1);
    assert_eq!(compiler.cache_stats().misses, 1);
}

#[test]
fn test_structurally_equal_plans_hit_the_cache() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());

    let a = users_with_tasks(&env);
    let b = users_with_tasks(&env);
    assert_eq!(a.signature(), b.signature());

    let first = compiler.compile("update", "memory", &a, None).unwrap();
    let second = compiler.compile("update", "memory", &b, None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_request_components_are_part_of_the_signature() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let plan = users_with_tasks(&env);
    let upcase = Customization::plugin("upcase_name");

    let create = compiler.compile("create", "memory", &plan, None).unwrap();
    let update = compiler.compile("update", "memory", &plan, None).unwrap();
    let other_adapter = compiler.compile("create", "sql", &plan, None).unwrap();
    let customized = compiler.compile("create", "memory", &plan, Some(&upcase)).unwrap();
    let customized_again = compiler
        .compile("create", "memory", &plan, Some(&upcase.clone()))
        .unwrap();

    assert!(!Arc::ptr_eq(&create, &update));
    assert!(!Arc::ptr_eq(&create, &other_adapter));
    assert!(!Arc::ptr_eq(&create, &customized));
    assert!(Arc::ptr_eq(&customized, &customized_again));
    assert_eq!(compiler.cache().len(), 4);
}

#[test]
fn test_key_inference_symmetry() {
    let env = common::env();
    let users = env.container.relation("users").unwrap();
    let tasks = env.container.relation("tasks").unwrap();

    let parent = infer_keys(&env.container, &users, &tasks, KeyDirection::Parent).unwrap();
    let children = infer_keys(&env.container, &users, &tasks, KeyDirection::Children).unwrap();

    assert_eq!(parent, KeyMapping::single("user_id", "id"));
    assert_eq!(children, KeyMapping::single("id", "user_id"));
    assert_eq!(parent.invert(), children);
}

#[test]
fn test_flat_plan_unwraps_to_bare_command() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());

    let flat = compiler
        .compile("create", "memory", &proxy(&env, "users").to_ast(), None)
        .unwrap();
    let nested = compiler
        .compile("create", "memory", &users_with_tasks(&env), None)
        .unwrap();

    assert!(!flat.is_graph());
    assert!(flat.as_command().is_some());
    assert!(nested.is_graph());
    assert_eq!(nested.as_graph().unwrap().root_name(), "users");
}

#[test]
fn test_unsupported_type_is_rejected_before_compiling() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());

    let err = compiler
        .compile("upsert", "memory", &users_with_tasks(&env), None)
        .unwrap_err();

    assert!(err.is_unsupported_command_type());
    assert!(compiler.cache().is_empty());
    assert_eq!(compiler.cache_stats().misses, 0);
    assert_eq!(env.gateway.registrations(), 0);
}

#[test]
fn test_end_to_end_nested_create() {
    let env = common::env();
    let plan = users_with_tasks(&env);

    let tasks = plan.as_relation().unwrap().relations()[0].clone();
    assert_eq!(tasks.meta.combine.combine_type, Some(Cardinality::Many));
    assert_eq!(tasks.meta.combine.keys, KeyMapping::single("id", "user_id"));

    let compiler = CommandCompiler::new(env.container.clone());
    let command = compiler.compile("create", "memory", &plan, None).unwrap();

    let created = command
        .call(json!({"name": "Jane", "tasks": [{"title": "Buy milk"}]}))
        .unwrap();

    let users = env.gateway.rows("users");
    let tasks = env.gateway.rows("tasks");
    assert_eq!(users.len(), 1);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["user_id"], users[0]["id"]);
    assert_eq!(tasks[0]["title"], json!("Buy milk"));

    assert_eq!(
        created,
        json!({
            "id": 1,
            "name": "Jane",
            "tasks": [{"id": 1, "user_id": 1, "title": "Buy milk"}]
        })
    );
}

#[test]
fn test_wrapper_puts_input_under_root_name() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let compiled = compiler
        .compile("create", "memory", &users_with_tasks(&env), None)
        .unwrap();
    let proxy = compiled.as_graph().unwrap();

    let via_wrapper = proxy.call(json!({"name": "Jane"})).unwrap();
    let via_graph = proxy.graph().call(json!({"users": {"name": "Joe"}})).unwrap();

    assert_eq!(via_wrapper["name"], json!("Jane"));
    assert_eq!(via_graph["name"], json!("Joe"));
    assert!(proxy.graph().call(json!({"name": "Jane"})).is_err());
}

#[test]
fn test_chaining_composes_output_mappers() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let compiled = compiler
        .compile("create", "memory", &users_with_tasks(&env), None)
        .unwrap();

    let proxy = compiled.as_graph().unwrap().clone()
        >> Mapper::new(|value| Ok(value["tasks"].clone()))
        >> Mapper::new(|value| Ok(Value::from(value.as_array().map(Vec::len).unwrap_or(0))));

    let count = proxy
        .call(json!({"name": "Jane", "tasks": [{"title": "a"}, {"title": "b"}]}))
        .unwrap();
    assert_eq!(count, json!(2));
}

#[test]
fn test_nested_update_restricts_children_to_parent() {
    let env = common::env();
    common::seed(&env);
    let compiler = CommandCompiler::new(env.container.clone());

    let update = compiler
        .compile("update", "memory", &users_with_tasks(&env), None)
        .unwrap()
        .view("by_id", &[json!(1)])
        .unwrap();

    let updated = update
        .call(json!({"name": "Jane Doe", "tasks": {"title": "Done"}}))
        .unwrap();

    assert_eq!(updated["name"], json!("Jane Doe"));
    assert_eq!(updated["tasks"], json!([{"id": 2, "user_id": 1, "title": "Done"}]));

    let joe_task = env.gateway.rows("tasks").into_iter().find(|t| t["user_id"] == json!(2)).unwrap();
    assert_eq!(joe_task["title"], json!("Joe Task"));
}

#[test]
fn test_invalid_child_payload_leaves_parent_untouched() {
    let env = common::env();
    common::seed(&env);
    let compiler = CommandCompiler::new(env.container.clone());

    let update = compiler
        .compile("update", "memory", &users_with_tasks(&env), None)
        .unwrap()
        .view("by_id", &[json!(1)])
        .unwrap();

    let err = update
        .call(json!({"name": "Jane Doe", "tasks": [{"title": "Done"}]}))
        .unwrap_err();

    assert!(matches!(err, elif_graph::GraphError::InvalidInput { .. }));
    assert_eq!(env.gateway.rows("users")[0]["name"], json!("Jane"));
    assert_eq!(env.gateway.rows("tasks")[1]["title"], json!("Jane Task"));
}

#[test]
fn test_invalid_entry_in_create_batch_writes_nothing() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let create = compiler
        .compile("create", "memory", &users_with_tasks(&env), None)
        .unwrap();

    let err = create
        .call(json!([{"name": "Jane"}, {"name": "Joe", "tasks": ["Buy milk"]}]))
        .unwrap_err();

    assert!(matches!(err, elif_graph::GraphError::InvalidInput { .. }));
    assert_eq!(env.gateway.count("users"), 0);
    assert_eq!(env.gateway.count("tasks"), 0);
}

#[test]
fn test_nested_delete_removes_children_of_parent() {
    let env = common::env();
    common::seed(&env);
    let compiler = CommandCompiler::new(env.container.clone());

    let delete = compiler
        .compile_type(CommandType::Delete, "memory", &users_with_tasks(&env), None)
        .unwrap()
        .view("by_id", &[json!(2)])
        .unwrap();

    let deleted = delete.call(json!({"tasks": null})).unwrap();

    assert_eq!(deleted["name"], json!("Joe"));
    assert_eq!(env.gateway.count("users"), 1);
    assert_eq!(env.gateway.count("tasks"), 1);
    assert_eq!(env.gateway.rows("tasks")[0]["title"], json!("Jane Task"));
}

#[test]
fn test_customization_applies_to_every_command() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let plan = proxy(&env, "users")
        .combine(&elif_graph::CombineSpec::new().many_with_keys(
            "friends",
            proxy(&env, "tags"),
            KeyMapping::single("id", "task_id"),
        ))
        .unwrap()
        .to_ast();

    let command = compiler
        .compile("create", "memory", &plan, Some(&Customization::plugin("upcase_name")))
        .unwrap();
    command
        .call(json!({"name": "jane", "friends": [{"name": "joe"}]}))
        .unwrap();

    assert_eq!(env.gateway.rows("users")[0]["name"], json!("JANE"));
    assert_eq!(env.gateway.rows("tags")[0]["name"], json!("JOE"));
    assert_eq!(env.gateway.rows("tags")[0]["task_id"], json!(1));
}

#[test]
fn test_missing_plugin_fails_compilation() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());

    let err = compiler
        .compile(
            "create",
            "memory",
            &proxy(&env, "users").to_ast(),
            Some(&Customization::plugin("timestamps")),
        )
        .unwrap_err();

    assert!(matches!(err, elif_graph::GraphError::PluginNotFound { .. }));
    assert!(compiler.cache().is_empty());
}

#[test]
fn test_concurrent_compilation_registers_once() {
    let env = common::env();
    let compiler = CommandCompiler::new(env.container.clone());
    let plan = users_with_tasks(&env);

    let compiled: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| compiler.compile("create", "memory", &plan, None).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(compiled.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(env.gateway.registrations(), 2);
}

#[test]
fn test_development_config_skips_the_cache() {
    let env = common::env_with(GraphConfigBuilder::development().build().unwrap());
    let compiler = CommandCompiler::new(env.container.clone());
    let plan = users_with_tasks(&env);

    let first = compiler.compile("create", "memory", &plan, None).unwrap();
    let second = compiler.compile("create", "memory", &plan, None).unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(env.gateway.registrations(), 4);
}

//! Command Compilation Benchmark
//!
//! Compares cached and uncached compilation of combine trees and measures
//! nested create throughput against the in-memory gateway

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elif_graph::{
    CombineOptions, CommandCompiler, Container, GraphConfig, GraphConfigBuilder, MemoryGateway,
    PlanNode, RelationProxy, RelationSchema,
};
use serde_json::json;

fn container(config: GraphConfig) -> Container {
    Container::builder(config)
        .gateway("default", Arc::new(MemoryGateway::new()))
        .relation(RelationSchema::new("users").attributes(["id", "name"]).has_many("tasks"))
        .relation(RelationSchema::new("tasks").attributes(["id", "user_id", "title"]).has_many("tags"))
        .relation(RelationSchema::new("tags").attributes(["id", "task_id", "name"]))
        .build()
        .expect("benchmark container")
}

fn plan(container: &Container, depth: usize) -> PlanNode {
    let names = ["users", "tasks", "tags"];
    let proxy = |name: &str| RelationProxy::from_container(container, name).expect("relation");

    let mut tree = proxy(names[depth - 1]);
    for level in (0..depth - 1).rev() {
        tree = proxy(names[level])
            .combine_children(CombineOptions::new().many(tree))
            .expect("combine");
    }
    tree.to_ast()
}

fn bench_compilation(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation");

    for depth in [1usize, 2, 3] {
        let cached = CommandCompiler::new(container(GraphConfig::default()));
        let cached_plan = plan(cached.container(), depth);
        group.bench_with_input(BenchmarkId::new("cached", depth), &cached_plan, |b, plan| {
            b.iter(|| black_box(cached.compile("create", "memory", black_box(plan), None).expect("compile")))
        });

        let uncached = CommandCompiler::new(container(
            GraphConfigBuilder::development().build().expect("config"),
        ));
        let uncached_plan = plan(uncached.container(), depth);
        group.bench_with_input(BenchmarkId::new("uncached", depth), &uncached_plan, |b, plan| {
            b.iter(|| black_box(uncached.compile("create", "memory", black_box(plan), None).expect("compile")))
        });
    }

    group.finish();
}

fn bench_nested_create(c: &mut Criterion) {
    let compiler = CommandCompiler::new(container(GraphConfig::default()));
    let command = compiler
        .compile("create", "memory", &plan(compiler.container(), 2), None)
        .expect("compile");

    c.bench_function("nested_create_user_with_tasks", |b| {
        b.iter(|| {
            black_box(
                command
                    .call(json!({"name": "Jane", "tasks": [{"title": "Buy milk"}, {"title": "Walk dog"}]}))
                    .expect("create"),
            )
        })
    });
}

criterion_group!(benches, bench_compilation, bench_nested_create);
criterion_main!(benches);

//! Benchmarks for weft core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use weft::backends::MockBackend;
use weft::core::parser;
use weft::trace::TraceEvent;
use weft::{
    compile, ActionType, AtomicAction, ExecutionContext, ExecutionPlan, Intent, Parameters,
    RetryPolicy, RuntimeConfig, Scheduler,
};

/// Layered DAG: `width` actions per layer, each depending on two actions of
/// the layer above.
fn layered_plan(layers: usize, width: usize) -> ExecutionPlan {
    let mut actions = Vec::with_capacity(layers * width);
    for layer in 0..layers {
        for col in 0..width {
            let mut action = AtomicAction::new(format!("n{layer}_{col}"), ActionType::Generate);
            if layer > 0 {
                action = action
                    .depends_on(format!("n{}_{}", layer - 1, col))
                    .depends_on(format!("n{}_{}", layer - 1, (col + 1) % width));
            }
            actions.push(action);
        }
    }
    ExecutionPlan::new("bench", actions)
}

fn bench_intent_parse(c: &mut Criterion) {
    let yaml = r#"
goals:
  - generate_base_image
  - transform_to_abstract
  - filter_noise
  - compose_collage
  - export_png
constraints:
  style: abstract
  size: 1024
  backend: mock
metadata:
  source: bench
user_id: bench-user
priority: 3
"#;

    c.bench_function("intent_parse", |b| {
        b.iter(|| {
            let intent = parser::parse_intent(black_box(yaml)).unwrap();
            black_box(intent);
        });
    });
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for goals in [10, 100, 1000] {
        let intent = Intent::new((0..goals).map(|i| format!("transform_step_{i}")))
            .with_constraint("style", "abstract");
        group.bench_with_input(BenchmarkId::from_parameter(goals), &intent, |b, intent| {
            b.iter(|| black_box(compile(black_box(intent), true)));
        });
    }
    group.finish();
}

fn bench_execution_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("execution_order");
    for layers in [10, 50, 200] {
        let plan = layered_plan(layers, 10);
        group.bench_with_input(BenchmarkId::from_parameter(layers * 10), &plan, |b, plan| {
            b.iter(|| black_box(plan.execution_ids().unwrap().len()));
        });
    }
    group.finish();
}

fn bench_levels(c: &mut Criterion) {
    let plan = layered_plan(100, 10);
    c.bench_function("levels_1000", |b| {
        b.iter(|| black_box(plan.levels().unwrap().len()));
    });
}

fn bench_inject_dependencies(c: &mut Criterion) {
    let mut group = c.benchmark_group("inject_dependencies");
    for deps in [1, 8, 64] {
        let context = ExecutionContext::new();
        let ids: Vec<String> = (0..deps).map(|i| format!("up_{i}")).collect();
        for id in &ids {
            context.store_result(&TraceEvent::success(
                id.clone(),
                json!({"artifact": "x".repeat(128)}),
                0.01,
                Parameters::new(),
            ));
        }
        let mut params = Parameters::new();
        params.insert("goal".into(), json!("compose"));

        group.bench_with_input(BenchmarkId::from_parameter(deps), &ids, |b, ids| {
            b.iter(|| black_box(context.inject_dependencies("down", ids.iter(), &params)));
        });
    }
    group.finish();
}

fn bench_scheduler_run(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let plan = layered_plan(10, 10);

    let mut group = c.benchmark_group("scheduler_run");
    for (label, config) in [
        ("sequential", RuntimeConfig::sequential()),
        ("parallel_4", RuntimeConfig::parallel(4)),
    ] {
        let mut scheduler = Scheduler::new(config.with_retry(RetryPolicy::none()));
        scheduler.register_backend("mock", MockBackend::new("mock"));
        group.bench_function(label, |b| {
            b.to_async(&runtime)
                .iter(|| async { black_box(scheduler.run(&plan).await.unwrap().len()) });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_intent_parse,
    bench_compile,
    bench_execution_order,
    bench_levels,
    bench_inject_dependencies,
    bench_scheduler_run
);
criterion_main!(benches);

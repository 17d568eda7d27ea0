//! Benchmarks for expression parsing and operation matching
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dat_rs::config::DatConfig;
use dat_rs::host::{MemoryVistrail, ModuleRegistry};
use dat_rs::lattice::TypeLattice;
use dat_rs::operations::{OperationMatcher, OperationRegistry};
use dat_rs::parsing::parse_expression;
use dat_rs::{Operation, OperationParameter, TypeDescriptor, Workspace};
use std::sync::Arc;

const PACKAGE: &str = "org.example.bench";

fn level(i: usize) -> TypeDescriptor {
    TypeDescriptor::new(PACKAGE, format!("Level{}", i))
}

/// `Level0 <: Float`, `Level(i+1) <: Level(i)` up to `depth`.
fn chain_registry(config: &DatConfig, depth: usize) -> ModuleRegistry {
    let mut registry = ModuleRegistry::with_basic_package(config);
    registry.add_module(level(0), &[config.basic("Float")]).unwrap();
    for i in 1..=depth {
        registry.add_module(level(i), &[level(i - 1)]).unwrap();
    }
    registry
}

/// One `f(Level(k), Level(k))` overload for every `step`-th level.
fn overloads(config: &DatConfig, depth: usize, step: usize) -> OperationRegistry {
    let mut operations = OperationRegistry::with_builtins(config);
    for k in (0..=depth).step_by(step) {
        operations.register(Operation::with_callback(
            "f",
            vec![
                OperationParameter::new("x", [level(k)]),
                OperationParameter::new("y", [level(k)]),
            ],
            level(k),
            |_, _| Ok(None),
        ));
    }
    operations
}

fn bench_find_operation(c: &mut Criterion) {
    let config = DatConfig::default();
    let mut group = c.benchmark_group("find_operation");

    for depth in [4usize, 16, 64] {
        let registry: Arc<ModuleRegistry> = Arc::new(chain_registry(&config, depth));
        let snapshot = overloads(&config, depth, 2).snapshot();
        let lattice = TypeLattice::new(registry);
        // The first argument narrows to the `depth / 2` overload, which the
        // second argument also satisfies.
        let args = vec![level(depth / 2), level(depth)];

        group.throughput(Throughput::Elements(snapshot.len() as u64));
        group.bench_with_input(BenchmarkId::new("chain", depth), &args, |b, args| {
            let matcher = OperationMatcher::new(&snapshot, &lattice);
            b.iter(|| matcher.find_operation(black_box("f"), black_box(args)).unwrap())
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_expression");

    for terms in [4usize, 32, 256] {
        let expression = (0..terms)
            .map(|i| format!("f(a{}, {}.5) * 'x'", i, i))
            .collect::<Vec<_>>()
            .join(" + ");
        let text = format!("result = {}", expression);

        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("terms", terms), &text, |b, text| {
            b.iter(|| parse_expression(black_box(text)).unwrap())
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let config = DatConfig::default();
    let depth = 16;
    let workspace = Workspace::new(
        Box::new(MemoryVistrail::new()),
        Arc::new(chain_registry(&config, depth)),
        overloads(&config, depth, 1).snapshot(),
        config,
    );
    workspace.perform_operation("a = 1").unwrap();

    let mut group = c.benchmark_group("resolve");
    group.bench_function("folded_constants", |b| {
        b.iter(|| workspace.resolve(black_box("x = (1 + 2) * 3 / 4 - 5")).unwrap())
    });
    group.bench_function("builtin_application", |b| {
        b.iter(|| workspace.resolve(black_box("x = a * 2 + a")).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_find_operation, bench_parse, bench_resolve);
criterion_main!(benches);

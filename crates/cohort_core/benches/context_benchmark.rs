//! # Context Performance Benchmark
//!
//! - Create/destroy churn through the reuse pool
//! - Component adds and removes routed to watching groups
//! - Replacements on a populated group
//!
//! Run with: `cargo bench --package cohort_core`

// Benchmarks don't need docs and keep unread component fields
#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cohort_core::{Context, Matcher};

const POSITION: usize = 0;
const VELOCITY: usize = 1;
const HEALTH: usize = 2;
const TOTAL_COMPONENTS: usize = 8;

#[derive(Debug, Default)]
struct Position(f32, f32);

#[derive(Debug, Default)]
struct Velocity(f32, f32);

#[derive(Debug, Default)]
struct Health(u32);

fn context() -> Context {
    Context::new(TOTAL_COMPONENTS, 0, None).expect("slot count matches")
}

/// Benchmark: create then destroy entities, reusing pooled records.
fn bench_create_destroy_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_destroy_churn");

    for count in [1_000, 10_000, 100_000] {
        let mut ctx = context();
        // Warm the reuse pool so the measured loop never allocates a record.
        let warm: Vec<_> = (0..count).map(|_| ctx.create_entity()).collect();
        for e in warm {
            ctx.destroy_entity(e).expect("active entity");
        }

        let mut live = Vec::with_capacity(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                for _ in 0..count {
                    live.push(ctx.create_entity());
                }
                for e in live.drain(..) {
                    ctx.destroy_entity(e).expect("active entity");
                }
                black_box(ctx.reusable_entities_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: add/remove a component watched by several groups.
fn bench_routed_group_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("routed_group_updates");

    for watching in [1, 4, TOTAL_COMPONENTS] {
        let mut ctx = context();
        ctx.get_group(Matcher::all_of([POSITION])).expect("valid matcher");
        for other in 1..watching {
            ctx.get_group(Matcher::all_of([POSITION, other]))
                .expect("valid matcher");
        }
        // Unrelated groups that must never be touched by POSITION changes.
        ctx.get_group(Matcher::all_of([HEALTH])).expect("valid matcher");

        let entities: Vec<_> = (0..1_000)
            .map(|_| {
                let e = ctx.create_entity();
                ctx.add_component(e, VELOCITY, Box::new(Velocity(1.0, 0.0)))
                    .expect("fresh slot");
                e
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(watching), &watching, |b, _| {
            b.iter(|| {
                for &e in &entities {
                    let position = ctx.create_component::<Position>(POSITION);
                    ctx.add_component(e, POSITION, position).expect("empty slot");
                }
                for &e in &entities {
                    ctx.remove_component(e, POSITION).expect("occupied slot");
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: replace a component on every member of a group.
fn bench_replace_in_group(c: &mut Criterion) {
    let mut ctx = context();
    let healthy = ctx.get_group(Matcher::all_of([HEALTH])).expect("valid matcher");
    for _ in 0..10_000 {
        let e = ctx.create_entity();
        ctx.add_component(e, HEALTH, Box::new(Health(100))).expect("fresh slot");
    }
    let members = ctx.group(healthy).expect("known group").entities();

    c.bench_function("replace_10k_group_members", |b| {
        b.iter(|| {
            for &e in &members {
                let mut health = ctx.create_component::<Health>(HEALTH);
                health.0 = 99;
                ctx.replace_component(e, HEALTH, health).expect("enabled entity");
            }
        });
    });
}

criterion_group!(
    benches,
    bench_create_destroy_churn,
    bench_routed_group_updates,
    bench_replace_in_group,
);
criterion_main!(benches);

//! Criterion benchmarks for chain planning.
//!
//! Two benchmark groups:
//! - `batch_chain`: one batch mill, growing order books
//! - `capped_batches`: small batch cap forcing many input deliveries per order

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use procnet_core::chain::ProcessChain;
use procnet_core::energy::NoEnergyData;
use procnet_core::order::{OrderCollection, ProductionOrder};
use procnet_core::petri_net::PetriNetTemplate;
use procnet_core::plan::ProductionPlan;
use procnet_core::test_utils::*;

// ===========================================================================
// Builders
// ===========================================================================

/// `count` orders of 100 steel, one every two hours.
fn order_book(count: u64) -> OrderCollection {
    let base = ts("2024-01-01 00:00:00");
    (0..count)
        .map(|i| {
            ProductionOrder::new(
                i,
                steel(),
                mass(100.0),
                base + chrono::TimeDelta::hours(2 * i as i64),
            )
        })
        .collect()
}

fn plan(mut chain: ProcessChain) -> ProductionPlan {
    let mut plan = ProductionPlan::new();
    chain
        .create_process_chain_production_plan(&mut plan, &mut NoEnergyData, None)
        .unwrap();
    plan
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_batch_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_chain");
    for count in [10u64, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut chain = batch_chain("bench", 0.0);
                    chain.set_orders(order_book(count)).unwrap();
                    chain
                },
                plan,
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_capped_batches(c: &mut Criterion) {
    c.bench_function("capped_batches", |b| {
        b.iter_batched(
            || {
                let mut chain = linear_chain(
                    "bench",
                    PetriNetTemplate::Batch,
                    make_batch_stream("ore", "mine", "mill", ore(), 5, Some(5.0)),
                    make_batch_stream("steel", "mill", "yard", steel(), 40, None),
                    0.0,
                );
                chain.set_orders(order_book(50)).unwrap();
                chain
            },
            plan,
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_batch_chain, bench_capped_batches);
criterion_main!(benches);

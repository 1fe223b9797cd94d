use std::time::Instant;

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::Throughput;
use criterion::{black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;

use evq::*;

const HOLDS: u64 = 10_000;

fn prefilled(name: &str, population: u64) -> Box<dyn EventQueue<u64, SimTime>> {
    let registry = Registry::<u64, SimTime>::standard();
    let mut queue = registry
        .create(&QueueOptions::default().implementation(name))
        .unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    for e in 0..population {
        queue.enqueue(e, SimTime::new(rng.random::<f64>() * population as f64));
    }
    queue
}

fn hold_by_population(c: &mut Criterion) {
    let populations = [100u64, 1_000, 10_000, 100_000];

    let mut group = c.benchmark_group("evq::hold::by_population");
    group.throughput(Throughput::Elements(HOLDS));
    for name in Registry::<u64, SimTime>::standard().names() {
        for population in populations {
            group.bench_with_input(
                BenchmarkId::new(name, population),
                &population,
                |b, &population| {
                    let mut queue = prefilled(name, population);
                    let mut rng = StdRng::seed_from_u64(7);
                    b.iter_custom(|iters| {
                        let start = Instant::now();
                        for _ in 0..iters {
                            for _ in 0..HOLDS {
                                let (e, t) = queue.dequeue().unwrap();
                                queue.enqueue(e, t + 2.0 * rng.random::<f64>());
                            }
                        }
                        start.elapsed()
                    });
                },
            );
        }
    }
    group.finish();
}

fn cancel_and_requeue(c: &mut Criterion) {
    let mut group = c.benchmark_group("evq::cancel");
    group.throughput(Throughput::Elements(HOLDS));
    for name in Registry::<u64, SimTime>::standard().names() {
        group.bench_function(name, |b| {
            let mut queue = prefilled(name, HOLDS);
            let mut rng = StdRng::seed_from_u64(9);
            b.iter(|| {
                for _ in 0..HOLDS {
                    let e = rng.random_range(0..HOLDS);
                    let t = SimTime::new(rng.random::<f64>() * HOLDS as f64);
                    black_box(queue.requeue(&e, t));
                }
            });
        });
    }
    group.finish();
}

fn standard_workload(c: &mut Criterion) {
    let workload = Workload::standard();

    let mut group = c.benchmark_group("evq::workload");
    group.throughput(Throughput::Elements(workload.len() as u64));
    group.sample_size(10);
    for name in Registry::<u64, SimTime>::standard().names() {
        group.bench_function(name, |b| {
            let mut queue = prefilled(name, 0);
            b.iter(|| black_box(benchmark(&mut *queue, workload).unwrap()));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    hold_by_population,
    cancel_and_requeue,
    standard_workload
);
criterion_main!(benches);

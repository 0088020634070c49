//! Criterion benchmarks for the flow router.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use spikeflow::config::{FlowConfig, LearningConfig};
use spikeflow::learning::LearningLoop;
use spikeflow::router::FlowRouter;

fn bench_cfg(seed: u64) -> FlowConfig {
    FlowConfig {
        seed: Some(seed),
        ..FlowConfig::default()
    }
}

/// Benchmark step() with varying particle counts.
fn bench_step_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_size");

    for count in [16usize, 64, 256, 1024].iter() {
        group.throughput(Throughput::Elements(*count as u64));

        group.bench_with_input(BenchmarkId::new("step", count), count, |b, &count| {
            let mut router = FlowRouter::new(bench_cfg(42)).unwrap();
            let energies: Vec<f32> = (0..count).map(|i| 1.0 + (i % 23) as f32).collect();
            let mut state = router.seed_state(&energies);

            b.iter(|| {
                if state.is_drained() {
                    state = router.seed_state(&energies);
                }
                let out = router.step(&mut state).unwrap();
                black_box(out.spikes)
            });
        });
    }

    group.finish();
}

/// Benchmark a full learning epoch (seed, simulate, aggregate, update).
fn bench_epoch(c: &mut Criterion) {
    let mut group = c.benchmark_group("epoch");

    let energies = [10.0f32, 20.0, 15.0, 8.0, 12.0, 18.0, 22.0, 14.0];
    group.throughput(Throughput::Elements(energies.len() as u64));

    group.bench_function("run_epoch_8", |b| {
        let learn = LearningConfig {
            steps_per_epoch: 50,
            ..LearningConfig::default()
        };
        let mut learner = LearningLoop::new(bench_cfg(42), learn).unwrap();

        b.iter(|| {
            let m = learner.run_epoch(&energies, &energies).unwrap();
            black_box(m.total_loss)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_step_sizes, bench_epoch);

criterion_main!(benches);

//! Benchmarks for the rolling regression engine.

#![allow(missing_docs)]

use chrono::{Days, NaiveDate};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rvar_data::{Observation, SecurityTimeline};
use rvar_regression::{CancellationToken, RollingConfig, RollingRegressionEngine};

fn synthetic_timeline(id: i64, len: usize) -> SecurityTimeline {
    let mut rng = StdRng::seed_from_u64(id as u64);
    let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
    let observations = (0..len)
        .map(|i| {
            let factors = [
                rng.gen_range(-0.03..0.03),
                rng.gen_range(-0.01..0.01),
                rng.gen_range(-0.01..0.01),
            ];
            let exret = 1.05 * factors[0] + 0.3 * factors[1] + rng.gen_range(-0.02..0.02);
            let date = start.checked_add_days(Days::new(i as u64)).unwrap();
            Observation::new(id, date, exret, factors)
        })
        .collect();
    SecurityTimeline::new(id, observations).unwrap()
}

fn bench_run_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_partition");
    let cancel = CancellationToken::new();

    for window in [20usize, 60, 120] {
        let engine = RollingRegressionEngine::new(RollingConfig {
            window,
            ..Default::default()
        })
        .unwrap();
        let timelines: Vec<SecurityTimeline> =
            (0..10).map(|id| synthetic_timeline(id, 500)).collect();

        group.bench_with_input(BenchmarkId::from_parameter(window), &timelines, |b, t| {
            b.iter(|| engine.run_partition(black_box(t), &cancel).unwrap());
        });
    }

    group.finish();
}

fn bench_fit_window(c: &mut Criterion) {
    let engine = RollingRegressionEngine::default();
    let timeline = synthetic_timeline(1, 60);

    c.bench_function("fit_window_60", |b| {
        b.iter(|| engine.fit_window(black_box(timeline.observations())).unwrap());
    });
}

criterion_group!(benches, bench_run_partition, bench_fit_window);
criterion_main!(benches);

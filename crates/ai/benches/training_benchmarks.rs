use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use stockcast_ai::{train, EstimatorSpec, ForestParams, Observation, RandomForest, TrainingConfig};
use stockcast_core::{MaterialId, YearMonth};

/// `materials` series of `months` points each, ending right before the cutoff
/// plus one validation month.
fn synthetic_history(materials: i64, months: i32) -> (Vec<Observation>, YearMonth) {
    let start = YearMonth::new(2020, 1).unwrap();
    let mut rows = Vec::new();
    for id in 1..=materials {
        for m in 0..=months {
            let seasonal = ((m % 12) as f64 - 6.0).abs();
            rows.push(Observation {
                material_id: MaterialId::new(id),
                year_month: start.plus_months(m),
                demand: (id as f64) * 2.0 + seasonal,
            });
        }
    }
    (rows, start.plus_months(months))
}

fn bench_forest_threads(c: &mut Criterion) {
    let mut group = c.benchmark_group("forest_fit_threads");
    group.sample_size(10);

    let x: Vec<Vec<f64>> = (0..2000).map(|i| vec![(i % 37) as f64, (i % 11) as f64, (i / 50) as f64]).collect();
    let y: Vec<f64> = x.iter().map(|r| r[0] * 0.5 + r[1] - r[2]).collect();

    for threads in [1usize, 2, 6].iter() {
        group.bench_with_input(BenchmarkId::new("fit_100_trees", threads), threads, |b, &threads| {
            let params = ForestParams {
                num_threads: threads,
                ..ForestParams::default()
            };
            b.iter(|| RandomForest::fit(black_box(&x), black_box(&y), &params).unwrap());
        });
    }

    group.finish();
}

fn bench_training_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("training_run");
    group.sample_size(10);

    for materials in [5i64, 25, 100].iter() {
        let (rows, cutoff) = synthetic_history(*materials, 24);
        let mut config = TrainingConfig::standard(cutoff, 6);
        for spec in config.forecaster.estimators.iter_mut() {
            if let EstimatorSpec::ImputedRandomForest(p) = spec {
                p.n_estimators = 20;
            }
        }

        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_with_input(BenchmarkId::new("standard_ensemble", materials), &rows, |b, rows| {
            b.iter(|| train(black_box(rows), &config).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_forest_threads, bench_training_run);
criterion_main!(benches);

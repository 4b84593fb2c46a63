use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lasso_sweep::prelude::*;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Target as a sparse combination of features + noise
    let y = Array1::from_shape_fn(n_rows, |i| {
        x[[i, 0]] * 2.0 - x[[i, 1]] + rng.gen::<f64>() * 0.1
    });

    let names = (0..n_features).map(|i| format!("feature_{}", i)).collect();
    Dataset::new(names, "target", x, y).unwrap()
}

fn lasso(rows: &Dataset, point: &HyperparameterPoint) -> Result<FitResult> {
    LassoRegression::new(point.penalty).fit(rows)
}

fn rmse(fit: &FitResult, rows: &Dataset) -> Result<f64> {
    Metric::Rmse.score(fit, rows)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("lasso_fit");
    group.sample_size(20);

    for n_rows in [1000, 5000, 10000].iter() {
        let ds = create_regression_data(*n_rows, 20);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &ds, |b, ds| {
            b.iter(|| LassoRegression::new(0.01).fit(black_box(ds)).unwrap())
        });
    }

    group.finish();
}

fn bench_tune(c: &mut Criterion) {
    let mut group = c.benchmark_group("tune");
    group.sample_size(10); // Fewer samples for full sweeps

    let ds = create_regression_data(2000, 20);
    let folds = CrossValidator::new(5).with_random_state(1).make_folds(&ds).unwrap();
    let grid = HyperparameterGrid::log_space(1e-3, 1.0, 20).unwrap();

    for workers in [1, 2, 4].iter() {
        group.bench_with_input(BenchmarkId::new("workers", workers), workers, |b, &w| {
            b.iter(|| {
                TunedFitter::new()
                    .tune(black_box(&ds), &folds, &grid, lasso, rmse, WorkerPool::new(w).unwrap())
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_tune);
criterion_main!(benches);

use bikestore_ml::preparation::{stratified_split, SplitConfig};
use bikestore_ml::training::{GridSearch, LinearRegression, LogisticRegression, SearchConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);
    let y_reg: Array1<f64> = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();
    let threshold = n_features as f64 * 5.0;
    let y_clf = y_reg.mapv(|v| if v > threshold { 1.0 } else { 0.0 });

    (x, y_reg, y_clf)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    for n_rows in [1000, 5000, 10000].iter() {
        let (x, y_reg, y_clf) = create_data(*n_rows, 4);

        group.bench_with_input(BenchmarkId::new("linear", n_rows), &(&x, &y_reg), |b, (x, y)| {
            b.iter(|| {
                let mut model = LinearRegression::new();
                model.fit(black_box(x), black_box(y)).unwrap();
            })
        });

        group.bench_with_input(BenchmarkId::new("logistic", n_rows), &(&x, &y_clf), |b, (x, y)| {
            b.iter(|| {
                let mut model = LogisticRegression::new();
                model.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10);

    for n_rows in [1000, 5000].iter() {
        let (x, _, y) = create_data(*n_rows, 4);
        let search = GridSearch::new(SearchConfig::default());

        group.bench_with_input(BenchmarkId::new("c_grid", n_rows), &(&x, &y), |b, (x, y)| {
            b.iter(|| search.fit(black_box(x), black_box(y)).unwrap())
        });
    }

    group.finish();
}

fn bench_split(c: &mut Criterion) {
    let (_, _, y) = create_data(100_000, 1);
    let config = SplitConfig::default();

    c.bench_function("stratified_split_100k", |b| {
        b.iter(|| stratified_split(black_box(&y), &config).unwrap())
    });
}

criterion_group!(benches, bench_fit, bench_grid_search, bench_split);
criterion_main!(benches);

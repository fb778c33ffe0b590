//! TreeSHAP explanation benchmarks.
//!
//! - Single request latency through the forecaster
//! - Batch explanation, sequential vs parallel

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array2;

use shapcast::testing;
use shapcast::{DemandForecaster, ExplainConfig, Parallelism};

fn forecaster() -> DemandForecaster {
    DemandForecaster::new(Arc::new(testing::reference_model()), ExplainConfig::default())
        .expect("reference model is explainable")
}

/// Deterministic raw rows spread over the training range.
fn raw_rows(n_rows: usize) -> Array2<f32> {
    Array2::from_shape_fn((n_rows, 4), |(i, j)| {
        let t = ((i * 31 + j * 17) % 97) as f32 / 97.0;
        match j {
            0 => (i % 4) as f32,
            1 => 400.0 * t,
            2 => 40.0 * t,
            _ => 8.0 * t,
        }
    })
}

// =============================================================================
// Single Request
// =============================================================================

fn bench_single_request(c: &mut Criterion) {
    let forecaster = forecaster();
    let request = testing::reference_request();

    c.bench_function("explain/single_request", |b| {
        b.iter(|| black_box(forecaster.predict(black_box(&request))))
    });
}

// =============================================================================
// Batch
// =============================================================================

fn bench_batch(c: &mut Criterion) {
    let forecaster = forecaster();
    let mut group = c.benchmark_group("explain/batch");

    for n_rows in [100usize, 1_000, 10_000] {
        let rows = raw_rows(n_rows);
        group.throughput(Throughput::Elements(n_rows as u64));

        for (label, parallelism) in [
            ("sequential", Parallelism::Sequential),
            ("parallel", Parallelism::Parallel),
        ] {
            group.bench_with_input(BenchmarkId::new(label, n_rows), &rows, |b, rows| {
                b.iter(|| black_box(forecaster.explain_rows(black_box(rows.view()), parallelism)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_single_request, bench_batch);
criterion_main!(benches);

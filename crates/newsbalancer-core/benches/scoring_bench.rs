//! Benchmarks for the composite score calculator.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use newsbalancer_core::config::CompositeScoreConfig;
use newsbalancer_core::scoring::{compute, RatedScore};

fn sample_scores(config: &CompositeScoreConfig) -> Vec<RatedScore> {
    config
        .perspectives
        .iter()
        .enumerate()
        .flat_map(|(i, p)| {
            p.models.iter().enumerate().map(move |(j, model)| RatedScore {
                model: model.clone(),
                score: Some(((i as f64) - 1.0) * 0.3 + (j as f64) * 0.05),
                confidence: 0.6 + (j as f64) * 0.1,
            })
        })
        .collect()
}

fn bench_compute(c: &mut Criterion) {
    let config = CompositeScoreConfig::default();
    let scores = sample_scores(&config);

    c.bench_function("compute_composite", |b| {
        b.iter(|| compute(black_box(&scores), black_box(&config)))
    });

    let duplicated: Vec<RatedScore> = scores
        .iter()
        .cycle()
        .take(scores.len() * 8)
        .cloned()
        .collect();

    c.bench_function("compute_composite_with_duplicates", |b| {
        b.iter(|| compute(black_box(&duplicated), black_box(&config)))
    });
}

criterion_group!(benches, bench_compute);
criterion_main!(benches);

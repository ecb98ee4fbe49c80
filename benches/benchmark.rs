// Performance benchmarks for alignment, blending and end-to-end estimation
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lapprice::{EstimatorBuilder, EstimatorConfig, RawAttributeSet};
use lapprice_core::{extract, ModelKind};
use lapprice_ensemble::{Blender, DecayArtifact, EnsembleWeights, KnnArtifact, ModelArtifact, Weighting};
use lapprice_schema::{AlignerBuilder, FeatureSchema, ScalingParameters};
use rand::prelude::*;
use std::sync::Arc;

const BRANDS: [&str; 6] = ["Lenovo", "Dell", "Apple", "HP", "ASUS", "Acer"];

fn generate_schema(extra_brands: usize) -> FeatureSchema {
    let mut columns: Vec<String> = ["release_year", "cpu_score", "ram_size", "age", "age_factor"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    columns.extend(BRANDS.iter().map(|b| format!("brand_{}", b)));
    columns.extend((0..extra_brands).map(|i| format!("brand_Vendor{}", i)));
    for tier in ["low", "mid", "high", "very_high"] {
        columns.push(format!("performance_tier_{}", tier));
    }
    FeatureSchema::new(columns).unwrap()
}

fn generate_listing(rng: &mut impl Rng) -> RawAttributeSet {
    RawAttributeSet::new()
        .with("brand", BRANDS[rng.random_range(0..BRANDS.len())])
        .with("cpu_score", rng.random_range(1000..15000))
        .with("release_year", rng.random_range(2012..2024))
        .with("ram_desc", format!("{}GB", 4 << rng.random_range(0..4)))
}

fn benchmark_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");
    let mut rng = rand::rng();
    let listing = generate_listing(&mut rng);
    let scaling = ScalingParameters::from_pairs([("cpu_score", 5000.0, 2500.0), ("ram_size", 12.0, 6.0)]);

    for width in [0, 100, 1000].iter() {
        let schema = Arc::new(generate_schema(*width));
        let aligner = AlignerBuilder::new(schema)
            .scaling(Some(&scaling))
            .reference_year(2024)
            .build();
        group.bench_with_input(BenchmarkId::new("extra_columns", width), width, |b, _| {
            b.iter(|| aligner.align(black_box(&listing)));
        });
    }
    group.finish();
}

fn benchmark_extract(c: &mut Criterion) {
    c.bench_function("extract_description", |b| {
        b.iter(|| extract(black_box("联想拯救者 i7-12700H 16G内存 512G固态 RTX3060 2022年"), 2024));
    });
}

fn benchmark_blend(c: &mut Criterion) {
    let blender = Blender::default();
    let weights = EnsembleWeights::default();
    let predictions = [
        (ModelKind::Xgb, 3520.0),
        (ModelKind::Knn, 3310.0),
        (ModelKind::Decay, 2980.0),
    ];
    c.bench_function("blend", |b| {
        b.iter(|| blender.blend(black_box(&predictions), &weights).unwrap());
    });
}

fn benchmark_estimate_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("estimate_batch");
    let mut rng = rand::rng();

    let points: Vec<Vec<f32>> = (0..2000)
        .map(|_| vec![rng.random_range(1000.0..15000.0), rng.random_range(0.0..12.0)])
        .collect();
    let targets: Vec<f64> = (0..2000).map(|_| rng.random_range(500.0..9000.0)).collect();

    let estimator = EstimatorBuilder::new(generate_schema(0))
        .config(EstimatorConfig {
            reference_year: Some(2024),
            ..EstimatorConfig::default()
        })
        .model(ModelArtifact::Knn(KnnArtifact {
            features: vec!["cpu_score".to_string(), "age".to_string()],
            k: 5,
            weighting: Weighting::Distance,
            points,
            targets,
        }))
        .model(ModelArtifact::Decay(DecayArtifact {
            features: vec!["age_factor".to_string()],
            intercept: 500.0,
            coefficients: vec![5000.0],
        }))
        .build()
        .unwrap();

    for size in [100, 1000].iter() {
        let batch: Vec<RawAttributeSet> = (0..*size).map(|_| generate_listing(&mut rng)).collect();
        group.bench_with_input(BenchmarkId::new("listings", size), size, |b, _| {
            b.iter(|| estimator.estimate_batch(black_box(&batch)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_align,
    benchmark_extract,
    benchmark_blend,
    benchmark_estimate_batch
);
criterion_main!(benches);

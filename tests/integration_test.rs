// Integration tests for lapprice
use lapprice::{EstimatorConfig, Error, ModelKind, PriceEstimator, RawAttributeSet};
use lapprice_storage::{write_artifact, ArtifactEntry, ArtifactManifest};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_json(dir: &Path, name: &str, value: Value) {
    fs::write(dir.join(format!("{}.json", name)), value.to_string()).unwrap();
}

fn feature_names() -> Value {
    json!([
        "release_year",
        "cpu_score",
        "ram_size",
        "age",
        "age_factor",
        "brand_Dell",
        "brand_Lenovo",
        "brand_Other",
        "storage_type_SSD",
        "gpu_type_Dedicated",
        "performance_tier_high"
    ])
}

fn xgb_model() -> Value {
    json!({
        "base_score": 3000.0,
        "trees": [
            {"nodes": [
                {"split": {"feature": 5, "threshold": 0.5, "left": 1, "right": 2}},
                {"leaf": 0.0},
                {"leaf": 500.0}
            ]},
            {"nodes": [
                {"split": {"feature": 2, "threshold": 0.5, "left": 1, "right": 2}},
                {"leaf": 0.0},
                {"leaf": 1000.0}
            ]}
        ]
    })
}

fn knn_model() -> Value {
    json!({
        "features": ["age"],
        "k": 1,
        "weighting": "distance",
        "points": [[2.0], [5.0]],
        "targets": [3000.0, 1500.0]
    })
}

fn decay_model() -> Value {
    json!({"features": ["age_factor"], "intercept": 0.0, "coefficients": [4000.0]})
}

/// A model directory with every artifact except those in `skip`
fn model_dir(skip: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    let artifacts = [
        ("feature_names", feature_names()),
        (
            "scaler",
            json!({"columns": ["cpu_score", "ram_size"], "mean": [5000.0, 8.0], "scale": [2500.0, 4.0]}),
        ),
        ("model_weights", json!({"xgb": 0.6, "knn": 0.3, "decay": 0.1})),
        ("xgb_model", xgb_model()),
        ("knn_model", knn_model()),
        ("decay_model", decay_model()),
    ];
    for (name, value) in artifacts {
        if !skip.contains(&name) {
            write_json(dir.path(), name, value);
        }
    }
    dir
}

fn config() -> EstimatorConfig {
    EstimatorConfig {
        reference_year: Some(2024),
        ..EstimatorConfig::default()
    }
}

#[test]
fn test_all_models_present() {
    let dir = model_dir(&[]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    assert!(estimator.has_scaling());
    assert!(estimator.warnings().is_empty());
    assert!((estimator.weights().total() - 1.0).abs() < 1e-9);

    let attrs = RawAttributeSet::new()
        .with("brand", "Dell")
        .with("release_year", 2022)
        .with("ram_desc", "8GB");
    let estimate = estimator.estimate(&attrs).unwrap();

    // xgb 3500, knn 3000, decay 4000 * 0.81
    assert_eq!(estimate.result.point_estimate, 3324);
    assert!(estimate.scaled);
    assert_eq!(estimate.contributions.len(), 3);
}

#[test]
fn test_explicit_brand_beats_description() {
    let dir = model_dir(&["knn_model"]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    let attrs = RawAttributeSet::new()
        .with("description", "联想 8G内存")
        .with("brand", "Dell")
        .with("release_year", 2022);

    let merged = estimator.merge_attributes(&attrs);
    assert_eq!(merged.text("brand").as_deref(), Some("Dell"));
    assert_eq!(merged.text("ram_desc").as_deref(), Some("8GB"));

    let result = estimator.predict(&attrs).unwrap();
    // 3500 * 6/7 + 3240 * 1/7
    assert_eq!(result.point_estimate, 3463);
    assert_eq!(result.range_low, 2943);
    assert_eq!(result.range_high, 3983);
    assert_eq!(result.range_label, "2943-3983");
}

#[test]
fn test_knn_absent_renormalizes() {
    let dir = model_dir(&["knn_model"]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    assert!(!estimator.is_present(ModelKind::Knn));
    let weights = estimator.weights();
    assert_eq!(weights.get(ModelKind::Knn), 0.0);
    assert!((weights.get(ModelKind::Xgb) - 0.6 / 0.7).abs() < 1e-9);
    assert!((weights.get(ModelKind::Decay) - 0.1 / 0.7).abs() < 1e-9);
    assert!(estimator.warnings().iter().any(|w| w.contains("knn")));
}

#[test]
fn test_missing_weights_fall_back_to_defaults() {
    let dir = model_dir(&["model_weights"]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();
    assert!((estimator.weights().get(ModelKind::Xgb) - 0.6).abs() < 1e-9);
    assert!((estimator.weights().get(ModelKind::Knn) - 0.3).abs() < 1e-9);
}

#[test]
fn test_missing_scaler_is_reported() {
    let dir = model_dir(&["scaler"]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();
    assert!(!estimator.has_scaling());

    let estimate = estimator.estimate(&RawAttributeSet::new().with("brand", "Lenovo")).unwrap();
    assert!(!estimate.scaled);
    assert!(estimate.warnings.iter().any(|w| w.contains("scaling")));
}

#[test]
fn test_missing_schema_is_fatal() {
    let dir = model_dir(&["feature_names"]);
    let err = PriceEstimator::open(dir.path(), config()).unwrap_err();
    assert!(matches!(err, Error::SchemaUnavailable(_)));
    assert!(err.is_unavailable());
}

#[test]
fn test_no_sub_models_is_fatal() {
    let dir = model_dir(&["xgb_model", "knn_model", "decay_model"]);
    let err = PriceEstimator::open(dir.path(), config()).unwrap_err();
    assert!(matches!(err, Error::AllModelsAbsent));
}

#[test]
fn test_unseen_brand_matches_missing_brand() {
    let dir = model_dir(&[]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    let unseen = RawAttributeSet::new().with("brand", "Framework").with("cpu_score", 6200);
    let missing = RawAttributeSet::new().with("cpu_score", 6200);

    let a = estimator.aligner().align(&unseen);
    let b = estimator.aligner().align(&missing);
    assert_eq!(a.dim(), 11);
    assert_eq!(a.as_slice(), b.as_slice());
    assert_eq!(
        estimator.predict(&unseen).unwrap(),
        estimator.predict(&missing).unwrap()
    );
}

#[test]
fn test_negative_blend_clamps_to_zero() {
    let dir = model_dir(&["xgb_model", "knn_model", "decay_model"]);
    write_json(
        dir.path(),
        "decay_model",
        json!({"features": ["age"], "intercept": -1000.0, "coefficients": [10.0]}),
    );
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    let estimate = estimator.estimate(&RawAttributeSet::new()).unwrap();
    assert!(estimate.raw_estimate < 0.0);
    assert_eq!(estimate.result.point_estimate, 0);
    assert_eq!(estimate.result.range_low, 50);
    assert_eq!(estimate.result.range_high, 100);
}

#[test]
fn test_manifest_with_mixed_encodings() {
    let dir = model_dir(&["xgb_model", "knn_model", "decay_model"]);
    let xgb: lapprice_ensemble::XgbArtifact = serde_json::from_value(xgb_model()).unwrap();
    let decay: lapprice_ensemble::DecayArtifact = serde_json::from_value(decay_model()).unwrap();
    let xgb_sum = write_artifact(&dir.path().join("trees.bin"), &xgb).unwrap();
    let decay_sum = write_artifact(&dir.path().join("decay.json.gz"), &decay).unwrap();

    let mut manifest = ArtifactManifest::new(1);
    for (name, file, sha256) in [
        ("feature_names", "feature_names.json", None),
        ("scaler", "scaler.json", None),
        ("model_weights", "model_weights.json", None),
        ("xgb_model", "trees.bin", Some(xgb_sum)),
        ("decay_model", "decay.json.gz", Some(decay_sum)),
    ] {
        manifest.insert(
            name,
            ArtifactEntry {
                file: file.to_string(),
                sha256,
            },
        );
    }
    manifest.save(dir.path()).unwrap();

    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();
    assert!(estimator.is_present(ModelKind::Xgb));
    assert!(estimator.is_present(ModelKind::Decay));
    assert!(!estimator.is_present(ModelKind::Knn));

    let attrs = RawAttributeSet::new()
        .with("brand", "Dell")
        .with("release_year", 2022)
        .with("ram_desc", "8GB");
    assert_eq!(estimator.predict(&attrs).unwrap().point_estimate, 3463);
}

#[test]
fn test_corrupt_checksum_disables_model() {
    let dir = model_dir(&[]);
    let mut manifest = ArtifactManifest::new(1);
    for name in ["feature_names", "scaler", "model_weights", "xgb_model", "decay_model"] {
        manifest.insert(
            name,
            ArtifactEntry {
                file: format!("{}.json", name),
                sha256: None,
            },
        );
    }
    manifest.insert(
        "knn_model",
        ArtifactEntry {
            file: "knn_model.json".to_string(),
            sha256: Some("0".repeat(64)),
        },
    );
    manifest.save(dir.path()).unwrap();

    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();
    assert!(!estimator.is_present(ModelKind::Knn));
    assert!(estimator.warnings().iter().any(|w| w.contains("checksum")));
}

#[test]
fn test_batch_matches_sequential() {
    let dir = model_dir(&[]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    let batch: Vec<RawAttributeSet> = (0..40)
        .map(|i| {
            RawAttributeSet::new()
                .with("brand", if i % 2 == 0 { "Dell" } else { "Lenovo" })
                .with("cpu_score", 2000 + i * 250)
                .with("release_year", 2015 + (i % 9))
                .with("ram_desc", format!("{}GB", 4 << (i % 4)))
        })
        .collect();

    let parallel = estimator.estimate_batch(&batch);
    for (attrs, result) in batch.iter().zip(parallel) {
        assert_eq!(result.unwrap().result, estimator.predict(attrs).unwrap());
    }
}

#[test]
fn test_json_output_shape() {
    let dir = model_dir(&[]);
    let estimator = PriceEstimator::open(dir.path(), config()).unwrap();

    let estimate = estimator
        .estimate_json(json!({"description": "戴尔 XPS 16GB 512G SSD RTX3050 2021年"}))
        .unwrap();
    let value = serde_json::to_value(&estimate).unwrap();
    for field in ["predicted_price", "price_range_low", "price_range_high", "price_range_str"] {
        assert!(value.get(field).is_some(), "missing {}", field);
    }
    assert!(estimate.result.range_high >= estimate.result.range_low + 50);
}

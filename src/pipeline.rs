//! Inference pipeline
//!
//! Ties extraction, alignment, sub-model evaluation and blending together
//! behind a single read-only [`PriceEstimator`].

use lapprice_core::{current_year, Error, ExtractionDefaults, ModelKind, RawAttributeSet, Result, TextExtractor};
use lapprice_ensemble::{
    resolve_weights, Blender, EnsembleWeights, ExplainedEstimate, ModelArtifact, PredictionResult,
    PricingPolicy, Regressor, SubModelSpec,
};
use lapprice_schema::{AlignerBuilder, FeatureAligner, FeatureSchema, ScalingParameters, SchemaError};
use lapprice_storage::{ArtifactStore, LoadedArtifacts};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime configuration of the estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub pricing: PricingPolicy,
    pub extraction: ExtractionDefaults,
    /// Year ages are computed against; the current year when unset
    pub reference_year: Option<i32>,
    /// Used when the model directory has no weights artifact
    pub fallback_weights: EnsembleWeights,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            extraction: ExtractionDefaults::default(),
            reference_year: None,
            fallback_weights: EnsembleWeights::default(),
        }
    }
}

/// A loaded sub-model and the schema positions it reads
#[derive(Debug)]
struct ActiveModel {
    kind: ModelKind,
    indices: Vec<usize>,
    regressor: Box<dyn Regressor>,
}

/// Serves price estimates from a fixed set of trained artifacts.
///
/// Immutable after construction; share it across threads behind an `Arc`.
#[derive(Debug)]
pub struct PriceEstimator {
    aligner: FeatureAligner,
    extractor: TextExtractor,
    blender: Blender,
    models: Vec<ActiveModel>,
    specs: Vec<SubModelSpec>,
    weights: EnsembleWeights,
    /// Degradations found at startup, repeated on every result
    warnings: Vec<String>,
}

impl PriceEstimator {
    /// Load every artifact from a model directory
    pub fn open<P: AsRef<Path>>(dir: P, config: EstimatorConfig) -> Result<Self> {
        let store = ArtifactStore::open(dir).map_err(|e| Error::SchemaUnavailable(format!("{:#}", e)))?;
        Self::from_artifacts(store.load_all()?, config)
    }

    pub fn from_artifacts(artifacts: LoadedArtifacts, config: EstimatorConfig) -> Result<Self> {
        let mut builder = EstimatorBuilder::new(artifacts.schema)
            .config(config)
            .scaling(artifacts.scaling)
            .weights(artifacts.weights);
        for artifact in artifacts.models.into_values() {
            builder = builder.model(artifact);
        }
        for (kind, reason) in artifacts.model_errors {
            builder = builder.absent(kind, reason);
        }
        builder.build()
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.aligner.schema()
    }

    pub fn aligner(&self) -> &FeatureAligner {
        &self.aligner
    }

    /// Weights after zeroing absent sub-models and renormalizing
    pub fn weights(&self) -> &EnsembleWeights {
        &self.weights
    }

    pub fn specs(&self) -> &[SubModelSpec] {
        &self.specs
    }

    pub fn is_present(&self, kind: ModelKind) -> bool {
        self.specs.iter().any(|s| s.kind == kind && s.present)
    }

    pub fn has_scaling(&self) -> bool {
        self.aligner.has_scaling()
    }

    pub fn reference_year(&self) -> i32 {
        self.aligner.reference_year()
    }

    pub fn policy(&self) -> &PricingPolicy {
        self.blender.policy()
    }

    /// Startup degradations reported with every estimate
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Fill gaps in `attrs` from its description, if it has one.
    ///
    /// Explicit values win over extracted ones, which win over the
    /// extractor's defaults. Explicit `null`s count as missing.
    pub fn merge_attributes(&self, attrs: &RawAttributeSet) -> RawAttributeSet {
        match attrs.description() {
            Some(text) => {
                let extracted = self.extractor.extract(text, self.reference_year());
                debug!(matched = ?extracted.matched_keys(), "extracted attributes from description");
                attrs.overlay_on(extracted.attributes())
            }
            None => attrs.clone(),
        }
    }

    /// Estimate a price with its per-model breakdown
    pub fn estimate(&self, attrs: &RawAttributeSet) -> Result<ExplainedEstimate> {
        let merged = self.merge_attributes(attrs);
        let vector = self.aligner.align(&merged);

        let mut warnings = self.warnings.clone();
        let mut predictions = Vec::with_capacity(self.models.len());
        for model in &self.models {
            let features = vector.select(&model.indices)?;
            let prediction = model.regressor.predict(&features)?;
            if prediction.is_finite() {
                debug!(model = %model.kind, prediction, "sub-model prediction");
                predictions.push((model.kind, prediction));
            } else {
                warn!(model = %model.kind, "sub-model returned a non-finite prediction");
                warnings.push(format!("sub-model '{}' excluded: non-finite prediction", model.kind));
            }
        }

        let breakdown = self.blender.blend_explained(&predictions, &self.weights)?;
        Ok(ExplainedEstimate::new(breakdown, vector.is_scaled(), warnings))
    }

    /// Estimate a price
    pub fn predict(&self, attrs: &RawAttributeSet) -> Result<PredictionResult> {
        self.estimate(attrs).map(|e| e.result)
    }

    /// Estimate from a JSON object of attributes
    pub fn estimate_json(&self, value: Value) -> Result<ExplainedEstimate> {
        let attrs = RawAttributeSet::from_value(value)
            .ok_or_else(|| Error::Serialization("attributes must be a JSON object".to_string()))?;
        self.estimate(&attrs)
    }

    /// Estimate many listings in parallel; results keep input order
    pub fn estimate_batch(&self, batch: &[RawAttributeSet]) -> Vec<Result<ExplainedEstimate>> {
        batch.par_iter().map(|attrs| self.estimate(attrs)).collect()
    }
}

/// Builds a [`PriceEstimator`] from already-decoded artifacts
#[derive(Debug)]
pub struct EstimatorBuilder {
    schema: FeatureSchema,
    scaling: Option<ScalingParameters>,
    weights: Option<EnsembleWeights>,
    models: BTreeMap<ModelKind, ModelArtifact>,
    absent: BTreeMap<ModelKind, String>,
    config: EstimatorConfig,
}

impl EstimatorBuilder {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            scaling: None,
            weights: None,
            models: BTreeMap::new(),
            absent: BTreeMap::new(),
            config: EstimatorConfig::default(),
        }
    }

    pub fn config(mut self, config: EstimatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scaling(mut self, scaling: Option<ScalingParameters>) -> Self {
        self.scaling = scaling;
        self
    }

    /// Trained blend weights; the configured fallback is used when `None`
    pub fn weights(mut self, weights: Option<EnsembleWeights>) -> Self {
        self.weights = weights;
        self
    }

    pub fn model(mut self, artifact: ModelArtifact) -> Self {
        self.absent.remove(&artifact.kind());
        self.models.insert(artifact.kind(), artifact);
        self
    }

    /// Record why a sub-model could not be loaded
    pub fn absent(mut self, kind: ModelKind, reason: impl Into<String>) -> Self {
        self.models.remove(&kind);
        self.absent.insert(kind, reason.into());
        self
    }

    pub fn build(mut self) -> Result<PriceEstimator> {
        let EstimatorConfig {
            pricing,
            extraction,
            reference_year,
            fallback_weights,
        } = self.config;
        let reference_year = reference_year.unwrap_or_else(current_year);
        let blender = Blender::new(pricing)?;

        let schema = Arc::new(self.schema);
        let aligner = AlignerBuilder::new(Arc::clone(&schema))
            .scaling(self.scaling.as_ref())
            .reference_year(reference_year)
            .build();

        let mut warnings = Vec::new();
        if !aligner.has_scaling() {
            warnings.push("scaling parameters unavailable: features were not standardized".to_string());
        }

        let mut models = Vec::new();
        let mut specs = Vec::new();
        for kind in ModelKind::ALL {
            let Some(artifact) = self.models.remove(&kind) else {
                let reason = self
                    .absent
                    .remove(&kind)
                    .unwrap_or_else(|| "artifact not provided".to_string());
                warnings.push(format!("sub-model '{}' absent: {}", kind, reason));
                specs.push(SubModelSpec::absent(kind));
                continue;
            };

            match activate(kind, artifact, &schema) {
                Ok((model, features)) => {
                    info!(model = %kind, features = features.len(), "sub-model ready");
                    specs.push(SubModelSpec::present(kind, features));
                    models.push(model);
                }
                Err(reason) => {
                    warn!(model = %kind, %reason, "sub-model disabled");
                    warnings.push(format!("sub-model '{}' absent: {}", kind, reason));
                    specs.push(SubModelSpec::absent(kind));
                }
            }
        }

        let initial = self.weights.unwrap_or(fallback_weights);
        let weights = resolve_weights(&initial, &specs)?;
        info!(?weights, present = models.len(), "ensemble weights resolved");

        Ok(PriceEstimator {
            aligner,
            extractor: TextExtractor::new(extraction),
            blender,
            models,
            specs,
            weights,
            warnings,
        })
    }
}

/// Resolve a sub-model's columns against the schema and validate it
fn activate(
    kind: ModelKind,
    artifact: ModelArtifact,
    schema: &FeatureSchema,
) -> std::result::Result<(ActiveModel, Vec<String>), String> {
    let features = artifact.features(schema.columns());
    let indices = schema.indices_of(&features).map_err(|e| match e {
        SchemaError::FeatureNotFound(name) => format!("feature '{}' missing from schema", name),
        other => other.to_string(),
    })?;
    let regressor = artifact
        .into_regressor(indices.len())
        .map_err(|e| e.to_string())?;
    Ok((
        ActiveModel {
            kind,
            indices,
            regressor,
        },
        features,
    ))
}

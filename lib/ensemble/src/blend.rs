//! Weighted blending and price range formatting
//!
//! Combines the point predictions of the sub-models that answered into a
//! single estimate, then widens it into the quoted price range.

use crate::error::EnsembleError;
use crate::explain::{BlendBreakdown, ModelContribution};
use crate::weights::EnsembleWeights;
use lapprice_core::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Absorbs float noise in `p * factor` before flooring/ceiling
const RANGE_EPSILON: f64 = 1e-9;

/// How a blended estimate is turned into a quoted range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    /// Multiplier for the low end of the range
    pub low_factor: f64,
    /// Multiplier for the high end of the range
    pub high_factor: f64,
    /// Floor for the low end of the range
    pub minimum_price: u64,
    /// Smallest allowed gap between the low and high ends
    pub min_span: u64,
    /// Appended to the range label, e.g. "元"
    pub currency_suffix: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            low_factor: 0.85,
            high_factor: 1.15,
            minimum_price: 50,
            min_span: 50,
            currency_suffix: String::new(),
        }
    }
}

impl PricingPolicy {
    pub fn validate(&self) -> Result<(), EnsembleError> {
        if !self.low_factor.is_finite() || !self.high_factor.is_finite() {
            return Err(EnsembleError::InvalidPolicy(
                "range factors must be finite".to_string(),
            ));
        }
        if self.low_factor < 0.0 {
            return Err(EnsembleError::InvalidPolicy(format!(
                "low_factor must be non-negative, got {}",
                self.low_factor
            )));
        }
        if self.high_factor < self.low_factor {
            return Err(EnsembleError::InvalidPolicy(format!(
                "high_factor {} is below low_factor {}",
                self.high_factor, self.low_factor
            )));
        }
        Ok(())
    }
}

/// The estimate returned to callers, in integer currency units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "predicted_price")]
    pub point_estimate: u64,
    #[serde(rename = "price_range_low")]
    pub range_low: u64,
    #[serde(rename = "price_range_high")]
    pub range_high: u64,
    #[serde(rename = "price_range_str")]
    pub range_label: String,
}

impl PredictionResult {
    /// Whether `price` falls inside the quoted range, ends included
    pub fn contains(&self, price: f64) -> bool {
        price >= self.range_low as f64 && price <= self.range_high as f64
    }
}

/// Blends sub-model predictions under a [`PricingPolicy`]
#[derive(Debug, Clone, Default)]
pub struct Blender {
    policy: PricingPolicy,
}

impl Blender {
    pub fn new(policy: PricingPolicy) -> Result<Self, EnsembleError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Blend `predictions` under `weights`.
    ///
    /// Models without a prediction, or with a non-finite one, are treated as
    /// absent: their weight is zeroed and the rest renormalized.
    pub fn blend(
        &self,
        predictions: &[(ModelKind, f64)],
        weights: &EnsembleWeights,
    ) -> Result<PredictionResult, EnsembleError> {
        self.blend_explained(predictions, weights).map(|b| b.result)
    }

    /// Same as [`Blender::blend`], also returning each model's contribution
    pub fn blend_explained(
        &self,
        predictions: &[(ModelKind, f64)],
        weights: &EnsembleWeights,
    ) -> Result<BlendBreakdown, EnsembleError> {
        let mut answered: BTreeMap<ModelKind, f64> = BTreeMap::new();
        for &(kind, prediction) in predictions {
            if !prediction.is_finite() {
                warn!(model = %kind, "non-finite prediction excluded from blend");
                continue;
            }
            answered.entry(kind).or_insert(prediction);
        }

        if answered.is_empty() {
            return Err(EnsembleError::NoPrediction);
        }
        // Startup already rejected an empty ensemble, so a zero total here
        // concerns this request only
        let effective = weights
            .renormalized(|kind| answered.contains_key(&kind))
            .map_err(|e| match e {
                EnsembleError::AllModelsAbsent => EnsembleError::NoPrediction,
                other => other,
            })?;

        let contributions: Vec<ModelContribution> = answered
            .iter()
            .map(|(&model, &prediction)| {
                let weight = effective.get(model);
                ModelContribution {
                    model,
                    prediction,
                    weight,
                    contribution: weight * prediction,
                }
            })
            .collect();

        let raw_estimate: f64 = contributions.iter().map(|c| c.contribution).sum();
        let estimate = raw_estimate.max(0.0);
        if raw_estimate < 0.0 {
            debug!(raw_estimate, "negative blended estimate clamped to zero");
        }

        Ok(BlendBreakdown {
            result: self.format(estimate),
            raw_estimate,
            contributions,
        })
    }

    /// Quote a non-negative estimate as a [`PredictionResult`]
    pub fn format(&self, estimate: f64) -> PredictionResult {
        let estimate = if estimate.is_finite() { estimate.max(0.0) } else { 0.0 };
        let (range_low, range_high) = self.price_range(estimate);
        PredictionResult {
            point_estimate: estimate.round() as u64,
            range_low,
            range_high,
            range_label: format!("{}-{}{}", range_low, range_high, self.policy.currency_suffix),
        }
    }

    /// `(low, high)` for a non-negative estimate
    pub fn price_range(&self, estimate: f64) -> (u64, u64) {
        let low = (estimate * self.policy.low_factor + RANGE_EPSILON).floor().max(0.0) as u64;
        let high = (estimate * self.policy.high_factor - RANGE_EPSILON).ceil().max(0.0) as u64;

        let low = low.max(self.policy.minimum_price);
        let high = high.max(low.saturating_add(self.policy.min_span));
        (low, high)
    }
}

/// Blend under the default pricing policy
pub fn blend(
    predictions: &[(ModelKind, f64)],
    weights: &EnsembleWeights,
) -> Result<PredictionResult, EnsembleError> {
    Blender::default().blend(predictions, weights)
}

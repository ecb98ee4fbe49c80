//! Ensemble weights
//!
//! The blend weights of each sub-model, as configured at training time, and
//! the renormalization applied when some sub-models are unavailable.
//! Degradation is resolved once at startup from a list of [`SubModelSpec`];
//! nothing here mutates shared state.

use crate::error::EnsembleError;
use lapprice_core::ModelKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weights used when no weights artifact is available
pub const DEFAULT_WEIGHTS: [(ModelKind, f64); 3] = [
    (ModelKind::Xgb, 0.6),
    (ModelKind::Knn, 0.3),
    (ModelKind::Decay, 0.1),
];

/// Per-sub-model blend weights
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EnsembleWeights {
    weights: BTreeMap<ModelKind, f64>,
}

impl Default for EnsembleWeights {
    fn default() -> Self {
        Self::from_pairs(DEFAULT_WEIGHTS)
    }
}

impl EnsembleWeights {
    pub fn new(weights: BTreeMap<ModelKind, f64>) -> Self {
        Self { weights }
    }

    pub fn from_pairs<I: IntoIterator<Item = (ModelKind, f64)>>(pairs: I) -> Self {
        Self {
            weights: pairs.into_iter().collect(),
        }
    }

    /// Weight of a sub-model; unlisted models weigh 0
    pub fn get(&self, kind: ModelKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, kind: ModelKind, weight: f64) {
        self.weights.insert(kind, weight);
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, f64)> + '_ {
        self.weights.iter().map(|(k, w)| (*k, *w))
    }

    /// Check that every weight is finite and non-negative
    pub fn validate(&self) -> Result<(), EnsembleError> {
        for (&kind, &weight) in &self.weights {
            if !weight.is_finite() {
                return Err(EnsembleError::NonFiniteWeight(kind));
            }
            if weight < 0.0 {
                return Err(EnsembleError::NegativeWeight(kind, weight));
            }
        }
        Ok(())
    }

    /// Zero the weights of absent sub-models and renormalize the rest.
    ///
    /// - active total in `(0, 1)`: every active weight is scaled by `1/total`
    /// - active total `>= 1`: weights are left as they are
    /// - active total `0`: [`EnsembleError::AllModelsAbsent`]
    ///
    /// The returned table lists every known model, absent ones at 0.
    pub fn renormalized<F>(&self, is_present: F) -> Result<EnsembleWeights, EnsembleError>
    where
        F: Fn(ModelKind) -> bool,
    {
        self.validate()?;

        let mut active: BTreeMap<ModelKind, f64> = ModelKind::ALL
            .iter()
            .chain(self.weights.keys())
            .map(|&kind| {
                let weight = if is_present(kind) { self.get(kind) } else { 0.0 };
                (kind, weight)
            })
            .collect();

        let active_sum: f64 = active.values().sum();
        if active_sum <= 0.0 {
            return Err(EnsembleError::AllModelsAbsent);
        }

        if active_sum < 1.0 {
            let scale = 1.0 / active_sum;
            for weight in active.values_mut() {
                *weight *= scale;
            }
        }

        Ok(EnsembleWeights { weights: active })
    }
}

/// A sub-model as resolved at startup
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubModelSpec {
    pub kind: ModelKind,
    /// Columns the sub-model was trained on, drawn from the feature schema
    pub required_features: Vec<String>,
    /// False when the sub-model's artifact could not be loaded
    pub present: bool,
}

impl SubModelSpec {
    pub fn present(kind: ModelKind, required_features: Vec<String>) -> Self {
        Self {
            kind,
            required_features,
            present: true,
        }
    }

    pub fn absent(kind: ModelKind) -> Self {
        Self {
            kind,
            required_features: Vec::new(),
            present: false,
        }
    }
}

/// Renormalize `initial` over the sub-models `specs` marks present
pub fn resolve_weights(
    initial: &EnsembleWeights,
    specs: &[SubModelSpec],
) -> Result<EnsembleWeights, EnsembleError> {
    initial.renormalized(|kind| specs.iter().any(|s| s.kind == kind && s.present))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_present() -> Vec<SubModelSpec> {
        ModelKind::ALL
            .iter()
            .map(|&k| SubModelSpec::present(k, vec!["age".to_string()]))
            .collect()
    }

    #[test]
    fn test_all_present_sums_to_one() {
        let weights = resolve_weights(&EnsembleWeights::default(), &all_present()).unwrap();
        assert!((weights.total() - 1.0).abs() < 1e-9);
        assert!((weights.get(ModelKind::Xgb) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_knn_absent_renormalizes() {
        let mut specs = all_present();
        specs[1] = SubModelSpec::absent(ModelKind::Knn);

        let weights = resolve_weights(&EnsembleWeights::default(), &specs).unwrap();
        assert_eq!(weights.get(ModelKind::Knn), 0.0);
        assert!((weights.total() - 1.0).abs() < 1e-9);
        assert!((weights.get(ModelKind::Xgb) - 0.6 / 0.7).abs() < 1e-9);
        assert!((weights.get(ModelKind::Decay) - 0.1 / 0.7).abs() < 1e-9);
        // ratio between the remaining models is preserved
        let ratio = weights.get(ModelKind::Xgb) / weights.get(ModelKind::Decay);
        assert!((ratio - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_absent_is_error() {
        let specs: Vec<_> = ModelKind::ALL.iter().map(|&k| SubModelSpec::absent(k)).collect();
        assert!(matches!(
            resolve_weights(&EnsembleWeights::default(), &specs),
            Err(EnsembleError::AllModelsAbsent)
        ));
    }

    #[test]
    fn test_present_but_zero_weight_is_error() {
        let weights = EnsembleWeights::from_pairs([(ModelKind::Xgb, 0.0), (ModelKind::Knn, 0.5)]);
        let specs = vec![
            SubModelSpec::present(ModelKind::Xgb, vec![]),
            SubModelSpec::absent(ModelKind::Knn),
        ];
        assert!(matches!(
            resolve_weights(&weights, &specs),
            Err(EnsembleError::AllModelsAbsent)
        ));
    }

    #[test]
    fn test_total_above_one_is_left_alone() {
        let weights = EnsembleWeights::from_pairs([
            (ModelKind::Xgb, 0.9),
            (ModelKind::Knn, 0.6),
            (ModelKind::Decay, 0.2),
        ]);
        let mut specs = all_present();
        specs[2] = SubModelSpec::absent(ModelKind::Decay);

        let resolved = resolve_weights(&weights, &specs).unwrap();
        assert_eq!(resolved.get(ModelKind::Xgb), 0.9);
        assert_eq!(resolved.get(ModelKind::Knn), 0.6);
        assert_eq!(resolved.get(ModelKind::Decay), 0.0);
    }

    #[test]
    fn test_negative_weight_error() {
        let weights = EnsembleWeights::from_pairs([(ModelKind::Knn, -0.5)]);
        assert!(matches!(
            weights.renormalized(|_| true),
            Err(EnsembleError::NegativeWeight(ModelKind::Knn, _))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let json = r#"{"xgb":0.5,"knn":0.25,"decay":0.25}"#;
        let weights: EnsembleWeights = serde_json::from_str(json).unwrap();
        assert_eq!(weights.get(ModelKind::Knn), 0.25);

        let back = serde_json::to_string(&weights).unwrap();
        let parsed: EnsembleWeights = serde_json::from_str(&back).unwrap();
        assert_eq!(weights, parsed);
    }
}

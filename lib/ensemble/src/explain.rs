//! Explainability for blended estimates
//!
//! Shows how much each sub-model contributed to a quoted price.

use crate::blend::PredictionResult;
use lapprice_core::ModelKind;
use serde::Serialize;

/// One sub-model's share of a blended estimate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelContribution {
    pub model: ModelKind,
    /// The sub-model's own point prediction
    pub prediction: f64,
    /// Weight after renormalization over the models that answered
    pub weight: f64,
    /// `weight * prediction`
    pub contribution: f64,
}

/// A blend result before it is returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct BlendBreakdown {
    pub result: PredictionResult,
    /// Weighted sum before clamping at zero
    pub raw_estimate: f64,
    pub contributions: Vec<ModelContribution>,
}

/// An estimate with its per-model breakdown and any degradation warnings
#[derive(Debug, Clone, Serialize)]
pub struct ExplainedEstimate {
    #[serde(flatten)]
    pub result: PredictionResult,
    pub raw_estimate: f64,
    pub contributions: Vec<ModelContribution>,
    /// Whether the feature vector was standardized
    pub scaled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ExplainedEstimate {
    pub fn new(breakdown: BlendBreakdown, scaled: bool, warnings: Vec<String>) -> Self {
        Self {
            result: breakdown.result,
            raw_estimate: breakdown.raw_estimate,
            contributions: breakdown.contributions,
            scaled,
            warnings,
        }
    }

    /// Contribution of a single sub-model, if it answered
    pub fn contribution_of(&self, model: ModelKind) -> Option<&ModelContribution> {
        self.contributions.iter().find(|c| c.model == model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blend::Blender;
    use crate::weights::EnsembleWeights;

    #[test]
    fn test_explained_serializes_flat() {
        let breakdown = Blender::default()
            .blend_explained(
                &[(ModelKind::Xgb, 2000.0), (ModelKind::Knn, 1000.0)],
                &EnsembleWeights::default(),
            )
            .unwrap();
        let explained = ExplainedEstimate::new(breakdown, false, vec!["unscaled".to_string()]);

        let json = serde_json::to_value(&explained).unwrap();
        assert!(json.get("predicted_price").is_some());
        assert_eq!(json["scaled"], false);
        assert_eq!(json["contributions"].as_array().unwrap().len(), 2);
        assert_eq!(json["warnings"][0], "unscaled");

        let knn = explained.contribution_of(ModelKind::Knn).unwrap();
        assert!((knn.weight - 1.0 / 3.0).abs() < 1e-9);
        assert!(explained.contribution_of(ModelKind::Decay).is_none());
    }
}

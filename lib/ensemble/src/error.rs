use lapprice_core::ModelKind;
use thiserror::Error;

/// Errors raised while weighting, evaluating or blending sub-models
#[derive(Debug, Clone, Error)]
pub enum EnsembleError {
    #[error("Sub-model '{0}' has negative weight {1}")]
    NegativeWeight(ModelKind, f64),

    #[error("Sub-model '{0}' has a non-finite weight")]
    NonFiniteWeight(ModelKind),

    #[error("All sub-models absent: total active weight is zero")]
    AllModelsAbsent,

    #[error("No sub-model produced a usable prediction for this listing")]
    NoPrediction,

    #[error("Invalid pricing policy: {0}")]
    InvalidPolicy(String),

    #[error("Sub-model '{model}' is malformed: {reason}")]
    InvalidModel { model: ModelKind, reason: String },

    #[error("Sub-model '{model}' expects {expected} features, got {actual}")]
    InvalidDimension {
        model: ModelKind,
        expected: usize,
        actual: usize,
    },
}

impl From<EnsembleError> for lapprice_core::Error {
    fn from(e: EnsembleError) -> Self {
        match e {
            EnsembleError::AllModelsAbsent => lapprice_core::Error::AllModelsAbsent,
            EnsembleError::NoPrediction => lapprice_core::Error::NoPrediction,
            EnsembleError::InvalidDimension { expected, actual, .. } => {
                lapprice_core::Error::InvalidDimension { expected, actual }
            }
            EnsembleError::InvalidModel { model, reason } => lapprice_core::Error::Model {
                model: model.to_string(),
                reason,
            },
            other => lapprice_core::Error::InvalidConfig(other.to_string()),
        }
    }
}

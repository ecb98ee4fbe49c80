use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a sub-model blended into the final estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Gradient-boosted regression trees
    Xgb,
    /// Distance-weighted k-nearest-neighbour regressor
    Knn,
    /// Linear model over the age decay features
    Decay,
}

impl ModelKind {
    /// All known sub-models, in blending order
    pub const ALL: [ModelKind; 3] = [ModelKind::Xgb, ModelKind::Knn, ModelKind::Decay];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Xgb => "xgb",
            ModelKind::Knn => "knn",
            ModelKind::Decay => "decay",
        }
    }

    /// Base name of the artifact holding this model's parameters
    pub fn artifact_name(&self) -> &'static str {
        match self {
            ModelKind::Xgb => "xgb_model",
            ModelKind::Knn => "knn_model",
            ModelKind::Decay => "decay_model",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xgb" | "xgboost" => Ok(ModelKind::Xgb),
            "knn" => Ok(ModelKind::Knn),
            "decay" => Ok(ModelKind::Decay),
            other => Err(format!("unknown sub-model '{}'", other)),
        }
    }
}

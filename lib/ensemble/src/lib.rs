//! # lapprice Ensemble
//!
//! Sub-model evaluation and weighted blending for the lapprice estimator.
//!
//! ## Features
//!
//! - **Ensemble Weights**: Per-model weights, renormalized over the models that are present
//! - **Sub-model Evaluators**: Gradient-boosted trees, k-nearest neighbours and a linear decay model
//! - **Blending**: Weighted point estimate, clamped at zero and widened into a price range
//! - **Explainability**: Per-model contribution breakdown for transparency
//!
//! ## Example
//!
//! ```rust
//! use lapprice_ensemble::{Blender, EnsembleWeights, PricingPolicy};
//! use lapprice_core::ModelKind;
//!
//! let blender = Blender::new(PricingPolicy::default()).unwrap();
//! let predictions = [
//!     (ModelKind::Xgb, 1000.0),
//!     (ModelKind::Knn, 1000.0),
//!     (ModelKind::Decay, 1000.0),
//! ];
//!
//! let result = blender.blend(&predictions, &EnsembleWeights::default()).unwrap();
//! assert_eq!(result.range_label, "850-1150");
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Weights    │────>│ Renormalize │────>│  Blender    │
//! │ (artifact)  │     │ (present)   │     │ (Σ w·p)     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                ^
//!                     ┌─────────────┐            │
//!                     │ Regressors  │────────────┘
//!                     │ (per model) │
//!                     └─────────────┘
//! ```

pub mod error;
pub mod weights;
pub mod models;
pub mod blend;
pub mod explain;
pub mod metrics;

// Re-export main types for convenience
pub use error::EnsembleError;
pub use weights::{resolve_weights, EnsembleWeights, SubModelSpec, DEFAULT_WEIGHTS};
pub use models::{
    DecayArtifact,
    KnnArtifact,
    KnnRegressor,
    LinearRegressor,
    ModelArtifact,
    RegressionTree,
    Regressor,
    SplitNode,
    TreeEnsemble,
    TreeNode,
    Weighting,
    XgbArtifact,
};
pub use blend::{blend, Blender, PredictionResult, PricingPolicy};
pub use explain::{BlendBreakdown, ExplainedEstimate, ModelContribution};
pub use metrics::{range_hit_rate, smape, BatchStats};

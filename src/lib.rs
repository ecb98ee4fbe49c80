//! # lapprice
//!
//! Resale price estimation for used laptops.
//!
//! lapprice rebuilds a listing into the exact feature layout its models were
//! trained on, evaluates a gradient-boosted, a nearest-neighbour and an age
//! decay regressor, and blends them into a quoted price range.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! lapprice estimate --models ./models --description "联想拯救者 16G内存 512G固态 2021年"
//! lapprice batch --models ./models --input listings.jsonl
//! lapprice inspect --models ./models
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use lapprice::prelude::*;
//!
//! let estimator = PriceEstimator::open("./models", EstimatorConfig::default()).unwrap();
//!
//! let listing = RawAttributeSet::new()
//!     .with("brand", "Dell")
//!     .with("cpu_score", 8200)
//!     .with("description", "戴尔 16G内存 512G固态");
//!
//! let estimate = estimator.estimate(&listing).unwrap();
//! println!("{}", estimate.result.range_label);
//! ```
//!
//! ## Crate Structure
//!
//! - `lapprice-core` - Attribute sets, description extraction, feature vectors, errors
//! - `lapprice-schema` - Training-schema alignment and scaling
//! - `lapprice-ensemble` - Sub-model evaluators, weight renormalization and blending
//! - `lapprice-storage` - Artifact directory reader (manifest, checksums, encodings)
//!
//! ## Degraded Modes
//!
//! - **Missing sub-model**: its weight is zeroed and the rest renormalized
//! - **Missing scaler**: features are passed unscaled and every result carries a warning
//! - **Missing schema**: fatal, no estimate can be made

pub mod pipeline;

pub use pipeline::{EstimatorBuilder, EstimatorConfig, PriceEstimator};

// Re-export core types
pub use lapprice_core::{
    extract, ExtractedAttributeSet, ExtractionDefaults, FeatureVector, ModelKind,
    RawAttributeSet, TextExtractor,
    Error, Result,
};

// Re-export schema alignment
pub use lapprice_schema::{align, FeatureAligner, FeatureSchema, ScalingParameters};

// Re-export blending
pub use lapprice_ensemble::{
    blend, smape, BatchStats, Blender, EnsembleWeights, ExplainedEstimate, PredictionResult,
    PricingPolicy, SubModelSpec,
};

// Re-export storage
pub use lapprice_storage::{ArtifactStore, LoadedArtifacts};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EstimatorConfig, PriceEstimator,
        RawAttributeSet, ModelKind,
        PredictionResult, ExplainedEstimate, PricingPolicy, EnsembleWeights,
        FeatureSchema, ScalingParameters,
        Error, Result,
    };
}

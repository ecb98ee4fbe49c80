//! # lapprice Schema
//!
//! Training-schema alignment for the lapprice estimator.
//!
//! ## Overview
//!
//! Models are trained on a fixed, ordered set of columns: a handful of
//! numeric features plus one indicator column per categorical value seen in
//! the training data. At serving time only a single, possibly incomplete
//! listing is available, so the vector must be rebuilt by name:
//!
//! 1. Normalize the listing, substituting neutral defaults
//! 2. Derive `age`, `age_factor` and `performance_tier`
//! 3. Encode the record's own columns
//! 4. Reconcile against the [`FeatureSchema`] by column name
//! 5. Standardize with the [`ScalingParameters`]
//!
//! ## Example
//!
//! ```rust
//! use lapprice_schema::{AlignerBuilder, FeatureSchema, ScalingParameters};
//! use lapprice_core::RawAttributeSet;
//! use std::sync::Arc;
//!
//! let schema = FeatureSchema::new(vec![
//!     "cpu_score".to_string(),
//!     "age".to_string(),
//!     "brand_Dell".to_string(),
//! ]).unwrap();
//! let scaling = ScalingParameters::from_pairs([("cpu_score", 5000.0, 2500.0)]);
//!
//! let aligner = AlignerBuilder::new(Arc::new(schema))
//!     .scaling(Some(&scaling))
//!     .reference_year(2024)
//!     .build();
//!
//! let attrs = RawAttributeSet::new().with("brand", "Dell").with("cpu_score", 7500);
//! let vector = aligner.align(&attrs);
//! assert_eq!(vector.as_slice(), &[1.0, 2.0, 1.0]);
//! ```
//!
//! ## Alignment Flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Attributes  │────>│ Normalized  │────>│  Encoded    │
//! │   (JSON)    │     │  listing    │     │  columns    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌──────┴──────┐
//!                     │   Scaled    │<────│ Schema slots│
//!                     │   vector    │     │  (by name)  │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod schema;
pub mod features;
pub mod aligner;

// Re-export main types
pub use schema::{
    FeatureSchema,
    ScalingParameters,
    ResolvedScaling,
    ColumnScale,
    SchemaError,
};
pub use features::{NormalizedListing, PerformanceTier, one_hot_column};
pub use aligner::{align, AlignerBuilder, FeatureAligner};

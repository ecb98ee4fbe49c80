//! # lapprice Core
//!
//! Core types for the lapprice resale estimator.
//!
//! - [`RawAttributeSet`] - listing attributes as received from a caller
//! - [`TextExtractor`] - rule-based attribute extraction from descriptions
//! - [`FeatureVector`] - a training-compatible, schema-ordered feature vector
//! - [`ModelKind`] - identity of each blended sub-model
//! - [`Error`] - the error type shared across the workspace
//!
//! ## Example
//!
//! ```rust
//! use lapprice_core::{extract, RawAttributeSet};
//!
//! let explicit = RawAttributeSet::new()
//!     .with("description", "联想 8G内存")
//!     .with("brand", "Dell");
//!
//! let extracted = extract(explicit.description().unwrap(), 2024);
//! let merged = explicit.overlay_on(extracted.attributes());
//!
//! assert_eq!(merged.text("brand").as_deref(), Some("Dell"));
//! assert_eq!(merged.text("ram_desc").as_deref(), Some("8GB"));
//! ```

pub mod attributes;
pub mod error;
pub mod extract;
pub mod model;
pub mod vector;

pub use attributes::{coerce_number, coerce_text, keys, RawAttributeSet};
pub use error::{Error, Result};
pub use extract::{extract, parse_ram_gb, ExtractedAttributeSet, ExtractionDefaults, TextExtractor};
pub use model::ModelKind;
pub use vector::{l2_distance, FeatureVector};

use chrono::Datelike;

/// The current calendar year in local time
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}

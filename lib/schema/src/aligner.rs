//! Feature Aligner
//!
//! Converts a listing's attributes into a vector with exactly the columns,
//! order and scaling the models were trained with.

use crate::features::NormalizedListing;
use crate::schema::{FeatureSchema, ResolvedScaling, ScalingParameters};
use lapprice_core::{current_year, FeatureVector, RawAttributeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Aligns raw attributes to a training-time feature schema
#[derive(Debug, Clone)]
pub struct FeatureAligner {
    schema: Arc<FeatureSchema>,
    scaling: Option<ResolvedScaling>,
    reference_year: i32,
}

impl FeatureAligner {
    /// Create an aligner; `scaling` of `None` means the scaler artifact was
    /// unavailable and vectors are produced unscaled
    pub fn new(schema: Arc<FeatureSchema>, scaling: Option<&ScalingParameters>) -> Self {
        AlignerBuilder::new(schema).scaling(scaling).build()
    }

    /// Get a reference to the schema
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn shared_schema(&self) -> Arc<FeatureSchema> {
        Arc::clone(&self.schema)
    }

    pub fn has_scaling(&self) -> bool {
        self.scaling.is_some()
    }

    /// Year that ages and the default release year are computed against
    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Build the schema-ordered feature vector for `attrs`.
    ///
    /// 1. Normalize scalars and categoricals, substituting defaults
    /// 2. Encode the record's own columns
    /// 3. Copy every encoded column the schema names into its slot
    /// 4. Standardize the columns that have scaling parameters
    ///
    /// Encoded columns the schema does not name (an unseen category value,
    /// say) are dropped. Schema columns the record does not produce stay 0.
    pub fn align(&self, attrs: &RawAttributeSet) -> FeatureVector {
        let listing = NormalizedListing::from_attributes(attrs, self.reference_year);
        if !listing.defaulted.is_empty() {
            debug!(fields = ?listing.defaulted, "substituted defaults for missing attributes");
        }

        let mut values = vec![0.0f64; self.schema.len()];
        let mut dropped = 0usize;
        for (column, value) in listing.encode() {
            match self.schema.index_of(&column) {
                Some(position) => values[position] = value,
                None => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!(dropped, "encoded columns absent from schema were dropped");
        }

        let scaled = match &self.scaling {
            Some(scaling) => {
                scaling.apply(&mut values);
                true
            }
            None => {
                debug!("no scaling parameters, feature vector left unscaled");
                false
            }
        };

        // Values beyond f32 range become 0
        let mut overflowed = Vec::new();
        let data = values
            .into_iter()
            .enumerate()
            .map(|(position, v)| {
                let v = v as f32;
                if v.is_finite() {
                    v
                } else {
                    overflowed.push(position);
                    0.0
                }
            })
            .collect();
        if !overflowed.is_empty() {
            let columns: Vec<&str> = overflowed
                .iter()
                .filter_map(|&p| self.schema.columns().get(p).map(String::as_str))
                .collect();
            debug!(?columns, dropped, "non-finite feature values replaced with 0");
        }

        FeatureVector::new(data, scaled)
    }
}

/// Align with a one-off aligner using the current year
pub fn align(
    attrs: &RawAttributeSet,
    schema: &FeatureSchema,
    scaling: Option<&ScalingParameters>,
) -> FeatureVector {
    FeatureAligner::new(Arc::new(schema.clone()), scaling).align(attrs)
}

/// Builder for creating FeatureAligner with custom options
#[derive(Debug, Clone)]
pub struct AlignerBuilder {
    schema: Arc<FeatureSchema>,
    scaling: Option<ResolvedScaling>,
    reference_year: Option<i32>,
}

impl AlignerBuilder {
    pub fn new(schema: Arc<FeatureSchema>) -> Self {
        Self {
            schema,
            scaling: None,
            reference_year: None,
        }
    }

    pub fn scaling(mut self, scaling: Option<&ScalingParameters>) -> Self {
        self.scaling = scaling.map(|params| {
            let (resolved, unknown) = params.resolve(&self.schema);
            if !unknown.is_empty() {
                warn!(columns = ?unknown, "scaling parameters name columns missing from schema");
            }
            resolved
        });
        self
    }

    /// Pin the reference year instead of reading the clock
    pub fn reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn build(self) -> FeatureAligner {
        if self.scaling.is_none() {
            warn!("scaling parameters unavailable, features will be passed unscaled");
        }
        FeatureAligner {
            schema: self.schema,
            scaling: self.scaling,
            reference_year: self.reference_year.unwrap_or_else(current_year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_schema() -> Arc<FeatureSchema> {
        let columns = [
            "release_year",
            "cpu_score",
            "ram_size",
            "age",
            "age_factor",
            "brand_Dell",
            "brand_Lenovo",
            "gpu_type_Integrated",
            "storage_type_SSD",
            "performance_tier_mid",
            "performance_tier_high",
        ];
        Arc::new(FeatureSchema::new(columns.iter().map(|s| s.to_string()).collect()).unwrap())
    }

    fn unscaled(schema: Arc<FeatureSchema>) -> FeatureAligner {
        AlignerBuilder::new(schema).reference_year(2024).build()
    }

    #[test]
    fn test_vector_matches_schema_order() {
        let aligner = unscaled(create_test_schema());
        let attrs = RawAttributeSet::from_value(json!({
            "brand": "Dell",
            "release_year": 2020,
            "cpu_score": 6000,
            "ram_desc": "16GB",
            "gpu_type": "Integrated",
            "storage_type": "SSD"
        }))
        .unwrap();

        let v = aligner.align(&attrs);
        assert_eq!(v.dim(), aligner.schema().len());
        assert!(!v.is_scaled());
        assert_eq!(
            v.as_slice(),
            &[2020.0, 6000.0, 16.0, 4.0, 0.6561, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_key_order_does_not_matter() {
        let aligner = unscaled(create_test_schema());
        let a = RawAttributeSet::new()
            .with("brand", "Lenovo")
            .with("cpu_score", 3000)
            .with("storage_type", "SSD");
        let b = RawAttributeSet::new()
            .with("storage_type", "SSD")
            .with("cpu_score", 3000)
            .with("brand", "Lenovo");

        assert_eq!(aligner.align(&a).as_slice(), aligner.align(&b).as_slice());
    }

    #[test]
    fn test_same_attributes_same_vector() {
        let schema = create_test_schema();
        let scaling = ScalingParameters::from_pairs([("cpu_score", 4000.0, 1500.0), ("age", 3.0, 2.0)]);
        let aligner = AlignerBuilder::new(schema)
            .scaling(Some(&scaling))
            .reference_year(2024)
            .build();
        let attrs = RawAttributeSet::new().with("brand", "Dell").with("cpu_score", 4500.5);

        let v1 = aligner.align(&attrs);
        let v2 = aligner.align(&attrs);
        let bits1: Vec<u32> = v1.as_slice().iter().map(|x| x.to_bits()).collect();
        let bits2: Vec<u32> = v2.as_slice().iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits1, bits2);
    }

    #[test]
    fn test_unseen_category_is_dropped() {
        let aligner = unscaled(create_test_schema());
        let attrs = RawAttributeSet::new().with("brand", "Framework");

        let v = aligner.align(&attrs);
        assert_eq!(v.dim(), 11);
        // neither known brand slot is set
        assert_eq!(v.get(5), Some(0.0));
        assert_eq!(v.get(6), Some(0.0));
    }

    #[test]
    fn test_scaling_applies_to_listed_columns_only() {
        let schema = create_test_schema();
        let scaling = ScalingParameters::from_pairs([
            ("cpu_score", 4000.0, 2000.0),
            ("brand_Dell", 0.5, 0.5),
        ]);
        let aligner = AlignerBuilder::new(schema)
            .scaling(Some(&scaling))
            .reference_year(2024)
            .build();
        let attrs = RawAttributeSet::new().with("cpu_score", 5000).with("brand", "Lenovo");

        let v = aligner.align(&attrs);
        assert!(v.is_scaled());
        assert_eq!(v.get(1), Some(0.5));
        // brand_Dell is absent from the record but still standardized
        assert_eq!(v.get(5), Some(-1.0));
        assert_eq!(v.get(6), Some(1.0));
        // unscaled numeric column keeps its raw value
        assert_eq!(v.get(2), Some(8.0));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let aligner = unscaled(create_test_schema());
        let v = aligner.align(&RawAttributeSet::new());
        assert_eq!(v.get(0), Some(2022.0));
        assert_eq!(v.get(1), Some(3000.0));
        assert_eq!(v.get(2), Some(8.0));
        assert_eq!(v.get(3), Some(2.0));
        assert_eq!(v.get(9), Some(1.0));
        assert!(v.is_finite());
    }

    #[test]
    fn test_out_of_range_values_stay_finite() {
        let aligner = unscaled(create_test_schema());
        let attrs = RawAttributeSet::new()
            .with("cpu_score", 1e39)
            .with("release_year", i64::from(i32::MIN) + 500);
        let v = aligner.align(&attrs);
        assert!(v.is_finite());
        assert_eq!(v.get(1), Some(0.0));
        // ancient listing is fully depreciated, not priced as new
        assert!(v.get(3).unwrap() > 1e9);
        assert_eq!(v.get(4), Some(0.0));
    }

    #[test]
    fn test_free_function_align() {
        let schema = create_test_schema();
        let v = align(&RawAttributeSet::new(), &schema, None);
        assert_eq!(v.dim(), schema.len());
    }
}

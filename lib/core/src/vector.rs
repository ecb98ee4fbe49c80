use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A training-compatible feature vector, index-aligned with the feature schema
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    data: Vec<f32>,
    /// Whether standardization was applied to the numeric columns
    scaled: bool,
}

impl FeatureVector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>, scaled: bool) -> Self {
        Self { data, scaled }
    }

    #[inline]
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            data: vec![0.0; dim],
            scaled: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f32> {
        self.data.get(index).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_scaled(&self) -> bool {
        self.scaled
    }

    /// True when every entry is a finite number
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    /// Gather the entries at `indices`, in that order.
    ///
    /// Sub-models pick their own columns this way, by schema position
    /// resolved from column names at load time.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<f32>> {
        indices
            .iter()
            .map(|&i| {
                self.data.get(i).copied().ok_or(Error::InvalidDimension {
                    expected: i + 1,
                    actual: self.data.len(),
                })
            })
            .collect()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.data
    }
}

/// Euclidean distance between two equally sized slices, accumulated in
/// f64 so it stays finite for any finite input
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

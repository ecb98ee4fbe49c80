//! Offline accuracy checks for blended estimates

use crate::blend::PredictionResult;
use serde::Serialize;

/// Symmetric mean absolute percentage error, in percent.
///
/// Pairs where both values are zero count as a perfect prediction.
/// Returns `None` for empty or mismatched inputs.
pub fn smape(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let total: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (p - a).abs() / denom
            }
        })
        .sum();
    Some(100.0 * total / actual.len() as f64)
}

/// Share of `actual` prices that fall inside their quoted range
pub fn range_hit_rate(actual: &[f64], results: &[PredictionResult]) -> Option<f64> {
    if actual.is_empty() || actual.len() != results.len() {
        return None;
    }
    let hits = actual
        .iter()
        .zip(results)
        .filter(|(&a, r)| r.contains(a))
        .count();
    Some(hits as f64 / actual.len() as f64)
}

/// Accuracy summary over a labelled batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStats {
    pub count: usize,
    pub smape: f64,
    pub range_hit_rate: f64,
}

impl BatchStats {
    pub fn compute(actual: &[f64], results: &[PredictionResult]) -> Option<Self> {
        let predicted: Vec<f64> = results.iter().map(|r| r.point_estimate as f64).collect();
        Some(Self {
            count: actual.len(),
            smape: smape(actual, &predicted)?,
            range_hit_rate: range_hit_rate(actual, results)?,
        })
    }
}

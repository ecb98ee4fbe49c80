//! Sub-model evaluators
//!
//! Inference-only versions of the three trained regressors. Each reads a
//! feature subset already selected from the aligned vector by column name.

use crate::error::EnsembleError;
use lapprice_core::{l2_distance, ModelKind};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A trained point-prediction model
pub trait Regressor: Send + Sync + fmt::Debug {
    fn kind(&self) -> ModelKind;

    /// Width of the feature subset this model reads
    fn n_features(&self) -> usize;

    /// Predict from a feature subset of width [`Regressor::n_features`]
    fn predict(&self, features: &[f32]) -> Result<f64, EnsembleError>;
}

fn check_width(model: ModelKind, expected: usize, features: &[f32]) -> Result<(), EnsembleError> {
    if features.len() != expected {
        return Err(EnsembleError::InvalidDimension {
            model,
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

fn invalid(model: ModelKind, reason: impl Into<String>) -> EnsembleError {
    EnsembleError::InvalidModel {
        model,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Gradient-boosted trees
// ---------------------------------------------------------------------------

/// Internal split of a regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitNode {
    /// Position within the model's feature subset
    pub feature: usize,
    pub threshold: f32,
    pub left: usize,
    pub right: usize,
    /// Branch taken when the feature is NaN
    #[serde(default)]
    pub missing_left: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeNode {
    Split(SplitNode),
    Leaf(f64),
}

/// A single regression tree stored as a flat node array, root at 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Children must come after their parent, which rules out cycles
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split(split) = node {
                if split.feature >= n_features {
                    return Err(format!(
                        "node {} splits on feature {} of {}",
                        i, split.feature, n_features
                    ));
                }
                for child in [split.left, split.right] {
                    if child <= i || child >= self.nodes.len() {
                        return Err(format!("node {} has invalid child {}", i, child));
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf_value(&self, features: &[f32]) -> f64 {
        let mut i = 0;
        loop {
            match &self.nodes[i] {
                TreeNode::Leaf(value) => return *value,
                TreeNode::Split(split) => {
                    let x = features[split.feature];
                    let go_left = if x.is_nan() {
                        split.missing_left
                    } else {
                        x < split.threshold
                    };
                    i = if go_left { split.left } else { split.right };
                }
            }
        }
    }
}

/// Stored form of the gradient-boosted model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XgbArtifact {
    /// Columns the trees index into; the full schema when absent
    #[serde(default)]
    pub features: Option<Vec<String>>,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<RegressionTree>,
}

/// Additive tree ensemble: `base_score + Σ leaf(tree)`
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    base_score: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl TreeEnsemble {
    pub fn new(
        base_score: f64,
        trees: Vec<RegressionTree>,
        n_features: usize,
    ) -> Result<Self, EnsembleError> {
        if !base_score.is_finite() {
            return Err(invalid(ModelKind::Xgb, "base_score is not finite"));
        }
        for (t, tree) in trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|reason| invalid(ModelKind::Xgb, format!("tree {}: {}", t, reason)))?;
        }
        Ok(Self {
            base_score,
            trees,
            n_features,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for TreeEnsemble {
    fn kind(&self) -> ModelKind {
        ModelKind::Xgb
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f32]) -> Result<f64, EnsembleError> {
        check_width(ModelKind::Xgb, self.n_features, features)?;
        Ok(self.base_score + self.trees.iter().map(|t| t.leaf_value(features)).sum::<f64>())
    }
}

// ---------------------------------------------------------------------------
// Nearest neighbours
// ---------------------------------------------------------------------------

/// Neighbour weighting scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Inverse distance
    #[default]
    Distance,
    Uniform,
}

/// Stored form of the nearest-neighbour model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnArtifact {
    pub features: Vec<String>,
    pub k: usize,
    #[serde(default)]
    pub weighting: Weighting,
    /// Training points, already scaled like the serving vector
    pub points: Vec<Vec<f32>>,
    pub targets: Vec<f64>,
}

/// k-nearest-neighbour regressor over the training points
#[derive(Debug, Clone)]
pub struct KnnRegressor {
    k: usize,
    weighting: Weighting,
    points: Vec<Vec<f32>>,
    targets: Vec<f64>,
    n_features: usize,
}

impl KnnRegressor {
    pub fn new(
        k: usize,
        weighting: Weighting,
        points: Vec<Vec<f32>>,
        targets: Vec<f64>,
        n_features: usize,
    ) -> Result<Self, EnsembleError> {
        if k == 0 {
            return Err(invalid(ModelKind::Knn, "k must be at least 1"));
        }
        if points.is_empty() {
            return Err(invalid(ModelKind::Knn, "no training points"));
        }
        if points.len() != targets.len() {
            return Err(invalid(
                ModelKind::Knn,
                format!("{} points but {} targets", points.len(), targets.len()),
            ));
        }
        if let Some(bad) = points.iter().position(|p| p.len() != n_features) {
            return Err(invalid(
                ModelKind::Knn,
                format!("point {} has {} features, expected {}", bad, points[bad].len(), n_features),
            ));
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(invalid(ModelKind::Knn, "non-finite target"));
        }
        Ok(Self {
            k,
            weighting,
            points,
            targets,
            n_features,
        })
    }

    /// Indices and distances of the `k` closest points, nearest first.
    /// Equal distances keep training order.
    fn neighbours(&self, query: &[f32]) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(OrderedFloat<f64>, usize)> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (OrderedFloat(l2_distance(query, p)), i))
            .collect();
        let k = self.k.min(ranked.len());
        if k < ranked.len() {
            ranked.select_nth_unstable(k - 1);
            ranked.truncate(k);
        }
        ranked.sort_unstable();
        ranked.into_iter().map(|(d, i)| (i, d.into_inner())).collect()
    }

    fn mean_target(&self, indices: impl Iterator<Item = usize>) -> f64 {
        let (sum, n) = indices.fold((0.0, 0usize), |(s, n), i| (s + self.targets[i], n + 1));
        sum / n as f64
    }
}

impl Regressor for KnnRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::Knn
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f32]) -> Result<f64, EnsembleError> {
        check_width(ModelKind::Knn, self.n_features, features)?;
        let neighbours = self.neighbours(features);

        match self.weighting {
            Weighting::Uniform => Ok(self.mean_target(neighbours.iter().map(|&(i, _)| i))),
            Weighting::Distance => {
                if neighbours.iter().any(|&(_, d)| d == 0.0) {
                    let exact = neighbours.iter().filter(|&&(_, d)| d == 0.0);
                    return Ok(self.mean_target(exact.map(|&(i, _)| i)));
                }
                let (weighted, total) = neighbours.iter().fold((0.0, 0.0), |(s, w), &(i, d)| {
                    let inv = 1.0 / d;
                    (s + inv * self.targets[i], w + inv)
                });
                if total.is_finite() && total > 0.0 {
                    Ok(weighted / total)
                } else {
                    // distances could not be weighed (NaN query)
                    Ok(self.mean_target(neighbours.iter().map(|&(i, _)| i)))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Linear decay
// ---------------------------------------------------------------------------

/// Stored form of the linear decay model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayArtifact {
    pub features: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

/// `intercept + Σ coefficient·x`
#[derive(Debug, Clone)]
pub struct LinearRegressor {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearRegressor {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Result<Self, EnsembleError> {
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(invalid(ModelKind::Decay, "non-finite parameter"));
        }
        Ok(Self {
            intercept,
            coefficients,
        })
    }
}

impl Regressor for LinearRegressor {
    fn kind(&self) -> ModelKind {
        ModelKind::Decay
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f32]) -> Result<f64, EnsembleError> {
        check_width(ModelKind::Decay, self.coefficients.len(), features)?;
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, &x)| c * f64::from(x))
                .sum::<f64>())
    }
}

// ---------------------------------------------------------------------------
// Artifact dispatch
// ---------------------------------------------------------------------------

/// Any sub-model artifact, as decoded from disk
#[derive(Debug, Clone, PartialEq)]
pub enum ModelArtifact {
    Xgb(XgbArtifact),
    Knn(KnnArtifact),
    Decay(DecayArtifact),
}

impl ModelArtifact {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelArtifact::Xgb(_) => ModelKind::Xgb,
            ModelArtifact::Knn(_) => ModelKind::Knn,
            ModelArtifact::Decay(_) => ModelKind::Decay,
        }
    }

    /// Column names the model reads, in order.
    /// Tree models without an explicit list read every schema column.
    pub fn features(&self, schema_columns: &[String]) -> Vec<String> {
        match self {
            ModelArtifact::Xgb(a) => a
                .features
                .clone()
                .unwrap_or_else(|| schema_columns.to_vec()),
            ModelArtifact::Knn(a) => a.features.clone(),
            ModelArtifact::Decay(a) => a.features.clone(),
        }
    }

    /// Check the parameters and build an evaluator reading `n_features` columns
    pub fn into_regressor(self, n_features: usize) -> Result<Box<dyn Regressor>, EnsembleError> {
        match self {
            ModelArtifact::Xgb(a) => Ok(Box::new(TreeEnsemble::new(a.base_score, a.trees, n_features)?)),
            ModelArtifact::Knn(a) => Ok(Box::new(KnnRegressor::new(
                a.k,
                a.weighting,
                a.points,
                a.targets,
                n_features,
            )?)),
            ModelArtifact::Decay(a) => {
                if a.coefficients.len() != n_features {
                    return Err(EnsembleError::InvalidDimension {
                        model: ModelKind::Decay,
                        expected: n_features,
                        actual: a.coefficients.len(),
                    });
                }
                Ok(Box::new(LinearRegressor::new(a.intercept, a.coefficients)?))
            }
        }
    }
}

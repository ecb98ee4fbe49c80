//! Feature schema and scaling parameters
//!
//! The feature schema is the ordered list of columns a model was trained on.
//! It is turned into a name to position table once, at load time, so that
//! per-request alignment is a keyed lookup and never depends on the order
//! in which attributes happened to arrive.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Ordered feature columns fixed at training time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    columns: Vec<String>,
    index: AHashMap<String, usize>,
}

impl FeatureSchema {
    /// Build a schema from training-time column names.
    ///
    /// Column names must be non-empty and unique.
    pub fn new(columns: Vec<String>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::EmptySchema);
        }

        let mut index = AHashMap::with_capacity(columns.len());
        for (position, name) in columns.iter().enumerate() {
            if name.is_empty() {
                return Err(SchemaError::EmptyColumnName(position));
            }
            if index.insert(name.clone(), position).is_some() {
                return Err(SchemaError::DuplicateColumn(name.clone()));
            }
        }

        Ok(Self { columns, index })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in training order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, position: usize) -> Option<&str> {
        self.columns.get(position).map(String::as_str)
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resolve an ordered list of column names to schema positions
    pub fn indices_of<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, SchemaError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.index_of(name)
                    .ok_or_else(|| SchemaError::FeatureNotFound(name.to_string()))
            })
            .collect()
    }
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.columns
    }
}

/// Mean and scale of one standardized column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub mean: f64,
    pub scale: f64,
}

impl ColumnScale {
    /// A zero or non-finite scale is treated as 1.0, the convention for
    /// constant columns
    pub fn new(mean: f64, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale != 0.0 { scale } else { 1.0 };
        let mean = if mean.is_finite() { mean } else { 0.0 };
        Self { mean, scale }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Per-column standardization parameters fitted at training time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ScalingData", into = "ScalingData")]
pub struct ScalingParameters {
    columns: Vec<String>,
    scales: Vec<ColumnScale>,
}

#[derive(Serialize, Deserialize)]
struct ScalingData {
    columns: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl ScalingParameters {
    pub fn new(columns: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, SchemaError> {
        if columns.len() != mean.len() || columns.len() != scale.len() {
            return Err(SchemaError::ScalingLengthMismatch {
                columns: columns.len(),
                mean: mean.len(),
                scale: scale.len(),
            });
        }
        let scales = mean
            .into_iter()
            .zip(scale)
            .map(|(m, s)| ColumnScale::new(m, s))
            .collect();
        Ok(Self { columns, scales })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: Into<String>,
    {
        let (columns, scales) = pairs
            .into_iter()
            .map(|(name, mean, scale)| (name.into(), ColumnScale::new(mean, scale)))
            .unzip();
        Self { columns, scales }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<ColumnScale> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.scales[i])
    }

    /// Lay the parameters out by schema position.
    ///
    /// Columns the schema does not know are reported back and otherwise
    /// ignored.
    pub fn resolve(&self, schema: &FeatureSchema) -> (ResolvedScaling, Vec<String>) {
        let mut by_position = vec![None; schema.len()];
        let mut unknown = Vec::new();
        for (name, scale) in self.columns.iter().zip(&self.scales) {
            match schema.index_of(name) {
                Some(position) => by_position[position] = Some(*scale),
                None => unknown.push(name.clone()),
            }
        }
        (ResolvedScaling { by_position }, unknown)
    }
}

impl TryFrom<ScalingData> for ScalingParameters {
    type Error = SchemaError;

    fn try_from(data: ScalingData) -> Result<Self, Self::Error> {
        Self::new(data.columns, data.mean, data.scale)
    }
}

impl From<ScalingParameters> for ScalingData {
    fn from(params: ScalingParameters) -> Self {
        let (mean, scale) = params.scales.iter().map(|s| (s.mean, s.scale)).unzip();
        Self {
            columns: params.columns,
            mean,
            scale,
        }
    }
}

/// Scaling parameters indexed by schema position
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedScaling {
    by_position: Vec<Option<ColumnScale>>,
}

impl ResolvedScaling {
    pub fn get(&self, position: usize) -> Option<ColumnScale> {
        self.by_position.get(position).copied().flatten()
    }

    /// Number of schema columns that will be standardized
    pub fn scaled_columns(&self) -> usize {
        self.by_position.iter().filter(|s| s.is_some()).count()
    }

    /// Standardize `values` in place; `values` is in schema order
    pub fn apply(&self, values: &mut [f64]) {
        for (value, scale) in values.iter_mut().zip(&self.by_position) {
            if let Some(scale) = scale {
                *value = scale.apply(*value);
            }
        }
    }
}

/// Errors raised while building or querying a schema
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    #[error("Schema cannot be empty")]
    EmptySchema,

    #[error("Column at position {0} has an empty name")]
    EmptyColumnName(usize),

    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("Feature '{0}' not found in schema")]
    FeatureNotFound(String),

    #[error("Scaling parameters disagree in length: {columns} columns, {mean} means, {scale} scales")]
    ScalingLengthMismatch {
        columns: usize,
        mean: usize,
        scale: usize,
    },
}

impl From<SchemaError> for lapprice_core::Error {
    fn from(e: SchemaError) -> Self {
        match e {
            SchemaError::FeatureNotFound(name) => lapprice_core::Error::FeatureNotFound(name),
            other => lapprice_core::Error::SchemaUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_schema_creation() {
        let schema = FeatureSchema::new(names(&["cpu_score", "age", "brand_Dell"])).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("age"), Some(1));
        assert_eq!(schema.column(2), Some("brand_Dell"));
        assert!(!schema.contains("brand_Apple"));
    }

    #[test]
    fn test_empty_schema_error() {
        assert!(matches!(FeatureSchema::new(Vec::new()), Err(SchemaError::EmptySchema)));
    }

    #[test]
    fn test_duplicate_and_empty_columns() {
        assert!(matches!(
            FeatureSchema::new(names(&["a", "b", "a"])),
            Err(SchemaError::DuplicateColumn(c)) if c == "a"
        ));
        assert!(matches!(
            FeatureSchema::new(names(&["a", ""])),
            Err(SchemaError::EmptyColumnName(1))
        ));
    }

    #[test]
    fn test_indices_of() {
        let schema = FeatureSchema::new(names(&["a", "b", "c"])).unwrap();
        assert_eq!(schema.indices_of(&["c", "a"]).unwrap(), vec![2, 0]);
        assert!(matches!(
            schema.indices_of(&["a", "zz"]),
            Err(SchemaError::FeatureNotFound(c)) if c == "zz"
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let schema = FeatureSchema::new(names(&["x", "y"])).unwrap();
        let json = serde_json::to_string(&schema).unwrap();
        assert_eq!(json, r#"["x","y"]"#);
        let parsed: FeatureSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, parsed);
        assert_eq!(parsed.index_of("y"), Some(1));

        assert!(serde_json::from_str::<FeatureSchema>(r#"["x","x"]"#).is_err());
    }

    #[test]
    fn test_scaling_resolution() {
        let schema = FeatureSchema::new(names(&["age", "brand_Dell", "cpu_score"])).unwrap();
        let scaling = ScalingParameters::from_pairs([
            ("cpu_score", 5000.0, 2500.0),
            ("age", 3.0, 0.0),
            ("ram_size", 8.0, 4.0),
        ]);

        let (resolved, unknown) = scaling.resolve(&schema);
        assert_eq!(unknown, vec!["ram_size".to_string()]);
        assert_eq!(resolved.scaled_columns(), 2);
        assert!(resolved.get(1).is_none());

        let mut values = vec![5.0, 1.0, 7500.0];
        resolved.apply(&mut values);
        // zero scale is treated as 1.0
        assert_eq!(values, vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_scaling_length_mismatch() {
        let json = r#"{"columns":["a","b"],"mean":[1.0],"scale":[1.0,2.0]}"#;
        assert!(serde_json::from_str::<ScalingParameters>(json).is_err());

        let json = r#"{"columns":["a"],"mean":[1.0],"scale":[2.0]}"#;
        let parsed: ScalingParameters = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.get("a"), Some(ColumnScale { mean: 1.0, scale: 2.0 }));
    }
}

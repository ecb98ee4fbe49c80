//! Listing attributes as received from a request
//!
//! A [`RawAttributeSet`] is a JSON object of whatever the caller sent. Keys
//! the pipeline does not know are carried along and ignored unless the
//! training schema happens to name them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Well-known attribute keys
pub mod keys {
    pub const BRAND: &str = "brand";
    pub const RAM_DESC: &str = "ram_desc";
    pub const RELEASE_YEAR: &str = "release_year";
    pub const CPU_SCORE: &str = "cpu_score";
    pub const GPU_TYPE: &str = "gpu_type";
    pub const STORAGE_TYPE: &str = "storage_type";
    pub const SCREEN_CONDITION: &str = "screen_condition";
    pub const BATTERY_HEALTH: &str = "battery_health";
    pub const DESCRIPTION: &str = "description";
    pub const CPU_MODEL: &str = "cpu_model";
}

/// Attribute name to value mapping for a single listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributeSet {
    fields: Map<String, Value>,
}

impl RawAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build from a JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// A key counts as supplied when present with a non-null value
    pub fn is_supplied(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(v) if !v.is_null())
    }

    /// The free-text description, if a non-blank string was given
    pub fn description(&self) -> Option<&str> {
        self.fields
            .get(keys::DESCRIPTION)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Whether any field other than the description was supplied
    pub fn has_structured_fields(&self) -> bool {
        self.fields
            .iter()
            .any(|(k, v)| k != keys::DESCRIPTION && !v.is_null())
    }

    /// Numeric view of a field.
    ///
    /// JSON numbers and numeric strings coerce; anything else, including
    /// non-finite values, yields `None`.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(coerce_number)
    }

    /// String view of a field. Null and empty strings yield `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(coerce_text)
    }

    /// Overlay `self` on top of `base`: every supplied key of `self` wins.
    pub fn overlay_on(&self, base: &RawAttributeSet) -> RawAttributeSet {
        let mut merged = base.fields.clone();
        for (key, value) in &self.fields {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            } else {
                merged.entry(key.clone()).or_insert(Value::Null);
            }
        }
        RawAttributeSet { fields: merged }
    }
}

impl From<Map<String, Value>> for RawAttributeSet {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Coerce a JSON value to a finite number
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Coerce a JSON value to a category label
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        _ => None,
    }
}

//! Listing normalization and derived features
//!
//! Turns a raw attribute set into the fixed set of scalar and categorical
//! fields the training pipeline produced, substituting neutral defaults for
//! anything missing or malformed.

use lapprice_core::attributes::keys;
use lapprice_core::{parse_ram_gb, RawAttributeSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CPU benchmark score assumed when none is given
pub const DEFAULT_CPU_SCORE: f64 = 3000.0;

/// RAM size in GB assumed when the descriptor is missing or unparseable
pub const DEFAULT_RAM_GB: f64 = 8.0;

/// A missing release year is taken as this many years before the reference year
pub const RELEASE_YEAR_LAG: i32 = 2;

/// Yearly depreciation multiplier behind `age_factor`
pub const AGE_DECAY_BASE: f64 = 0.9;

/// Left-closed bucket boundaries for `performance_tier`
pub const TIER_BOUNDARIES: [f64; 3] = [2000.0, 5000.0, 10000.0];

/// Categorical fields one-hot encoded by the training pipeline, in order
pub const CATEGORICAL_FIELDS: [&str; 6] = [
    keys::BRAND,
    keys::GPU_TYPE,
    keys::STORAGE_TYPE,
    keys::SCREEN_CONDITION,
    keys::BATTERY_HEALTH,
    PERFORMANCE_TIER,
];

pub const PERFORMANCE_TIER: &str = "performance_tier";
pub const RAM_SIZE: &str = "ram_size";
pub const AGE: &str = "age";
pub const AGE_FACTOR: &str = "age_factor";

/// Placeholder for absent categorical values
pub const UNKNOWN: &str = "Unknown";

/// CPU performance bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceTier {
    Low,
    Mid,
    High,
    VeryHigh,
}

impl PerformanceTier {
    /// Bucket a CPU score: `< 2000` low, `[2000, 5000)` mid,
    /// `[5000, 10000)` high, `>= 10000` very high
    pub fn from_cpu_score(score: f64) -> Self {
        let [low_mid, mid_high, high_very] = TIER_BOUNDARIES;
        if score < low_mid {
            PerformanceTier::Low
        } else if score < mid_high {
            PerformanceTier::Mid
        } else if score < high_very {
            PerformanceTier::High
        } else {
            PerformanceTier::VeryHigh
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::Low => "low",
            PerformanceTier::Mid => "mid",
            PerformanceTier::High => "high",
            PerformanceTier::VeryHigh => "very_high",
        }
    }
}

/// Years since release, never negative
#[inline]
pub fn age(reference_year: i32, release_year: i32) -> i32 {
    reference_year.saturating_sub(release_year).max(0)
}

/// Exponential depreciation prior: `0.9^age`
#[inline]
pub fn age_factor(age: i32) -> f64 {
    AGE_DECAY_BASE.powi(age)
}

/// RAM in GB from a descriptor value: numbers are taken as-is (truncated),
/// strings are parsed as `<n> G...`
pub fn ram_size(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(f64::trunc),
        Value::String(s) => parse_ram_gb(s).map(f64::from),
        _ => None,
    }
}

/// A listing reduced to the fields the training pipeline understood
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedListing {
    pub release_year: i32,
    pub cpu_score: f64,
    pub ram_size: f64,
    pub age: i32,
    pub age_factor: f64,
    pub performance_tier: PerformanceTier,
    /// `(field, value)` for every entry of [`CATEGORICAL_FIELDS`]
    pub categoricals: Vec<(&'static str, String)>,
    /// Other numeric attributes passed through under their own names
    pub passthrough: Vec<(String, f64)>,
    /// Fields that fell back to a default
    pub defaulted: Vec<&'static str>,
}

impl NormalizedListing {
    pub fn from_attributes(attrs: &RawAttributeSet, reference_year: i32) -> Self {
        let mut defaulted = Vec::new();

        let release_year = match attrs.number(keys::RELEASE_YEAR) {
            Some(year) if year >= i32::MIN as f64 && year <= i32::MAX as f64 => year.trunc() as i32,
            _ => {
                defaulted.push(keys::RELEASE_YEAR);
                reference_year.saturating_sub(RELEASE_YEAR_LAG)
            }
        };

        let cpu_score = attrs.number(keys::CPU_SCORE).unwrap_or_else(|| {
            defaulted.push(keys::CPU_SCORE);
            DEFAULT_CPU_SCORE
        });

        let ram_size = ram_size(attrs.get(keys::RAM_DESC)).unwrap_or_else(|| {
            defaulted.push(keys::RAM_DESC);
            DEFAULT_RAM_GB
        });

        let age = age(reference_year, release_year);
        let performance_tier = PerformanceTier::from_cpu_score(cpu_score);

        let categoricals = CATEGORICAL_FIELDS
            .iter()
            .map(|&field| {
                let value = if field == PERFORMANCE_TIER {
                    performance_tier.as_str().to_string()
                } else {
                    attrs.text(field).unwrap_or_else(|| {
                        defaulted.push(field);
                        UNKNOWN.to_string()
                    })
                };
                (field, value)
            })
            .collect();

        let passthrough = attrs
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .filter_map(|(key, value)| match value {
                Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(|v| (key.clone(), v)),
                _ => None,
            })
            .collect();

        Self {
            release_year,
            cpu_score,
            ram_size,
            age,
            age_factor: age_factor(age),
            performance_tier,
            categoricals,
            passthrough,
            defaulted,
        }
    }

    /// The record's own one-hot encoding: numeric columns plus one
    /// `<field>_<value>` indicator per categorical field.
    ///
    /// This only knows the values present in this record, not the training
    /// vocabulary; reconciling against the schema happens afterwards.
    pub fn encode(&self) -> Vec<(String, f64)> {
        let mut columns = Vec::with_capacity(5 + self.categoricals.len() + self.passthrough.len());
        columns.push((keys::RELEASE_YEAR.to_string(), f64::from(self.release_year)));
        columns.push((keys::CPU_SCORE.to_string(), self.cpu_score));
        columns.push((RAM_SIZE.to_string(), self.ram_size));
        columns.push((AGE.to_string(), f64::from(self.age)));
        columns.push((AGE_FACTOR.to_string(), self.age_factor));
        columns.extend(self.passthrough.iter().cloned());
        columns.extend(
            self.categoricals
                .iter()
                .map(|(field, value)| (one_hot_column(field, value), 1.0)),
        );
        columns
    }
}

/// Indicator column name for a categorical value
pub fn one_hot_column(field: &str, value: &str) -> String {
    format!("{}_{}", field, value)
}

/// Keys whose values are either derived here or never numeric features
fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        keys::RELEASE_YEAR
            | keys::CPU_SCORE
            | keys::RAM_DESC
            | keys::DESCRIPTION
            | keys::CPU_MODEL
            | RAM_SIZE
            | AGE
            | AGE_FACTOR
    ) || CATEGORICAL_FIELDS.contains(&key)
}

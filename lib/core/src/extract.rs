//! Description extractor
//!
//! Best-effort parsing of a free-text listing into structured attributes.
//! Each rule is independent and fills one field on a match; fields no rule
//! resolves get a fixed default. Extraction never fails.

use crate::attributes::{keys, RawAttributeSet};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// `<n>G` / `<n>GB` with an explicit memory marker after it
static RAM_WITH_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*GB?\s*(?:内存|运行内存|RAM)").expect("valid RAM marker pattern")
});

static RAM_GENERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*GB?").expect("valid RAM pattern"));

static CPU_MODEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(i[3579]\s?-\s?\d{4,5}[a-z]*)").expect("valid CPU model pattern")
});

static RELEASE_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:(20\d{2})\s*(?:年|款))|(?:year\s*(20\d{2}))").expect("valid year pattern")
});

static DEDICATED_GPU: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:rtx|gtx|radeon\s*rx|独显|独立显卡)").expect("valid GPU pattern")
});

static SSD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:ssd|固态)").expect("valid SSD pattern"));

static HDD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:hdd|机械硬盘|机械)").expect("valid HDD pattern"));

/// Brand keywords, checked in order; the first hit wins
const BRAND_KEYWORDS: &[(&[&str], &str)] = &[
    (&["联想"], "Lenovo"),
    (&["戴尔"], "Dell"),
    (&["苹果", "MacBook", "Macbook", "macbook"], "Apple"),
    (&["ThinkPad", "Thinkpad", "Lenovo", "拯救者", "小新"], "Lenovo"),
    (&["Dell", "XPS", "外星人", "Alienware"], "Dell"),
    (&["华为", "Huawei", "HUAWEI", "MateBook"], "Huawei"),
    (&["华硕", "ASUS", "Asus"], "ASUS"),
    (&["惠普", "HP ", "Pavilion", "EliteBook"], "HP"),
    (&["小米", "Xiaomi", "RedmiBook"], "Xiaomi"),
    (&["宏碁", "Acer"], "Acer"),
    (&["微软", "Surface"], "Microsoft"),
];

/// Parse a RAM descriptor such as `"16GB"` or `"8 g"` into gigabytes
pub fn parse_ram_gb(text: &str) -> Option<u32> {
    static RAM_DESC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(\d+)\s*G").expect("valid RAM descriptor pattern"));

    RAM_DESC
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Fallback values for fields no rule resolves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionDefaults {
    pub brand: String,
    pub ram_desc: String,
    pub storage_type: String,
    pub screen_condition: String,
    pub battery_health: String,
    pub gpu_type: String,
    /// Release year is `reference_year - release_year_lag`
    pub release_year_lag: i32,
    pub cpu_score: f64,
}

impl Default for ExtractionDefaults {
    fn default() -> Self {
        Self {
            brand: "Other".to_string(),
            ram_desc: "Unknown".to_string(),
            storage_type: "Unknown".to_string(),
            screen_condition: "Good".to_string(),
            battery_health: "Good".to_string(),
            gpu_type: "Integrated".to_string(),
            release_year_lag: 2,
            cpu_score: 3000.0,
        }
    }
}

/// Attributes pulled out of a description
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedAttributeSet {
    attributes: RawAttributeSet,
    defaulted: BTreeSet<&'static str>,
}

impl ExtractedAttributeSet {
    pub fn attributes(&self) -> &RawAttributeSet {
        &self.attributes
    }

    pub fn into_attributes(self) -> RawAttributeSet {
        self.attributes
    }

    /// Whether `key` holds a fallback rather than a matched value
    pub fn is_defaulted(&self, key: &str) -> bool {
        self.defaulted.contains(key)
    }

    /// Keys some rule actually matched
    pub fn matched_keys(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .map(|(k, _)| k.as_str())
            .filter(|k| !self.defaulted.contains(*k))
            .collect()
    }

    fn set(&mut self, key: &'static str, value: impl Into<serde_json::Value>) {
        self.attributes.insert(key, value);
        self.defaulted.remove(key);
    }

    fn set_default(&mut self, key: &'static str, value: impl Into<serde_json::Value>) {
        if self.attributes.get(key).is_none() {
            self.attributes.insert(key, value);
            self.defaulted.insert(key);
        }
    }
}

/// Rule-based description extractor
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    defaults: ExtractionDefaults,
}

impl TextExtractor {
    pub fn new(defaults: ExtractionDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &ExtractionDefaults {
        &self.defaults
    }

    /// Extract attributes from `text`, resolving the release-year default
    /// against `reference_year`
    pub fn extract(&self, text: &str, reference_year: i32) -> ExtractedAttributeSet {
        let mut out = ExtractedAttributeSet::default();

        if let Some(m) = CPU_MODEL.captures(text).and_then(|c| c.get(1)) {
            out.set(keys::CPU_MODEL, m.as_str().to_string());
        }

        if let Some(gb) = extract_ram(text) {
            out.set(keys::RAM_DESC, format!("{}GB", gb));
        }

        if let Some(brand) = extract_brand(text) {
            out.set(keys::BRAND, brand);
        }

        if SSD.is_match(text) {
            out.set(keys::STORAGE_TYPE, "SSD");
        } else if HDD.is_match(text) {
            out.set(keys::STORAGE_TYPE, "HDD");
        }

        if DEDICATED_GPU.is_match(text) {
            out.set(keys::GPU_TYPE, "Dedicated");
        }

        if let Some(year) = extract_year(text, reference_year) {
            out.set(keys::RELEASE_YEAR, year);
        }

        let d = &self.defaults;
        out.set_default(keys::RAM_DESC, d.ram_desc.clone());
        out.set_default(keys::BRAND, d.brand.clone());
        out.set_default(keys::STORAGE_TYPE, d.storage_type.clone());
        out.set_default(keys::SCREEN_CONDITION, d.screen_condition.clone());
        out.set_default(keys::BATTERY_HEALTH, d.battery_health.clone());
        out.set_default(keys::GPU_TYPE, d.gpu_type.clone());
        out.set_default(keys::RELEASE_YEAR, reference_year - d.release_year_lag);
        out.set_default(keys::CPU_SCORE, d.cpu_score);

        out
    }
}

/// Extract with the built-in defaults
pub fn extract(text: &str, reference_year: i32) -> ExtractedAttributeSet {
    TextExtractor::default().extract(text, reference_year)
}

fn extract_ram(text: &str) -> Option<u32> {
    RAM_WITH_MARKER
        .captures(text)
        .or_else(|| RAM_GENERIC.captures(text))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_brand(text: &str) -> Option<&'static str> {
    BRAND_KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| text.contains(w)))
        .map(|(_, brand)| *brand)
}

fn extract_year(text: &str, reference_year: i32) -> Option<i32> {
    RELEASE_YEAR.captures_iter(text).find_map(|c| {
        let year: i32 = c.get(1).or_else(|| c.get(2))?.as_str().parse().ok()?;
        (2000..=reference_year).contains(&year).then_some(year)
    })
}

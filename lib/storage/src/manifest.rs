// Artifact manifest for a trained model directory
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const MANIFEST_FILE: &str = "manifest.json";

pub const FEATURE_NAMES: &str = "feature_names";
pub const SCALER: &str = "scaler";
pub const MODEL_WEIGHTS: &str = "model_weights";

/// Where an artifact lives and what its contents should hash to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Path relative to the model directory
    pub file: String,
    /// Hex SHA-256 of the file contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Index of the artifacts written by one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

impl ArtifactManifest {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            created_at: Some(Utc::now()),
            artifacts: BTreeMap::new(),
        }
    }

    /// Read `manifest.json` from `dir`; `None` when the directory has none
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Option<Self>> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path).with_context(|| format!("reading {:?}", path))?;
        let manifest = serde_json::from_slice(&data)
            .with_context(|| format!("parsing {:?}", path))?;
        Ok(Some(manifest))
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let temp = path.with_extension("tmp");
        fs::write(&temp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ArtifactEntry> {
        self.artifacts.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ArtifactEntry) {
        self.artifacts.insert(name.into(), entry);
    }
}

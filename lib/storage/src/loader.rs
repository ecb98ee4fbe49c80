// Loads the trained artifacts of a model directory
use crate::blob::{checksum, read_artifact, Encoding};
use crate::manifest::{ArtifactManifest, FEATURE_NAMES, MODEL_WEIGHTS, SCALER};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use lapprice_core::{Error, ModelKind};
use lapprice_ensemble::{DecayArtifact, EnsembleWeights, KnnArtifact, ModelArtifact, XgbArtifact};
use lapprice_schema::{FeatureSchema, ScalingParameters};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Artifact file as found on disk, for inspection
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDescription {
    pub name: String,
    pub file: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    pub checksum: String,
}

/// Everything read from a model directory at startup
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub schema: FeatureSchema,
    /// `None` when the scaler artifact is missing
    pub scaling: Option<ScalingParameters>,
    /// `None` when the weights artifact is missing
    pub weights: Option<EnsembleWeights>,
    pub models: BTreeMap<ModelKind, ModelArtifact>,
    /// Why each missing sub-model could not be loaded
    pub model_errors: BTreeMap<ModelKind, String>,
}

/// A model directory, optionally indexed by a manifest
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    manifest: Option<ArtifactManifest>,
}

impl ArtifactStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(anyhow!("model directory {:?} does not exist", dir));
        }
        let manifest = ArtifactManifest::load(&dir)?;
        match &manifest {
            Some(m) => info!(dir = ?dir, version = m.version, "opened model directory with manifest"),
            None => info!(dir = ?dir, "opened model directory without manifest"),
        }
        Ok(Self { dir, manifest })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> Option<&ArtifactManifest> {
        self.manifest.as_ref()
    }

    /// Path and expected checksum of an artifact, if it exists
    fn locate(&self, name: &str) -> Option<(PathBuf, Option<String>)> {
        match &self.manifest {
            Some(manifest) => {
                let entry = manifest.get(name)?;
                let path = self.dir.join(&entry.file);
                path.is_file().then(|| (path, entry.sha256.clone()))
            }
            None => Encoding::SEARCH_ORDER
                .iter()
                .map(|e| self.dir.join(format!("{}.{}", name, e.extension())))
                .find(|p| p.is_file())
                .map(|p| (p, None)),
        }
    }

    /// Decode an artifact; `Ok(None)` when it does not exist
    fn read_optional<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let Some((path, sha256)) = self.locate(name) else {
            return Ok(None);
        };
        debug!(artifact = name, path = ?path, "reading artifact");
        read_artifact(&path, sha256.as_deref())
            .with_context(|| format!("loading artifact '{}'", name))
            .map(Some)
    }

    /// The feature schema; without it no estimate can be made
    pub fn load_schema(&self) -> lapprice_core::Result<FeatureSchema> {
        match self.read_optional::<FeatureSchema>(FEATURE_NAMES) {
            Ok(Some(schema)) => {
                info!(columns = schema.len(), "loaded feature schema");
                Ok(schema)
            }
            Ok(None) => Err(Error::SchemaUnavailable(format!(
                "no '{}' artifact in {:?}",
                FEATURE_NAMES, self.dir
            ))),
            Err(e) => Err(Error::SchemaUnavailable(format!("{:#}", e))),
        }
    }

    /// Scaling parameters. Missing is tolerated, unreadable is not
    pub fn load_scaling(&self) -> lapprice_core::Result<Option<ScalingParameters>> {
        match self.read_optional::<ScalingParameters>(SCALER) {
            Ok(Some(scaling)) => {
                info!(columns = scaling.len(), "loaded scaling parameters");
                Ok(Some(scaling))
            }
            Ok(None) => {
                warn!("no '{}' artifact, features will not be standardized", SCALER);
                Ok(None)
            }
            Err(e) => Err(Error::SchemaUnavailable(format!("{:#}", e))),
        }
    }

    pub fn load_weights(&self) -> lapprice_core::Result<Option<EnsembleWeights>> {
        match self.read_optional::<EnsembleWeights>(MODEL_WEIGHTS) {
            Ok(Some(weights)) => {
                info!(?weights, "loaded ensemble weights");
                Ok(Some(weights))
            }
            Ok(None) => {
                warn!("no '{}' artifact, using default weights", MODEL_WEIGHTS);
                Ok(None)
            }
            Err(e) => Err(Error::Artifact(format!("{:#}", e))),
        }
    }

    /// A sub-model's artifact; `Ok(None)` when it does not exist
    pub fn load_model(&self, kind: ModelKind) -> Result<Option<ModelArtifact>> {
        let name = kind.artifact_name();
        Ok(match kind {
            ModelKind::Xgb => self.read_optional::<XgbArtifact>(name)?.map(ModelArtifact::Xgb),
            ModelKind::Knn => self.read_optional::<KnnArtifact>(name)?.map(ModelArtifact::Knn),
            ModelKind::Decay => self.read_optional::<DecayArtifact>(name)?.map(ModelArtifact::Decay),
        })
    }

    /// Load every artifact. Only the schema, or a corrupt scaler or weights
    /// file, is fatal; a sub-model that fails to load is left out.
    pub fn load_all(&self) -> lapprice_core::Result<LoadedArtifacts> {
        let schema = self.load_schema()?;
        let scaling = self.load_scaling()?;
        let weights = self.load_weights()?;

        let mut models = BTreeMap::new();
        let mut model_errors = BTreeMap::new();
        for kind in ModelKind::ALL {
            match self.load_model(kind) {
                Ok(Some(artifact)) => {
                    info!(model = %kind, "loaded sub-model artifact");
                    models.insert(kind, artifact);
                }
                Ok(None) => {
                    warn!(model = %kind, "sub-model artifact missing, its weight will be zeroed");
                    model_errors.insert(kind, "artifact not found".to_string());
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    warn!(model = %kind, error = %reason, "sub-model artifact failed to load");
                    model_errors.insert(kind, reason);
                }
            }
        }

        Ok(LoadedArtifacts {
            schema,
            scaling,
            weights,
            models,
            model_errors,
        })
    }

    /// Describe every known artifact present in the directory
    pub fn describe(&self) -> Result<Vec<ArtifactDescription>> {
        let names = [FEATURE_NAMES, SCALER, MODEL_WEIGHTS]
            .into_iter()
            .chain(ModelKind::ALL.iter().map(|k| k.artifact_name()));

        let mut descriptions = Vec::new();
        for name in names {
            let Some((path, _)) = self.locate(name) else {
                continue;
            };
            let metadata = fs::metadata(&path)?;
            let data = fs::read(&path)?;
            let modified = metadata
                .modified()
                .ok()
                .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%dT%H:%M:%SZ").to_string());

            descriptions.push(ArtifactDescription {
                name: name.to_string(),
                file: path
                    .strip_prefix(&self.dir)
                    .unwrap_or(&path)
                    .display()
                    .to_string(),
                size: metadata.len(),
                modified,
                checksum: checksum(&data),
            });
        }
        Ok(descriptions)
    }
}

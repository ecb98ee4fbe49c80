pub mod blob;
pub mod manifest;
pub mod loader;

pub use blob::{checksum, read_artifact, write_artifact, BlobError, Encoding};
pub use manifest::{ArtifactEntry, ArtifactManifest, FEATURE_NAMES, MANIFEST_FILE, MODEL_WEIGHTS, SCALER};
pub use loader::{ArtifactDescription, ArtifactStore, LoadedArtifacts};

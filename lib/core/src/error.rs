use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Feature schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("All sub-models absent: no estimate can be produced")]
    AllModelsAbsent,

    /// Every active sub-model failed on one request
    #[error("No sub-model produced a usable prediction for this listing")]
    NoPrediction,

    #[error("Invalid feature dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Feature not found in schema: {0}")]
    FeatureNotFound(String),

    #[error("Sub-model {model} failed: {reason}")]
    Model { model: String, reason: String },

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error means no estimate can be served at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Error::SchemaUnavailable(_) | Error::AllModelsAbsent)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

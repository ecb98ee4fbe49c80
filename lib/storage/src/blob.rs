// Artifact file encodings and checksums
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("unsupported artifact encoding for {0:?}")]
    UnsupportedEncoding(String),

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

/// On-disk encoding, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `.json`
    Json,
    /// `.json.gz`
    GzipJson,
    /// `.bin`
    Bincode,
}

impl Encoding {
    /// Extensions tried, in order, for an artifact without a manifest entry
    pub const SEARCH_ORDER: [Encoding; 3] = [Encoding::Json, Encoding::GzipJson, Encoding::Bincode];

    pub fn from_path(path: &Path) -> Result<Self, BlobError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if name.ends_with(".json.gz") {
            Ok(Encoding::GzipJson)
        } else if name.ends_with(".json") {
            Ok(Encoding::Json)
        } else if name.ends_with(".bin") {
            Ok(Encoding::Bincode)
        } else {
            Err(BlobError::UnsupportedEncoding(name.to_string()))
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
            Encoding::GzipJson => "json.gz",
            Encoding::Bincode => "bin",
        }
    }
}

/// Hex SHA-256 of `bytes`
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Decode an artifact, verifying its checksum first when one is expected
pub fn read_artifact<T: DeserializeOwned>(path: &Path, expected_sha256: Option<&str>) -> Result<T> {
    let encoding = Encoding::from_path(path)?;
    let raw = fs::read(path).with_context(|| format!("reading {:?}", path))?;

    if let Some(expected) = expected_sha256 {
        let actual = checksum(&raw);
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(BlobError::ChecksumMismatch {
                file: path.display().to_string(),
                expected: expected.to_string(),
                actual,
            }
            .into());
        }
    }

    decode(encoding, &raw).with_context(|| format!("decoding {:?}", path))
}

fn decode<T: DeserializeOwned>(encoding: Encoding, raw: &[u8]) -> Result<T> {
    match encoding {
        Encoding::Json => Ok(serde_json::from_slice(raw)?),
        Encoding::GzipJson => {
            let mut json = Vec::new();
            GzDecoder::new(raw).read_to_end(&mut json)?;
            Ok(serde_json::from_slice(&json)?)
        }
        Encoding::Bincode => bincode::deserialize(raw)
            .map_err(|e| anyhow::anyhow!("Serialization error: {}", e)),
    }
}

/// Encode `value` at `path` (temp file + rename) and return its checksum
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<String> {
    let bytes = match Encoding::from_path(path)? {
        Encoding::Json => serde_json::to_vec(value)?,
        Encoding::GzipJson => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&serde_json::to_vec(value)?)?;
            encoder.finish()?
        }
        Encoding::Bincode => bincode::serialize(value)
            .map_err(|e| anyhow::anyhow!("Serialization error: {}", e))?,
    };

    let temp = path.with_extension("tmp");
    fs::write(&temp, &bytes)?;
    fs::rename(&temp, path)?;
    Ok(checksum(&bytes))
}

//! Checksummed Blob Storage
//!
//! Every persisted artifact is wrapped in an envelope that records the file
//! format, the feature layout it was produced with, and a SHA-256 of the
//! payload. Writes go to a sibling temp file and are renamed into place, so
//! a reader sees either the old blob or the new one, never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::logic::features::layout::{layout_hash, validate_layout, LayoutMismatchError, FEATURE_VERSION};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported format version {0}")]
    FormatVersion(u32),

    #[error("checksum mismatch (expected {expected}, got {actual})")]
    Checksum { expected: String, actual: String },

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),
}

impl StorageError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io { path: path.to_path_buf(), source }
    }
}

/// On-disk wrapper; the payload is kept as a JSON string so the checksum
/// covers exactly the bytes that get parsed
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    feature_version: u8,
    layout_hash: u32,
    checksum: String,
    payload: String,
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Serialize `value` into an envelope and write it atomically
pub fn save_blob<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let payload = serde_json::to_string(value)?;
    let envelope = Envelope {
        format_version: FORMAT_VERSION,
        feature_version: FEATURE_VERSION,
        layout_hash: layout_hash(),
        checksum: checksum(payload.as_bytes()),
        payload,
    };
    let bytes = serde_json::to_vec_pretty(&envelope)?;
    write_atomic(path, &bytes)
}

/// Load and verify a blob; `Ok(None)` when the file does not exist
pub fn load_blob<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };
    decode_blob(&bytes).map(Some)
}

/// Verify and decode raw envelope bytes
pub fn decode_blob<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(StorageError::FormatVersion(envelope.format_version));
    }
    validate_layout(envelope.feature_version, envelope.layout_hash)?;

    let actual = checksum(envelope.payload.as_bytes());
    if actual != envelope.checksum {
        return Err(StorageError::Checksum { expected: envelope.checksum, actual });
    }

    Ok(serde_json::from_str(&envelope.payload)?)
}

/// Write to `<path>.tmp`, fsync, rename over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
    }

    let tmp = tmp_path(path);
    {
        let mut file = fs::File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
        file.write_all(bytes).map_err(|e| StorageError::io(&tmp, e))?;
        file.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn test_missing_blob_is_none() {
        let dir = tempdir().unwrap();
        let loaded: Option<Sample> = load_blob(&dir.path().join("nope.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("blob.json");
        let sample = Sample { name: "a".into(), values: vec![1, 2, 3] };

        save_blob(&path, &sample).unwrap();
        let loaded: Sample = load_blob(&path).unwrap().unwrap();
        assert_eq!(loaded, sample);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.json");
        save_blob(&path, &Sample { name: "a".into(), values: vec![1] }).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("[1]", "[2]")).unwrap();

        let result: Result<Option<Sample>, _> = load_blob(&path);
        assert!(matches!(result, Err(StorageError::Checksum { .. })));
    }

    #[test]
    fn test_garbage_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.json");
        fs::write(&path, b"not json").unwrap();
        let result: Result<Option<Sample>, _> = load_blob(&path);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}

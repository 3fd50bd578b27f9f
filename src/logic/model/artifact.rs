//! Batch Model Artifact Storage
//!
//! Exactly one artifact is deployed at a time. It is replaced only by a
//! successful maintenance run, through `ArtifactStore::replace`, which
//! hands back the previous bytes so the caller can roll back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::storage::{self, StorageError};

pub type ArtifactError = StorageError;

/// Versioned snapshot of a trained batch model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchModelArtifact<M> {
    pub version: Uuid,
    pub created_at: DateTime<Utc>,
    /// Vectors the model was fitted on
    pub training_size: usize,
    pub model: M,
}

impl<M> BatchModelArtifact<M> {
    pub fn new(model: M, training_size: usize) -> Self {
        Self {
            version: Uuid::new_v4(),
            created_at: Utc::now(),
            training_size,
            model,
        }
    }
}

/// File-backed home of the deployed artifact
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// `Ok(None)` on cold start; an error means the file exists but is unusable
    pub fn load<M: DeserializeOwned>(&self) -> Result<Option<BatchModelArtifact<M>>, ArtifactError> {
        storage::load_blob(&self.path)
    }

    pub fn save<M: Serialize>(&self, artifact: &BatchModelArtifact<M>) -> Result<(), ArtifactError> {
        storage::save_blob(&self.path, artifact)
    }

    /// Raw bytes of the deployed artifact, if any
    pub fn snapshot(&self) -> Result<Option<Vec<u8>>, ArtifactError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&self.path, e)),
        }
    }

    /// Atomically deploy `artifact`, returning the bytes it replaced
    pub fn replace<M: Serialize>(&self, artifact: &BatchModelArtifact<M>) -> Result<Option<Vec<u8>>, ArtifactError> {
        let previous = self.snapshot()?;
        self.save(artifact)?;
        Ok(previous)
    }

    /// Put back what `replace` returned
    pub fn restore(&self, previous: Option<Vec<u8>>) -> Result<(), ArtifactError> {
        match previous {
            Some(bytes) => storage::write_atomic(&self.path, &bytes),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::io(&self.path, e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::features::FeatureVector;
    use crate::logic::model::{AnomalyDetector, ForestConfig, IsolationForest};
    use tempfile::tempdir;

    fn fitted_forest() -> IsolationForest {
        let pool = vec![
            FeatureVector::new([-1, -1, -1, -1, -1, 1, -1, -1, 0]).unwrap(),
            FeatureVector::new([-1, -1, -1, 1, -1, 1, 0, -1, 0]).unwrap(),
            FeatureVector::new([0, -1, -1, -1, -1, 1, -1, 1, 0]).unwrap(),
        ];
        let mut forest = IsolationForest::new(ForestConfig { n_trees: 10, ..Default::default() });
        forest.fit(&pool).unwrap();
        forest
    }

    #[test]
    fn test_cold_start_is_none() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("anomaly_model.json"));
        let loaded: Option<BatchModelArtifact<IsolationForest>> = store.load().unwrap();
        assert!(loaded.is_none());
        assert!(store.snapshot().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load_forest() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("anomaly_model.json"));
        let artifact = BatchModelArtifact::new(fitted_forest(), 3);
        store.save(&artifact).unwrap();

        let loaded: BatchModelArtifact<IsolationForest> = store.load().unwrap().unwrap();
        assert_eq!(loaded.version, artifact.version);
        assert_eq!(loaded.training_size, 3);

        let probe = FeatureVector::suspicious_default();
        assert_eq!(loaded.model.predict(&probe), artifact.model.predict(&probe));
    }

    #[test]
    fn test_replace_then_restore() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("anomaly_model.json"));
        store.save(&BatchModelArtifact::new(fitted_forest(), 3)).unwrap();
        let before = store.snapshot().unwrap();

        let previous = store.replace(&BatchModelArtifact::new(fitted_forest(), 3)).unwrap();
        assert_ne!(store.snapshot().unwrap(), before);

        store.restore(previous).unwrap();
        assert_eq!(store.snapshot().unwrap(), before);
    }

    #[test]
    fn test_restore_nothing_removes_file() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("anomaly_model.json"));
        let previous = store.replace(&BatchModelArtifact::new(fitted_forest(), 3)).unwrap();
        assert!(previous.is_none());
        store.restore(previous).unwrap();
        assert!(!store.exists());
    }
}

//! Durable storage for fitted models.
//!
//! A snapshot is written as one JSON document. Saving writes a temporary
//! sibling file and renames it over the target, so readers never observe a
//! half-written model.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use stockcast_ai::{FittedLagForecaster, TrainingReport};
use stockcast_core::YearMonth;

/// A fitted model with the metadata of the run that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: Uuid,
    pub trained_at: DateTime<Utc>,
    pub cutoff: YearMonth,
    pub report: TrainingReport,
    pub model: FittedLagForecaster,
}

impl ModelSnapshot {
    /// Wrap a freshly trained model under a new version id.
    pub fn new(model: FittedLagForecaster, report: TrainingReport) -> Self {
        Self {
            version: Uuid::now_v7(),
            trained_at: Utc::now(),
            cutoff: report.cutoff,
            report,
            model,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model file {path} is not a valid model: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("model store unavailable: {0}")]
    Unavailable(String),
}

/// Model persistence abstraction.
pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ModelSnapshot>, ModelStoreError>;

    /// Overwrite the stored model.
    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ModelStoreError>;
}

/// JSON file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "model.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> ModelStoreError {
        ModelStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<ModelSnapshot>, ModelStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(&self.path, e)),
        };
        let snapshot = serde_json::from_str(&raw).map_err(|source| ModelStoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ModelStoreError> {
        let body = serde_json::to_vec(snapshot).map_err(ModelStoreError::Serialize)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error(dir, e))?;
        }

        let tmp = self.temp_path();
        {
            let mut file = fs::File::create(&tmp).map_err(|e| self.io_error(&tmp, e))?;
            file.write_all(&body).map_err(|e| self.io_error(&tmp, e))?;
            file.sync_all().map_err(|e| self.io_error(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(&self.path, e))?;

        debug!(path = %self.path.display(), bytes = body.len(), version = %snapshot.version, "model saved");
        Ok(())
    }
}

/// In-memory model store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryModelStore {
    inner: RwLock<Option<ModelSnapshot>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self) -> Result<Option<ModelSnapshot>, ModelStoreError> {
        self.inner
            .read()
            .map(|s| s.clone())
            .map_err(|_| ModelStoreError::Unavailable("lock poisoned".to_string()))
    }

    fn save(&self, snapshot: &ModelSnapshot) -> Result<(), ModelStoreError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| ModelStoreError::Unavailable("lock poisoned".to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use stockcast_ai::{train, Observation, TrainingConfig};
    use stockcast_core::MaterialId;

    /// A small but real trained snapshot.
    pub(crate) fn trained_snapshot() -> ModelSnapshot {
        let start = YearMonth::new(2024, 1).unwrap();
        let rows: Vec<Observation> = (0..6)
            .map(|i| Observation {
                material_id: MaterialId::new(1),
                year_month: start.plus_months(i),
                demand: 10.0 + i as f64,
            })
            .collect();
        let mut config = TrainingConfig::standard(start.plus_months(5), 1);
        for spec in config.forecaster.estimators.iter_mut() {
            match spec {
                stockcast_ai::EstimatorSpec::ImputedRandomForest(p) => p.n_estimators = 3,
                stockcast_ai::EstimatorSpec::GradientBoosting(p) => p.n_estimators = 3,
            }
        }
        let outcome = train(&rows, &config).unwrap();
        ModelSnapshot::new(outcome.model, outcome.report)
    }

    #[test]
    fn missing_file_means_not_trained() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn saved_model_loads_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("nested").join("model.json"));
        let snapshot = trained_snapshot();

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, snapshot);
        assert!(!store.temp_path().exists());
        assert_eq!(
            loaded.model.forecast(MaterialId::new(1), 3).unwrap(),
            snapshot.model.forecast(MaterialId::new(1), 3).unwrap()
        );
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        fs::write(&path, b"{ not json").unwrap();

        let err = FileModelStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ModelStoreError::Corrupt { .. }));
    }

    #[test]
    fn in_memory_store_round_trips() {
        let store = InMemoryModelStore::new();
        assert!(store.load().unwrap().is_none());
        let snapshot = trained_snapshot();
        store.save(&snapshot).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot));
    }
}

//! Versioned model registry.
//!
//! Readers take a reference-counted snapshot and keep using it for as long as
//! they need, even if a newer model is published meanwhile. Writers must hold
//! a [`TrainingPermit`]; only one exists at a time, so training runs are
//! serialized. Publishing persists first and swaps second: the in-memory model
//! never gets ahead of the stored one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::model_store::{ModelSnapshot, ModelStore, ModelStoreError};

/// Proof of exclusive write access to a [`ModelRegistry`].
#[derive(Debug)]
pub struct TrainingPermit {
    _guard: OwnedMutexGuard<()>,
}

pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    current: RwLock<Option<Arc<ModelSnapshot>>>,
    writer: Arc<Mutex<()>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("version", &self.current().map(|s| s.version))
            .field("generation", &self.generation())
            .finish()
    }
}

impl ModelRegistry {
    /// An empty registry; nothing is read from the store.
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            writer: Arc::new(Mutex::new(())),
            generation: AtomicU64::new(0),
        }
    }

    /// A registry seeded from whatever the store holds. An unreadable model
    /// is logged and treated as "not trained".
    pub fn load(store: Arc<dyn ModelStore>) -> Self {
        let registry = Self::new(store);
        match registry.store.load() {
            Ok(Some(snapshot)) => {
                info!(version = %snapshot.version, cutoff = %snapshot.cutoff, "loaded persisted model");
                registry.swap(Arc::new(snapshot));
            }
            Ok(None) => info!("no persisted model; starting untrained"),
            Err(e) => warn!(error = %e, "persisted model unreadable; starting untrained"),
        }
        registry
    }

    /// The model currently served, if any.
    pub fn current(&self) -> Option<Arc<ModelSnapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of models published through this registry (loads included).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Wait for exclusive write access.
    pub async fn begin_training(&self) -> TrainingPermit {
        TrainingPermit {
            _guard: self.writer.clone().lock_owned().await,
        }
    }

    /// Persist `snapshot` and make it the served model.
    pub fn publish(
        &self,
        _permit: &TrainingPermit,
        snapshot: ModelSnapshot,
    ) -> Result<Arc<ModelSnapshot>, ModelStoreError> {
        self.store.save(&snapshot)?;
        let snapshot = Arc::new(snapshot);
        self.swap(snapshot.clone());
        info!(version = %snapshot.version, cutoff = %snapshot.cutoff, "model published");
        Ok(snapshot)
    }

    fn swap(&self, snapshot: Arc<ModelSnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::model_store::tests::trained_snapshot;
    use crate::model_store::{FileModelStore, InMemoryModelStore};

    struct FailingStore;

    impl ModelStore for FailingStore {
        fn load(&self) -> Result<Option<ModelSnapshot>, ModelStoreError> {
            Err(ModelStoreError::Unavailable("disk gone".to_string()))
        }

        fn save(&self, _snapshot: &ModelSnapshot) -> Result<(), ModelStoreError> {
            Err(ModelStoreError::Unavailable("disk gone".to_string()))
        }
    }

    #[tokio::test]
    async fn publish_bumps_version_and_keeps_old_readers_intact() {
        let registry = ModelRegistry::new(Arc::new(InMemoryModelStore::new()));
        assert!(registry.current().is_none());
        assert_eq!(registry.generation(), 0);

        let permit = registry.begin_training().await;
        let first = registry.publish(&permit, trained_snapshot()).unwrap();
        let reader = registry.current().unwrap();
        let second = registry.publish(&permit, trained_snapshot()).unwrap();

        assert_ne!(first.version, second.version);
        assert_eq!(registry.generation(), 2);
        assert_eq!(reader.version, first.version);
        assert_eq!(registry.current().unwrap().version, second.version);
    }

    #[tokio::test]
    async fn only_one_training_permit_at_a_time() {
        let registry = ModelRegistry::new(Arc::new(InMemoryModelStore::new()));
        let permit = registry.begin_training().await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), registry.begin_training()).await;
        assert!(waiting.is_err());
        drop(permit);
        let next = tokio::time::timeout(Duration::from_secs(5), registry.begin_training()).await;
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn failed_persist_leaves_served_model_unchanged() {
        let registry = ModelRegistry::new(Arc::new(FailingStore));
        let permit = registry.begin_training().await;
        assert!(registry.publish(&permit, trained_snapshot()).is_err());
        assert!(registry.current().is_none());
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn load_restores_the_persisted_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("model.json"));
        let snapshot = trained_snapshot();
        store.save(&snapshot).unwrap();

        let registry = ModelRegistry::load(Arc::new(store));
        assert_eq!(registry.current().unwrap().version, snapshot.version);
    }

    #[test]
    fn unreadable_model_starts_untrained() {
        let registry = ModelRegistry::load(Arc::new(FailingStore));
        assert!(registry.current().is_none());
    }
}

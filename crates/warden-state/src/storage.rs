//! Snapshot storage backends.
//!
//! [`FileStateStore`] is the production backend; [`InMemoryStateStore`]
//! keeps the last saved map in memory for tests and dry runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use warden_types::ActualStateMap;

use crate::error::{StateError, StateResult};
use crate::snapshot::StateSnapshot;

/// Durable home of the actual-state map.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved map. A store that was never written yields an
    /// empty map.
    async fn load(&self) -> StateResult<ActualStateMap>;

    /// Replace the stored map.
    async fn save(&self, map: &ActualStateMap) -> StateResult<()>;
}

/// JSON snapshot file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
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
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> StateResult<ActualStateMap> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state snapshot, starting empty");
                return Ok(ActualStateMap::new());
            }
            Err(e) => return Err(StateError::io(&self.path, e)),
        };

        let snapshot: StateSnapshot =
            serde_json::from_slice(&raw).map_err(|e| StateError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;

        debug!(
            path = %self.path.display(),
            instances = snapshot.instances.len(),
            last_updated = %snapshot.last_updated,
            "Loaded state snapshot"
        );

        Ok(snapshot.into_map())
    }

    async fn save(&self, map: &ActualStateMap) -> StateResult<()> {
        let json = serde_json::to_vec_pretty(&StateSnapshot::capture(map))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::io(parent, e))?;
        }

        // Write the whole snapshot to a sibling file, then rename over the
        // old one, so a crash never leaves a half-written snapshot.
        let temp = self.temp_path();
        {
            let mut file = tokio::fs::File::create(&temp)
                .await
                .map_err(|e| StateError::io(&temp, e))?;
            file.write_all(&json)
                .await
                .map_err(|e| StateError::io(&temp, e))?;
            file.sync_all()
                .await
                .map_err(|e| StateError::io(&temp, e))?;
        }

        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            warn!(path = %temp.display(), error = %e, "Failed to move snapshot into place");
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StateError::io(&self.path, e));
        }

        debug!(path = %self.path.display(), instances = map.len(), "Saved state snapshot");
        Ok(())
    }
}

/// In-memory snapshot store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    saved: Mutex<Option<ActualStateMap>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a previously saved map.
    pub fn with_map(map: ActualStateMap) -> Self {
        let store = Self::default();
        *store.saved.lock() = Some(map);
        store
    }

    /// Last saved map, if any.
    pub fn saved(&self) -> Option<ActualStateMap> {
        self.saved.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// Make saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> StateResult<ActualStateMap> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    async fn save(&self, map: &ActualStateMap) -> StateResult<()> {
        if *self.fail_saves.lock() {
            return Err(StateError::io(
                "memory",
                std::io::Error::other("injected save failure"),
            ));
        }
        *self.saved.lock() = Some(map.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use warden_types::{ManagedInstance, ResourceId, TenantId};

    fn sample_map() -> ActualStateMap {
        let mut map = ActualStateMap::new();
        map.insert(ManagedInstance::new(TenantId::new("t1"), ResourceId::new("r1"), Utc::now()));
        map.insert(ManagedInstance::new(TenantId::new("t2"), ResourceId::new("r2"), Utc::now()));
        map
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("instances.json"));

        let map = store.load().await.unwrap();
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested").join("instances.json"));
        let map = sample_map();

        store.save(&map).await.unwrap();

        let reopened = FileStateStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load().await.unwrap(), map);
        assert!(!dir.path().join("nested").join("instances.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("instances.json"));

        store.save(&sample_map()).await.unwrap();
        store.save(&ActualStateMap::new()).await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instances.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = FileStateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StateError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_memory_store_counts_saves() {
        let store = InMemoryStateStore::new();
        store.save(&sample_map()).await.unwrap();

        store.fail_saves(true);
        assert!(store.save(&ActualStateMap::new()).await.is_err());

        assert_eq!(store.save_count(), 1);
        assert_eq!(store.saved().unwrap().len(), 2);
    }
}

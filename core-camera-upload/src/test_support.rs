//! In-memory bridge fakes shared by unit tests.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::media::{MediaAsset, MediaKind};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, SettingsStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values.lock().await.insert(key.into(), value.into());
        Ok(())
    }
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }
    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
    }
    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get_string(key).await?.and_then(|v| v.parse().ok()))
    }
    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().await.contains_key(key))
    }
    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }
    async fn clear_all(&self) -> Result<()> {
        self.values.lock().await.clear();
        Ok(())
    }
}

/// File system holding only sizes and modification times.
pub struct MemoryFileSystem {
    cache_dir: PathBuf,
    files: Mutex<HashMap<PathBuf, FileMetadata>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            cache_dir: PathBuf::from("/cache"),
            files: Mutex::new(HashMap::new()),
        }
    }

    pub async fn put(&self, path: impl Into<PathBuf>, size: u64, modified_at_ms: i64) {
        self.files.lock().await.insert(
            path.into(),
            FileMetadata {
                size,
                modified_at_ms: Some(modified_at_ms),
                is_directory: false,
            },
        );
    }

    pub async fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.files.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(self.cache_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.files.lock().await.contains_key(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        self.files
            .lock()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<()> {
        let mut files = self.files.lock().await;
        let metadata = files
            .get(source)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(source.display().to_string()))?;
        files.insert(destination.to_path_buf(), metadata);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.files
            .lock()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotFound(path.display().to_string()))
    }
}

/// Platform asset with timestamps in seconds
pub fn asset(id: &str, filename: &str, created: i64) -> MediaAsset {
    MediaAsset {
        id: id.to_string(),
        filename: filename.to_string(),
        uri: format!("/dcim/{}", filename),
        kind: MediaKind::Photo,
        creation_time: created,
        modification_time: created,
        album_id: None,
    }
}

//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;

/// Tokio-based file system implementation
///
/// Temporary upload payloads live under the platform cache directory
/// (`~/.cache/camera-upload` on Linux).
pub struct TokioFileSystem {
    cache_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with the default cache directory
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("camera-upload");

        Self { cache_dir }
    }

    /// Create a new file system accessor with a custom cache directory
    pub fn with_cache_directory(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn strip_file_scheme(path: &Path) -> PathBuf {
        let raw = path.to_string_lossy();
        match raw.strip_prefix("file://") {
            Some(stripped) => PathBuf::from(stripped),
            None => path.to_path_buf(),
        }
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        if !fs::try_exists(&self.cache_dir).await.map_err(BridgeError::Io)? {
            fs::create_dir_all(&self.cache_dir)
                .await
                .map_err(BridgeError::Io)?;
            debug!(path = ?self.cache_dir, "Created cache directory");
        }
        Ok(self.cache_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(Self::strip_file_scheme(path))
            .await
            .map_err(BridgeError::Io)
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(Self::strip_file_scheme(path))
            .await
            .map_err(BridgeError::Io)?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at_ms: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(BridgeError::Io)?;
        }

        let bytes = fs::copy(Self::strip_file_scheme(source), destination)
            .await
            .map_err(BridgeError::Io)?;
        debug!(destination = ?destination, size = bytes, "Copied file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(Self::strip_file_scheme(path))
            .await
            .map_err(BridgeError::Io)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }
}

//! # Per-Asset Upload State
//!
//! Durable idempotency markers, one per local asset id.
//!
//! ## Overview
//!
//! A record is written after an asset's files were handed to the upload
//! queue, or when a run finds the asset unchanged. Delta computation compares
//! `last_modified_logical` against the local index. The upload task treats
//! the asset as unchanged when any one of logical mtime, filesystem mtime or
//! size still matches.
//!
//! All timestamps are milliseconds. Records live in the settings store under
//! `cameraUploadState:<assetId>` as camelCase JSON.

use crate::error::Result;
use crate::settings::keys;
use async_trait::async_trait;
use bridge_traits::storage::{FileMetadata, SettingsStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What was last synchronized for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerAssetUploadState {
    /// Logical last-modified of the local index entry, in milliseconds
    pub last_modified_logical: i64,
    /// Filesystem modification time of the asset's content, in milliseconds
    #[serde(default)]
    pub last_modified_filesystem: Option<i64>,
    /// Size of the asset's content in bytes
    #[serde(default)]
    pub last_uploaded_size: Option<u64>,
}

impl PerAssetUploadState {
    /// Build the record for an entry and the stat of its content.
    ///
    /// Both timestamps are already in milliseconds. A missing filesystem
    /// mtime falls back to the logical timestamp.
    pub fn observed(logical_ms: i64, stat: &FileMetadata) -> Self {
        Self {
            last_modified_logical: logical_ms,
            last_modified_filesystem: Some(stat.modified_at_ms.unwrap_or(logical_ms)),
            last_uploaded_size: Some(stat.size),
        }
    }

    /// Whether the logical timestamp still matches
    pub fn matches_logical(&self, logical_ms: i64) -> bool {
        self.last_modified_logical == logical_ms
    }

    /// Whether any of the three signals says the content is unchanged
    pub fn matches_any(&self, logical_ms: i64, stat: &FileMetadata) -> bool {
        let filesystem_match = match (self.last_modified_filesystem, stat.modified_at_ms) {
            (Some(stored), Some(current)) => stored == current,
            _ => false,
        };

        filesystem_match
            || self.matches_logical(logical_ms)
            || self.last_uploaded_size == Some(stat.size)
    }
}

/// Storage for per-asset upload state.
#[async_trait]
pub trait UploadStateRepository: Send + Sync {
    async fn get(&self, asset_id: &str) -> Result<Option<PerAssetUploadState>>;

    async fn put(&self, asset_id: &str, state: PerAssetUploadState) -> Result<()>;

    /// Every stored record, keyed by asset id
    async fn load_all(&self) -> Result<HashMap<String, PerAssetUploadState>>;

    /// Delete every record, returning how many were removed
    async fn reset(&self) -> Result<usize>;
}

/// [`UploadStateRepository`] on top of the host settings store.
pub struct SettingsUploadStateRepository {
    store: Arc<dyn SettingsStore>,
}

impl SettingsUploadStateRepository {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    fn decode(asset_id: &str, raw: &str) -> Option<PerAssetUploadState> {
        match serde_json::from_str(raw) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(asset_id, error = %e, "Discarding unreadable upload state");
                None
            }
        }
    }
}

#[async_trait]
impl UploadStateRepository for SettingsUploadStateRepository {
    async fn get(&self, asset_id: &str) -> Result<Option<PerAssetUploadState>> {
        Ok(self
            .store
            .get_string(&keys::asset_state(asset_id))
            .await?
            .and_then(|raw| Self::decode(asset_id, &raw)))
    }

    async fn put(&self, asset_id: &str, state: PerAssetUploadState) -> Result<()> {
        let raw = serde_json::to_string(&state)?;
        self.store
            .set_string(&keys::asset_state(asset_id), &raw)
            .await?;
        debug!(asset_id, logical = state.last_modified_logical, "Stored upload state");
        Ok(())
    }

    async fn load_all(&self) -> Result<HashMap<String, PerAssetUploadState>> {
        let mut states = HashMap::new();

        for key in self.store.list_keys().await? {
            let Some(asset_id) = key.strip_prefix(keys::ASSET_STATE_PREFIX) else {
                continue;
            };
            if let Some(raw) = self.store.get_string(&key).await? {
                if let Some(state) = Self::decode(asset_id, &raw) {
                    states.insert(asset_id.to_string(), state);
                }
            }
        }

        Ok(states)
    }

    async fn reset(&self) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.list_keys().await? {
            if key.starts_with(keys::ASSET_STATE_PREFIX) {
                self.store.delete(&key).await?;
                removed += 1;
            }
        }

        info!(removed, "Reset camera upload state");
        Ok(removed)
    }
}

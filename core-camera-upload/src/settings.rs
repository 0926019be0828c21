//! # Camera Upload Settings
//!
//! Typed access to the camera upload keys held in the host settings store.
//!
//! ## Overview
//!
//! Per-user settings are namespaced with a `:<userId>` suffix. Session keys
//! (`isLoggedIn`, `userId`, `masterKeys`) and the progress counters are
//! global. A [`UserSettings`] snapshot is read once at the start of every
//! run so the whole run sees one consistent configuration.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let settings = CameraUploadSettings::new(store, clock);
//!
//! settings.enable("42", folder_uuid, "Camera Uploads").await?;
//! settings.set_flag("42", UserFlag::IncludeImages, true).await?;
//!
//! let snapshot = settings.user_settings("42").await?;
//! assert!(snapshot.enabled);
//! ```

use crate::error::{CameraUploadError, Result};
use crate::filter::MediaTypeFilter;
use crate::index::normalize_timestamp_ms;
use bridge_traits::storage::SettingsStore;
use bridge_traits::time::Clock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Keys
// ============================================================================

/// Settings store keys.
pub mod keys {
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const USER_ID: &str = "userId";
    pub const MASTER_KEYS: &str = "masterKeys";

    pub const ENABLED: &str = "cameraUploadEnabled";
    pub const FOLDER_UUID: &str = "cameraUploadFolderUUID";
    pub const FOLDER_NAME: &str = "cameraUploadFolderName";
    pub const INCLUDE_IMAGES: &str = "cameraUploadIncludeImages";
    pub const INCLUDE_VIDEOS: &str = "cameraUploadIncludeVideos";
    pub const EXCLUDED_ALBUMS: &str = "cameraUploadExcludedAlbums";
    pub const AFTER_ENABLED_TIME: &str = "cameraUploadAfterEnabledTime";
    pub const WIFI_ONLY: &str = "onlyWifiUploads";
    pub const ENABLE_HEIC: &str = "cameraUploadEnableHeic";
    pub const ONLY_UPLOAD_ORIGINAL: &str = "cameraUploadOnlyUploadOriginal";
    pub const CONVERT_LIVE_AND_BURST: &str = "cameraUploadConvertLiveAndBurst";
    pub const CONVERT_LIVE_AND_BURST_KEEP_ORIGINAL: &str =
        "cameraUploadConvertLiveAndBurstAndKeepOriginal";

    pub const TOTAL: &str = "cameraUploadTotal";
    pub const UPLOADED: &str = "cameraUploadUploaded";

    pub const REMOTE_CACHE_PREFIX: &str = "cameraUploadLastLoadRemoteCache:";
    pub const ASSET_STATE_PREFIX: &str = "cameraUploadState:";

    /// Namespace a per-user key
    pub fn per_user(key: &str, user_id: &str) -> String {
        format!("{}:{}", key, user_id)
    }

    pub fn remote_cache(folder_uuid: &str) -> String {
        format!("{}{}", REMOTE_CACHE_PREFIX, folder_uuid)
    }

    pub fn asset_state(asset_id: &str) -> String {
        format!("{}{}", ASSET_STATE_PREFIX, asset_id)
    }
}

// ============================================================================
// Types
// ============================================================================

/// Boolean per-user preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFlag {
    IncludeImages,
    IncludeVideos,
    WifiOnly,
    EnableHeic,
    OnlyUploadOriginal,
    ConvertLiveAndBurst,
    ConvertLiveAndBurstKeepOriginal,
}

impl UserFlag {
    pub fn key(&self) -> &'static str {
        match self {
            UserFlag::IncludeImages => keys::INCLUDE_IMAGES,
            UserFlag::IncludeVideos => keys::INCLUDE_VIDEOS,
            UserFlag::WifiOnly => keys::WIFI_ONLY,
            UserFlag::EnableHeic => keys::ENABLE_HEIC,
            UserFlag::OnlyUploadOriginal => keys::ONLY_UPLOAD_ORIGINAL,
            UserFlag::ConvertLiveAndBurst => keys::CONVERT_LIVE_AND_BURST,
            UserFlag::ConvertLiveAndBurstKeepOriginal => keys::CONVERT_LIVE_AND_BURST_KEEP_ORIGINAL,
        }
    }
}

/// Flags steering the file materializer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// Upload HEIC stills as-is instead of transcoding to JPEG
    pub enable_heic: bool,
    pub only_upload_original: bool,
    pub convert_live_and_burst: bool,
    pub convert_live_and_burst_keep_original: bool,
}

impl MaterializeOptions {
    /// Whether any representation-splitting flag is set
    pub fn wants_conversion(&self) -> bool {
        self.convert_live_and_burst || self.convert_live_and_burst_keep_original
    }
}

/// Snapshot of one user's camera upload configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSettings {
    pub user_id: String,
    pub enabled: bool,
    pub folder_uuid: Option<String>,
    pub folder_name: Option<String>,
    pub media_types: MediaTypeFilter,
    pub excluded_albums: HashSet<String>,
    /// Enrollment time in milliseconds (0 when never recorded)
    pub enrollment_ms: i64,
    pub wifi_only: bool,
    pub materialize: MaterializeOptions,
}

impl UserSettings {
    /// Destination folder, if configured and structurally a UUID
    pub fn valid_folder_uuid(&self) -> Option<&str> {
        self.folder_uuid
            .as_deref()
            .filter(|uuid| Uuid::parse_str(uuid).is_ok())
    }
}

/// Running totals published for the UI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub uploaded: u64,
    pub total: u64,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.uploaded >= self.total
    }
}

// ============================================================================
// Settings Accessor
// ============================================================================

/// Typed reader/writer for camera upload settings.
#[derive(Clone)]
pub struct CameraUploadSettings {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
}

impl CameraUploadSettings {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }

    /// The signed-in user id, or `None` when logged out
    pub async fn current_user(&self) -> Result<Option<String>> {
        if !self.store.get_bool(keys::IS_LOGGED_IN).await?.unwrap_or(false) {
            return Ok(None);
        }

        Ok(self
            .store
            .get_string(keys::USER_ID)
            .await?
            .filter(|id| !id.is_empty()))
    }

    /// Master keys used to decrypt remote metadata.
    ///
    /// A missing or empty key list is an error.
    pub async fn master_keys(&self) -> Result<Vec<String>> {
        let raw = self
            .store
            .get_string(keys::MASTER_KEYS)
            .await?
            .ok_or_else(|| CameraUploadError::Settings("masterKeys missing".to_string()))?;
        let master_keys: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| CameraUploadError::Settings(format!("masterKeys: {}", e)))?;
        if master_keys.is_empty() {
            return Err(CameraUploadError::Settings("masterKeys empty".to_string()));
        }
        Ok(master_keys)
    }

    async fn flag(&self, user_id: &str, key: &str) -> Result<bool> {
        Ok(self
            .store
            .get_bool(&keys::per_user(key, user_id))
            .await?
            .unwrap_or(false))
    }

    async fn user_string(&self, user_id: &str, key: &str) -> Result<Option<String>> {
        Ok(self
            .store
            .get_string(&keys::per_user(key, user_id))
            .await?
            .filter(|value| !value.is_empty()))
    }

    /// Read a consistent snapshot of the user's settings
    pub async fn user_settings(&self, user_id: &str) -> Result<UserSettings> {
        let materialize = MaterializeOptions {
            enable_heic: self.flag(user_id, keys::ENABLE_HEIC).await?,
            only_upload_original: self.flag(user_id, keys::ONLY_UPLOAD_ORIGINAL).await?,
            convert_live_and_burst: self.flag(user_id, keys::CONVERT_LIVE_AND_BURST).await?,
            convert_live_and_burst_keep_original: self
                .flag(user_id, keys::CONVERT_LIVE_AND_BURST_KEEP_ORIGINAL)
                .await?,
        };

        let enrollment_ms = self
            .store
            .get_i64(&keys::per_user(keys::AFTER_ENABLED_TIME, user_id))
            .await?
            .map(normalize_timestamp_ms)
            .unwrap_or(0);

        Ok(UserSettings {
            user_id: user_id.to_string(),
            enabled: self.flag(user_id, keys::ENABLED).await?,
            folder_uuid: self.user_string(user_id, keys::FOLDER_UUID).await?,
            folder_name: self.user_string(user_id, keys::FOLDER_NAME).await?,
            media_types: MediaTypeFilter::new(
                self.flag(user_id, keys::INCLUDE_IMAGES).await?,
                self.flag(user_id, keys::INCLUDE_VIDEOS).await?,
            ),
            excluded_albums: self.excluded_albums(user_id).await?,
            enrollment_ms,
            wifi_only: self.flag(user_id, keys::WIFI_ONLY).await?,
            materialize,
        })
    }

    pub async fn set_flag(&self, user_id: &str, flag: UserFlag, value: bool) -> Result<()> {
        self.store
            .set_bool(&keys::per_user(flag.key(), user_id), value)
            .await?;
        debug!(user_id, flag = flag.key(), value, "Updated camera upload flag");
        Ok(())
    }

    /// Turn camera upload on for a destination folder.
    ///
    /// The enrollment time is only recorded the first time, so assets taken
    /// between a disable and a re-enable are still picked up.
    pub async fn enable(&self, user_id: &str, folder_uuid: &str, folder_name: &str) -> Result<()> {
        if Uuid::parse_str(folder_uuid).is_err() {
            return Err(CameraUploadError::Settings(format!(
                "invalid folder uuid: {}",
                folder_uuid
            )));
        }

        let store = &self.store;
        store
            .set_string(&keys::per_user(keys::FOLDER_UUID, user_id), folder_uuid)
            .await?;
        store
            .set_string(&keys::per_user(keys::FOLDER_NAME, user_id), folder_name)
            .await?;

        let enrollment_key = keys::per_user(keys::AFTER_ENABLED_TIME, user_id);
        if store.get_i64(&enrollment_key).await?.is_none() {
            store
                .set_i64(&enrollment_key, self.clock.unix_timestamp_millis())
                .await?;
        }

        store
            .set_bool(&keys::per_user(keys::ENABLED, user_id), true)
            .await?;

        info!(user_id, folder_uuid, "Camera upload enabled");
        Ok(())
    }

    /// Turn camera upload off; with `reset` the destination and progress go too
    pub async fn disable(&self, user_id: &str, reset: bool) -> Result<()> {
        let store = &self.store;
        store
            .set_bool(&keys::per_user(keys::ENABLED, user_id), false)
            .await?;

        if reset {
            let folder_key = keys::per_user(keys::FOLDER_UUID, user_id);
            if let Some(folder_uuid) = store.get_string(&folder_key).await? {
                store.delete(&keys::remote_cache(&folder_uuid)).await?;
            }
            store.delete(&folder_key).await?;
            store
                .delete(&keys::per_user(keys::FOLDER_NAME, user_id))
                .await?;
            self.set_progress(UploadProgress::default()).await?;
        }

        info!(user_id, reset, "Camera upload disabled");
        Ok(())
    }

    /// Albums the user excluded. Malformed stored JSON reads as no exclusions.
    pub async fn excluded_albums(&self, user_id: &str) -> Result<HashSet<String>> {
        let raw = match self
            .store
            .get_string(&keys::per_user(keys::EXCLUDED_ALBUMS, user_id))
            .await?
        {
            Some(raw) => raw,
            None => return Ok(HashSet::new()),
        };

        match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
            Ok(map) => Ok(map
                .into_iter()
                .filter_map(|(id, excluded)| excluded.then_some(id))
                .collect()),
            Err(e) => {
                warn!(user_id, error = %e, "Ignoring malformed excluded album list");
                Ok(HashSet::new())
            }
        }
    }

    pub async fn set_album_excluded(
        &self,
        user_id: &str,
        album_id: &str,
        excluded: bool,
    ) -> Result<()> {
        let mut albums = self.excluded_albums(user_id).await?;
        if excluded {
            albums.insert(album_id.to_string());
        } else {
            albums.remove(album_id);
        }

        let map: BTreeMap<&str, bool> = albums.iter().map(|id| (id.as_str(), true)).collect();
        self.store
            .set_string(
                &keys::per_user(keys::EXCLUDED_ALBUMS, user_id),
                &serde_json::to_string(&map)?,
            )
            .await?;
        Ok(())
    }

    pub async fn progress(&self) -> Result<UploadProgress> {
        let read = |value: Option<i64>| value.unwrap_or(0).max(0) as u64;
        Ok(UploadProgress {
            uploaded: read(self.store.get_i64(keys::UPLOADED).await?),
            total: read(self.store.get_i64(keys::TOTAL).await?),
        })
    }

    pub async fn set_progress(&self, progress: UploadProgress) -> Result<()> {
        self.store
            .set_i64(keys::TOTAL, progress.total as i64)
            .await?;
        self.store
            .set_i64(keys::UPLOADED, progress.uploaded as i64)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;
    use bridge_traits::time::FixedClock;

    const USER: &str = "7";
    const FOLDER: &str = "3f1e0c1a-8a5b-4a7c-9d2e-0b6f4c2d1e90";

    fn settings() -> (CameraUploadSettings, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let clock = Arc::new(FixedClock::at_millis(1_700_000_000_000));
        (CameraUploadSettings::new(store.clone(), clock), store)
    }

    #[tokio::test]
    async fn test_current_user_requires_login() {
        let (settings, store) = settings();
        store.set_string(keys::USER_ID, USER).await.unwrap();
        assert_eq!(settings.current_user().await.unwrap(), None);

        store.set_bool(keys::IS_LOGGED_IN, true).await.unwrap();
        assert_eq!(settings.current_user().await.unwrap(), Some(USER.to_string()));
    }

    #[tokio::test]
    async fn test_enable_records_enrollment_once() {
        let (settings, store) = settings();
        let enrollment_key = keys::per_user(keys::AFTER_ENABLED_TIME, USER);
        store.set_i64(&enrollment_key, 1_600_000_000).await.unwrap();

        settings.enable(USER, FOLDER, "Camera").await.unwrap();
        let snapshot = settings.user_settings(USER).await.unwrap();

        assert!(snapshot.enabled);
        assert_eq!(snapshot.valid_folder_uuid(), Some(FOLDER));
        assert_eq!(snapshot.folder_name.as_deref(), Some("Camera"));
        assert_eq!(snapshot.enrollment_ms, 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_enable_rejects_malformed_folder() {
        let (settings, _) = settings();
        assert!(settings.enable(USER, "not-a-uuid", "Camera").await.is_err());
    }

    #[tokio::test]
    async fn test_disable_with_reset_clears_destination() {
        let (settings, store) = settings();
        settings.enable(USER, FOLDER, "Camera").await.unwrap();
        store
            .set_string(&keys::remote_cache(FOLDER), "{}")
            .await
            .unwrap();
        settings
            .set_progress(UploadProgress {
                uploaded: 3,
                total: 9,
            })
            .await
            .unwrap();

        settings.disable(USER, true).await.unwrap();
        let snapshot = settings.user_settings(USER).await.unwrap();

        assert!(!snapshot.enabled);
        assert_eq!(snapshot.folder_uuid, None);
        assert!(!store.has_key(&keys::remote_cache(FOLDER)).await.unwrap());
        assert_eq!(settings.progress().await.unwrap(), UploadProgress::default());
    }

    #[tokio::test]
    async fn test_excluded_albums_toggle_and_malformed() {
        let (settings, store) = settings();
        settings.set_album_excluded(USER, "album-1", true).await.unwrap();
        settings.set_album_excluded(USER, "album-2", true).await.unwrap();
        settings.set_album_excluded(USER, "album-1", false).await.unwrap();

        let excluded = settings.excluded_albums(USER).await.unwrap();
        assert_eq!(excluded, HashSet::from(["album-2".to_string()]));

        store
            .set_string(&keys::per_user(keys::EXCLUDED_ALBUMS, USER), "{oops")
            .await
            .unwrap();
        assert!(settings.excluded_albums(USER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flags_and_master_keys() {
        let (settings, store) = settings();
        assert!(matches!(
            settings.master_keys().await,
            Err(CameraUploadError::Settings(_))
        ));
        settings
            .set_flag(USER, UserFlag::ConvertLiveAndBurst, true)
            .await
            .unwrap();
        settings.set_flag(USER, UserFlag::WifiOnly, true).await.unwrap();
        store
            .set_string(keys::MASTER_KEYS, r#"["k1","k2"]"#)
            .await
            .unwrap();

        let snapshot = settings.user_settings(USER).await.unwrap();
        assert!(snapshot.wifi_only);
        assert!(snapshot.materialize.wants_conversion());
        assert_eq!(snapshot.media_types, MediaTypeFilter::new(false, false));
        assert_eq!(settings.master_keys().await.unwrap(), vec!["k1", "k2"]);

        store.set_string(keys::MASTER_KEYS, "nope").await.unwrap();
        assert!(settings.master_keys().await.is_err());

        store.set_string(keys::MASTER_KEYS, "[]").await.unwrap();
        assert!(settings.master_keys().await.is_err());
    }
}

//! # Configuration
//!
//! Wires the host bridges and scheduler tunables into a single
//! [`CameraUploadConfig`].
//!
//! ## Overview
//!
//! Every host must inject the capabilities the engine cannot provide itself
//! (media library, remote directory, metadata codec, upload queue, ...).
//! The builder fails fast with [`Error::CapabilityMissing`] naming the
//! capability and what each platform is expected to inject. With the
//! `desktop-shims` feature, the file system, network monitor and settings
//! store fall back to the `bridge-desktop` adapters.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CameraUploadConfig, SchedulerSettings};
//! use std::time::Duration;
//!
//! let config = CameraUploadConfig::builder()
//!     .settings_store(settings)
//!     .media_library(photos)
//!     .remote_directory(api)
//!     .metadata_codec(crypto)
//!     .upload_queue(queue)
//!     .permission_gate(permissions)
//!     .image_transcoder(transcoder)
//!     .scheduler(SchedulerSettings::default().with_max_concurrent_uploads(4))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::EventBus;
use bridge_traits::{
    Clock, FileSystemAccess, ImageTranscoder, MediaLibrary, MetadataCodec, NetworkMonitor,
    PermissionGate, RemoteDirectory, SettingsStore, SystemClock, UploadQueue,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Scheduler Tunables
// ============================================================================

/// Timing and concurrency limits of the upload scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Delay between the end of one run and the start of the next
    pub run_interval: Duration,
    /// Minimum time after a run before another run may execute
    pub run_cooldown: Duration,
    /// Capacity of the upload semaphore
    pub max_concurrent_uploads: usize,
    /// Maximum number of deltas executed in one run
    pub max_queued_per_run: usize,
    /// Failures after which an asset is excluded until restart
    pub max_failures: u32,
    /// Page size used while enumerating album assets
    pub asset_page_size: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            run_interval: Duration::from_millis(5000),
            run_cooldown: Duration::from_millis(4000),
            max_concurrent_uploads: 10,
            max_queued_per_run: 16,
            max_failures: 1,
            asset_page_size: 256,
        }
    }
}

impl SchedulerSettings {
    pub fn with_run_interval(mut self, interval: Duration) -> Self {
        self.run_interval = interval;
        self
    }

    pub fn with_run_cooldown(mut self, cooldown: Duration) -> Self {
        self.run_cooldown = cooldown;
        self
    }

    pub fn with_max_concurrent_uploads(mut self, max: usize) -> Self {
        self.max_concurrent_uploads = max;
        self
    }

    pub fn with_max_queued_per_run(mut self, max: usize) -> Self {
        self.max_queued_per_run = max;
        self
    }

    pub fn with_max_failures(mut self, max: u32) -> Self {
        self.max_failures = max;
        self
    }

    pub fn with_asset_page_size(mut self, size: usize) -> Self {
        self.asset_page_size = size;
        self
    }

    /// Validates the tunables.
    ///
    /// The interval may be zero (tests drive runs back to back) but every
    /// limit must admit at least one item.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_uploads == 0 {
            return Err(Error::Config(
                "max_concurrent_uploads must be greater than 0".to_string(),
            ));
        }

        if self.max_queued_per_run == 0 {
            return Err(Error::Config(
                "max_queued_per_run must be greater than 0".to_string(),
            ));
        }

        if self.max_failures == 0 {
            return Err(Error::Config(
                "max_failures must be greater than 0".to_string(),
            ));
        }

        if self.asset_page_size == 0 {
            return Err(Error::Config(
                "asset_page_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Fully wired engine configuration.
#[derive(Clone)]
pub struct CameraUploadConfig {
    pub settings_store: Arc<dyn SettingsStore>,
    pub media_library: Arc<dyn MediaLibrary>,
    pub remote_directory: Arc<dyn RemoteDirectory>,
    pub metadata_codec: Arc<dyn MetadataCodec>,
    pub upload_queue: Arc<dyn UploadQueue>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    pub permission_gate: Arc<dyn PermissionGate>,
    pub image_transcoder: Arc<dyn ImageTranscoder>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
    pub scheduler: SchedulerSettings,
}

impl CameraUploadConfig {
    /// Creates a new builder.
    pub fn builder() -> CameraUploadConfigBuilder {
        CameraUploadConfigBuilder::default()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

fn require<T: ?Sized>(value: Option<Arc<T>>, capability: &str, message: &str) -> Result<Arc<T>> {
    value.ok_or_else(|| capability_missing(capability, message))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "FileSystemAccess implementation is required for temporary upload files. \
         Desktop: enable the 'desktop-shims' feature to use TokioFileSystem. \
         Mobile: inject the app sandbox file system.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Ok(Arc::new(bridge_desktop::DesktopNetworkMonitor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_network_monitor() -> Result<Arc<dyn NetworkMonitor>> {
    Err(capability_missing(
        "NetworkMonitor",
        "NetworkMonitor implementation is required for the online and Wi-Fi-only gates. \
         Desktop: enable the 'desktop-shims' feature to use DesktopNetworkMonitor. \
         Mobile: inject NWPathMonitor/ConnectivityManager adapters.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(database_path: Option<&Path>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let Some(path) = database_path else {
        return Err(capability_missing(
            "SettingsStore",
            "SettingsStore implementation or .settings_database() path is required.",
        ));
    };

    let init_store = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(Error::from)
    };

    // Building a runtime inside a runtime panics; hop to a plain thread.
    let store = match Handle::try_current() {
        Ok(_) => {
            let path = path.to_path_buf();
            thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??
        }
        Err(_) => init_store(path.to_path_buf())?,
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_database_path: Option<&Path>) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required for settings and upload state. \
         Desktop: enable the 'desktop-shims' feature and set .settings_database(). \
         Mobile: inject MMKV/UserDefaults/DataStore adapters.",
    ))
}

/// Builder for [`CameraUploadConfig`].
#[derive(Default)]
pub struct CameraUploadConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_database: Option<PathBuf>,
    media_library: Option<Arc<dyn MediaLibrary>>,
    remote_directory: Option<Arc<dyn RemoteDirectory>>,
    metadata_codec: Option<Arc<dyn MetadataCodec>>,
    upload_queue: Option<Arc<dyn UploadQueue>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    permission_gate: Option<Arc<dyn PermissionGate>>,
    image_transcoder: Option<Arc<dyn ImageTranscoder>>,
    clock: Option<Arc<dyn Clock>>,
    event_bus: Option<EventBus>,
    scheduler: SchedulerSettings,
}

impl CameraUploadConfigBuilder {
    /// Sets the settings store (required unless `desktop-shims` provides one).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Path of the SQLite database backing the default desktop settings store.
    pub fn settings_database<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_database = Some(path.into());
        self
    }

    /// Sets the media library (required).
    pub fn media_library(mut self, library: Arc<dyn MediaLibrary>) -> Self {
        self.media_library = Some(library);
        self
    }

    /// Sets the remote directory listing service (required).
    pub fn remote_directory(mut self, directory: Arc<dyn RemoteDirectory>) -> Self {
        self.remote_directory = Some(directory);
        self
    }

    /// Sets the metadata codec (required).
    pub fn metadata_codec(mut self, codec: Arc<dyn MetadataCodec>) -> Self {
        self.metadata_codec = Some(codec);
        self
    }

    /// Sets the upload queue (required).
    pub fn upload_queue(mut self, queue: Arc<dyn UploadQueue>) -> Self {
        self.upload_queue = Some(queue);
        self
    }

    /// Sets the file system access implementation.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the network monitor.
    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    /// Sets the permission probe (required).
    pub fn permission_gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.permission_gate = Some(gate);
        self
    }

    /// Sets the HEIC transcoder (required).
    pub fn image_transcoder(mut self, transcoder: Arc<dyn ImageTranscoder>) -> Self {
        self.image_transcoder = Some(transcoder);
        self
    }

    /// Sets the clock. Default: [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Shares an existing event bus. Default: a fresh bus.
    pub fn event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Sets the scheduler tunables.
    pub fn scheduler(mut self, settings: SchedulerSettings) -> Self {
        self.scheduler = settings;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - `CapabilityMissing` when a required bridge was not injected
    /// - `Config` when the scheduler tunables are invalid
    pub fn build(self) -> Result<CameraUploadConfig> {
        self.scheduler.validate()?;

        let media_library = require(
            self.media_library,
            "MediaLibrary",
            "MediaLibrary implementation is required to enumerate device media. \
             iOS: inject a PhotoKit adapter. Android: inject a MediaStore adapter.",
        )?;
        let remote_directory = require(
            self.remote_directory,
            "RemoteDirectory",
            "RemoteDirectory implementation is required to list the upload folder.",
        )?;
        let metadata_codec = require(
            self.metadata_codec,
            "MetadataCodec",
            "MetadataCodec implementation is required to decrypt remote file metadata.",
        )?;
        let upload_queue = require(
            self.upload_queue,
            "UploadQueue",
            "UploadQueue implementation is required to hand files to the transport.",
        )?;
        let permission_gate = require(
            self.permission_gate,
            "PermissionGate",
            "PermissionGate implementation is required to check media permissions.",
        )?;
        let image_transcoder = require(
            self.image_transcoder,
            "ImageTranscoder",
            "ImageTranscoder implementation is required for HEIC to JPEG conversion.",
        )?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_database.as_deref())?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let network_monitor = match self.network_monitor {
            Some(monitor) => monitor,
            None => provide_default_network_monitor()?,
        };

        Ok(CameraUploadConfig {
            settings_store,
            media_library,
            remote_directory,
            metadata_codec,
            upload_queue,
            file_system,
            network_monitor,
            permission_gate,
            image_transcoder,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_bus: self.event_bus.unwrap_or_default(),
            scheduler: self.scheduler,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        Album, AssetInfo, AssetPage, DecryptedFileMetadata, ExportOutcome, FileMetadata,
        FolderPresence, MediaAsset, NetworkInfo, NetworkStatus, RemoteUpload, UploadRequest,
    };
    use std::path::Path;

    struct NoopBridge;

    #[async_trait]
    impl SettingsStore for NoopBridge {
        async fn set_string(&self, _key: &str, _value: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_string(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
        async fn set_bool(&self, _key: &str, _value: bool) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_bool(&self, _key: &str) -> BridgeResult<Option<bool>> {
            Ok(None)
        }
        async fn set_i64(&self, _key: &str, _value: i64) -> BridgeResult<()> {
            Ok(())
        }
        async fn get_i64(&self, _key: &str) -> BridgeResult<Option<i64>> {
            Ok(None)
        }
        async fn delete(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
        async fn has_key(&self, _key: &str) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn list_keys(&self) -> BridgeResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn clear_all(&self) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl MediaLibrary for NoopBridge {
        async fn list_albums(&self, _include_smart_albums: bool) -> BridgeResult<Vec<Album>> {
            Ok(Vec::new())
        }
        async fn list_assets(
            &self,
            _album_id: &str,
            _after: Option<String>,
            _first: usize,
        ) -> BridgeResult<AssetPage> {
            Ok(AssetPage::default())
        }
        async fn asset_info(&self, _asset: &MediaAsset) -> BridgeResult<AssetInfo> {
            Ok(AssetInfo::default())
        }
        async fn export_representations(
            &self,
            _asset: &MediaAsset,
            _output_dir: &Path,
            _file_prefix: &str,
        ) -> BridgeResult<ExportOutcome> {
            Ok(ExportOutcome::default())
        }
    }

    #[async_trait]
    impl RemoteDirectory for NoopBridge {
        async fn list_uploads(&self, _folder: &str, _page: u32) -> BridgeResult<Vec<RemoteUpload>> {
            Ok(Vec::new())
        }
        async fn folder_presence(&self, _folder: &str) -> BridgeResult<FolderPresence> {
            Ok(FolderPresence::default())
        }
    }

    #[async_trait]
    impl MetadataCodec for NoopBridge {
        async fn decrypt_file_metadata(
            &self,
            _keys: &[String],
            _metadata: &str,
            _uuid: &str,
        ) -> BridgeResult<DecryptedFileMetadata> {
            Ok(DecryptedFileMetadata::default())
        }
    }

    #[async_trait]
    impl UploadQueue for NoopBridge {
        async fn enqueue(&self, _request: UploadRequest) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl FileSystemAccess for NoopBridge {
        async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
            Ok(std::env::temp_dir())
        }
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn metadata(&self, _path: &Path) -> BridgeResult<FileMetadata> {
            Ok(FileMetadata {
                size: 0,
                modified_at_ms: None,
                is_directory: false,
            })
        }
        async fn copy_file(&self, _source: &Path, _destination: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl NetworkMonitor for NoopBridge {
        async fn get_network_info(&self) -> BridgeResult<NetworkInfo> {
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                network_type: None,
                is_metered: false,
            })
        }
    }

    #[async_trait]
    impl PermissionGate for NoopBridge {
        async fn media_permissions_granted(&self, _prompt: bool) -> BridgeResult<bool> {
            Ok(true)
        }
    }

    #[async_trait]
    impl ImageTranscoder for NoopBridge {
        async fn heic_to_jpeg(&self, source: &Path) -> BridgeResult<PathBuf> {
            Ok(source.to_path_buf())
        }
    }

    fn complete_builder() -> CameraUploadConfigBuilder {
        let bridge = Arc::new(NoopBridge);
        CameraUploadConfig::builder()
            .settings_store(bridge.clone())
            .media_library(bridge.clone())
            .remote_directory(bridge.clone())
            .metadata_codec(bridge.clone())
            .upload_queue(bridge.clone())
            .file_system(bridge.clone())
            .network_monitor(bridge.clone())
            .permission_gate(bridge.clone())
            .image_transcoder(bridge)
    }

    #[test]
    fn test_scheduler_defaults() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.run_interval, Duration::from_millis(5000));
        assert_eq!(settings.run_cooldown, Duration::from_millis(4000));
        assert_eq!(settings.max_queued_per_run, 16);
        assert_eq!(settings.max_failures, 1);
        assert_eq!(settings.asset_page_size, 256);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_scheduler_validation_rejects_zero_limits() {
        let settings = SchedulerSettings::default().with_max_concurrent_uploads(0);
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        let settings = SchedulerSettings::default().with_max_failures(0);
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_with_all_bridges() {
        let config = complete_builder()
            .scheduler(SchedulerSettings::default().with_max_concurrent_uploads(2))
            .build()
            .unwrap();

        assert_eq!(config.scheduler.max_concurrent_uploads, 2);
        assert_eq!(config.event_bus.subscriber_count(), 0);
    }

    #[test]
    fn test_missing_media_library_fails_fast() {
        let bridge = Arc::new(NoopBridge);
        let result = CameraUploadConfig::builder()
            .settings_store(bridge.clone())
            .remote_directory(bridge)
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "MediaLibrary")
            }
            _ => panic!("expected CapabilityMissing"),
        }
    }

    #[test]
    fn test_invalid_scheduler_settings_fail_build() {
        let result = complete_builder()
            .scheduler(SchedulerSettings::default().with_max_queued_per_run(0))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_settings_store_without_shims() {
        let bridge = Arc::new(NoopBridge);
        let result = CameraUploadConfig::builder()
            .media_library(bridge.clone())
            .remote_directory(bridge.clone())
            .metadata_codec(bridge.clone())
            .upload_queue(bridge.clone())
            .file_system(bridge.clone())
            .network_monitor(bridge.clone())
            .permission_gate(bridge.clone())
            .image_transcoder(bridge)
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "SettingsStore"
        ));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_shims_provide_defaults() {
        let bridge = Arc::new(NoopBridge);
        let db = std::env::temp_dir()
            .join(format!("camera-upload-config-{}", std::process::id()))
            .join("settings.db");

        let config = CameraUploadConfig::builder()
            .settings_database(db)
            .media_library(bridge.clone())
            .remote_directory(bridge.clone())
            .metadata_codec(bridge.clone())
            .upload_queue(bridge.clone())
            .permission_gate(bridge.clone())
            .image_transcoder(bridge)
            .build();

        assert!(config.is_ok());
    }
}

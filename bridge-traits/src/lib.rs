//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the camera upload engine and the
//! platform-specific implementations. Each trait represents a capability the
//! engine requires but that must be implemented differently per platform
//! (iOS, Android, desktop).
//!
//! ## Traits
//!
//! ### Device media
//! - [`MediaLibrary`](media::MediaLibrary) - Albums, paginated assets, multi-representation export
//! - [`ImageTranscoder`](media::ImageTranscoder) - HEIC to baseline JPEG conversion
//! - [`PermissionGate`](media::PermissionGate) - Media library permission probe
//!
//! ### Cloud collaborators
//! - [`RemoteDirectory`](cloud::RemoteDirectory) - Folder listing and presence checks
//! - [`MetadataCodec`](cloud::MetadataCodec) - Encrypted file metadata decoding
//! - [`UploadQueue`](cloud::UploadQueue) - Hand-off to the upload transport
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value store
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Temporary files and stat
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and Wi-Fi detection
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | Storage, file system, network |
//! | iOS      | host app            | Injected |
//! | Android  | host app            | Injected |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors to `BridgeError` and
//! include context (asset ids, paths, folder ids) in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind an `Arc`.

pub mod cloud;
pub mod error;
pub mod media;
pub mod network;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cloud::{
    DecryptedFileMetadata, FolderPresence, MetadataCodec, RemoteDirectory, RemoteUpload,
    UploadQueue, UploadRequest,
};
pub use media::{
    Album, AssetInfo, AssetPage, ExportOutcome, ImageTranscoder, MediaAsset, MediaKind,
    MediaLibrary, PermissionGate,
};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileMetadata, FileSystemAccess, SettingsStore};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};

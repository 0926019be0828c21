//! Device Media Abstractions
//!
//! Traits over the platform photo library (PhotoKit, MediaStore), the image
//! transcoder used for HEIC output, and the media permission probe.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Kind of a media library asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    /// Anything the platform could not classify (audio, unknown)
    Other,
}

/// A device album, including smart/system albums
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub asset_count: u64,
}

/// A single asset as enumerated from the media library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Stable platform asset id
    pub id: String,
    pub filename: String,
    /// Platform asset URI (`ph://`, `content://`, `file://`)
    pub uri: String,
    pub kind: MediaKind,
    /// Creation time as reported by the platform (seconds or milliseconds)
    pub creation_time: i64,
    /// Modification time as reported by the platform (seconds or milliseconds)
    pub modification_time: i64,
    pub album_id: Option<String>,
}

/// One page of an album enumeration
#[derive(Debug, Clone, Default)]
pub struct AssetPage {
    pub assets: Vec<MediaAsset>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

/// Extended asset information needed to read the asset's content
#[derive(Debug, Clone, Default)]
pub struct AssetInfo {
    /// Local file URI, when the content is available on device
    pub local_uri: Option<String>,
    pub uri: Option<String>,
}

/// Result of exporting every underlying representation of an asset
#[derive(Debug, Clone, Default)]
pub struct ExportOutcome {
    /// Paths of the exported representation files
    pub files: Vec<PathBuf>,
    /// Structured export error codes; any entry fails the whole export
    pub errors: Vec<String>,
}

/// Media library trait
///
/// # Platform Support
///
/// - **iOS**: PhotoKit, multi-representation export of live photos and bursts
/// - **Android**: MediaStore, single representation only
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// List albums; smart albums (Recents, Favorites) are included when requested
    async fn list_albums(&self, include_smart_albums: bool) -> Result<Vec<Album>>;

    /// Fetch one page of assets from an album
    ///
    /// `after` is the `end_cursor` of the previous page.
    async fn list_assets(
        &self,
        album_id: &str,
        after: Option<String>,
        first: usize,
    ) -> Result<AssetPage>;

    /// Resolve extended information for an asset
    async fn asset_info(&self, asset: &MediaAsset) -> Result<AssetInfo>;

    /// Whether the platform can export every representation of an asset
    /// (live photo still + motion, burst frames)
    fn supports_multi_representation_export(&self) -> bool {
        false
    }

    /// Export all representations of an asset into `output_dir`, each file
    /// name prefixed with `file_prefix`
    async fn export_representations(
        &self,
        asset: &MediaAsset,
        output_dir: &Path,
        file_prefix: &str,
    ) -> Result<ExportOutcome>;
}

/// Image transcoder trait
#[async_trait]
pub trait ImageTranscoder: Send + Sync {
    /// Convert a HEIC image to a baseline JPEG and return the path of the
    /// converted file
    async fn heic_to_jpeg(&self, source: &Path) -> Result<PathBuf>;
}

/// Media permission probe
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Check whether media library and storage permissions are granted.
    ///
    /// When `prompt` is true the platform may show its permission dialog.
    async fn media_permissions_granted(&self, prompt: bool) -> Result<bool>;
}

//! # File Materializer
//!
//! Turns one local asset into the files that get handed to the upload queue.
//!
//! ## Overview
//!
//! Two paths exist:
//!
//! - **Primary copy**: the asset's content is copied to
//!   `<cacheDir>/<prefix>_<name>`. HEIC stills are transcoded to JPEG first
//!   unless HEIC uploads are enabled. Taken when only originals are wanted,
//!   when the platform cannot export representations, or when no
//!   live/burst conversion flag is set.
//! - **Representation export**: every representation (live photo still and
//!   motion, burst frames, edits) is exported into the cache directory and
//!   filtered:
//!   - `penultimate` intermediates are dropped
//!   - with live/burst conversion, stills of a live photo are dropped unless
//!     the keep-original flag is set too
//!   - HEIC stills are transcoded unless HEIC is enabled or the file is a
//!     `FullSizeRender` edit
//!
//! Every emitted name contains the asset's base name. One materialization
//! runs at a time; a failure removes every temporary file it created.

use crate::error::{CameraUploadError, Result};
use crate::index::normalize_timestamp_ms;
use crate::settings::MaterializeOptions;
use bridge_traits::media::{ImageTranscoder, MediaAsset, MediaKind, MediaLibrary};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::time::Clock;
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A file ready for the upload queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    /// Milliseconds
    pub last_modified: i64,
}

pub struct FileMaterializer {
    media_library: Arc<dyn MediaLibrary>,
    file_system: Arc<dyn FileSystemAccess>,
    transcoder: Arc<dyn ImageTranscoder>,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileMaterializer {
    pub fn new(
        media_library: Arc<dyn MediaLibrary>,
        file_system: Arc<dyn FileSystemAccess>,
        transcoder: Arc<dyn ImageTranscoder>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            media_library,
            file_system,
            transcoder,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Resolve the readable content URI of an asset
    pub async fn resolve_uri(&self, asset: &MediaAsset) -> Result<String> {
        let info = self.media_library.asset_info(asset).await?;

        [info.local_uri, info.uri, Some(asset.uri.clone())]
            .into_iter()
            .flatten()
            .find(|uri| !uri.is_empty())
            .ok_or_else(|| CameraUploadError::NoAssetUri {
                asset_id: asset.id.clone(),
            })
    }

    /// Produce the upload files for one asset
    #[instrument(skip(self, asset, options), fields(asset_id = %asset.id))]
    pub async fn materialize(
        &self,
        asset: &MediaAsset,
        asset_uri: &str,
        options: &MaterializeOptions,
    ) -> Result<Vec<UploadFile>> {
        let _guard = self.lock.lock().await;

        let cache_dir = self.file_system.get_cache_directory().await?;
        let prefix = Uuid::new_v4().simple().to_string();

        let export = !options.only_upload_original
            && self.media_library.supports_multi_representation_export()
            && options.wants_conversion();

        if export {
            self.export_all(asset, &cache_dir, &prefix, options).await
        } else {
            let file = self
                .copy_primary(asset, asset_uri, &cache_dir, &prefix, options)
                .await?;
            Ok(vec![file])
        }
    }

    // ========================================================================
    // Primary copy
    // ========================================================================

    async fn copy_primary(
        &self,
        asset: &MediaAsset,
        asset_uri: &str,
        cache_dir: &Path,
        prefix: &str,
        options: &MaterializeOptions,
    ) -> Result<UploadFile> {
        let mut source = PathBuf::from(asset_uri);
        let mut name = asset.filename.clone();
        let mut intermediate = None;

        if !options.enable_heic && is_heic(asset_uri) && asset.kind == MediaKind::Photo {
            let converted = self.transcoder.heic_to_jpeg(&source).await?;
            name = format!("{}.JPG", file_stem(&asset.filename));
            source = converted.clone();
            intermediate = Some(converted);
        }

        let target = cache_dir.join(format!("{}_{}", prefix, name));
        if self.file_system.exists(&target).await.unwrap_or(false) {
            self.discard(&target).await;
        }

        let copied = self.file_system.copy_file(&source, &target).await;
        if let Some(intermediate) = intermediate {
            self.discard(&intermediate).await;
        }
        copied?;

        let stat = match self.file_system.metadata(&target).await {
            Ok(stat) if stat.size > 0 => stat,
            Ok(_) => {
                self.discard(&target).await;
                return Err(CameraUploadError::EmptyFile { name });
            }
            Err(e) => {
                self.discard(&target).await;
                return Err(e.into());
            }
        };

        debug!(name = %name, size = stat.size, "Copied primary resource");
        Ok(UploadFile {
            mime_type: mime_for(&name),
            path: target,
            name,
            size: stat.size,
            last_modified: self.fallback_last_modified(asset),
        })
    }

    // ========================================================================
    // Representation export
    // ========================================================================

    async fn export_all(
        &self,
        asset: &MediaAsset,
        cache_dir: &Path,
        prefix: &str,
        options: &MaterializeOptions,
    ) -> Result<Vec<UploadFile>> {
        let outcome = self
            .media_library
            .export_representations(asset, cache_dir, prefix)
            .await?;

        if !outcome.errors.is_empty() {
            for path in &outcome.files {
                self.discard(path).await;
            }
            return Err(CameraUploadError::Export(outcome.errors.join(", ")));
        }

        let mut produced = Vec::new();
        match self
            .filter_exports(asset, &outcome.files, prefix, options, &mut produced)
            .await
        {
            Ok(files) => Ok(files),
            Err(e) => {
                for path in outcome.files.iter().chain(produced.iter()) {
                    if self.file_system.exists(path).await.unwrap_or(false) {
                        self.discard(path).await;
                    }
                }
                Err(e)
            }
        }
    }

    async fn filter_exports(
        &self,
        asset: &MediaAsset,
        exported: &[PathBuf],
        prefix: &str,
        options: &MaterializeOptions,
        produced: &mut Vec<PathBuf>,
    ) -> Result<Vec<UploadFile>> {
        let is_live = exported.iter().any(|path| is_motion(path));
        let asset_stem = file_stem(&asset.filename);
        let mut files = Vec::new();

        for path in exported {
            let lower = path.to_string_lossy().to_lowercase();

            if lower.contains("penultimate") {
                self.discard(path).await;
                continue;
            }

            if options.convert_live_and_burst
                && !options.convert_live_and_burst_keep_original
                && is_live
                && !is_motion(path)
            {
                debug!(resource = %display_name(path), "Dropping live photo still");
                self.discard(path).await;
                continue;
            }

            let resource_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .map(|n| n.strip_prefix(prefix).map(str::to_string).unwrap_or(n))
                .map(|n| n.strip_prefix('_').map(str::to_string).unwrap_or(n))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| asset.filename.clone());

            let transcode = !options.enable_heic
                && lower.ends_with(".heic")
                && asset.kind == MediaKind::Photo
                && !lower.contains("fullsizerender");

            let (path, name) = if transcode {
                let converted = self.transcoder.heic_to_jpeg(path).await?;
                produced.push(converted.clone());
                self.discard(path).await;

                let stem = if asset.filename.contains('.') {
                    file_stem(&resource_name)
                } else {
                    asset.filename.as_str()
                };
                let name = if stem.contains(asset_stem) {
                    format!("{}.JPG", stem)
                } else {
                    format!("{}_{}.JPG", asset_stem, stem)
                };
                (converted, name)
            } else {
                let name = if resource_name.contains(asset_stem) {
                    resource_name
                } else {
                    format!("{}{}", asset_stem, resource_name)
                };
                (path.clone(), name)
            };

            if !self.file_system.exists(&path).await? {
                return Err(CameraUploadError::MissingResource(display_name(&path)));
            }
            let stat = self.file_system.metadata(&path).await?;

            files.push(UploadFile {
                mime_type: mime_for(&name),
                path,
                name,
                size: stat.size,
                last_modified: self.fallback_last_modified(asset),
            });
        }

        debug!(exported = exported.len(), emitted = files.len(), "Filtered exported representations");
        Ok(files)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Creation time, else modification time, else now
    fn fallback_last_modified(&self, asset: &MediaAsset) -> i64 {
        [asset.creation_time, asset.modification_time]
            .into_iter()
            .find(|ts| *ts > 0)
            .map(normalize_timestamp_ms)
            .unwrap_or_else(|| self.clock.unix_timestamp_millis())
    }

    /// Best-effort removal of a temporary file
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = self.file_system.delete_file(path).await {
            warn!(file = %display_name(path), error = %e, "Could not remove temporary file");
        }
    }
}

fn is_heic(uri: &str) -> bool {
    uri.to_lowercase().ends_with(".heic")
}

fn is_motion(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".mov")
}

/// Filename without its last extension
fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(pos) => &filename[..pos],
        None => filename,
    }
}

fn mime_for(name: &str) -> String {
    mime_guess::from_path(name).first_or_octet_stream().to_string()
}

fn display_name(path: &Path) -> String {
    strip_path(&path.to_string_lossy()).to_string()
}

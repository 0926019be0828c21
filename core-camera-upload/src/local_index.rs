//! # Local Media Index Builder
//!
//! Enumerates on-device media into a [`MediaIndex`] keyed by delta-name.
//!
//! ## Workflow
//!
//! 1. List every album, smart albums included, and drop the excluded ones
//! 2. Page through each album's assets, keeping the first copy of every id
//! 3. Sort by creation time, oldest first
//! 4. Apply the media-type, enrollment-time and extension filters
//! 5. Assign collision-free delta-names
//!
//! Builds are serialized: a caller that arrives while another build is in
//! flight waits for it to finish. Any enumeration error discards the partial
//! result.
//!
//! ## Name Collisions
//!
//! Candidates are tried in order and the first whose delta-name is free wins:
//!
//! ```text
//! IMG_0001.JPG
//! IMG_0001_<creationMs>.JPG
//! IMG_0001_<sha256(assetId)[..10]>.JPG
//! IMG_0001_<sha256(assetId)[..10]>_<n>.JPG
//! ```

use crate::error::Result;
use crate::index::{delta_name, normalize_timestamp_ms, IndexEntry, MediaIndex};
use crate::settings::UserSettings;
use bridge_traits::media::{MediaAsset, MediaLibrary};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Length of the hex asset-id hash used in the third naming tier.
const ID_HASH_LEN: usize = 10;

pub struct LocalIndexBuilder {
    media_library: Arc<dyn MediaLibrary>,
    page_size: usize,
    lock: Mutex<()>,
}

impl LocalIndexBuilder {
    pub fn new(media_library: Arc<dyn MediaLibrary>, page_size: usize) -> Self {
        Self {
            media_library,
            page_size: page_size.max(1),
            lock: Mutex::new(()),
        }
    }

    /// Build the local index for a settings snapshot
    #[instrument(skip(self, settings), fields(user_id = %settings.user_id))]
    pub async fn build(&self, settings: &UserSettings) -> Result<MediaIndex> {
        let _guard = self.lock.lock().await;

        let assets = self.enumerate(settings).await?;
        let enumerated = assets.len();

        let mut assets: Vec<MediaAsset> = assets
            .into_iter()
            .filter(|asset| settings.media_types.admits(asset, settings.enrollment_ms))
            .collect();
        assets.sort_by_key(|asset| normalize_timestamp_ms(asset.creation_time));

        let index = assign_names(assets);
        info!(enumerated, indexed = index.len(), "Built local index");
        Ok(index)
    }

    async fn enumerate(&self, settings: &UserSettings) -> Result<Vec<MediaAsset>> {
        let albums = self.media_library.list_albums(true).await?;

        let mut seen = HashSet::new();
        let mut assets = Vec::new();

        for album in albums {
            if settings.excluded_albums.contains(&album.id) {
                debug!(album_id = %album.id, title = %album.title, "Skipping excluded album");
                continue;
            }

            let mut cursor = None;
            loop {
                let page = self
                    .media_library
                    .list_assets(&album.id, cursor.take(), self.page_size)
                    .await?;

                for asset in page.assets {
                    if seen.insert(asset.id.clone()) {
                        assets.push(asset);
                    }
                }

                match page.end_cursor {
                    Some(next) if page.has_next_page => cursor = Some(next),
                    _ => break,
                }
            }
        }

        Ok(assets)
    }
}

/// Short stable hash of an asset id
pub fn id_hash(asset_id: &str) -> String {
    let digest = Sha256::digest(asset_id.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(ID_HASH_LEN);
    hash
}

fn split_filename(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

fn with_suffix(stem: &str, suffix: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    }
}

fn assign_names(assets: Vec<MediaAsset>) -> MediaIndex {
    let mut index = MediaIndex::new();

    for asset in assets {
        let (stem, ext) = split_filename(&asset.filename);
        let hash = id_hash(&asset.id);

        let mut candidates = vec![
            asset.filename.clone(),
            with_suffix(stem, &normalize_timestamp_ms(asset.creation_time).to_string(), ext),
            with_suffix(stem, &hash, ext),
        ]
        .into_iter();

        let mut counter = 0u32;
        let name = loop {
            let candidate = candidates.next().unwrap_or_else(|| {
                counter += 1;
                with_suffix(stem, &format!("{}_{}", hash, counter), ext)
            });
            if !index.contains_key(&delta_name(&candidate)) {
                break candidate;
            }
        };

        if name != asset.filename {
            debug!(asset_id = %asset.id, filename = %asset.filename, name = %name, "Renamed colliding asset");
        }

        index.insert(delta_name(&name), IndexEntry::local(name, asset));
    }

    index
}

//! Album listing and exclusion management for the camera upload settings UI.

use crate::error::Result;
use crate::settings::CameraUploadSettings;
use bridge_traits::media::{Album, MediaLibrary};
use std::sync::Arc;
use tracing::info;

/// An album and whether its assets are left out of camera upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumSelection {
    pub album: Album,
    pub excluded: bool,
}

pub struct AlbumExclusions {
    media_library: Arc<dyn MediaLibrary>,
    settings: CameraUploadSettings,
}

impl AlbumExclusions {
    pub fn new(media_library: Arc<dyn MediaLibrary>, settings: CameraUploadSettings) -> Self {
        Self {
            media_library,
            settings,
        }
    }

    /// Non-empty albums, largest first, with their exclusion flag
    pub async fn list(&self, user_id: &str) -> Result<Vec<AlbumSelection>> {
        let excluded = self.settings.excluded_albums(user_id).await?;

        let mut albums: Vec<AlbumSelection> = self
            .media_library
            .list_albums(true)
            .await?
            .into_iter()
            .filter(|album| album.asset_count > 0)
            .map(|album| AlbumSelection {
                excluded: excluded.contains(&album.id),
                album,
            })
            .collect();

        albums.sort_by(|a, b| b.album.asset_count.cmp(&a.album.asset_count));
        Ok(albums)
    }

    /// Flip the exclusion of one album and return the new state
    pub async fn toggle(&self, user_id: &str, album_id: &str) -> Result<bool> {
        let excluded = !self
            .settings
            .excluded_albums(user_id)
            .await?
            .contains(album_id);

        self.settings
            .set_album_excluded(user_id, album_id, excluded)
            .await?;

        info!(user_id, album_id, excluded, "Toggled camera upload album");
        Ok(excluded)
    }
}

//! # Remote Index Loader
//!
//! Builds a [`MediaIndex`] of the remote camera upload folder.
//!
//! ## Overview
//!
//! The listing is fetched in one request and sorted by upload timestamp.
//! Decrypting every entry is the expensive part, so the decrypted index is
//! cached in the settings store under
//! `cameraUploadLastLoadRemoteCache:<folderUUID>` together with the uuid of
//! the newest entry and the entry count. The cache is reused only while both
//! still match the fresh listing.
//!
//! Entries that fail to decrypt, or decrypt to an empty name, are skipped.

use crate::error::Result;
use crate::index::{delta_name, IndexEntry, MediaIndex};
use crate::settings::keys;
use bridge_traits::cloud::{MetadataCodec, RemoteDirectory};
use bridge_traits::storage::SettingsStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The listing endpoint returns the whole folder on its first page.
const LISTING_PAGE: u32 = 1;

/// Cached decrypted listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIndexCache {
    /// Uuid of the newest entry when the cache was written
    pub uuid: String,
    pub count: usize,
    pub items: MediaIndex,
}

pub struct RemoteIndexLoader {
    remote_directory: Arc<dyn RemoteDirectory>,
    metadata_codec: Arc<dyn MetadataCodec>,
    store: Arc<dyn SettingsStore>,
}

impl RemoteIndexLoader {
    pub fn new(
        remote_directory: Arc<dyn RemoteDirectory>,
        metadata_codec: Arc<dyn MetadataCodec>,
        store: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            remote_directory,
            metadata_codec,
            store,
        }
    }

    /// Load the index of `folder_uuid`, decrypting with `master_keys`
    #[instrument(skip(self, master_keys))]
    pub async fn load(&self, folder_uuid: &str, master_keys: &[String]) -> Result<MediaIndex> {
        let mut uploads = self
            .remote_directory
            .list_uploads(folder_uuid, LISTING_PAGE)
            .await?;

        if uploads.is_empty() {
            debug!("Remote folder is empty");
            return Ok(MediaIndex::new());
        }

        uploads.sort_by_key(|upload| upload.timestamp);
        let count = uploads.len();
        let last_uuid = uploads[count - 1].uuid.clone();

        if let Some(cache) = self.cached(folder_uuid).await? {
            if cache.count == count && cache.uuid == last_uuid {
                debug!(count, "Remote listing unchanged, using cached index");
                return Ok(cache.items);
            }
        }

        let mut items = MediaIndex::new();
        let mut skipped = 0usize;

        for upload in &uploads {
            let decrypted = match self
                .metadata_codec
                .decrypt_file_metadata(master_keys, &upload.metadata, &upload.uuid)
                .await
            {
                Ok(decrypted) => decrypted,
                Err(e) => {
                    warn!(uuid = %upload.uuid, error = %e, "Could not decrypt remote metadata");
                    skipped += 1;
                    continue;
                }
            };

            if decrypted.name.is_empty() {
                skipped += 1;
                continue;
            }

            let last_modified = decrypted.last_modified.unwrap_or(upload.timestamp);
            items.insert(
                delta_name(&decrypted.name),
                IndexEntry::remote(decrypted.name, upload.uuid.clone(), last_modified),
            );
        }

        if skipped == count {
            // Retried on the next pass instead of cached
            warn!(count, "No remote entry could be decrypted, not caching");
            return Ok(items);
        }

        let cache = RemoteIndexCache {
            uuid: last_uuid,
            count,
            items,
        };
        self.store
            .set_string(&keys::remote_cache(folder_uuid), &serde_json::to_string(&cache)?)
            .await?;

        info!(count, indexed = cache.items.len(), skipped, "Loaded remote index");
        Ok(cache.items)
    }

    async fn cached(&self, folder_uuid: &str) -> Result<Option<RemoteIndexCache>> {
        let Some(raw) = self.store.get_string(&keys::remote_cache(folder_uuid)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(cache) => Ok(Some(cache)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable remote index cache");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntryOrigin;
    use crate::test_support::MemoryStore;
    use async_trait::async_trait;
    use bridge_traits::cloud::{DecryptedFileMetadata, FolderPresence, RemoteUpload};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    const FOLDER: &str = "0d6c7f5e-2f5b-4c1e-8f57-3a0e3d1e8c11";

    #[derive(Default)]
    struct Listing {
        uploads: Mutex<Vec<RemoteUpload>>,
    }

    #[async_trait]
    impl RemoteDirectory for Listing {
        async fn list_uploads(&self, _folder: &str, page: u32) -> BridgeResult<Vec<RemoteUpload>> {
            assert_eq!(page, 1);
            Ok(self.uploads.lock().await.clone())
        }

        async fn folder_presence(&self, _folder: &str) -> BridgeResult<FolderPresence> {
            Ok(FolderPresence {
                present: true,
                trashed: false,
            })
        }
    }

    /// Metadata is the plain name; "!" fails to decrypt.
    #[derive(Default)]
    struct PlainCodec {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataCodec for PlainCodec {
        async fn decrypt_file_metadata(
            &self,
            _keys: &[String],
            metadata: &str,
            _uuid: &str,
        ) -> BridgeResult<DecryptedFileMetadata> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if metadata == "!" {
                return Err(BridgeError::OperationFailed("bad key".into()));
            }
            Ok(DecryptedFileMetadata {
                name: metadata.to_string(),
                last_modified: Some(1_700_000_000_000),
            })
        }
    }

    fn upload(uuid: &str, name: &str, timestamp: i64) -> RemoteUpload {
        RemoteUpload {
            uuid: uuid.to_string(),
            metadata: name.to_string(),
            timestamp,
        }
    }

    fn loader() -> (RemoteIndexLoader, Arc<Listing>, Arc<PlainCodec>) {
        let listing = Arc::new(Listing::default());
        let codec = Arc::new(PlainCodec::default());
        let loader = RemoteIndexLoader::new(
            listing.clone(),
            codec.clone(),
            Arc::new(MemoryStore::default()),
        );
        (loader, listing, codec)
    }

    #[tokio::test]
    async fn test_empty_listing_is_empty_index() {
        let (loader, _, codec) = loader();
        let index = loader.load(FOLDER, &[]).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(codec.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skips_undecryptable_and_nameless_entries() {
        let (loader, listing, _) = loader();
        *listing.uploads.lock().await = vec![
            upload("u2", "IMG_2.JPG", 20),
            upload("u1", "IMG_1.JPG", 10),
            upload("u3", "!", 30),
            upload("u4", "", 40),
        ];

        let index = loader.load(FOLDER, &["key".to_string()]).await.unwrap();

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["img_1", "img_2"]);
        let entry = index.get("img_2").unwrap();
        assert_eq!(entry.id, "u2");
        assert_eq!(entry.origin, EntryOrigin::Remote);
        assert_eq!(entry.last_modified, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_cache_reused_until_count_or_last_uuid_changes() {
        let (loader, listing, codec) = loader();
        *listing.uploads.lock().await = vec![upload("u1", "a.jpg", 1), upload("u2", "b.jpg", 2)];

        let first = loader.load(FOLDER, &[]).await.unwrap();
        assert_eq!(codec.calls.load(Ordering::SeqCst), 2);

        let second = loader.load(FOLDER, &[]).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(codec.calls.load(Ordering::SeqCst), 2);

        listing.uploads.lock().await.push(upload("u3", "c.jpg", 3));
        let third = loader.load(FOLDER, &[]).await.unwrap();
        assert_eq!(third.len(), 3);
        assert_eq!(codec.calls.load(Ordering::SeqCst), 5);

        // Same count, different newest entry
        listing.uploads.lock().await[2] = upload("u4", "d.jpg", 4);
        let fourth = loader.load(FOLDER, &[]).await.unwrap();
        assert!(fourth.contains_key("d"));
        assert!(!fourth.contains_key("c"));
        assert_eq!(codec.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_all_failed_decryption_is_not_cached() {
        let (loader, listing, codec) = loader();
        *listing.uploads.lock().await = vec![upload("u1", "!", 1), upload("u2", "!", 2)];

        assert!(loader.load(FOLDER, &[]).await.unwrap().is_empty());
        assert_eq!(codec.calls.load(Ordering::SeqCst), 2);

        // Same listing decrypts once the right keys are in place
        *listing.uploads.lock().await = vec![upload("u1", "a.jpg", 1), upload("u2", "b.jpg", 2)];
        let index = loader.load(FOLDER, &[]).await.unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(codec.calls.load(Ordering::SeqCst), 4);
    }
}

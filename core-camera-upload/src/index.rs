//! # Media Index
//!
//! The shape shared by the local and remote indexes.
//!
//! Both sides are keyed by a *delta-name*: the lowercased filename with its
//! extension stripped. Local and remote entries with the same delta-name are
//! considered the same asset when deltas are computed.

use bridge_traits::media::MediaAsset;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timestamps above this many seconds would land after the year 2100, so a
/// value this large is already in milliseconds.
const SECONDS_CEILING: i64 = 4_102_444_800;

/// Normalize a platform timestamp (seconds or milliseconds) to milliseconds.
pub fn normalize_timestamp_ms(timestamp: i64) -> i64 {
    if timestamp > SECONDS_CEILING {
        timestamp
    } else {
        timestamp * 1000
    }
}

/// Derive the join key for a filename.
///
/// ```
/// use core_camera_upload::index::delta_name;
///
/// assert_eq!(delta_name("IMG_0001.HEIC"), "img_0001");
/// assert_eq!(delta_name("archive.tar.gz"), "archive.tar");
/// assert_eq!(delta_name("README"), "readme");
/// ```
pub fn delta_name(filename: &str) -> String {
    let lower = filename.to_lowercase();
    if !lower.contains('.') {
        return lower;
    }

    Path::new(&lower)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(lower)
}

/// Where an index entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryOrigin {
    Local,
    Remote,
}

/// One asset in an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Display name (local names may carry a disambiguation suffix)
    pub name: String,
    /// Logical last-modified time in milliseconds
    pub last_modified: i64,
    /// Creation time in milliseconds
    pub creation_time: i64,
    /// Platform asset id (local) or server uuid (remote)
    pub id: String,
    pub origin: EntryOrigin,
    /// Source asset, present for local entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<MediaAsset>,
}

impl IndexEntry {
    /// Build a local entry from a platform asset
    pub fn local(name: String, asset: MediaAsset) -> Self {
        Self {
            name,
            last_modified: normalize_timestamp_ms(asset.modification_time),
            creation_time: normalize_timestamp_ms(asset.creation_time),
            id: asset.id.clone(),
            origin: EntryOrigin::Local,
            asset: Some(asset),
        }
    }

    /// Build a remote entry from decrypted metadata
    pub fn remote(name: String, uuid: String, last_modified: i64) -> Self {
        let last_modified = normalize_timestamp_ms(last_modified);
        Self {
            name,
            last_modified,
            creation_time: last_modified,
            id: uuid,
            origin: EntryOrigin::Remote,
            asset: None,
        }
    }
}

/// Insertion-ordered map from delta-name to entry.
///
/// Iteration follows first insertion; re-inserting a key replaces the entry
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaIndex(IndexMap<String, IndexEntry>);

impl MediaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry, returning the previous one
    pub fn insert(&mut self, key: String, entry: IndexEntry) -> Option<IndexEntry> {
        self.0.insert(key, entry)
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Vec<(String, IndexEntry)>> for MediaIndex {
    fn from(pairs: Vec<(String, IndexEntry)>) -> Self {
        Self(pairs.into_iter().collect())
    }
}

impl FromIterator<(String, IndexEntry)> for MediaIndex {
    fn from_iter<I: IntoIterator<Item = (String, IndexEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(name: &str, uuid: &str) -> IndexEntry {
        IndexEntry::remote(name.to_string(), uuid.to_string(), 1_700_000_000_000)
    }

    #[test]
    fn test_normalize_seconds_and_millis() {
        assert_eq!(normalize_timestamp_ms(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp_ms(1_700_000_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp_ms(0), 0);
    }

    #[test]
    fn test_delta_name() {
        assert_eq!(delta_name("IMG_1.JPG"), "img_1");
        assert_eq!(delta_name("IMG_1.jpg"), "img_1");
        assert_eq!(delta_name("IMG_1"), "img_1");
        assert_eq!(delta_name(".hidden"), ".hidden");
        assert_eq!(delta_name("clip.final.MOV"), "clip.final");
    }

    #[test]
    fn test_insertion_order_and_replace() {
        let mut index = MediaIndex::new();
        index.insert("b".into(), remote("b.jpg", "1"));
        index.insert("a".into(), remote("a.jpg", "2"));
        let previous = index.insert("b".into(), remote("b.jpg", "3"));

        assert_eq!(previous.map(|e| e.id), Some("1".to_string()));
        assert_eq!(index.len(), 2);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(index.get("b").map(|e| e.id.as_str()), Some("3"));
    }

    #[test]
    fn test_serde_preserves_order() {
        let mut index = MediaIndex::new();
        index.insert("z".into(), remote("z.png", "1"));
        index.insert("y".into(), remote("y.png", "2"));

        let json = serde_json::to_string(&index).unwrap();
        let decoded: MediaIndex = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, index);
        assert_eq!(decoded.keys().collect::<Vec<_>>(), vec!["z", "y"]);
    }

    #[test]
    fn test_from_pairs_keeps_last_duplicate_in_first_slot() {
        let index = MediaIndex::from(vec![
            ("a".to_string(), remote("a.jpg", "1")),
            ("b".to_string(), remote("b.jpg", "2")),
            ("a".to_string(), remote("a.jpg", "3")),
        ]);

        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(index.get("a").map(|e| e.id.as_str()), Some("3"));
        assert!(index.contains_key("b"));
    }
}

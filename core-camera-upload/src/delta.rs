//! # Delta Computer
//!
//! Reconciles the local index, the remote index and the persisted per-asset
//! state into the list of uploads a run has to perform.
//!
//! | remote has name | stored state      | result  |
//! |-----------------|-------------------|---------|
//! | no              | none              | Upload  |
//! | no              | same mtime        | -       |
//! | no              | different mtime   | Upload  |
//! | yes             | none              | -       |
//! | yes             | same mtime        | -       |
//! | yes             | different mtime   | Update  |
//!
//! A same-named remote entry without local bookkeeping is taken as already
//! synced, which also means an unrelated remote file sharing the base name
//! hides the local asset.

use crate::error::Result;
use crate::index::{IndexEntry, MediaIndex};
use crate::state::{PerAssetUploadState, UploadStateRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeltaKind {
    /// Not on the remote side yet
    Upload,
    /// On the remote side but changed locally since the last sync
    Update,
}

impl DeltaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::Upload => "UPLOAD",
            DeltaKind::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One required action for a local entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub kind: DeltaKind,
    pub item: IndexEntry,
}

/// Compute deltas in local index order
pub fn compute_deltas(
    local: &MediaIndex,
    remote: &MediaIndex,
    states: &HashMap<String, PerAssetUploadState>,
) -> Vec<Delta> {
    local
        .iter()
        .filter_map(|(name, entry)| {
            let changed = states
                .get(&entry.id)
                .map(|state| !state.matches_logical(entry.last_modified));

            let kind = match (remote.contains_key(name), changed) {
                (false, None) | (false, Some(true)) => DeltaKind::Upload,
                (true, Some(true)) => DeltaKind::Update,
                _ => return None,
            };

            Some(Delta {
                kind,
                item: entry.clone(),
            })
        })
        .collect()
}

/// Compute deltas against the stored upload state
pub async fn get_deltas(
    local: &MediaIndex,
    remote: &MediaIndex,
    states: &dyn UploadStateRepository,
) -> Result<Vec<Delta>> {
    let states = states.load_all().await?;
    let deltas = compute_deltas(local, remote, &states);

    debug!(
        local = local.len(),
        remote = remote.len(),
        deltas = deltas.len(),
        "Computed deltas"
    );
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::EntryOrigin;
    use crate::test_support::asset;

    fn local(entries: &[(&str, &str, i64)]) -> MediaIndex {
        entries
            .iter()
            .map(|(id, filename, seconds)| {
                let entry = IndexEntry::local(filename.to_string(), asset(id, filename, *seconds));
                (crate::index::delta_name(filename), entry)
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn remote(names: &[&str]) -> MediaIndex {
        names
            .iter()
            .map(|name| {
                (
                    crate::index::delta_name(name),
                    IndexEntry::remote(name.to_string(), format!("uuid-{}", name), 1),
                )
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn state(logical: i64) -> PerAssetUploadState {
        PerAssetUploadState {
            last_modified_logical: logical,
            last_modified_filesystem: None,
            last_uploaded_size: None,
        }
    }

    #[test]
    fn test_new_asset_uploads() {
        let local = local(&[("a1", "IMG_1.JPG", 100)]);
        let deltas = compute_deltas(&local, &MediaIndex::new(), &HashMap::new());

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, DeltaKind::Upload);
        assert_eq!(deltas[0].item.name, "IMG_1.JPG");
        assert_eq!(deltas[0].item.origin, EntryOrigin::Local);
    }

    #[test]
    fn test_unchanged_state_skips_even_without_remote() {
        let local = local(&[("a1", "IMG_1.JPG", 100)]);
        let states = HashMap::from([("a1".to_string(), state(100_000))]);

        assert!(compute_deltas(&local, &MediaIndex::new(), &states).is_empty());
        assert!(compute_deltas(&local, &remote(&["IMG_1.JPG"]), &states).is_empty());
    }

    #[test]
    fn test_changed_state_without_remote_uploads() {
        let local = local(&[("a1", "IMG_1.JPG", 100)]);
        let states = HashMap::from([("a1".to_string(), state(1))]);

        let deltas = compute_deltas(&local, &MediaIndex::new(), &states);
        assert_eq!(deltas[0].kind, DeltaKind::Upload);
    }

    #[test]
    fn test_remote_present_classification() {
        let local = local(&[("a1", "IMG_1.JPG", 100), ("a2", "IMG_2.JPG", 200)]);
        let remote = remote(&["img_1.heic", "IMG_2.JPG"]);
        let states = HashMap::from([("a2".to_string(), state(1))]);

        let deltas = compute_deltas(&local, &remote, &states);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].kind, DeltaKind::Update);
        assert_eq!(deltas[0].item.id, "a2");
    }

    #[test]
    fn test_output_follows_local_order() {
        let local = local(&[
            ("c", "C.JPG", 3),
            ("a", "A.JPG", 1),
            ("b", "B.JPG", 2),
        ]);
        let ids: Vec<_> = compute_deltas(&local, &MediaIndex::new(), &HashMap::new())
            .into_iter()
            .map(|d| d.item.id)
            .collect();

        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}

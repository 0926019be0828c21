//! Media type and extension filtering for the local index.

use bridge_traits::media::{MediaAsset, MediaKind};

/// Photo extensions accepted for upload.
pub const PHOTO_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "heic", "heif", "apng", "avif", "jfif", "pjpeg", "pjp", "svg",
    "webp", "bmp", "ico", "cur", "tif", "tiff",
];

/// Video extensions accepted for upload.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "hevc", "webm", "mkv", "flv", "vob", "ogv", "ogg", "drc", "gifv", "mng", "avi", "mts",
    "m2ts2", "ts", "mov", "wmv", "mp4", "m4p", "m4v", "mpg", "mp2", "mpeg", "m2v", "3gp",
];

/// Lowercased extension of a filename, if any
pub fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Which media kinds the user wants uploaded.
///
/// The flags narrow both the accepted kinds and the extension allow-list.
/// With neither flag set no extension is allowed, so nothing is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaTypeFilter {
    pub include_images: bool,
    pub include_videos: bool,
}

impl MediaTypeFilter {
    pub fn new(include_images: bool, include_videos: bool) -> Self {
        Self {
            include_images,
            include_videos,
        }
    }

    /// Kinds accepted by this filter.
    ///
    /// Choosing exactly one of images or videos narrows the index to that
    /// kind. `Other` always rides along.
    pub fn accepts_kind(&self, kind: MediaKind) -> bool {
        if self.include_images == self.include_videos {
            return true;
        }

        match kind {
            MediaKind::Photo => self.include_images,
            MediaKind::Video => self.include_videos,
            MediaKind::Other => true,
        }
    }

    /// Extensions uploaded under the current flags
    pub fn allowed_extensions(&self) -> impl Iterator<Item = &'static str> {
        let photos: &'static [&'static str] = if self.include_images {
            PHOTO_EXTENSIONS
        } else {
            &[]
        };
        let videos: &'static [&'static str] = if self.include_videos {
            VIDEO_EXTENSIONS
        } else {
            &[]
        };
        photos.iter().chain(videos.iter()).copied()
    }

    /// Whether the filename carries an extension from the allow-list
    pub fn accepts_extension(&self, filename: &str) -> bool {
        match extension(filename) {
            Some(ext) => self.allowed_extensions().any(|allowed| allowed == ext),
            None => false,
        }
    }

    /// Full local-index admission check for one asset.
    ///
    /// `enrollment_ms` is the normalized time camera upload was first enabled.
    pub fn admits(&self, asset: &MediaAsset, enrollment_ms: i64) -> bool {
        self.accepts_kind(asset.kind)
            && crate::index::normalize_timestamp_ms(asset.creation_time) >= enrollment_ms
            && self.accepts_extension(&asset.filename)
    }
}

//! Cloud Collaborator Abstractions
//!
//! Narrow interfaces to the remote directory API, the metadata crypto module
//! and the upload transport. The engine never sees raw HTTP or key material
//! beyond what these traits pass through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// An entry of the remote upload folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUpload {
    /// Server-assigned id
    pub uuid: String,
    /// Encrypted file metadata
    pub metadata: String,
    /// Server-side upload timestamp
    pub timestamp: i64,
}

/// Presence of a remote folder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderPresence {
    pub present: bool,
    pub trashed: bool,
}

/// Decrypted file metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecryptedFileMetadata {
    pub name: String,
    /// Logical last-modified timestamp recorded by the uploader
    pub last_modified: Option<i64>,
}

/// A file ready to be handed to the upload transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    /// Unix milliseconds
    pub last_modified: i64,
    /// Destination folder id
    pub parent_uuid: String,
    pub is_camera_upload: bool,
}

/// Remote directory listing service
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// List the uploads of a folder
    async fn list_uploads(&self, folder_uuid: &str, page: u32) -> Result<Vec<RemoteUpload>>;

    /// Check whether a folder still exists and whether it is trashed
    async fn folder_presence(&self, folder_uuid: &str) -> Result<FolderPresence>;
}

/// Metadata codec
#[async_trait]
pub trait MetadataCodec: Send + Sync {
    /// Decrypt the metadata of one remote file with the user's master keys
    async fn decrypt_file_metadata(
        &self,
        keys: &[String],
        metadata: &str,
        uuid: &str,
    ) -> Result<DecryptedFileMetadata>;
}

/// Upload queue service
#[async_trait]
pub trait UploadQueue: Send + Sync {
    /// Queue a file for upload. Returns once the transport accepted or
    /// rejected the file.
    async fn enqueue(&self, request: UploadRequest) -> Result<()>;
}

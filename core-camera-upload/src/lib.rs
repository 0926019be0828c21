//! # Camera Upload Engine
//!
//! Keeps a device's photos and videos synchronized into an encrypted cloud
//! folder.
//!
//! ## Overview
//!
//! Each pass of the engine:
//! - Enumerates local media into an index keyed by delta-name
//! - Loads and decrypts the remote folder listing, with a cached index
//! - Computes which local assets need an upload or an update
//! - Materializes each asset into uploadable files (HEIC conversion,
//!   live photo and burst splitting)
//! - Hands the files to the host upload queue with bounded concurrency and
//!   records per-asset idempotency state
//!
//! ## Components
//!
//! - **Index** (`index`): Shared index entry shape and delta-name derivation
//! - **Local Index Builder** (`local_index`): Album enumeration, filtering and collision-free naming
//! - **Remote Index Loader** (`remote_index`): Listing decryption with a count/last-uuid cache
//! - **Delta Computer** (`delta`): Upload/update classification
//! - **File Materializer** (`materializer`): Temporary upload files per asset
//! - **Upload State** (`state`): Durable per-asset markers
//! - **Run State Machine** (`run`): Pass phases and outcomes
//! - **Upload Scheduler** (`scheduler`): Gating, execution and the periodic loop
//! - **Settings** (`settings`): Typed access to the host settings store
//! - **Albums** (`albums`): Album exclusion management

pub mod albums;
pub mod delta;
pub mod error;
pub mod filter;
pub mod index;
pub mod local_index;
pub mod materializer;
pub mod remote_index;
pub mod run;
pub mod scheduler;
pub mod settings;
pub mod state;

#[cfg(test)]
mod test_support;

pub use albums::{AlbumExclusions, AlbumSelection};
pub use delta::{compute_deltas, get_deltas, Delta, DeltaKind};
pub use error::{CameraUploadError, Result};
pub use filter::MediaTypeFilter;
pub use index::{delta_name, EntryOrigin, IndexEntry, MediaIndex};
pub use local_index::LocalIndexBuilder;
pub use materializer::{FileMaterializer, UploadFile};
pub use remote_index::{RemoteIndexCache, RemoteIndexLoader};
pub use run::{GateFailure, RunOutcome, RunPhase, RunSummary};
pub use scheduler::UploadScheduler;
pub use settings::{CameraUploadSettings, MaterializeOptions, UploadProgress, UserFlag, UserSettings};
pub use state::{PerAssetUploadState, SettingsUploadStateRepository, UploadStateRepository};

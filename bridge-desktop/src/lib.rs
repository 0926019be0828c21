//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Desktop hosts have no photo library, so only the storage and network
//! capabilities are provided here:
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `FileSystemAccess` using `tokio::fs`
//! - `NetworkMonitor` using a TCP reachability probe
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{SqliteSettingsStore, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let settings = SqliteSettingsStore::new("/tmp/camera-upload/settings.db".into())
//!         .await
//!         .unwrap();
//!     let fs = TokioFileSystem::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod filesystem;
mod network;
mod settings;

pub use filesystem::TokioFileSystem;
pub use network::DesktopNetworkMonitor;
pub use settings::SqliteSettingsStore;

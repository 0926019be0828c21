//! Workspace facade crate.
//!
//! Re-exports the camera upload engine and its runtime so host applications
//! can depend on `camera-upload-workspace` with the `desktop-shims` feature
//! instead of wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_camera_upload as camera_upload;

#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use core_camera_upload::{RunOutcome, UploadScheduler};

#[cfg(feature = "desktop-shims")]
pub use core_runtime::config::{CameraUploadConfig, SchedulerSettings};

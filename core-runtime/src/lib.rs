//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the camera upload engine:
//! - Logging and tracing infrastructure
//! - Configuration management and bridge wiring
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the engine depends on. It
//! establishes the logging conventions, the fail-fast capability checks and
//! the event broadcasting used to surface upload progress to the host UI.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};

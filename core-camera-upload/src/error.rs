use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CameraUploadError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No asset URI found for {asset_id}")]
    NoAssetUri { asset_id: String },

    #[error("Materialized file {name} is empty")]
    EmptyFile { name: String },

    #[error("Representation export failed with error codes: {0}")]
    Export(String),

    #[error("Exported resource {0} does not exist")]
    MissingResource(String),

    #[error("Invalid run phase: {0}")]
    InvalidPhase(String),

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, CameraUploadError>;

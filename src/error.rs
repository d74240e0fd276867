//! Error types for the posture pipeline and its ports.

use thiserror::Error;

/// Reasons a landmark frame cannot be turned into posture metrics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("landmark {index} missing (frame has {len} points)")]
    MissingLandmark { index: usize, len: usize },

    #[error("landmark {index} has non-finite coordinates")]
    NonFinite { index: usize },

    #[error("face width is zero, spinal ratio undefined")]
    ZeroFaceWidth,
}

/// Failures reported by the pose-estimation collaborator.
#[derive(Error, Debug)]
pub enum PoseError {
    #[error("pose source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed pose record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures of an alert channel backend.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("audio backend unavailable: {0}")]
    Audio(String),

    #[error("notification dispatch failed: {0}")]
    Notification(String),
}

/// Failures of the key-value store backing the daily ledger.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Invalid configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sensitivity {0} outside 20..=80")]
    SensitivityOutOfRange(u8),

    #[error("sensitivity {0} is not a multiple of 5")]
    SensitivityOffGrid(u8),

    #[error("hidden interval must be positive")]
    ZeroHiddenInterval,

    #[error("tone sample rate must be positive")]
    ZeroSampleRate,
}

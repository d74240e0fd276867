//! Posture classification from pose landmarks: smoothing, personal baseline
//! calibration, dwell-gated status, cooldown-limited alerts and daily
//! good/bad posture statistics.

pub mod alerts;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod hysteresis;
pub mod inference;
pub mod metrics;
pub mod pipeline;
pub mod posture;
pub mod scheduler;
pub mod smoothing;
pub mod stats;
pub mod store;
pub mod tone;

pub use config::{Config, Settings};
pub use driver::{Driver, Ports};
pub use pipeline::{FrameReport, Pipeline, PostureAnalysis};
pub use posture::{ClassificationStatus, Sensitivity};

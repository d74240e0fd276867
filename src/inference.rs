use crate::error::PoseError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

// BlazePose 33-point topology; only these five feed the posture metrics
pub const NOSE: usize = 0;
pub const LEFT_EAR: usize = 7;
pub const RIGHT_EAR: usize = 8;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;

pub const POSE_LANDMARK_COUNT: usize = 33;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

fn full_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.visibility.is_finite()
    }
}

/// Landmarks of the single detected person in one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    points: Vec<Landmark>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Landmark] {
        &self.points
    }
}

/// Pose-estimation collaborator.
///
/// `detect` returns `Ok(None)` when nobody is in view. Implementations own the
/// camera: `open` acquires it on session start and `release` frees it on stop.
pub trait PoseDetector {
    fn open(&mut self) -> Result<(), PoseError> {
        Ok(())
    }

    fn detect(&mut self, timestamp_ms: u64) -> Result<Option<LandmarkFrame>, PoseError>;

    fn release(&mut self) {}
}

/// One line of a landmark recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Capture time in epoch milliseconds
    pub t: u64,
    /// Whether the host surface was visible at this point
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// `None` when nobody was detected
    #[serde(default)]
    pub landmarks: Option<LandmarkFrame>,
}

fn default_visible() -> bool {
    true
}

/// Plays back a JSON-lines recording, serving the latest record at or before
/// the requested timestamp.
pub struct ReplayDetector {
    records: Vec<ReplayRecord>,
    cursor: usize,
}

impl ReplayDetector {
    pub fn new(mut records: Vec<ReplayRecord>) -> Self {
        records.sort_by_key(|r| r.t);
        Self { records, cursor: 0 }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PoseError> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record: ReplayRecord = serde_json::from_str(trimmed)
                .map_err(|e| PoseError::Malformed(format!("line {}: {}", line_no + 1, e)))?;
            records.push(record);
        }

        Ok(Self::new(records))
    }

    pub fn records(&self) -> &[ReplayRecord] {
        &self.records
    }
}

impl PoseDetector for ReplayDetector {
    fn detect(&mut self, timestamp_ms: u64) -> Result<Option<LandmarkFrame>, PoseError> {
        if self.records.is_empty() {
            return Err(PoseError::Unavailable("empty recording".to_string()));
        }

        while self.cursor + 1 < self.records.len() && self.records[self.cursor + 1].t <= timestamp_ms {
            self.cursor += 1;
        }

        let record = &self.records[self.cursor];
        if record.t > timestamp_ms {
            return Ok(None);
        }
        Ok(record.landmarks.clone())
    }

    fn release(&mut self) {
        self.cursor = 0;
    }
}

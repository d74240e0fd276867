//! Posture metric extraction from the five head/shoulder landmarks.

use crate::error::FrameError;
use crate::inference::{Landmark, LandmarkFrame, LEFT_EAR, LEFT_SHOULDER, NOSE, RIGHT_EAR, RIGHT_SHOULDER};
use crate::smoothing::SmoothingBuffer;
use serde::{Deserialize, Serialize};

/// The five scalar posture signals, raw or smoothed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureMetrics {
    /// Vertical gap between the shoulders
    pub shoulder_slope: f64,
    /// Horizontal offset of the nose from the shoulder midpoint
    pub neck_offset: f64,
    /// Horizontal offset of the nose from the ear midpoint
    pub head_yaw: f64,
    /// Ear-to-ear distance, a proxy for distance to the camera
    pub face_width: f64,
    /// Nose-to-shoulder height in face widths
    pub spinal_ratio: f64,
}

/// Smoothed metrics plus the landmark confidence of the frame that produced them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    pub raw: PostureMetrics,
    pub smoothed: PostureMetrics,
    pub confidence: f64,
}

struct KeyPoints {
    nose: Landmark,
    left_ear: Landmark,
    right_ear: Landmark,
    left_shoulder: Landmark,
    right_shoulder: Landmark,
}

fn key_point(frame: &LandmarkFrame, index: usize) -> Result<Landmark, FrameError> {
    let point = frame.get(index).copied().ok_or(FrameError::MissingLandmark {
        index,
        len: frame.len(),
    })?;
    if !point.is_finite() {
        return Err(FrameError::NonFinite { index });
    }
    Ok(point)
}

fn key_points(frame: &LandmarkFrame) -> Result<KeyPoints, FrameError> {
    Ok(KeyPoints {
        nose: key_point(frame, NOSE)?,
        left_ear: key_point(frame, LEFT_EAR)?,
        right_ear: key_point(frame, RIGHT_EAR)?,
        left_shoulder: key_point(frame, LEFT_SHOULDER)?,
        right_shoulder: key_point(frame, RIGHT_SHOULDER)?,
    })
}

/// Compute raw metrics for one frame without touching any smoothing state.
pub fn raw_metrics(frame: &LandmarkFrame) -> Result<(PostureMetrics, f64), FrameError> {
    let p = key_points(frame)?;

    let face_width = (p.left_ear.x - p.right_ear.x).abs();
    if face_width == 0.0 {
        return Err(FrameError::ZeroFaceWidth);
    }

    let shoulder_mid_x = (p.left_shoulder.x + p.right_shoulder.x) / 2.0;
    let shoulder_mid_y = (p.left_shoulder.y + p.right_shoulder.y) / 2.0;
    let ear_mid_x = (p.left_ear.x + p.right_ear.x) / 2.0;

    let metrics = PostureMetrics {
        shoulder_slope: (p.left_shoulder.y - p.right_shoulder.y).abs(),
        neck_offset: (p.nose.x - shoulder_mid_x).abs(),
        head_yaw: (p.nose.x - ear_mid_x).abs(),
        face_width,
        spinal_ratio: (shoulder_mid_y - p.nose.y).abs() / face_width,
    };
    let confidence = (p.left_shoulder.visibility + p.right_shoulder.visibility + p.nose.visibility) / 3.0;

    Ok((metrics, confidence))
}

/// Turns landmark frames into smoothed posture metrics, one buffer per channel.
#[derive(Debug, Default)]
pub struct MetricExtractor {
    shoulder_slope: SmoothingBuffer,
    neck_offset: SmoothingBuffer,
    head_yaw: SmoothingBuffer,
    face_width: SmoothingBuffer,
    spinal_ratio: SmoothingBuffer,
}

impl MetricExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract and smooth one frame.
    ///
    /// Degenerate frames are rejected before any buffer is written, so a bad
    /// frame never shifts the averages.
    pub fn extract(&mut self, frame: &LandmarkFrame) -> Result<Extraction, FrameError> {
        let (raw, confidence) = raw_metrics(frame)?;

        let smoothed = PostureMetrics {
            shoulder_slope: self.shoulder_slope.push(raw.shoulder_slope),
            neck_offset: self.neck_offset.push(raw.neck_offset),
            head_yaw: self.head_yaw.push(raw.head_yaw),
            face_width: self.face_width.push(raw.face_width),
            spinal_ratio: self.spinal_ratio.push(raw.spinal_ratio),
        };

        Ok(Extraction {
            raw,
            smoothed,
            confidence,
        })
    }

    /// Current smoothed values without pushing a new sample
    pub fn current(&self) -> PostureMetrics {
        PostureMetrics {
            shoulder_slope: self.shoulder_slope.mean(),
            neck_offset: self.neck_offset.mean(),
            head_yaw: self.head_yaw.mean(),
            face_width: self.face_width.mean(),
            spinal_ratio: self.spinal_ratio.mean(),
        }
    }

    /// Samples held by the shoulder-slope channel; calibration keys off this one.
    pub fn samples(&self) -> usize {
        self.shoulder_slope.len()
    }

    pub fn is_warm(&self) -> bool {
        self.shoulder_slope.is_full()
    }

    pub fn clear(&mut self) {
        self.shoulder_slope.clear();
        self.neck_offset.clear();
        self.head_yaw.clear();
        self.face_width.clear();
        self.spinal_ratio.clear();
    }
}

use crate::error::{ConfigError, FrameError};
use crate::inference::LandmarkFrame;
use crate::metrics::{Extraction, MetricExtractor, PostureMetrics};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible posture status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassificationStatus {
    Good,
    SitStraight,
    MoveBack,
    NoPerson,
    #[default]
    Initializing,
}

impl ClassificationStatus {
    pub fn is_bad(&self) -> bool {
        matches!(self, Self::SitStraight | Self::MoveBack)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good Posture",
            Self::SitStraight => "Sit Up Straight",
            Self::MoveBack => "Move Back",
            Self::NoPerson => "No Person Detected",
            Self::Initializing => "Initializing",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Good => "Keep it up! Your posture looks great.",
            Self::SitStraight => "Your shoulders are uneven or you're leaning forward.",
            Self::MoveBack => "You're too close to the screen. Move back a bit.",
            Self::NoPerson => "Make sure you're visible in the camera frame.",
            Self::Initializing => "Setting up pose detection...",
        }
    }
}

impl fmt::Display for ClassificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "good",
            Self::SitStraight => "sit-straight",
            Self::MoveBack => "move-back",
            Self::NoPerson => "no-person",
            Self::Initializing => "initializing",
        };
        f.write_str(s)
    }
}

/// Kind of posture violation the classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostureViolation {
    /// Slouching, leaning or turning away from the screen
    SitStraight,
    /// Face too close to the camera
    MoveBack,
}

impl PostureViolation {
    pub fn status(&self) -> ClassificationStatus {
        match self {
            Self::SitStraight => ClassificationStatus::SitStraight,
            Self::MoveBack => ClassificationStatus::MoveBack,
        }
    }
}

/// Per-frame classifier verdict before hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPosture {
    Good,
    Bad(PostureViolation),
}

impl RawPosture {
    pub fn status(&self) -> ClassificationStatus {
        match self {
            Self::Good => ClassificationStatus::Good,
            Self::Bad(v) => v.status(),
        }
    }
}

/// User-facing sensitivity, 20..=80 in steps of 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Sensitivity(u8);

impl Sensitivity {
    pub const MIN: u8 = 20;
    pub const MAX: u8 = 80;
    pub const STEP: u8 = 5;
    pub const DEFAULT: Sensitivity = Sensitivity(50);

    pub fn new(value: u8) -> Result<Self, ConfigError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(ConfigError::SensitivityOutOfRange(value));
        }
        if value % Self::STEP != 0 {
            return Err(ConfigError::SensitivityOffGrid(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// Threshold divisor: 1.0 at 50, larger (tighter) as sensitivity rises
    pub fn multiplier(&self) -> f64 {
        1.0 + (f64::from(self.0) - 50.0) / 100.0
    }

    pub fn thresholds(&self, baseline: &PostureBaseline) -> Thresholds {
        Thresholds::new(self.multiplier(), baseline)
    }
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Sensitivity {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sensitivity> for u8 {
    fn from(s: Sensitivity) -> u8 {
        s.0
    }
}

/// Personalized reference posture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureBaseline {
    pub shoulder_slope: f64,
    pub neck_offset: f64,
    pub head_yaw: f64,
    pub face_width: f64,
    pub spinal_ratio: f64,
}

impl PostureBaseline {
    /// Used until a personal baseline has been captured.
    pub const FALLBACK: PostureBaseline = PostureBaseline {
        shoulder_slope: 0.03,
        neck_offset: 0.05,
        head_yaw: 0.02,
        face_width: 0.15,
        spinal_ratio: 1.5,
    };
}

impl From<PostureMetrics> for PostureBaseline {
    fn from(m: PostureMetrics) -> Self {
        Self {
            shoulder_slope: m.shoulder_slope,
            neck_offset: m.neck_offset,
            head_yaw: m.head_yaw,
            face_width: m.face_width,
            spinal_ratio: m.spinal_ratio,
        }
    }
}

/// Allowed deviations from the baseline at a given sensitivity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub shoulder: f64,
    pub neck: f64,
    pub head_yaw: f64,
    pub spinal_ratio: f64,
    /// Absolute face width above which the user is too close
    pub distance: f64,
}

impl Thresholds {
    const SHOULDER: f64 = 0.04;
    const NECK: f64 = 0.06;
    const HEAD_YAW: f64 = 0.03;
    const SPINAL_RATIO: f64 = 0.18;
    const SPINAL_SCALE: f64 = 1.2;
    const DISTANCE_FACTOR: f64 = 1.4;

    pub fn new(multiplier: f64, baseline: &PostureBaseline) -> Self {
        Self {
            shoulder: Self::SHOULDER / multiplier,
            neck: Self::NECK / multiplier,
            head_yaw: Self::HEAD_YAW / multiplier,
            spinal_ratio: Self::SPINAL_RATIO / (multiplier * Self::SPINAL_SCALE),
            distance: baseline.face_width * Self::DISTANCE_FACTOR / multiplier,
        }
    }
}

/// Compare smoothed metrics against the baseline. Proximity wins over
/// every orientation check.
pub fn classify(metrics: &PostureMetrics, baseline: &PostureBaseline, sensitivity: Sensitivity) -> RawPosture {
    let t = sensitivity.thresholds(baseline);

    if metrics.face_width > t.distance {
        return RawPosture::Bad(PostureViolation::MoveBack);
    }

    let slouching = metrics.shoulder_slope > baseline.shoulder_slope + t.shoulder
        || metrics.neck_offset > baseline.neck_offset + t.neck
        || metrics.head_yaw > baseline.head_yaw + t.head_yaw
        || metrics.spinal_ratio < baseline.spinal_ratio - t.spinal_ratio;

    if slouching {
        RawPosture::Bad(PostureViolation::SitStraight)
    } else {
        RawPosture::Good
    }
}

/// Holds the captured baseline, if any.
#[derive(Debug, Default)]
pub struct Calibrator {
    baseline: Option<PostureBaseline>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the smoothed metrics once the buffers are full. Returns the
    /// baseline only on the frame it was captured.
    pub fn maybe_capture(&mut self, extractor: &MetricExtractor) -> Option<PostureBaseline> {
        if self.baseline.is_some() || !extractor.is_warm() {
            return None;
        }
        let baseline = PostureBaseline::from(extractor.current());
        self.baseline = Some(baseline);
        Some(baseline)
    }

    pub fn baseline(&self) -> Option<&PostureBaseline> {
        self.baseline.as_ref()
    }

    /// Baseline to classify against, falling back to the stock values.
    pub fn effective(&self) -> &PostureBaseline {
        self.baseline.as_ref().unwrap_or(&PostureBaseline::FALLBACK)
    }

    pub fn clear(&mut self) {
        self.baseline = None;
    }
}

/// Result of analyzing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureReading {
    pub raw: RawPosture,
    pub metrics: PostureMetrics,
    pub confidence: f64,
    /// Set on the frame that captured a new baseline
    pub captured: Option<PostureBaseline>,
}

/// Smoothing, calibration and classification for one session.
#[derive(Debug, Default)]
pub struct PostureAnalyzer {
    extractor: MetricExtractor,
    calibrator: Calibrator,
}

impl PostureAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(&mut self, frame: &LandmarkFrame, sensitivity: Sensitivity) -> Result<PostureReading, FrameError> {
        let Extraction {
            smoothed,
            confidence,
            ..
        } = self.extractor.extract(frame)?;

        let captured = self.calibrator.maybe_capture(&self.extractor);
        if let Some(b) = &captured {
            log::info!(
                "baseline captured: slope={:.4} neck={:.4} yaw={:.4} face={:.4} spine={:.3}",
                b.shoulder_slope,
                b.neck_offset,
                b.head_yaw,
                b.face_width,
                b.spinal_ratio
            );
        }

        let raw = classify(&smoothed, self.calibrator.effective(), sensitivity);

        Ok(PostureReading {
            raw,
            metrics: smoothed,
            confidence,
            captured,
        })
    }

    pub fn baseline(&self) -> Option<&PostureBaseline> {
        self.calibrator.baseline()
    }

    pub fn samples(&self) -> usize {
        self.extractor.samples()
    }

    /// Drop the baseline and every smoothing buffer.
    pub fn reset(&mut self) {
        self.calibrator.clear();
        self.extractor.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fixtures::{pose, upright};
    use proptest::prelude::*;

    fn metrics(slope: f64, neck: f64, yaw: f64, face: f64, spine: f64) -> PostureMetrics {
        PostureMetrics {
            shoulder_slope: slope,
            neck_offset: neck,
            head_yaw: yaw,
            face_width: face,
            spinal_ratio: spine,
        }
    }

    #[test]
    fn test_sensitivity_bounds() {
        assert!(Sensitivity::new(20).is_ok());
        assert!(Sensitivity::new(80).is_ok());
        assert_eq!(Sensitivity::new(85), Err(ConfigError::SensitivityOutOfRange(85)));
        assert_eq!(Sensitivity::new(15), Err(ConfigError::SensitivityOutOfRange(15)));
        assert_eq!(Sensitivity::new(52), Err(ConfigError::SensitivityOffGrid(52)));
        assert_eq!(Sensitivity::default().multiplier(), 1.0);
    }

    #[test]
    fn test_thresholds_at_default_sensitivity() {
        let t = Sensitivity::DEFAULT.thresholds(&PostureBaseline::FALLBACK);
        assert!((t.shoulder - 0.04).abs() < 1e-12);
        assert!((t.neck - 0.06).abs() < 1e-12);
        assert!((t.head_yaw - 0.03).abs() < 1e-12);
        assert!((t.spinal_ratio - 0.15).abs() < 1e-12);
        assert!((t.distance - 0.21).abs() < 1e-12);
    }

    #[test]
    fn test_distance_checked_before_orientation() {
        let b = PostureBaseline::FALLBACK;
        // Too close and slouched at once
        let m = metrics(0.5, 0.5, 0.5, 0.3, 0.1);
        assert_eq!(
            classify(&m, &b, Sensitivity::DEFAULT),
            RawPosture::Bad(PostureViolation::MoveBack)
        );
    }

    #[test]
    fn test_each_orientation_check_trips() {
        let b = PostureBaseline::FALLBACK;
        let s = Sensitivity::DEFAULT;
        let sit = RawPosture::Bad(PostureViolation::SitStraight);

        assert_eq!(classify(&metrics(0.08, 0.0, 0.0, 0.15, 1.6), &b, s), sit);
        assert_eq!(classify(&metrics(0.0, 0.12, 0.0, 0.15, 1.6), &b, s), sit);
        assert_eq!(classify(&metrics(0.0, 0.0, 0.06, 0.15, 1.6), &b, s), sit);
        assert_eq!(classify(&metrics(0.0, 0.0, 0.0, 0.15, 1.3), &b, s), sit);
        assert_eq!(classify(&metrics(0.0, 0.0, 0.0, 0.15, 1.6), &b, s), RawPosture::Good);
    }

    #[test]
    fn test_higher_sensitivity_catches_smaller_deviation() {
        let b = PostureBaseline::FALLBACK;
        // 0.03 + 0.04/1.3 ~= 0.0608 at 80, 0.03 + 0.04/0.7 ~= 0.087 at 20
        let m = metrics(0.07, 0.0, 0.0, 0.15, 1.6);
        assert_eq!(
            classify(&m, &b, Sensitivity::new(80).unwrap()),
            RawPosture::Bad(PostureViolation::SitStraight)
        );
        assert_eq!(classify(&m, &b, Sensitivity::new(20).unwrap()), RawPosture::Good);
    }

    #[test]
    fn test_neutral_frames_good_against_fallback() {
        let mut analyzer = PostureAnalyzer::new();
        for _ in 0..5 {
            let reading = analyzer.analyze(&upright(), Sensitivity::DEFAULT).unwrap();
            assert_eq!(reading.raw, RawPosture::Good);
        }
    }

    #[test]
    fn test_baseline_captured_on_fifth_frame() {
        let mut analyzer = PostureAnalyzer::new();
        for i in 0..4 {
            let r = analyzer.analyze(&upright(), Sensitivity::DEFAULT).unwrap();
            assert!(r.captured.is_none(), "frame {}", i);
        }
        let r = analyzer.analyze(&upright(), Sensitivity::DEFAULT).unwrap();
        let b = r.captured.unwrap();
        assert!((b.face_width - 0.15).abs() < 1e-12);

        // Later frames never overwrite it
        let r = analyzer.analyze(&pose(0.5, 0.3, 0.18, 0.0), Sensitivity::DEFAULT).unwrap();
        assert!(r.captured.is_none());
        assert_eq!(analyzer.baseline(), Some(&b));
    }

    #[test]
    fn test_personal_baseline_tolerates_habitual_tilt() {
        let mut analyzer = PostureAnalyzer::new();
        // Fallback slope 0.03 + 0.04 would flag 0.08 tilt
        let tilted = pose(0.5, 0.3, 0.15, 0.08);
        for _ in 0..5 {
            analyzer.analyze(&tilted, Sensitivity::DEFAULT).unwrap();
        }
        let r = analyzer.analyze(&tilted, Sensitivity::DEFAULT).unwrap();
        assert_eq!(r.raw, RawPosture::Good);
    }

    #[test]
    fn test_reset_clears_baseline_and_buffers() {
        let mut analyzer = PostureAnalyzer::new();
        for _ in 0..6 {
            analyzer.analyze(&upright(), Sensitivity::DEFAULT).unwrap();
        }
        assert!(analyzer.baseline().is_some());
        analyzer.reset();
        assert!(analyzer.baseline().is_none());
        assert_eq!(analyzer.samples(), 0);
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(ClassificationStatus::SitStraight.to_string(), "sit-straight");
        let json = serde_json::to_string(&ClassificationStatus::NoPerson).unwrap();
        assert_eq!(json, "\"no-person\"");
        assert!(ClassificationStatus::MoveBack.is_bad());
        assert!(!ClassificationStatus::NoPerson.is_bad());
    }

    proptest! {
        #[test]
        fn prop_sensitivity_tightens_thresholds(a in 4u8..=16, b in 4u8..=16, face in 0.05f64..0.4) {
            prop_assume!(a < b);
            let lo = Sensitivity::new(a * 5).unwrap();
            let hi = Sensitivity::new(b * 5).unwrap();
            let base = PostureBaseline { face_width: face, ..PostureBaseline::FALLBACK };
            let tl = lo.thresholds(&base);
            let th = hi.thresholds(&base);
            prop_assert!(th.shoulder < tl.shoulder);
            prop_assert!(th.neck < tl.neck);
            prop_assert!(th.head_yaw < tl.head_yaw);
            prop_assert!(th.spinal_ratio < tl.spinal_ratio);
            prop_assert!(th.distance < tl.distance);
        }
    }
}

//! One session's worth of classification state and the per-frame pass.
//!
//! A [`Pipeline`] is built when a session starts and dropped when it stops;
//! everything that must not survive a restart (smoothing buffers, baseline,
//! dwell timer, cooldowns, session totals) lives here.

use crate::alerts::{AlertDispatcher, AlertOutputs, AlertsFired};
use crate::clock::Clock;
use crate::config::Settings;
use crate::hysteresis::{GateDecision, HysteresisGate};
use crate::inference::LandmarkFrame;
use crate::metrics::PostureMetrics;
use crate::posture::{ClassificationStatus, PostureAnalyzer, PostureBaseline};
use crate::stats::{DailyLedger, SessionHistoryPoint, StatisticsAccumulator};
use serde::Serialize;
use std::collections::VecDeque;

/// Numbers handed to the renderer alongside the status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureAnalysis {
    /// Smoothed shoulder slope, x100 for display
    pub shoulder_slope: f64,
    /// Smoothed neck offset, x100 for display
    pub neck_offset: f64,
    pub confidence: f64,
    pub metrics: PostureMetrics,
}

impl PostureAnalysis {
    fn new(metrics: PostureMetrics, confidence: f64) -> Self {
        Self {
            shoulder_slope: metrics.shoulder_slope * 100.0,
            neck_offset: metrics.neck_offset * 100.0,
            confidence,
            metrics,
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub timestamp_ms: u64,
    pub status: ClassificationStatus,
    /// Status before this frame, present only when it changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ClassificationStatus>,
    /// Classifier verdict before the dwell gate; absent without a usable frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<ClassificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PostureAnalysis>,
    pub good_duration_ms: u64,
    pub bad_duration_ms: u64,
    pub alerts: AlertsFired,
    pub baseline_captured: bool,
}

/// Collaborators a pass needs but does not own.
pub struct FrameContext<'a> {
    pub settings: &'a Settings,
    pub host_visible: bool,
    pub clock: &'a dyn Clock,
    pub ledger: &'a mut DailyLedger,
    pub outputs: AlertOutputs<'a>,
}

pub struct Pipeline {
    analyzer: PostureAnalyzer,
    gate: HysteresisGate,
    dispatcher: AlertDispatcher,
    stats: StatisticsAccumulator,
    status: ClassificationStatus,
    analysis: Option<PostureAnalysis>,
}

impl Pipeline {
    pub fn new(now_ms: u64, tone_sample_rate: u32) -> Self {
        Self {
            analyzer: PostureAnalyzer::new(),
            gate: HysteresisGate::new(),
            dispatcher: AlertDispatcher::new(tone_sample_rate),
            stats: StatisticsAccumulator::new(now_ms),
            status: ClassificationStatus::Initializing,
            analysis: None,
        }
    }

    /// Run one frame through extract, classify, gate, alert and accumulate.
    ///
    /// `None` and degenerate frames report [`ClassificationStatus::NoPerson`]
    /// and leave the buffers and the dwell timer as they were.
    pub fn process(&mut self, frame: Option<&LandmarkFrame>, now_ms: u64, ctx: &mut FrameContext<'_>) -> FrameReport {
        let reading = frame.and_then(|f| match self.analyzer.analyze(f, ctx.settings.sensitivity) {
            Ok(reading) => Some(reading),
            Err(e) => {
                log::debug!("frame skipped: {}", e);
                None
            }
        });

        let mut alerts = AlertsFired::default();
        let mut raw = None;
        let mut baseline_captured = false;

        let status = match reading {
            Some(reading) => {
                raw = Some(reading.raw.status());
                baseline_captured = reading.captured.is_some();
                self.analysis = Some(PostureAnalysis::new(reading.metrics, reading.confidence));

                let GateDecision { status, alert } = self.gate.update(reading.raw, now_ms);
                if let Some(kind) = alert {
                    alerts = self.dispatcher.dispatch(
                        kind,
                        now_ms,
                        &ctx.settings.alerts,
                        ctx.host_visible,
                        &mut ctx.outputs,
                    );
                }
                status
            }
            None => {
                self.analysis = None;
                ClassificationStatus::NoPerson
            }
        };

        self.stats.accumulate(now_ms, status, ctx.clock, ctx.ledger);

        let previous = if status != self.status {
            log::debug!("status {} -> {}", self.status, status);
            Some(self.status)
        } else {
            None
        };
        self.status = status;

        FrameReport {
            timestamp_ms: now_ms,
            status,
            previous,
            raw,
            analysis: self.analysis,
            good_duration_ms: self.stats.good_ms(),
            bad_duration_ms: self.stats.bad_ms(),
            alerts,
            baseline_captured,
        }
    }

    /// Drop the baseline, buffers, dwell timer and cooldowns. Statistics and
    /// the visible status are kept.
    pub fn recalibrate(&mut self) {
        self.analyzer.reset();
        self.gate.reset();
        self.dispatcher.reset();
        log::info!("recalibrating: baseline cleared");
    }

    pub fn reset_stats(&mut self, now_ms: u64) {
        self.stats.reset(now_ms);
    }

    pub fn status(&self) -> ClassificationStatus {
        self.status
    }

    pub fn analysis(&self) -> Option<&PostureAnalysis> {
        self.analysis.as_ref()
    }

    pub fn baseline(&self) -> Option<&PostureBaseline> {
        self.analyzer.baseline()
    }

    pub fn samples(&self) -> usize {
        self.analyzer.samples()
    }

    pub fn good_ms(&self) -> u64 {
        self.stats.good_ms()
    }

    pub fn bad_ms(&self) -> u64 {
        self.stats.bad_ms()
    }

    pub fn score(&self) -> u8 {
        self.stats.score()
    }

    pub fn timeline(&self) -> &VecDeque<SessionHistoryPoint> {
        self.stats.timeline()
    }

    pub fn gate(&self) -> &HysteresisGate {
        &self.gate
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }
}

//! Session lifecycle and the run loop glue between the scheduler, the pose
//! source and the pipeline.

use crate::alerts::{AlertOutputs, Notifier, Permission, SoundOutput};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::PoseError;
use crate::inference::PoseDetector;
use crate::pipeline::{FrameContext, FrameReport, Pipeline};
use crate::posture::{ClassificationStatus, Sensitivity};
use crate::scheduler::{Scheduler, Ticker, TickId, Visibility};
use crate::stats::{DailyLedger, DailyStatsBucket};
use crate::store::KeyValueStore;

/// Everything the driver talks to outside the process.
pub struct Ports {
    pub detector: Box<dyn PoseDetector>,
    pub clock: Box<dyn Clock>,
    pub ticker: Box<dyn Ticker>,
    pub store: Box<dyn KeyValueStore>,
    pub sound: Box<dyn SoundOutput>,
    pub notifier: Box<dyn Notifier>,
}

pub struct Driver {
    settings: Settings,
    detector: Box<dyn PoseDetector>,
    clock: Box<dyn Clock>,
    scheduler: Scheduler,
    ledger: DailyLedger,
    sound: Box<dyn SoundOutput>,
    notifier: Box<dyn Notifier>,
    session: Option<Pipeline>,
}

impl Driver {
    /// Opens the ledger right away so history is available before any
    /// session starts.
    pub fn new(settings: Settings, ports: Ports) -> Self {
        Self {
            scheduler: Scheduler::new(ports.ticker, settings.hidden_interval),
            ledger: DailyLedger::open(ports.store),
            settings,
            detector: ports.detector,
            clock: ports.clock,
            sound: ports.sound,
            notifier: ports.notifier,
            session: None,
        }
    }

    /// Acquire the pose source and begin scheduling passes. A no-op while a
    /// session is already running.
    pub fn start(&mut self) -> Result<(), PoseError> {
        if self.session.is_some() {
            return Ok(());
        }

        if self.settings.alerts.notifications_enabled {
            self.ensure_permission();
        }

        self.detector.open()?;
        self.session = Some(Pipeline::new(self.clock.now_ms(), self.settings.tone_sample_rate));
        self.scheduler.start();
        log::info!("session started (sensitivity {})", self.settings.sensitivity.value());
        Ok(())
    }

    /// Cancel the pending pass, release the pose source and discard all
    /// session state. The ledger keeps everything recorded so far.
    pub fn stop(&mut self) {
        if self.session.is_none() {
            return;
        }
        self.scheduler.stop();
        self.detector.release();
        self.session = None;
        log::info!("session stopped");
    }

    fn ensure_permission(&mut self) {
        if self.notifier.permission() != Permission::Undecided {
            return;
        }
        match self.notifier.request_permission() {
            Ok(p) => log::info!("notification permission: {:?}", p),
            Err(e) => log::warn!("notification permission request failed: {}", e),
        }
    }

    /// Handle a host callback. Stale or unexpected ticks are ignored and
    /// return `None`, as do passes where the pose source failed.
    pub fn on_tick(&mut self, id: TickId) -> Option<FrameReport> {
        if !self.scheduler.begin_pass(id) {
            log::trace!("ignoring tick {:?}", id);
            return None;
        }

        let now_ms = self.clock.now_ms();
        let report = match self.detector.detect(now_ms) {
            Ok(frame) => self.session.as_mut().map(|pipeline| {
                let mut ctx = FrameContext {
                    settings: &self.settings,
                    host_visible: self.scheduler.visibility() == Visibility::Visible,
                    clock: self.clock.as_ref(),
                    ledger: &mut self.ledger,
                    outputs: AlertOutputs {
                        sound: self.sound.as_mut(),
                        notifier: self.notifier.as_mut(),
                    },
                };
                pipeline.process(frame.as_ref(), now_ms, &mut ctx)
            }),
            Err(e) => {
                log::warn!("pose detection failed, skipping frame: {}", e);
                None
            }
        };

        self.scheduler.finish_pass();
        report
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.scheduler.set_visibility(visibility);
    }

    pub fn recalibrate(&mut self) {
        if let Some(pipeline) = self.session.as_mut() {
            pipeline.recalibrate();
        }
    }

    pub fn reset_stats(&mut self) {
        let now_ms = self.clock.now_ms();
        if let Some(pipeline) = self.session.as_mut() {
            pipeline.reset_stats(now_ms);
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.settings.sensitivity = sensitivity;
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.settings.alerts.sound_enabled = enabled;
    }

    /// Turning notifications on asks for permission if it is still undecided.
    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.settings.alerts.notifications_enabled = enabled;
        if enabled {
            self.ensure_permission();
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn status(&self) -> ClassificationStatus {
        self.session
            .as_ref()
            .map(Pipeline::status)
            .unwrap_or(ClassificationStatus::Initializing)
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Pipeline> {
        self.session.as_ref()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn ledger(&self) -> &DailyLedger {
        &self.ledger
    }

    pub fn today(&self) -> Option<&DailyStatsBucket> {
        self.ledger.day(self.clock.today())
    }

    pub fn weekly_summary(&self) -> Vec<DailyStatsBucket> {
        self.ledger.weekly_summary(self.clock.today())
    }
}

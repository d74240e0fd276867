//! Sound and notification alerts, each behind its own cooldown.

use crate::error::AlertError;
use crate::posture::PostureViolation;
use crate::tone::{synthesize, Tone, ToneSpec};
use serde::Serialize;

pub const SOUND_COOLDOWN_MS: u64 = 3000;
pub const NOTIFICATION_COOLDOWN_MS: u64 = 5000;

/// OS-level notification permission as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    Granted,
    Denied,
    #[default]
    Undecided,
}

/// Plays synthesized tones.
pub trait SoundOutput {
    fn play(&mut self, tone: &Tone) -> Result<(), AlertError>;
}

/// Shows system notifications.
pub trait Notifier {
    fn permission(&self) -> Permission;

    /// Ask the user for permission; returns the resulting state.
    fn request_permission(&mut self) -> Result<Permission, AlertError> {
        Ok(self.permission())
    }

    fn notify(&mut self, message: &AlertMessage) -> Result<(), AlertError>;
}

/// Sound output that discards everything.
#[derive(Debug, Default)]
pub struct Silent;

impl SoundOutput for Silent {
    fn play(&mut self, _tone: &Tone) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Notifier for hosts without notification support.
#[derive(Debug, Default)]
pub struct NoNotifier;

impl Notifier for NoNotifier {
    fn permission(&self) -> Permission {
        Permission::Denied
    }

    fn notify(&mut self, _message: &AlertMessage) -> Result<(), AlertError> {
        Err(AlertError::Notification("notifications unsupported".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub title: &'static str,
    pub body: &'static str,
}

impl AlertMessage {
    pub fn for_violation(kind: PostureViolation) -> Self {
        match kind {
            PostureViolation::MoveBack => Self {
                title: "Too Close to Screen",
                body: "You are too close to the screen!",
            },
            PostureViolation::SitStraight => Self {
                title: "Posture Check",
                body: "Sit up straight!",
            },
        }
    }
}

/// Last-fired time of a single channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownClock {
    last_fired_ms: Option<u64>,
    cooldown_ms: u64,
}

impl CooldownClock {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            last_fired_ms: None,
            cooldown_ms,
        }
    }

    pub fn ready(&self, now_ms: u64) -> bool {
        match self.last_fired_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.cooldown_ms,
        }
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_fired_ms = Some(now_ms);
    }

    pub fn last_fired(&self) -> Option<u64> {
        self.last_fired_ms
    }

    pub fn reset(&mut self) {
        self.last_fired_ms = None;
    }
}

/// User toggles for the alert channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertSettings {
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: true,
        }
    }
}

/// Borrowed alert backends for one dispatch.
pub struct AlertOutputs<'a> {
    pub sound: &'a mut dyn SoundOutput,
    pub notifier: &'a mut dyn Notifier,
}

/// Which channels delivered on a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertsFired {
    pub sound: bool,
    pub notification: bool,
}

impl AlertsFired {
    pub fn any(&self) -> bool {
        self.sound || self.notification
    }
}

/// Per-session alert state: the two cooldown clocks and the rendered tone.
#[derive(Debug)]
pub struct AlertDispatcher {
    sound_clock: CooldownClock,
    notification_clock: CooldownClock,
    tone: Tone,
}

impl AlertDispatcher {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sound_clock: CooldownClock::new(SOUND_COOLDOWN_MS),
            notification_clock: CooldownClock::new(NOTIFICATION_COOLDOWN_MS),
            tone: synthesize(&ToneSpec::alert(), sample_rate),
        }
    }

    /// Try both channels for a confirmed violation.
    ///
    /// A channel's cooldown starts on every attempt, delivered or not, so a
    /// broken backend is retried at the cooldown rate rather than every frame.
    pub fn dispatch(
        &mut self,
        kind: PostureViolation,
        now_ms: u64,
        settings: &AlertSettings,
        host_visible: bool,
        outputs: &mut AlertOutputs<'_>,
    ) -> AlertsFired {
        let mut fired = AlertsFired::default();
        let message = AlertMessage::for_violation(kind);

        if settings.sound_enabled && self.sound_clock.ready(now_ms) {
            self.sound_clock.mark(now_ms);
            match outputs.sound.play(&self.tone) {
                Ok(()) => {
                    log::debug!("alert tone played for {:?}", kind);
                    fired.sound = true;
                }
                Err(e) => log::warn!("alert tone failed: {}", e),
            }
        }

        if settings.notifications_enabled
            && !host_visible
            && outputs.notifier.permission() == Permission::Granted
            && self.notification_clock.ready(now_ms)
        {
            self.notification_clock.mark(now_ms);
            match outputs.notifier.notify(&message) {
                Ok(()) => {
                    log::info!("notification sent: {}", message.body);
                    fired.notification = true;
                }
                Err(e) => log::warn!("notification failed: {}", e),
            }
        }

        fired
    }

    pub fn sound_clock(&self) -> &CooldownClock {
        &self.sound_clock
    }

    pub fn notification_clock(&self) -> &CooldownClock {
        &self.notification_clock
    }

    pub fn reset(&mut self) {
        self.sound_clock.reset();
        self.notification_clock.reset();
    }
}

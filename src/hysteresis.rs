//! Dwell-time gate between the raw classifier verdict and the visible status.
//!
//! A raw violation has to persist for [`BAD_POSTURE_DWELL_MS`] before the
//! visible status follows it, which keeps single-frame flicker out of the UI
//! and the alert channels.

use crate::posture::{ClassificationStatus, PostureViolation, RawPosture};

pub const BAD_POSTURE_DWELL_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Good,
    /// Raw violation seen, dwell time not yet served
    Pending { since_ms: u64 },
    /// Dwell time served; follows the latest raw violation kind
    Confirmed { kind: PostureViolation, since_ms: u64 },
}

/// What the gate decided for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub status: ClassificationStatus,
    /// Set when the dwell requirement is met on this frame; alerts may fire
    pub alert: Option<PostureViolation>,
}

#[derive(Debug)]
pub struct HysteresisGate {
    state: GateState,
    dwell_ms: u64,
}

impl HysteresisGate {
    pub fn new() -> Self {
        Self::with_dwell(BAD_POSTURE_DWELL_MS)
    }

    pub fn with_dwell(dwell_ms: u64) -> Self {
        Self {
            state: GateState::Good,
            dwell_ms,
        }
    }

    pub fn update(&mut self, raw: RawPosture, now_ms: u64) -> GateDecision {
        let kind = match raw {
            RawPosture::Good => {
                self.state = GateState::Good;
                return GateDecision {
                    status: ClassificationStatus::Good,
                    alert: None,
                };
            }
            RawPosture::Bad(kind) => kind,
        };

        let since_ms = match self.state {
            GateState::Good => now_ms,
            GateState::Pending { since_ms } | GateState::Confirmed { since_ms, .. } => since_ms,
        };

        if now_ms.saturating_sub(since_ms) >= self.dwell_ms {
            self.state = GateState::Confirmed { kind, since_ms };
            GateDecision {
                status: kind.status(),
                alert: Some(kind),
            }
        } else {
            self.state = GateState::Pending { since_ms };
            GateDecision {
                status: ClassificationStatus::Good,
                alert: None,
            }
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Start of the current raw violation, if any
    pub fn bad_since(&self) -> Option<u64> {
        match self.state {
            GateState::Good => None,
            GateState::Pending { since_ms } | GateState::Confirmed { since_ms, .. } => Some(since_ms),
        }
    }

    pub fn reset(&mut self) {
        self.state = GateState::Good;
    }
}

impl Default for HysteresisGate {
    fn default() -> Self {
        Self::new()
    }
}

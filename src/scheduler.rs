//! Two-cadence pass scheduling.
//!
//! While the host surface is visible one pass runs per rendered frame; while
//! hidden, passes run on a fixed timer. Exactly one callback is outstanding at
//! any time and a new one is only requested after the current pass finishes,
//! so passes never overlap.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub const DEFAULT_HIDDEN_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// One pass per display refresh
    FrameSynced,
    /// One pass per timer expiry
    Interval(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickId(pub u64);

/// Host timing services: display-refresh callbacks and one-shot timers.
pub trait Ticker {
    fn request_frame(&mut self) -> TickId;
    fn request_timeout(&mut self, delay: Duration) -> TickId;
    fn cancel(&mut self, id: TickId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    /// A callback is outstanding
    Waiting { cadence: Cadence, tick: TickId },
    /// A pass is running; the next callback is requested when it ends
    InPass { cadence: Cadence },
}

pub struct Scheduler {
    ticker: Box<dyn Ticker>,
    visibility: Visibility,
    hidden_interval: Duration,
    state: SchedulerState,
}

impl Scheduler {
    pub fn new(ticker: Box<dyn Ticker>, hidden_interval: Duration) -> Self {
        Self {
            ticker,
            visibility: Visibility::Visible,
            hidden_interval,
            state: SchedulerState::Stopped,
        }
    }

    fn cadence(&self) -> Cadence {
        match self.visibility {
            Visibility::Visible => Cadence::FrameSynced,
            Visibility::Hidden => Cadence::Interval(self.hidden_interval),
        }
    }

    fn request(&mut self, cadence: Cadence, delay: Duration) {
        let tick = match cadence {
            Cadence::FrameSynced => self.ticker.request_frame(),
            Cadence::Interval(_) => self.ticker.request_timeout(delay),
        };
        self.state = SchedulerState::Waiting { cadence, tick };
    }

    /// Begin scheduling; the first pass runs as soon as the host allows.
    pub fn start(&mut self) {
        if self.state != SchedulerState::Stopped {
            return;
        }
        self.request(self.cadence(), Duration::ZERO);
    }

    /// Cancel the outstanding callback. A pass already running completes but
    /// schedules nothing further.
    pub fn stop(&mut self) {
        if let SchedulerState::Waiting { tick, .. } = self.state {
            self.ticker.cancel(tick);
        }
        self.state = SchedulerState::Stopped;
    }

    /// Switch cadence. An outstanding callback of the old cadence is replaced
    /// by an immediate one of the new cadence; a running pass picks the new
    /// cadence up when it finishes.
    pub fn set_visibility(&mut self, visibility: Visibility) {
        if self.visibility == visibility {
            return;
        }
        self.visibility = visibility;

        if let SchedulerState::Waiting { cadence, tick } = self.state {
            let next = self.cadence();
            if cadence != next {
                self.ticker.cancel(tick);
                self.request(next, Duration::ZERO);
            }
        }
        log::debug!("scheduler cadence now {:?}", self.cadence());
    }

    /// Claim the callback `id`. Returns false for stale or unknown ticks, or
    /// when a pass is already running.
    pub fn begin_pass(&mut self, id: TickId) -> bool {
        match self.state {
            SchedulerState::Waiting { cadence, tick } if tick == id => {
                self.state = SchedulerState::InPass { cadence };
                true
            }
            _ => false,
        }
    }

    /// Mark the running pass done and request the next callback.
    pub fn finish_pass(&mut self) {
        if let SchedulerState::InPass { .. } = self.state {
            let cadence = self.cadence();
            let delay = match cadence {
                Cadence::FrameSynced => Duration::ZERO,
                Cadence::Interval(d) => d,
            };
            self.request(cadence, delay);
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_running(&self) -> bool {
        self.state != SchedulerState::Stopped
    }

    /// Callback currently awaited, if any
    pub fn pending(&self) -> Option<TickId> {
        match self.state {
            SchedulerState::Waiting { tick, .. } => Some(tick),
            _ => None,
        }
    }
}

/// A request recorded by [`ManualTicker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRequest {
    Frame(TickId),
    Timeout(TickId, Duration),
}

impl TickRequest {
    pub fn id(&self) -> TickId {
        match self {
            TickRequest::Frame(id) | TickRequest::Timeout(id, _) => *id,
        }
    }
}

#[derive(Debug, Default)]
struct ManualTickerInner {
    next_id: u64,
    pending: Vec<TickRequest>,
    cancelled: Vec<TickId>,
}

/// Ticker driven by hand, for replay and tests. Clones share state, so the
/// caller keeps a handle after giving one to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    inner: Rc<RefCell<ManualTickerInner>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outstanding (not yet taken or cancelled) requests
    pub fn pending(&self) -> Vec<TickRequest> {
        self.inner.borrow().pending.clone()
    }

    /// Remove and return the oldest outstanding request
    pub fn take(&self) -> Option<TickRequest> {
        let mut inner = self.inner.borrow_mut();
        if inner.pending.is_empty() {
            None
        } else {
            Some(inner.pending.remove(0))
        }
    }

    pub fn cancelled(&self) -> Vec<TickId> {
        self.inner.borrow().cancelled.clone()
    }

    fn push(&mut self, make: impl FnOnce(TickId) -> TickRequest) -> TickId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let id = TickId(inner.next_id);
        inner.pending.push(make(id));
        id
    }
}

impl Ticker for ManualTicker {
    fn request_frame(&mut self) -> TickId {
        self.push(TickRequest::Frame)
    }

    fn request_timeout(&mut self, delay: Duration) -> TickId {
        self.push(|id| TickRequest::Timeout(id, delay))
    }

    fn cancel(&mut self, id: TickId) {
        let mut inner = self.inner.borrow_mut();
        inner.pending.retain(|r| r.id() != id);
        inner.cancelled.push(id);
    }
}

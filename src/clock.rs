//! Wall-clock sources for the pipeline.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock time in epoch milliseconds plus the local calendar mapping used
/// for daily buckets.
pub trait Clock {
    fn now_ms(&self) -> u64;

    /// Local calendar date containing `at_ms`
    fn local_date(&self, at_ms: u64) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.local_date(self.now_ms())
    }
}

fn utc_from_ms(at_ms: u64) -> DateTime<Utc> {
    let ms = i64::try_from(at_ms).unwrap_or(i64::MAX);
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// System clock in the host's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn local_date(&self, at_ms: u64) -> NaiveDate {
        utc_from_ms(at_ms).with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
enum Zone {
    Fixed(FixedOffset),
    Host,
}

/// Hand-driven clock; clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
    zone: Zone,
}

impl ManualClock {
    /// Calendar dates in UTC.
    pub fn new(start_ms: u64) -> Self {
        Self::with_offset(start_ms, Utc.fix())
    }

    pub fn with_offset(start_ms: u64, offset: FixedOffset) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
            zone: Zone::Fixed(offset),
        }
    }

    /// Calendar dates in the host's time zone, as [`SystemClock`] reports them.
    pub fn local(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
            zone: Zone::Host,
        }
    }

    /// Epoch milliseconds of local midnight starting `date`
    pub fn midnight_ms(date: NaiveDate, offset: FixedOffset) -> u64 {
        let local = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        let utc = local - chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
        utc.and_utc().timestamp_millis().max(0) as u64
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn local_date(&self, at_ms: u64) -> NaiveDate {
        match self.zone {
            Zone::Fixed(offset) => utc_from_ms(at_ms).with_timezone(&offset).date_naive(),
            Zone::Host => SystemClock.local_date(at_ms),
        }
    }
}

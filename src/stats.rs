//! Good/bad posture time: a persistent ledger of daily buckets plus
//! per-session totals and a rolling one-point-per-second timeline.

use crate::clock::Clock;
use crate::error::StoreError;
use crate::posture::ClassificationStatus;
use crate::store::KeyValueStore;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Store key holding the daily ledger
pub const LEDGER_KEY: &str = "posture-history";
pub const MAX_DAILY_BUCKETS: usize = 30;
pub const SESSION_HISTORY_CAPACITY: usize = 600;
pub const HISTORY_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatsBucket {
    pub date: NaiveDate,
    pub good_duration_ms: u64,
    pub bad_duration_ms: u64,
}

impl DailyStatsBucket {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            good_duration_ms: 0,
            bad_duration_ms: 0,
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.good_duration_ms + self.bad_duration_ms
    }

    pub fn score(&self) -> u8 {
        posture_score(self.good_duration_ms, self.bad_duration_ms)
    }
}

/// Sort by date, merge duplicate days and keep the newest buckets.
fn normalize(mut buckets: Vec<DailyStatsBucket>) -> Vec<DailyStatsBucket> {
    buckets.sort_by_key(|b| b.date);

    let mut merged: Vec<DailyStatsBucket> = Vec::with_capacity(buckets.len());
    for b in buckets {
        match merged.last_mut() {
            Some(last) if last.date == b.date => {
                last.good_duration_ms += b.good_duration_ms;
                last.bad_duration_ms += b.bad_duration_ms;
            }
            _ => merged.push(b),
        }
    }

    if merged.len() > MAX_DAILY_BUCKETS {
        merged.drain(..merged.len() - MAX_DAILY_BUCKETS);
    }
    merged
}

/// Daily buckets backed by a key-value store.
///
/// Store failures never surface to the caller: an unreadable ledger starts
/// empty and failed writes leave the in-memory copy authoritative.
pub struct DailyLedger {
    buckets: Vec<DailyStatsBucket>,
    store: Box<dyn KeyValueStore>,
    write_failing: bool,
}

impl DailyLedger {
    pub fn open(store: Box<dyn KeyValueStore>) -> Self {
        let buckets = match Self::load(store.as_ref()) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("posture history unreadable, starting empty: {}", e);
                Vec::new()
            }
        };
        log::debug!("posture history loaded: {} day(s)", buckets.len());

        Self {
            buckets,
            store,
            write_failing: false,
        }
    }

    fn load(store: &dyn KeyValueStore) -> Result<Vec<DailyStatsBucket>, StoreError> {
        match store.get(LEDGER_KEY)? {
            Some(value) => Ok(normalize(serde_json::from_value(value)?)),
            None => Ok(Vec::new()),
        }
    }

    /// Add durations to the bucket for `date`, creating it if needed.
    pub fn record(&mut self, date: NaiveDate, good_ms: u64, bad_ms: u64) {
        if good_ms == 0 && bad_ms == 0 {
            return;
        }

        match self.buckets.binary_search_by_key(&date, |b| b.date) {
            Ok(i) => {
                let b = &mut self.buckets[i];
                b.good_duration_ms += good_ms;
                b.bad_duration_ms += bad_ms;
            }
            Err(i) => self.buckets.insert(
                i,
                DailyStatsBucket {
                    date,
                    good_duration_ms: good_ms,
                    bad_duration_ms: bad_ms,
                },
            ),
        }

        if self.buckets.len() > MAX_DAILY_BUCKETS {
            let excess = self.buckets.len() - MAX_DAILY_BUCKETS;
            self.buckets.drain(..excess);
        }

        self.persist();
    }

    fn persist(&mut self) {
        let result = serde_json::to_value(&self.buckets)
            .map_err(StoreError::from)
            .and_then(|value| self.store.set(LEDGER_KEY, value));

        match result {
            Ok(()) => {
                if self.write_failing {
                    log::info!("posture history writes recovered");
                }
                self.write_failing = false;
            }
            Err(e) => {
                if !self.write_failing {
                    log::warn!("failed to save posture history: {}", e);
                }
                self.write_failing = true;
            }
        }
    }

    pub fn buckets(&self) -> &[DailyStatsBucket] {
        &self.buckets
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DailyStatsBucket> {
        self.buckets
            .binary_search_by_key(&date, |b| b.date)
            .ok()
            .map(|i| &self.buckets[i])
    }

    /// The seven days ending at `today`, oldest first, missing days zeroed.
    pub fn weekly_summary(&self, today: NaiveDate) -> Vec<DailyStatsBucket> {
        (0..7u64)
            .rev()
            .filter_map(|back| today.checked_sub_days(Days::new(back)))
            .map(|date| self.day(date).copied().unwrap_or_else(|| DailyStatsBucket::empty(date)))
            .collect()
    }

    pub fn is_write_failing(&self) -> bool {
        self.write_failing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistoryPoint {
    pub timestamp: u64,
    /// 1 for good posture, 0 otherwise
    pub score: u8,
}

/// Duration deltas applied on one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    pub good_ms: u64,
    pub bad_ms: u64,
}

/// Per-session duration totals and timeline.
#[derive(Debug)]
pub struct StatisticsAccumulator {
    good_ms: u64,
    bad_ms: u64,
    last_update_ms: u64,
    last_sample_ms: Option<u64>,
    timeline: VecDeque<SessionHistoryPoint>,
}

impl StatisticsAccumulator {
    pub fn new(now_ms: u64) -> Self {
        Self {
            good_ms: 0,
            bad_ms: 0,
            last_update_ms: now_ms,
            last_sample_ms: None,
            timeline: VecDeque::with_capacity(SESSION_HISTORY_CAPACITY),
        }
    }

    /// Credit the time since the previous frame to `status` and fold it into
    /// the ledger, split at local midnight when the interval spans two days.
    pub fn accumulate(
        &mut self,
        now_ms: u64,
        status: ClassificationStatus,
        clock: &dyn Clock,
        ledger: &mut DailyLedger,
    ) -> StatsDelta {
        let start = self.last_update_ms;
        let elapsed = now_ms.saturating_sub(start);
        self.last_update_ms = start.max(now_ms);

        let delta = match status {
            ClassificationStatus::Good => StatsDelta {
                good_ms: elapsed,
                bad_ms: 0,
            },
            ClassificationStatus::SitStraight | ClassificationStatus::MoveBack => StatsDelta {
                good_ms: 0,
                bad_ms: elapsed,
            },
            ClassificationStatus::NoPerson | ClassificationStatus::Initializing => StatsDelta::default(),
        };

        self.good_ms += delta.good_ms;
        self.bad_ms += delta.bad_ms;
        if elapsed > 0 && delta != StatsDelta::default() {
            for (date, span) in split_by_day(start, now_ms, clock) {
                if delta.good_ms > 0 {
                    ledger.record(date, span, 0);
                } else {
                    ledger.record(date, 0, span);
                }
            }
        }

        self.sample(now_ms, status);
        delta
    }

    fn sample(&mut self, now_ms: u64, status: ClassificationStatus) {
        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < HISTORY_INTERVAL_MS {
                return;
            }
        }
        self.last_sample_ms = Some(now_ms);

        if self.timeline.len() == SESSION_HISTORY_CAPACITY {
            self.timeline.pop_front();
        }
        self.timeline.push_back(SessionHistoryPoint {
            timestamp: now_ms,
            score: u8::from(status == ClassificationStatus::Good),
        });
    }

    /// Zero the totals and timeline; the ledger keeps what it has.
    pub fn reset(&mut self, now_ms: u64) {
        *self = Self::new(now_ms);
    }

    pub fn good_ms(&self) -> u64 {
        self.good_ms
    }

    pub fn bad_ms(&self) -> u64 {
        self.bad_ms
    }

    pub fn score(&self) -> u8 {
        posture_score(self.good_ms, self.bad_ms)
    }

    pub fn timeline(&self) -> &VecDeque<SessionHistoryPoint> {
        &self.timeline
    }
}

/// Break `[start, end)` into per-local-day spans, oldest first.
fn split_by_day(mut start: u64, end: u64, clock: &dyn Clock) -> Vec<(NaiveDate, u64)> {
    let mut spans = Vec::with_capacity(1);
    while start < end {
        let day = clock.local_date(start);
        if clock.local_date(end - 1) == day {
            spans.push((day, end - start));
            break;
        }

        // First millisecond that falls on a later day
        let (mut lo, mut hi) = (start, end - 1);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if clock.local_date(mid) == day {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        spans.push((day, hi - start));
        start = hi;
    }
    spans
}

/// Share of good time as a whole percentage; 0 when nothing was recorded.
pub fn posture_score(good_ms: u64, bad_ms: u64) -> u8 {
    let total = good_ms + bad_ms;
    if total == 0 {
        return 0;
    }
    ((good_ms as f64 / total as f64) * 100.0).round() as u8
}

/// `"1h 5m"` from an hour up, `"4m 12s"` below.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else {
        format!("{}m {}s", minutes, seconds % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Memory store whose contents stay visible to the test.
    #[derive(Clone, Default)]
    struct SharedStore {
        inner: Rc<RefCell<MemoryStore>>,
        fail_writes: Rc<RefCell<bool>>,
    }

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
            self.inner.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> Result<(), StoreError> {
            if *self.fail_writes.borrow() {
                return Err(StoreError::Rejected("quota exceeded".to_string()));
            }
            self.inner.borrow_mut().set(key, value)
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
            Err(StoreError::Rejected("locked".to_string()))
        }

        fn set(&mut self, _key: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Rejected("locked".to_string()))
        }
    }

    #[test]
    fn test_ledger_persists_camel_case_layout() {
        let store = SharedStore::default();
        let mut ledger = DailyLedger::open(Box::new(store.clone()));
        ledger.record(date(2026, 1, 2), 1500, 250);

        let saved = store.inner.borrow().get(LEDGER_KEY).unwrap().unwrap();
        assert_eq!(
            saved,
            json!([{ "date": "2026-01-02", "goodDurationMs": 1500, "badDurationMs": 250 }])
        );
    }

    #[test]
    fn test_ledger_merges_same_day() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        ledger.record(date(2026, 1, 2), 100, 0);
        ledger.record(date(2026, 1, 2), 0, 40);
        ledger.record(date(2026, 1, 2), 0, 0);
        assert_eq!(ledger.buckets().len(), 1);
        assert_eq!(ledger.buckets()[0].good_duration_ms, 100);
        assert_eq!(ledger.buckets()[0].bad_duration_ms, 40);
    }

    #[test]
    fn test_ledger_keeps_newest_thirty_days() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let start = date(2026, 1, 1);
        for i in 0..45u64 {
            ledger.record(start + Days::new(i), 1000, 0);
            assert!(ledger.buckets().len() <= MAX_DAILY_BUCKETS);
        }
        assert_eq!(ledger.buckets().len(), MAX_DAILY_BUCKETS);
        assert_eq!(ledger.buckets()[0].date, start + Days::new(15));
        assert!(ledger.buckets().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_ledger_normalizes_on_load() {
        let mut store = MemoryStore::new();
        store
            .set(
                LEDGER_KEY,
                json!([
                    { "date": "2026-02-03", "goodDurationMs": 5, "badDurationMs": 1 },
                    { "date": "2026-02-01", "goodDurationMs": 7, "badDurationMs": 0 },
                    { "date": "2026-02-03", "goodDurationMs": 5, "badDurationMs": 2 }
                ]),
            )
            .unwrap();

        let ledger = DailyLedger::open(Box::new(store));
        let days: Vec<_> = ledger.buckets().iter().map(|b| b.date).collect();
        assert_eq!(days, vec![date(2026, 2, 1), date(2026, 2, 3)]);
        assert_eq!(ledger.day(date(2026, 2, 3)).unwrap().good_duration_ms, 10);
        assert_eq!(ledger.day(date(2026, 2, 3)).unwrap().bad_duration_ms, 3);
    }

    #[test]
    fn test_unreadable_store_starts_empty() {
        let mut ledger = DailyLedger::open(Box::new(BrokenStore));
        assert!(ledger.buckets().is_empty());

        ledger.record(date(2026, 1, 1), 10, 0);
        assert!(ledger.is_write_failing());
        assert_eq!(ledger.day(date(2026, 1, 1)).unwrap().good_duration_ms, 10);
    }

    #[test]
    fn test_write_failure_recovers() {
        let store = SharedStore::default();
        let mut ledger = DailyLedger::open(Box::new(store.clone()));

        *store.fail_writes.borrow_mut() = true;
        ledger.record(date(2026, 1, 1), 10, 0);
        assert!(ledger.is_write_failing());

        *store.fail_writes.borrow_mut() = false;
        ledger.record(date(2026, 1, 1), 10, 0);
        assert!(!ledger.is_write_failing());
        let saved = store.inner.borrow().get(LEDGER_KEY).unwrap().unwrap();
        assert_eq!(saved[0]["goodDurationMs"], json!(20));
    }

    #[test]
    fn test_weekly_summary_fills_gaps() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        ledger.record(date(2026, 3, 2), 60_000, 0);
        ledger.record(date(2026, 3, 7), 0, 30_000);

        let week = ledger.weekly_summary(date(2026, 3, 7));
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, date(2026, 3, 1));
        assert_eq!(week[1].good_duration_ms, 60_000);
        assert_eq!(week[3], DailyStatsBucket::empty(date(2026, 3, 4)));
        assert_eq!(week[6].bad_duration_ms, 30_000);
    }

    #[test]
    fn test_accumulate_by_status() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let mut acc = StatisticsAccumulator::new(0);
        let clock = ManualClock::new(0);
        let d = date(1970, 1, 1);

        assert_eq!(acc.accumulate(100, ClassificationStatus::Good, &clock, &mut ledger).good_ms, 100);
        assert_eq!(acc.accumulate(250, ClassificationStatus::MoveBack, &clock, &mut ledger).bad_ms, 150);
        assert_eq!(
            acc.accumulate(10_250, ClassificationStatus::NoPerson, &clock, &mut ledger),
            StatsDelta::default()
        );
        // No backlog credited after the person returns
        assert_eq!(acc.accumulate(10_300, ClassificationStatus::SitStraight, &clock, &mut ledger).bad_ms, 50);

        assert_eq!(acc.good_ms(), 100);
        assert_eq!(acc.bad_ms(), 200);
        assert_eq!(ledger.day(d).unwrap().total_ms(), 300);
        assert_eq!(acc.score(), 33);
    }

    #[test]
    fn test_timeline_sampled_once_per_second() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let mut acc = StatisticsAccumulator::new(0);
        let clock = ManualClock::new(0);
        for t in (0..=2_016).step_by(16) {
            acc.accumulate(t, ClassificationStatus::Good, &clock, &mut ledger);
        }
        let stamps: Vec<u64> = acc.timeline().iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0, 1_008, 2_016]);
    }

    #[test]
    fn test_timeline_keeps_latest_600() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let mut acc = StatisticsAccumulator::new(0);
        let clock = ManualClock::new(0);
        for i in 0..700u64 {
            let status = if i % 2 == 0 {
                ClassificationStatus::Good
            } else {
                ClassificationStatus::SitStraight
            };
            acc.accumulate(i * 1000, status, &clock, &mut ledger);
        }

        let tl = acc.timeline();
        assert_eq!(tl.len(), SESSION_HISTORY_CAPACITY);
        assert_eq!(tl.front().unwrap().timestamp, 100_000);
        assert_eq!(tl.back().unwrap().timestamp, 699_000);
        assert_eq!(tl.front().unwrap().score, 1);
        assert_eq!(tl.back().unwrap().score, 0);
    }

    #[test]
    fn test_reset_keeps_ledger() {
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let mut acc = StatisticsAccumulator::new(0);
        let clock = ManualClock::new(0);
        let d = date(1970, 1, 1);
        acc.accumulate(5_000, ClassificationStatus::Good, &clock, &mut ledger);

        acc.reset(9_000);
        assert_eq!(acc.good_ms(), 0);
        assert!(acc.timeline().is_empty());
        assert_eq!(acc.accumulate(9_500, ClassificationStatus::Good, &clock, &mut ledger).good_ms, 500);
        assert_eq!(ledger.day(d).unwrap().good_duration_ms, 5_500);
    }

    #[test]
    fn test_interval_split_at_local_midnight() {
        let offset = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let day = date(2026, 6, 1);
        let midnight = ManualClock::midnight_ms(day, offset);
        let clock = ManualClock::with_offset(midnight - 400, offset);
        let mut ledger = DailyLedger::open(Box::new(MemoryStore::new()));
        let mut acc = StatisticsAccumulator::new(midnight - 400);

        let delta = acc.accumulate(midnight + 600, ClassificationStatus::SitStraight, &clock, &mut ledger);
        assert_eq!(delta.bad_ms, 1_000);
        assert_eq!(ledger.day(date(2026, 5, 31)).unwrap().bad_duration_ms, 400);
        assert_eq!(ledger.day(day).unwrap().bad_duration_ms, 600);
    }

    #[test]
    fn test_score_and_format() {
        assert_eq!(posture_score(0, 0), 0);
        assert_eq!(posture_score(3, 1), 75);
        assert_eq!(posture_score(2, 1), 67);
        assert_eq!(format_duration(59_999), "0m 59s");
        assert_eq!(format_duration(252_000), "4m 12s");
        assert_eq!(format_duration(3_900_000), "1h 5m");
    }
}

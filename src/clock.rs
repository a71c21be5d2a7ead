//! Simulation Clock
//!
//! Monotonic simulated clock with nanosecond resolution and deterministic
//! timers. Single source of truth for all simulation time; never reads
//! system time.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
/// i64 gives ~292 years of range, sufficient for any backtest.
pub type Nanos = i64;

/// Conversion constants
pub const NANOS_PER_MICRO: i64 = 1_000;
pub const NANOS_PER_MILLI: i64 = 1_000_000;
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A time event fired when the clock reaches a registered alarm time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEvent {
    /// Scheduled fire time in nanoseconds.
    pub ts_event: Nanos,
    /// Name of the alarm/timer that produced this event.
    pub name: String,
    /// Unique event identifier.
    pub event_id: Uuid,
}

#[derive(Debug, Clone)]
struct Timer {
    fire_at: Nanos,
    name: String,
    /// 0 = one-shot alarm; otherwise the repeat interval.
    interval_ns: Nanos,
    repeat: bool,
    /// Monotonic registration order, tie-breaker for equal fire times.
    seq: u64,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.fire_at
            .cmp(&other.fire_at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Monotonic simulation clock with a timer min-heap.
///
/// # Determinism Contract
/// - `timestamp_ns()` returns the current simulation time, never system time
/// - `advance_time()` only moves forward and fires due timers in ascending
///   `fire_at` order (registration order on ties)
/// - Repeating timers are rescheduled to `fire_at + interval`
#[derive(Debug, Clone)]
pub struct SimClock {
    current: Nanos,
    timers: BinaryHeap<Reverse<Timer>>,
    next_seq: u64,
}

impl SimClock {
    /// Create a new clock starting at the given time.
    pub fn new(start_ns: Nanos) -> Self {
        Self {
            current: start_ns,
            timers: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Create a clock from a Unix timestamp in seconds.
    pub fn from_unix_secs(secs: i64) -> Self {
        Self::new(secs * NANOS_PER_SEC)
    }

    /// Current simulation time in nanoseconds.
    #[inline]
    pub fn timestamp_ns(&self) -> Nanos {
        self.current
    }

    /// Current simulation time in seconds.
    #[inline]
    pub fn timestamp_secs(&self) -> i64 {
        self.current / NANOS_PER_SEC
    }

    /// Directly set the clock (no timers fired).
    pub fn set_time(&mut self, ts_ns: Nanos) {
        self.current = ts_ns;
    }

    /// Advance the clock to `ts_ns`, returning all timer events with
    /// `fire_at <= ts_ns` in ascending fire order. Repeating timers are
    /// rescheduled; one-shot alarms are consumed.
    pub fn advance_time(&mut self, ts_ns: Nanos) -> Vec<TimeEvent> {
        debug_assert!(
            ts_ns >= self.current,
            "SimClock: cannot go backward from {} to {}",
            self.current,
            ts_ns
        );

        let mut events = Vec::new();
        while let Some(Reverse(timer)) = self.timers.peek() {
            if timer.fire_at > ts_ns {
                break;
            }
            let Reverse(timer) = self.timers.pop().expect("peeked timer present");
            events.push(TimeEvent {
                ts_event: timer.fire_at,
                name: timer.name.clone(),
                event_id: Uuid::new_v4(),
            });
            if timer.repeat && timer.interval_ns > 0 {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.timers.push(Reverse(Timer {
                    fire_at: timer.fire_at + timer.interval_ns,
                    name: timer.name,
                    interval_ns: timer.interval_ns,
                    repeat: true,
                    seq,
                }));
            }
        }

        self.current = ts_ns;
        events
    }

    /// Register a one-shot alarm at `alert_time_ns`.
    pub fn set_time_alert(&mut self, name: impl Into<String>, alert_time_ns: Nanos) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse(Timer {
            fire_at: alert_time_ns,
            name: name.into(),
            interval_ns: 0,
            repeat: false,
            seq,
        }));
    }

    /// Register a repeating timer firing every `interval_ns` nanoseconds,
    /// starting at `start_ns` (defaults to now + interval).
    pub fn set_timer(&mut self, name: impl Into<String>, interval_ns: Nanos, start_ns: Option<Nanos>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Reverse(Timer {
            fire_at: start_ns.unwrap_or(self.current + interval_ns),
            name: name.into(),
            interval_ns,
            repeat: true,
            seq,
        }));
    }

    /// Cancel all timers with the given name.
    pub fn cancel_timer(&mut self, name: &str) {
        let remaining: Vec<Reverse<Timer>> = self
            .timers
            .drain()
            .filter(|Reverse(t)| t.name != name)
            .collect();
        self.timers = remaining.into();
    }

    /// Cancel every registered timer.
    pub fn cancel_all_timers(&mut self) {
        self.timers.clear();
    }

    /// Names of all registered timers.
    pub fn timer_names(&self) -> Vec<String> {
        self.timers.iter().map(|Reverse(t)| t.name.clone()).collect()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.current / NANOS_PER_SEC;
        let nanos = self.current % NANOS_PER_SEC;
        write!(f, "{}.{:09}s", secs, nanos)
    }
}

/// Convert a chrono DateTime to Nanos.
#[inline]
pub fn datetime_to_nanos(dt: &chrono::DateTime<chrono::Utc>) -> Nanos {
    dt.timestamp_nanos_opt().unwrap_or(0)
}

/// Convert Nanos to a chrono DateTime.
#[inline]
pub fn nanos_to_datetime(nanos: Nanos) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    let secs = nanos / NANOS_PER_SEC;
    let nsecs = (nanos % NANOS_PER_SEC) as u32;
    chrono::Utc.timestamp_opt(secs, nsecs).unwrap()
}

/// Parse an ISO8601/RFC3339 string to Nanos.
pub fn parse_timestamp(s: &str) -> Option<Nanos> {
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| datetime_to_nanos(&dt.with_timezone(&chrono::Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_monotonic() {
        let mut clock = SimClock::new(1_000_000_000);
        assert_eq!(clock.timestamp_ns(), 1_000_000_000);

        clock.advance_time(2_000_000_000);
        assert_eq!(clock.timestamp_ns(), 2_000_000_000);
    }

    #[test]
    fn test_alert_fires_once() {
        let mut clock = SimClock::new(0);
        clock.set_time_alert("stop-session", 500);

        let events = clock.advance_time(400);
        assert!(events.is_empty());

        let events = clock.advance_time(600);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ts_event, 500);
        assert_eq!(events[0].name, "stop-session");

        let events = clock.advance_time(1_000);
        assert!(events.is_empty());
    }

    #[test]
    fn test_repeating_timer_reschedules() {
        let mut clock = SimClock::new(0);
        clock.set_timer("heartbeat", 100, Some(100));

        let events = clock.advance_time(350);
        let fire_times: Vec<Nanos> = events.iter().map(|e| e.ts_event).collect();
        assert_eq!(fire_times, vec![100, 200, 300]);

        let events = clock.advance_time(400);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].ts_event, 400);
    }

    #[test]
    fn test_timers_fire_in_ascending_order() {
        let mut clock = SimClock::new(0);
        clock.set_time_alert("b", 300);
        clock.set_time_alert("a", 100);
        clock.set_time_alert("c", 200);

        let events = clock.advance_time(1_000);
        let names: Vec<&str> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_cancel_timer_by_name() {
        let mut clock = SimClock::new(0);
        clock.set_timer("keep", 100, Some(100));
        clock.set_timer("drop", 100, Some(150));
        clock.cancel_timer("drop");

        let events = clock.advance_time(200);
        assert!(events.iter().all(|e| e.name == "keep"));
    }

    #[test]
    fn test_datetime_roundtrip() {
        let nanos = 1_700_000_000_123_456_789;
        let dt = nanos_to_datetime(nanos);
        assert_eq!(datetime_to_nanos(&dt), nanos);
    }

    #[test]
    fn test_parse_timestamp() {
        let ns = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(ns, 1_704_067_200 * NANOS_PER_SEC);
    }
}

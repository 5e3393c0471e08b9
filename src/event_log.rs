use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};
use time::macros::format_description;
use time::OffsetDateTime;

/// how a log line should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Ok,
    Error,
}

/// one line in the session log. never mutated once pushed
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    pub timestamp: OffsetDateTime,
}

impl LogEntry {
    /// 24h wall clock, e.g. `21:07:42`
    pub fn time_label(&self) -> String {
        let fmt = format_description!("[hour]:[minute]:[second]");
        self.timestamp
            .format(&fmt)
            .unwrap_or_else(|_| String::from("--:--:--"))
    }
}

/// bounded log, newest entry first; anything past capacity falls off the end
#[derive(Debug)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    /// keeps at least the newest entry, whatever `capacity` says
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        EventLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, timestamp: OffsetDateTime) {
        self.entries.push_front(LogEntry {
            message: message.into(),
            severity,
            timestamp,
        });
        self.entries.truncate(self.capacity);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// newest first
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}

/// time source for log stamps and for the display reconcile schedule
pub trait Clock {
    /// wall clock, for log lines
    fn now(&self) -> OffsetDateTime;

    /// monotonic, for deadlines
    fn instant(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

/// clock that only moves when told to. clones share the same time
#[derive(Clone)]
pub struct ManualClock {
    wall: OffsetDateTime,
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            wall: OffsetDateTime::UNIX_EPOCH,
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.set(self.elapsed.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        self.wall + self.elapsed.get()
    }

    fn instant(&self) -> Instant {
        self.origin + self.elapsed.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_first() {
        let clock = ManualClock::new();
        let mut log = EventLog::new(4);
        log.push("first", Severity::Info, clock.now());
        log.push("second", Severity::Ok, clock.now());
        let messages: Vec<_> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["second", "first"]);
    }

    #[test]
    fn test_oldest_dropped_past_capacity() {
        let clock = ManualClock::new();
        let mut log = EventLog::new(120);
        for n in 0..125 {
            log.push(format!("line {}", n), Severity::Info, clock.now());
        }
        assert_eq!(log.len(), 120);
        assert_eq!(log.latest().map(|e| e.message.as_str()), Some("line 124"));
        assert_eq!(log.iter().last().map(|e| e.message.as_str()), Some("line 5"));
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let clock = ManualClock::new();
        let mut log = EventLog::new(0);
        log.push("old", Severity::Info, clock.now());
        log.push("failed", Severity::Error, clock.now());
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().map(|e| e.message.as_str()), Some("failed"));
    }

    #[test]
    fn test_count_and_clear() {
        let clock = ManualClock::new();
        let mut log = EventLog::new(8);
        log.push("a", Severity::Error, clock.now());
        log.push("b", Severity::Ok, clock.now());
        log.push("c", Severity::Error, clock.now());
        assert_eq!(log.count(Severity::Error), 2);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_time_label() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_secs(3 * 3600 + 4 * 60 + 5));
        let mut log = EventLog::new(1);
        log.push("tick", Severity::Info, clock.now());
        assert_eq!(log.latest().map(|e| e.time_label()), Some("03:04:05".to_string()));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        let before = other.instant();
        clock.advance(Duration::from_millis(60));
        assert_eq!(other.instant() - before, Duration::from_millis(60));
    }
}

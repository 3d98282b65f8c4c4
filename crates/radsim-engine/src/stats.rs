//! Runtime counters for the scheduler status report

use crate::client::ExchangeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct EngineStats {
    started: AtomicU64,
    reauthenticated: AtomicU64,
    expired: AtomicU64,
    disconnected: AtomicU64,
    stopped: AtomicU64,
    rejected: AtomicU64,
    unreachable: AtomicU64,
    timeouts: AtomicU64,
    skipped: AtomicU64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reauthenticated(&self) {
        self.reauthenticated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disconnected(&self) {
        self.disconnected.fetch_add(1, Ordering::Relaxed);
    }

    /// Stops requested directly rather than by a timer
    pub fn record_stopped(&self) {
        self.stopped.fetch_add(1, Ordering::Relaxed);
    }

    /// An action gave way to another holding the same session
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exchange_failure(&self, error: &ExchangeError) {
        let counter = match error {
            ExchangeError::Rejected(_) => &self.rejected,
            ExchangeError::Unreachable(_) => &self.unreachable,
            ExchangeError::Timeout => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            reauthenticated: self.reauthenticated.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            disconnected: self.disconnected.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unreachable: self.unreachable.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub started: u64,
    pub reauthenticated: u64,
    pub expired: u64,
    pub disconnected: u64,
    pub stopped: u64,
    pub rejected: u64,
    pub unreachable: u64,
    pub timeouts: u64,
    pub skipped: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "started={} reauthenticated={} expired={} disconnected={} stopped={} rejected={} unreachable={} timeouts={} skipped={}",
            self.started,
            self.reauthenticated,
            self.expired,
            self.disconnected,
            self.stopped,
            self.rejected,
            self.unreachable,
            self.timeouts,
            self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = EngineStats::new();
        stats.record_started();
        stats.record_started();
        stats.record_expired();
        stats.record_exchange_failure(&ExchangeError::Timeout);
        stats.record_exchange_failure(&ExchangeError::Rejected("no".into()));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.started, 2);
        assert_eq!(snapshot.expired, 1);
        assert_eq!(snapshot.timeouts, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.unreachable, 0);
    }

    #[test]
    fn test_snapshot_display() {
        let snapshot = StatsSnapshot {
            started: 3,
            ..StatsSnapshot::default()
        };
        let text = snapshot.to_string();
        assert!(text.starts_with("started=3 "));
        assert!(text.contains("timeouts=0"));
    }
}

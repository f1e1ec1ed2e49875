//! 🧮 RunStatistics: the two numbers everyone asks about at standup.
//!
//! One instance per run, shared by `Arc` with every worker. Workers only ever
//! `fetch_add`; the supervisor only reads after every worker has been joined.
//! No lock, because no invariant spans both counters at update time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct RunStatistics {
    sent: AtomicU64,
    failed: AtomicU64,
    started_at: Instant,
}

/// 📸 A plain copy of the counters, taken after the completion barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub sent: u64,
    pub failed: u64,
}

impl RunStatistics {
    /// ⏱️ Start the clock now.
    pub fn start() -> Self {
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 📸 Only meaningful once every worker is joined; before that it's a guess.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sent: self.sent.load(Ordering::Acquire),
            failed: self.failed.load(Ordering::Acquire),
        }
    }
}

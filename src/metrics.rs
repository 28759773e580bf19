//! Scheduler Counters
//!
//! Tick and sweep accounting, summarized in the shutdown log.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the decision loop
#[derive(Debug, Default)]
pub struct Metrics {
    /// Ticks observed by the loop
    ticks: AtomicU64,

    /// Ticks skipped because a sweep was in flight
    skipped_running: AtomicU64,

    /// Ticks skipped because the run interval had not passed
    skipped_interval: AtomicU64,

    /// Sweeps dispatched to the executor
    dispatched: AtomicU64,

    /// Sweeps completed, by outcome
    completed_ok: AtomicU64,
    completed_err: AtomicU64,
}

impl Metrics {
    /// Create new counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip_running(&self) {
        self.skipped_running.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip_interval(&self) {
        self.skipped_interval.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self, ok: bool) {
        if ok {
            self.completed_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed_err.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn skipped_running(&self) -> u64 {
        self.skipped_running.load(Ordering::Relaxed)
    }

    pub fn skipped_interval(&self) -> u64 {
        self.skipped_interval.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    pub fn completed_ok(&self) -> u64 {
        self.completed_ok.load(Ordering::Relaxed)
    }

    pub fn completed_err(&self) -> u64 {
        self.completed_err.load(Ordering::Relaxed)
    }

    /// Get a summary of counters
    pub fn summary(&self) -> String {
        format!(
            "Ticks: {} (skipped: {} running, {} interval) | Sweeps: {} dispatched, {} ok, {} failed",
            self.ticks(),
            self.skipped_running(),
            self.skipped_interval(),
            self.dispatched(),
            self.completed_ok(),
            self.completed_err()
        )
    }
}

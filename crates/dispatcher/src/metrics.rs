//! Consumer metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single consumer
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Current queue length
    queue_len: AtomicUsize,
    /// Artifacts accepted by the consumer
    consumed_count: AtomicU64,
    /// Artifacts the consumer rejected
    failure_count: AtomicU64,
    /// Sends that had to wait for queue space
    blocked_count: AtomicU64,
    /// Artifacts that never reached the consumer because its task was gone
    undelivered_count: AtomicU64,
}

impl ConsumerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn consumed_count(&self) -> u64 {
        self.consumed_count.load(Ordering::Relaxed)
    }

    pub fn inc_consumed_count(&self) {
        self.consumed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn blocked_count(&self) -> u64 {
        self.blocked_count.load(Ordering::Relaxed)
    }

    pub fn inc_blocked_count(&self) {
        self.blocked_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn undelivered_count(&self) -> u64 {
        self.undelivered_count.load(Ordering::Relaxed)
    }

    pub fn add_undelivered(&self, count: u64) {
        self.undelivered_count.fetch_add(count, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            consumed_count: self.consumed_count(),
            failure_count: self.failure_count(),
            blocked_count: self.blocked_count(),
            undelivered_count: self.undelivered_count(),
        }
    }
}

/// Snapshot of consumer metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub consumed_count: u64,
    pub failure_count: u64,
    pub blocked_count: u64,
    pub undelivered_count: u64,
}

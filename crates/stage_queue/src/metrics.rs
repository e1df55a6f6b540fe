//! Queue metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every handle of one queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Total items accepted by `put`
    pub enqueued: AtomicU64,

    /// Total items handed out by `get`
    pub dequeued: AtomicU64,

    /// Puts that found the queue full and had to wait
    pub blocked_puts: AtomicU64,

    /// Puts rejected because the queue was closed
    pub rejected_puts: AtomicU64,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted item
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dequeued item
    pub fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a put that had to wait for space
    pub fn record_blocked(&self) {
        self.blocked_puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a put that hit a closed queue
    pub fn record_rejected(&self) {
        self.rejected_puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            blocked_puts: self.blocked_puts.load(Ordering::Relaxed),
            rejected_puts: self.rejected_puts.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub enqueued: u64,
    pub dequeued: u64,
    pub blocked_puts: u64,
    pub rejected_puts: u64,
}

impl QueueSnapshot {
    /// Items accepted but never handed out
    pub fn undelivered(&self) -> u64 {
        self.enqueued.saturating_sub(self.dequeued)
    }
}

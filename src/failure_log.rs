//! Failure log for capturing failed requests
//!
//! In-memory ring for inspecting recent failures. NOT a persistent dead
//! letter queue. Records are lost on process restart - this is for
//! debugging/inspection only.
//!
//! For durable failure handling, react to `Failure` outcomes in the sink and
//! hand them to external infrastructure.

use crate::key::RequestKey;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A failed request with metadata about the failure
#[derive(Debug, Clone)]
pub struct FailedFetch {
    /// Trigger that initiated the request
    pub trigger_id: String,
    /// Key the request was issued for; `None` if derivation failed
    pub key: Option<RequestKey>,
    /// Error message from the failure
    pub error: String,
    /// When the failure occurred
    pub failed_at: Instant,
}

/// In-memory ring of recent failed requests (for inspection, not persistence)
///
/// When full, the oldest record is evicted (FIFO). Counters track total
/// captured and total evicted so capacity pressure is observable.
pub struct FailureLog {
    records: Mutex<VecDeque<FailedFetch>>,
    capacity: usize,
    /// Metrics: total failures ever captured
    total_captured: AtomicU64,
    /// Metrics: records evicted due to capacity
    total_dropped: AtomicU64,
}

impl FailureLog {
    /// Create a new failure log with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total_captured: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Record one failed request
    pub fn record(&self, failed: FailedFetch) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        records.push_back(failed);
        self.total_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Drain up to `n` records for reprocessing or reporting
    pub fn drain(&self, n: usize) -> Vec<FailedFetch> {
        let mut records = self.records.lock();
        let drain_count = n.min(records.len());
        records.drain(..drain_count).collect()
    }

    /// Peek at records without removing them
    pub fn peek(&self, n: usize) -> Vec<FailedFetch> {
        let records = self.records.lock();
        records.iter().take(n).cloned().collect()
    }

    /// Current number of records
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Check if the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Log capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total failures ever captured
    pub fn total_captured(&self) -> u64 {
        self.total_captured.load(Ordering::Relaxed)
    }

    /// Total records evicted due to capacity
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }

    /// Remove all records
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

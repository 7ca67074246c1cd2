//! Dispatch statistics.
//!
//! Counts every invocation and keeps two rolling buffers, the slowest
//! recent invocations and the most recent script errors, for the admin
//! `stats` command. When a buffer is full the oldest record is evicted.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use wisp_types::ObjectId;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationRecord {
    pub object: ObjectId,
    pub event: String,
    pub elapsed_ms: u64,
    /// Wall clock, unix milliseconds.
    pub at: u64,
}

/// One recorded failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub object: ObjectId,
    pub event: String,
    pub message: String,
    pub at: u64,
}

/// Per-object counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectCounters {
    pub invocations: u64,
    pub errors: u64,
    pub total_ms: u64,
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub invocations: u64,
    pub errors: u64,
    pub dropped_emits: u64,
    pub slow: Vec<InvocationRecord>,
    pub recent_errors: Vec<ErrorRecord>,
    pub per_object: BTreeMap<ObjectId, ObjectCounters>,
}

#[derive(Debug, Default)]
struct Inner {
    invocations: u64,
    errors: u64,
    dropped_emits: u64,
    slow: VecDeque<InvocationRecord>,
    recent_errors: VecDeque<ErrorRecord>,
    per_object: BTreeMap<ObjectId, ObjectCounters>,
}

/// Thread-safe dispatch counters.
#[derive(Debug)]
pub struct DispatchStats {
    inner: Mutex<Inner>,
    slow_threshold_ms: u64,
    capacity: usize,
}

impl DispatchStats {
    /// A `capacity` of 0 is treated as 1.
    #[must_use]
    pub fn new(slow_threshold_ms: u64, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            slow_threshold_ms,
            capacity: capacity.max(1),
        }
    }

    /// Counts a finished invocation. Returns true if it was slow.
    pub fn record_invocation(&self, record: InvocationRecord) -> bool {
        let mut inner = self.inner.lock();
        inner.invocations += 1;
        let counters = inner.per_object.entry(record.object.clone()).or_default();
        counters.invocations += 1;
        counters.total_ms = counters.total_ms.saturating_add(record.elapsed_ms);

        let slow = record.elapsed_ms >= self.slow_threshold_ms;
        if slow {
            if inner.slow.len() >= self.capacity {
                inner.slow.pop_front();
            }
            inner.slow.push_back(record);
        }
        slow
    }

    pub fn record_error(&self, record: ErrorRecord) {
        let mut inner = self.inner.lock();
        inner.errors += 1;
        inner
            .per_object
            .entry(record.object.clone())
            .or_default()
            .errors += 1;
        if inner.recent_errors.len() >= self.capacity {
            inner.recent_errors.pop_front();
        }
        inner.recent_errors.push_back(record);
    }

    /// Counts an emit dropped by the cascade depth bound.
    pub fn record_dropped_emit(&self) {
        self.inner.lock().dropped_emits += 1;
    }

    /// Forgets counters for a removed object.
    pub fn forget(&self, object: &ObjectId) {
        self.inner.lock().per_object.remove(object);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        StatsSnapshot {
            invocations: inner.invocations,
            errors: inner.errors,
            dropped_emits: inner.dropped_emits,
            slow: inner.slow.iter().cloned().collect(),
            recent_errors: inner.recent_errors.iter().cloned().collect(),
            per_object: inner.per_object.clone(),
        }
    }
}

impl Default for DispatchStats {
    fn default() -> Self {
        Self::new(100, 64)
    }
}

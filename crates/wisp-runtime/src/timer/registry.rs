//! Pending timers.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::Notify;
use tracing::debug;
use wisp_types::{ObjectId, TimerId};

/// A pending timer. Deadlines are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub id: TimerId,
    pub owner: ObjectId,
    pub event: String,
    pub payload: Value,
    pub fire_at: u64,
    /// Set for intervals.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_ms: Option<u64>,
}

/// A timer that came due.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerFire {
    pub id: TimerId,
    pub owner: ObjectId,
    pub event: String,
    pub payload: Value,
}

/// Introspection row for operators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerInfo {
    pub id: TimerId,
    pub owner: ObjectId,
    pub event: String,
    pub remaining_ms: u64,
    pub period_ms: Option<u64>,
}

/// Timers keyed by owning object.
///
/// Firing is pull based: [`take_due`](Self::take_due) returns every
/// timer whose deadline has passed, removing one-shots and rescheduling
/// intervals to `now + period`. The async driver waits on
/// [`changed`](Self::changed) to learn about new deadlines.
#[derive(Debug)]
pub struct TimerRegistry {
    entries: Mutex<BTreeMap<TimerId, TimerEntry>>,
    min_interval_ms: u64,
    changed: Notify,
}

impl TimerRegistry {
    pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1_000;

    #[must_use]
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            min_interval_ms,
            changed: Notify::new(),
        }
    }

    #[must_use]
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Schedules a one-shot fire `delay_ms` after `now`.
    pub fn set_timeout(
        &self,
        owner: &ObjectId,
        delay_ms: u64,
        event: &str,
        payload: Value,
        now: u64,
    ) -> TimerId {
        self.insert(TimerEntry {
            id: TimerId::generate(),
            owner: owner.clone(),
            event: event.to_string(),
            payload,
            fire_at: now.saturating_add(delay_ms),
            period_ms: None,
        })
    }

    /// Schedules a repeating fire. Periods below the floor are raised to it.
    pub fn set_interval(
        &self,
        owner: &ObjectId,
        period_ms: u64,
        event: &str,
        payload: Value,
        now: u64,
    ) -> TimerId {
        let period = period_ms.max(self.min_interval_ms).max(1);
        self.insert(TimerEntry {
            id: TimerId::generate(),
            owner: owner.clone(),
            event: event.to_string(),
            payload,
            fire_at: now.saturating_add(period),
            period_ms: Some(period),
        })
    }

    fn insert(&self, entry: TimerEntry) -> TimerId {
        let id = entry.id.clone();
        debug!(
            timer = %id,
            owner = %entry.owner,
            event = %entry.event,
            period_ms = ?entry.period_ms,
            "scheduled timer"
        );
        self.entries.lock().insert(id.clone(), entry);
        self.changed.notify_one();
        id
    }

    /// Cancels a timer. Unknown or already-fired ids are ignored.
    pub fn clear(&self, id: &TimerId) -> bool {
        let removed = self.entries.lock().remove(id).is_some();
        if removed {
            self.changed.notify_one();
        }
        removed
    }

    /// Cancels `id` only if `owner` owns it.
    pub fn clear_owned(&self, owner: &ObjectId, id: &TimerId) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.get(id) {
                Some(entry) if &entry.owner == owner => entries.remove(id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.changed.notify_one();
        }
        removed
    }

    /// Cancels everything `owner` scheduled. Returns how many.
    pub fn clear_owner(&self, owner: &ObjectId) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| &e.owner != owner);
        let removed = before - entries.len();
        drop(entries);
        if removed > 0 {
            self.changed.notify_one();
        }
        removed
    }

    /// Removes due one-shots, reschedules due intervals and returns them
    /// all in deadline order.
    pub fn take_due(&self, now: u64) -> Vec<TimerFire> {
        let mut entries = self.entries.lock();
        let mut due: Vec<&mut TimerEntry> =
            entries.values_mut().filter(|e| e.fire_at <= now).collect();
        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.id.cmp(&b.id)));

        let mut fires = Vec::with_capacity(due.len());
        let mut finished = Vec::new();
        for entry in due {
            fires.push(TimerFire {
                id: entry.id.clone(),
                owner: entry.owner.clone(),
                event: entry.event.clone(),
                payload: entry.payload.clone(),
            });
            match entry.period_ms {
                Some(period) => entry.fire_at = now.saturating_add(period),
                None => finished.push(entry.id.clone()),
            }
        }
        for id in finished {
            entries.remove(&id);
        }
        fires
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.lock().values().map(|e| e.fire_at).min()
    }

    /// All pending timers, soonest first.
    #[must_use]
    pub fn list(&self, now: u64) -> Vec<TimerInfo> {
        let mut rows: Vec<TimerInfo> = self
            .entries
            .lock()
            .values()
            .map(|e| TimerInfo {
                id: e.id.clone(),
                owner: e.owner.clone(),
                event: e.event.clone(),
                remaining_ms: e.fire_at.saturating_sub(now),
                period_ms: e.period_ms,
            })
            .collect();
        rows.sort_by(|a, b| a.remaining_ms.cmp(&b.remaining_ms).then_with(|| a.id.cmp(&b.id)));
        rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies every entry for persistence.
    #[must_use]
    pub fn entries(&self) -> Vec<TimerEntry> {
        self.entries.lock().values().cloned().collect()
    }

    /// Adds persisted entries back. Deadlines already in the past fire on
    /// the next [`take_due`](Self::take_due).
    pub fn restore(&self, entries: Vec<TimerEntry>) {
        let mut map = self.entries.lock();
        for entry in entries {
            map.insert(entry.id.clone(), entry);
        }
        drop(map);
        self.changed.notify_one();
    }

    /// Resolves when the set of deadlines may have changed.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MIN_INTERVAL_MS)
    }
}

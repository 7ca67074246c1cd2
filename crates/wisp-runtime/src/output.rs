//! Where narration and debug output go.
//!
//! A session attaches one [`OutputSink`] to the object it controls;
//! only objects with a session receive printed text. Debug listeners
//! attach to any object and receive its script logs and errors.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use wisp_types::ObjectId;

/// A line-oriented text destination.
pub trait OutputSink: Send + Sync {
    fn print(&self, text: &str);
}

/// Collects printed lines in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Returns and clears everything printed so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

impl OutputSink for BufferSink {
    fn print(&self, text: &str) {
        self.lines.lock().push(text.to_string());
    }
}

/// Session and debug sinks by object.
#[derive(Default)]
pub struct Outputs {
    sessions: RwLock<HashMap<ObjectId, Arc<dyn OutputSink>>>,
    debug: RwLock<HashMap<ObjectId, Vec<(ObjectId, Arc<dyn OutputSink>)>>>,
}

impl std::fmt::Debug for Outputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outputs")
            .field("sessions", &self.sessions.read().len())
            .field("debugged", &self.debug.read().len())
            .finish()
    }
}

impl Outputs {
    pub fn attach_session(&self, object: &ObjectId, sink: Arc<dyn OutputSink>) {
        self.sessions.write().insert(object.clone(), sink);
    }

    pub fn detach_session(&self, object: &ObjectId) -> bool {
        self.sessions.write().remove(object).is_some()
    }

    #[must_use]
    pub fn has_session(&self, object: &ObjectId) -> bool {
        self.sessions.read().contains_key(object)
    }

    /// Prints to `object`'s session. Returns false if it has none.
    pub fn print(&self, object: &ObjectId, text: &str) -> bool {
        let sink = self.sessions.read().get(object).cloned();
        match sink {
            Some(sink) => {
                sink.print(text);
                true
            }
            None => false,
        }
    }

    /// Attaches `listener`'s sink to `object`'s debug stream, replacing
    /// any previous attachment by the same listener.
    pub fn attach_debug(&self, object: &ObjectId, listener: &ObjectId, sink: Arc<dyn OutputSink>) {
        let mut debug = self.debug.write();
        let listeners = debug.entry(object.clone()).or_default();
        listeners.retain(|(id, _)| id != listener);
        listeners.push((listener.clone(), sink));
    }

    pub fn detach_debug(&self, object: &ObjectId, listener: &ObjectId) -> bool {
        let mut debug = self.debug.write();
        let Some(listeners) = debug.get_mut(object) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(id, _)| id != listener);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            debug.remove(object);
        }
        removed
    }

    /// Streams a line to everyone debugging `object`.
    pub fn debug(&self, object: &ObjectId, text: &str) {
        let sinks: Vec<Arc<dyn OutputSink>> = self
            .debug
            .read()
            .get(object)
            .map(|l| l.iter().map(|(_, s)| Arc::clone(s)).collect())
            .unwrap_or_default();
        for sink in sinks {
            sink.print(text);
        }
    }

    /// Drops every attachment to or from `object`.
    pub fn forget(&self, object: &ObjectId) {
        self.sessions.write().remove(object);
        let mut debug = self.debug.write();
        debug.remove(object);
        for listeners in debug.values_mut() {
            listeners.retain(|(id, _)| id != object);
        }
        debug.retain(|_, l| !l.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_only_with_session() {
        let outputs = Outputs::default();
        let sink = Arc::new(BufferSink::new());
        assert!(!outputs.print(&"alice".into(), "hello"));

        outputs.attach_session(&"alice".into(), sink.clone());
        assert!(outputs.print(&"alice".into(), "hello"));
        assert_eq!(sink.lines(), vec!["hello"]);

        assert!(outputs.detach_session(&"alice".into()));
        assert!(!outputs.has_session(&"alice".into()));
    }

    #[test]
    fn debug_listeners_by_listener_id() {
        let outputs = Outputs::default();
        let a = Arc::new(BufferSink::new());
        let b = Arc::new(BufferSink::new());
        outputs.attach_debug(&"orc".into(), &"alice".into(), a.clone());
        outputs.attach_debug(&"orc".into(), &"bob".into(), b.clone());

        outputs.debug(&"orc".into(), "boom");
        assert_eq!(a.lines(), vec!["boom"]);
        assert_eq!(b.lines(), vec!["boom"]);

        assert!(outputs.detach_debug(&"orc".into(), &"alice".into()));
        outputs.debug(&"orc".into(), "again");
        assert_eq!(a.lines().len(), 1);
        assert_eq!(b.lines().len(), 2);
    }

    #[test]
    fn forget_drops_both_directions() {
        let outputs = Outputs::default();
        let sink = Arc::new(BufferSink::new());
        outputs.attach_session(&"alice".into(), sink.clone());
        outputs.attach_debug(&"orc".into(), &"alice".into(), sink.clone());
        outputs.forget(&"alice".into());
        outputs.debug(&"orc".into(), "x");
        assert!(sink.lines().is_empty());
        assert!(!outputs.has_session(&"alice".into()));
    }
}

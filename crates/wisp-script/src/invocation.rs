//! What the dispatcher hands to an engine, and what comes back.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use wisp_types::{event, ObjectId, Tag};

/// A flattened compilation unit ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    /// Entry path, used as the chunk name and cache key.
    pub path: String,
    pub text: Arc<str>,
    /// Newest modification time in the import closure (unix ms).
    pub modified: u64,
}

/// The event an invocation should deliver.
///
/// `tags` lists the registration tags that may claim the event; a
/// callback registered under `event` with none of them is not called.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub event: String,
    pub tags: Vec<Tag>,
    pub payload: Value,
}

impl Trigger {
    /// A typed command. `own` is true when the typing object is the
    /// owner, which additionally lets `command` callbacks claim it.
    #[must_use]
    pub fn command(verb: &str, line: &str, own: bool) -> Self {
        let tags = if own {
            vec![Tag::Command, Tag::Action]
        } else {
            vec![Tag::Action]
        };
        Self {
            event: verb.to_string(),
            tags,
            payload: event::command_payload(line),
        }
    }

    /// A programmatic message, timer fire or engine event.
    #[must_use]
    pub fn emit(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            tags: vec![Tag::Emit],
            payload,
        }
    }

    /// Whether a registration with `registered` tags may claim this trigger.
    #[must_use]
    pub fn accepts(&self, registered: &BTreeSet<Tag>) -> bool {
        self.tags.iter().any(|t| registered.contains(t))
    }
}

/// One call into a script on behalf of one object.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub object: ObjectId,
    pub source: ScriptSource,
    /// Current State text. Empty means no state yet.
    pub state: String,
    pub trigger: Trigger,
}

/// Result of a successful invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOutcome {
    /// True if a callback claimed the trigger.
    pub handled: bool,
    /// State text to commit. Identical to the input bytes when the
    /// script left State semantically unchanged.
    pub state: String,
    /// Registrations made by this run's top-level body.
    pub callbacks: BTreeMap<String, BTreeSet<Tag>>,
}

//! Callback tags and built-in events.
//!
//! | Tag | Triggered by |
//! |-----|--------------|
//! | `action` | A typed command from any object in range |
//! | `command` | A typed command from the owning object itself |
//! | `emit` | `emit`, `emitToLocation`, timers and engine events |
//!
//! Engine-generated events are always delivered with the `emit` tag.

use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Trigger classification of a callback registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Action,
    Command,
    Emit,
}

impl Tag {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Command => "command",
            Self::Emit => "emit",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "action" => Ok(Self::Action),
            "command" => Ok(Self::Command),
            "emit" => Ok(Self::Emit),
            other => Err(format!("unknown callback tag '{other}'")),
        }
    }
}

/// Names of events the engine itself delivers.
pub mod events {
    /// A move happened in an observer's source or destination.
    pub const MOVEMENT: &str = "movement";
    /// Sent to an active mover, asking it to narrate for one observer.
    pub const RENDER_MOVEMENT: &str = "renderMovement";
    /// Sent by a mover's `renderMovement` back to the observer.
    pub const MOVEMENT_RENDERED: &str = "movementRendered";
    /// An exit's use challenges blocked a move.
    pub const EXIT_FAILED: &str = "exitFailed";
    /// First event an object receives after `createObject`.
    pub const CREATED: &str = "created";
}

/// Payload of a typed command.
#[must_use]
pub fn command_payload(line: &str) -> Value {
    json!({ "line": line })
}

/// Payload of a `movement` event for one observer.
#[must_use]
pub fn movement_payload(
    object: &ObjectId,
    source: &ObjectId,
    destination: &ObjectId,
    exit: Option<&str>,
    observer: &ObjectId,
) -> Value {
    json!({
        "Object": object.as_str(),
        "Source": source.as_str(),
        "Destination": destination.as_str(),
        "Exit": exit,
        "Observer": observer.as_str(),
    })
}

/// Payload of a `renderMovement` request to the mover.
#[must_use]
pub fn render_movement_payload(
    observer: &ObjectId,
    source: &ObjectId,
    destination: &ObjectId,
    exit: Option<&str>,
) -> Value {
    json!({
        "Observer": observer.as_str(),
        "Source": source.as_str(),
        "Destination": destination.as_str(),
        "Exit": exit,
    })
}

#[must_use]
pub fn exit_failed_payload(exit: &str, subject: &ObjectId) -> Value {
    json!({ "exit": exit, "subject": subject.as_str() })
}

#[must_use]
pub fn created_payload(creator: &ObjectId) -> Value {
    json!({ "creator": creator.as_str() })
}

/// Extracts the narration text from a `movementRendered` payload.
#[must_use]
pub fn rendered_message(payload: &Value) -> Option<&str> {
    payload.get("Message").and_then(Value::as_str)
}

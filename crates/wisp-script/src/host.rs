//! The host API scripts call back into.
//!
//! One [`HostApi`] value is bound to one invocation of one object. Every
//! method maps to a script-visible function:
//!
//! | Script function | Method |
//! |-----------------|--------|
//! | `getId()` | [`HostApi::id`] |
//! | `setDescriptions(list)` | [`HostApi::set_descriptions`] |
//! | `setExits(list)` | [`HostApi::set_exits`] |
//! | `setMovement(cfg)` | [`HostApi::set_movement`] |
//! | `setSkills(map)` | [`HostApi::set_skills`] |
//! | `emit(id, event, payload, challenges?)` | [`HostApi::emit`] |
//! | `emitToLocation(id, event, payload, challenges?)` | [`HostApi::emit_to_location`] |
//! | `getLocation()` | [`HostApi::location`] |
//! | `moveObject(id, dest)` | [`HostApi::move_object`] |
//! | `getContent()` | [`HostApi::content`] |
//! | `getNeighbourhood()` | [`HostApi::neighbourhood`] |
//! | `createObject(path, loc)` | [`HostApi::create_object`] |
//! | `removeObject(id)` | [`HostApi::remove_object`] |
//! | `getSourcePath()` / `setSourcePath(p)` | [`HostApi::source_path`] / [`HostApi::set_source_path`] |
//! | `getLearning()` / `setLearning(b)` | [`HostApi::learning`] / [`HostApi::set_learning`] |
//! | `getSkillConfig(n)` / `casSkillConfig(n, old, new)` | [`HostApi::skill_config`] / [`HostApi::cas_skill_config`] |
//! | `setTimeout` / `setInterval` / `clearInterval` | timer methods |
//! | `log(...)` | [`HostApi::log`] |
//!
//! Setters for the object's own fields are drafts: the runtime commits
//! them with State only if the invocation succeeds. Structural calls,
//! emits and timers take effect immediately.

use crate::HostError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use wisp_types::{Challenge, Description, Exit, MovementConfig, ObjectId, Skill, SkillConfig, TimerId};

pub type HostResult<T> = Result<T, HostError>;

/// Severity of a script `log` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parses a level name, defaulting to `Info`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }
}

/// An object as seen by a particular viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectView {
    pub id: ObjectId,
    pub short: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long: String,
}

/// The caller's surroundings: its location, what else is there, and
/// what lies behind each visible exit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Neighbourhood {
    pub location: Option<ObjectView>,
    pub content: Vec<ObjectView>,
    /// Exit name to destination.
    pub neighbours: BTreeMap<String, ObjectView>,
}

/// Host services available to one running script.
pub trait HostApi: Send + Sync {
    /// Id of the object being invoked.
    fn id(&self) -> ObjectId;

    fn set_descriptions(&self, descriptions: Vec<Description>) -> HostResult<()>;

    fn set_exits(&self, exits: Vec<Exit>) -> HostResult<()>;

    fn set_movement(&self, movement: MovementConfig) -> HostResult<()>;

    fn set_skills(&self, skills: BTreeMap<String, Skill>) -> HostResult<()>;

    /// Queues one message. Dropped without error if the target fails a
    /// challenge.
    fn emit(
        &self,
        target: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()>;

    /// Queues a message to every object inside `location`, gated per
    /// recipient.
    fn emit_to_location(
        &self,
        location: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()>;

    fn location(&self) -> HostResult<Option<ObjectId>>;

    fn move_object(&self, id: &ObjectId, destination: &ObjectId) -> HostResult<()>;

    fn content(&self) -> HostResult<Vec<ObjectId>>;

    fn neighbourhood(&self) -> HostResult<Neighbourhood>;

    fn create_object(&self, source_path: &str, location: &ObjectId) -> HostResult<ObjectId>;

    fn remove_object(&self, id: &ObjectId) -> HostResult<()>;

    fn source_path(&self) -> String;

    fn set_source_path(&self, path: &str) -> HostResult<()>;

    fn learning(&self) -> bool;

    fn set_learning(&self, learning: bool);

    fn skill_config(&self, name: &str) -> Option<SkillConfig>;

    /// Replaces `name` iff its stored value equals `expected` (`None`
    /// meaning absent). Never fails; a lost race returns `false`.
    fn cas_skill_config(&self, name: &str, expected: Option<SkillConfig>, new: SkillConfig) -> bool;

    fn set_timeout(&self, delay_ms: u64, event: &str, payload: Value) -> HostResult<TimerId>;

    fn set_interval(&self, period_ms: u64, event: &str, payload: Value) -> HostResult<TimerId>;

    /// Cancels a timer owned by this object. Unknown ids are ignored.
    fn clear_interval(&self, id: &TimerId);

    fn log(&self, level: LogLevel, message: &str);

    /// Prints `text` to this object's own session, if one is attached.
    fn echo(&self, text: &str);
}

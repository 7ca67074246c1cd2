//! Test doubles for both sides of the script boundary.
//!
//! - [`RecordingHost`] stands in for the runtime when testing an engine.
//! - [`ScriptedEngine`] stands in for a real engine when testing the
//!   runtime: each source path maps to a Rust closure.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use wisp_script::testing::{reply, RecordingHost, ScriptedEngine};
//! use wisp_script::{HostApi, Invocation, ScriptEngine, ScriptSource, Trigger};
//!
//! let engine = ScriptedEngine::new().on("/bell.lua", |inv, host| {
//!     host.log(wisp_script::LogLevel::Info, "ding");
//!     Ok(reply(inv, true))
//! });
//!
//! let host = Arc::new(RecordingHost::new("bell"));
//! let inv = Invocation {
//!     object: "bell".into(),
//!     source: ScriptSource { path: "/bell.lua".into(), text: "".into(), modified: 1 },
//!     state: String::new(),
//!     trigger: Trigger::emit("ring", json!({})),
//! };
//! let out = engine.invoke(&inv, host.clone()).unwrap();
//! assert!(out.handled);
//! assert_eq!(host.calls().len(), 1);
//! ```

use crate::{
    HostApi, HostError, HostResult, Invocation, InvocationOutcome, LogLevel, Neighbourhood,
    ScriptEngine, ScriptError,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wisp_types::{
    Challenge, Description, Exit, MovementConfig, ObjectId, Skill, SkillConfig, TimerId,
};

/// One host call observed by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    SetDescriptions(Vec<Description>),
    SetExits(Vec<Exit>),
    SetMovement(MovementConfig),
    SetSkills(BTreeMap<String, Skill>),
    Emit {
        target: ObjectId,
        event: String,
        payload: Value,
        challenges: Vec<Challenge>,
    },
    EmitToLocation {
        location: ObjectId,
        event: String,
        payload: Value,
        challenges: Vec<Challenge>,
    },
    Move {
        id: ObjectId,
        destination: ObjectId,
    },
    Create {
        source_path: String,
        location: ObjectId,
    },
    Remove(ObjectId),
    SetSourcePath(String),
    SetLearning(bool),
    Cas {
        name: String,
        swapped: bool,
    },
    SetTimeout {
        delay_ms: u64,
        event: String,
        payload: Value,
    },
    SetInterval {
        period_ms: u64,
        event: String,
        payload: Value,
    },
    ClearInterval(TimerId),
    Log {
        level: LogLevel,
        message: String,
    },
    Echo(String),
}

/// A [`HostApi`] that records every call and answers from fixed data.
#[derive(Debug)]
pub struct RecordingHost {
    id: ObjectId,
    calls: Mutex<Vec<HostCall>>,
    location: Mutex<Option<ObjectId>>,
    content: Mutex<Vec<ObjectId>>,
    source_path: Mutex<String>,
    learning: Mutex<bool>,
    skill_configs: Mutex<BTreeMap<String, SkillConfig>>,
    move_error: Mutex<Option<HostError>>,
    next_timer: AtomicU64,
}

impl RecordingHost {
    #[must_use]
    pub fn new(id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            calls: Mutex::new(Vec::new()),
            location: Mutex::new(None),
            content: Mutex::new(Vec::new()),
            source_path: Mutex::new(String::new()),
            learning: Mutex::new(false),
            skill_configs: Mutex::new(BTreeMap::new()),
            move_error: Mutex::new(None),
            next_timer: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_location(self, location: impl Into<ObjectId>) -> Self {
        *self.location.lock() = Some(location.into());
        self
    }

    #[must_use]
    pub fn with_content(self, content: Vec<ObjectId>) -> Self {
        *self.content.lock() = content;
        self
    }

    #[must_use]
    pub fn with_source_path(self, path: impl Into<String>) -> Self {
        *self.source_path.lock() = path.into();
        self
    }

    #[must_use]
    pub fn with_skill_config(self, name: impl Into<String>, config: SkillConfig) -> Self {
        self.skill_configs.lock().insert(name.into(), config);
        self
    }

    /// Makes every subsequent `move_object` fail with `err`.
    #[must_use]
    pub fn failing_moves(self, err: HostError) -> Self {
        *self.move_error.lock() = Some(err);
        self
    }

    #[must_use]
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Only the `Log` calls, as messages.
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Log { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }

    fn timer_id(&self) -> TimerId {
        TimerId::new(format!("t{}", self.next_timer.fetch_add(1, Ordering::SeqCst)))
    }
}

impl HostApi for RecordingHost {
    fn id(&self) -> ObjectId {
        self.id.clone()
    }

    fn set_descriptions(&self, descriptions: Vec<Description>) -> HostResult<()> {
        self.record(HostCall::SetDescriptions(descriptions));
        Ok(())
    }

    fn set_exits(&self, exits: Vec<Exit>) -> HostResult<()> {
        self.record(HostCall::SetExits(exits));
        Ok(())
    }

    fn set_movement(&self, movement: MovementConfig) -> HostResult<()> {
        self.record(HostCall::SetMovement(movement));
        Ok(())
    }

    fn set_skills(&self, skills: BTreeMap<String, Skill>) -> HostResult<()> {
        self.record(HostCall::SetSkills(skills));
        Ok(())
    }

    fn emit(
        &self,
        target: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()> {
        self.record(HostCall::Emit {
            target: target.clone(),
            event: event.to_string(),
            payload,
            challenges,
        });
        Ok(())
    }

    fn emit_to_location(
        &self,
        location: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()> {
        self.record(HostCall::EmitToLocation {
            location: location.clone(),
            event: event.to_string(),
            payload,
            challenges,
        });
        Ok(())
    }

    fn location(&self) -> HostResult<Option<ObjectId>> {
        Ok(self.location.lock().clone())
    }

    fn move_object(&self, id: &ObjectId, destination: &ObjectId) -> HostResult<()> {
        if let Some(err) = self.move_error.lock().clone() {
            return Err(err);
        }
        self.record(HostCall::Move {
            id: id.clone(),
            destination: destination.clone(),
        });
        Ok(())
    }

    fn content(&self) -> HostResult<Vec<ObjectId>> {
        Ok(self.content.lock().clone())
    }

    fn neighbourhood(&self) -> HostResult<Neighbourhood> {
        Ok(Neighbourhood::default())
    }

    fn create_object(&self, source_path: &str, location: &ObjectId) -> HostResult<ObjectId> {
        self.record(HostCall::Create {
            source_path: source_path.to_string(),
            location: location.clone(),
        });
        Ok(ObjectId::new(format!("created-{}", self.calls.lock().len())))
    }

    fn remove_object(&self, id: &ObjectId) -> HostResult<()> {
        self.record(HostCall::Remove(id.clone()));
        Ok(())
    }

    fn source_path(&self) -> String {
        self.source_path.lock().clone()
    }

    fn set_source_path(&self, path: &str) -> HostResult<()> {
        *self.source_path.lock() = path.to_string();
        self.record(HostCall::SetSourcePath(path.to_string()));
        Ok(())
    }

    fn learning(&self) -> bool {
        *self.learning.lock()
    }

    fn set_learning(&self, learning: bool) {
        *self.learning.lock() = learning;
        self.record(HostCall::SetLearning(learning));
    }

    fn skill_config(&self, name: &str) -> Option<SkillConfig> {
        self.skill_configs.lock().get(name).cloned()
    }

    fn cas_skill_config(&self, name: &str, expected: Option<SkillConfig>, new: SkillConfig) -> bool {
        let swapped = {
            let mut configs = self.skill_configs.lock();
            if configs.get(name).cloned() == expected {
                configs.insert(name.to_string(), new);
                true
            } else {
                false
            }
        };
        self.record(HostCall::Cas {
            name: name.to_string(),
            swapped,
        });
        swapped
    }

    fn set_timeout(&self, delay_ms: u64, event: &str, payload: Value) -> HostResult<TimerId> {
        self.record(HostCall::SetTimeout {
            delay_ms,
            event: event.to_string(),
            payload,
        });
        Ok(self.timer_id())
    }

    fn set_interval(&self, period_ms: u64, event: &str, payload: Value) -> HostResult<TimerId> {
        self.record(HostCall::SetInterval {
            period_ms,
            event: event.to_string(),
            payload,
        });
        Ok(self.timer_id())
    }

    fn clear_interval(&self, id: &TimerId) {
        self.record(HostCall::ClearInterval(id.clone()));
    }

    fn log(&self, level: LogLevel, message: &str) {
        self.record(HostCall::Log {
            level,
            message: message.to_string(),
        });
    }

    fn echo(&self, text: &str) {
        self.record(HostCall::Echo(text.to_string()));
    }
}

/// Behavior of one scripted source path.
pub type Behavior =
    Arc<dyn Fn(&Invocation, &dyn HostApi) -> Result<InvocationOutcome, ScriptError> + Send + Sync>;

/// Outcome that keeps the invocation's State as is.
#[must_use]
pub fn reply(invocation: &Invocation, handled: bool) -> InvocationOutcome {
    InvocationOutcome {
        handled,
        state: invocation.state.clone(),
        callbacks: BTreeMap::new(),
    }
}

/// A [`ScriptEngine`] whose "scripts" are Rust closures keyed by path.
///
/// Paths without a behavior run as empty scripts: nothing is handled and
/// State is unchanged.
#[derive(Default)]
pub struct ScriptedEngine {
    behaviors: RwLock<HashMap<String, Behavior>>,
    invocations: Mutex<Vec<(ObjectId, String)>>,
    invalidated: Mutex<Vec<String>>,
}

impl std::fmt::Debug for ScriptedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEngine")
            .field("paths", &self.behaviors.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ScriptedEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on<F>(self, path: &str, behavior: F) -> Self
    where
        F: Fn(&Invocation, &dyn HostApi) -> Result<InvocationOutcome, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.set(path, behavior);
        self
    }

    /// Replaces the behavior of `path`.
    pub fn set<F>(&self, path: &str, behavior: F)
    where
        F: Fn(&Invocation, &dyn HostApi) -> Result<InvocationOutcome, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        self.behaviors
            .write()
            .insert(path.to_string(), Arc::new(behavior));
    }

    /// Every `(object, event)` invoked so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<(ObjectId, String)> {
        self.invocations.lock().clone()
    }

    #[must_use]
    pub fn invalidated(&self) -> Vec<String> {
        self.invalidated.lock().clone()
    }
}

impl ScriptEngine for ScriptedEngine {
    fn invoke(
        &self,
        invocation: &Invocation,
        host: Arc<dyn HostApi>,
    ) -> Result<InvocationOutcome, ScriptError> {
        self.invocations
            .lock()
            .push((invocation.object.clone(), invocation.trigger.event.clone()));
        let behavior = self.behaviors.read().get(&invocation.source.path).cloned();
        match behavior {
            Some(behavior) => behavior(invocation, host.as_ref()),
            None => Ok(reply(invocation, false)),
        }
    }

    fn invalidate(&self, path: &str) {
        self.invalidated.lock().push(path.to_string());
    }

    fn invalidate_all(&self) {
        self.invalidated.lock().push("*".to_string());
    }
}

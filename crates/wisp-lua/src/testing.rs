//! Lua script testing harness.
//!
//! Runs one script against a [`RecordingHost`] without a world around
//! it. State is carried from one trigger to the next the way the
//! runtime would commit it.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use wisp_lua::testing::LuaTestHarness;
//!
//! let script = r#"
//!     addCallback("poke", "emit", function(p)
//!         state.pokes = (state.pokes or 0) + 1
//!         log("poked by " .. p.by)
//!     end)
//! "#;
//!
//! let mut harness = LuaTestHarness::from_script("orc", script);
//! assert!(harness.emit("poke", json!({"by": "alice"})).unwrap());
//! assert!(harness.emit("poke", json!({"by": "bob"})).unwrap());
//! assert_eq!(harness.state(), r#"{"pokes":2}"#);
//! assert_eq!(harness.host().logs(), vec!["poked by alice", "poked by bob"]);
//! ```

use crate::{LuaEngine, LuaEnv};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use wisp_script::testing::RecordingHost;
use wisp_script::{Invocation, ScriptEngine, ScriptError, ScriptSource, Trigger};
use wisp_types::{ObjectId, Tag};

/// Test harness for a single Lua script.
pub struct LuaTestHarness {
    engine: LuaEngine,
    host: Arc<RecordingHost>,
    object: ObjectId,
    source: ScriptSource,
    state: String,
    callbacks: BTreeMap<String, BTreeSet<Tag>>,
}

impl LuaTestHarness {
    /// Creates a harness for `script` running as object `id`.
    #[must_use]
    pub fn from_script(id: &str, script: &str) -> Self {
        Self::with_host(script, RecordingHost::new(id))
    }

    /// Creates a harness with a pre-configured host.
    #[must_use]
    pub fn with_host(script: &str, host: RecordingHost) -> Self {
        let object = wisp_script::HostApi::id(&host);
        Self {
            engine: LuaEngine::new(LuaEnv::default()),
            host: Arc::new(host),
            source: ScriptSource {
                path: format!("/{}.lua", object.as_str()),
                text: script.into(),
                modified: 1,
            },
            object,
            state: String::new(),
            callbacks: BTreeMap::new(),
        }
    }

    /// Replaces the engine limits.
    #[must_use]
    pub fn with_env(mut self, env: LuaEnv) -> Self {
        self.engine = LuaEngine::new(env);
        self
    }

    /// Sets the State the next trigger starts from.
    #[must_use]
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Delivers `trigger`; on success commits State and returns whether
    /// a callback claimed it. On error State is left untouched.
    ///
    /// # Errors
    ///
    /// Any [`ScriptError`] the engine reports.
    pub fn trigger(&mut self, trigger: Trigger) -> Result<bool, ScriptError> {
        let invocation = Invocation {
            object: self.object.clone(),
            source: self.source.clone(),
            state: self.state.clone(),
            trigger,
        };
        let outcome = self.engine.invoke(&invocation, self.host.clone())?;
        self.state = outcome.state;
        self.callbacks = outcome.callbacks;
        Ok(outcome.handled)
    }

    /// Delivers a programmatic message.
    ///
    /// # Errors
    ///
    /// See [`trigger`](Self::trigger).
    pub fn emit(&mut self, event: &str, payload: Value) -> Result<bool, ScriptError> {
        self.trigger(Trigger::emit(event, payload))
    }

    /// Types `line` as the owner of this object.
    ///
    /// # Errors
    ///
    /// See [`trigger`](Self::trigger).
    pub fn command(&mut self, line: &str) -> Result<bool, ScriptError> {
        let verb = line.split_whitespace().next().unwrap_or_default();
        self.trigger(Trigger::command(verb, line, true))
    }

    /// Types `line` as some other object nearby.
    ///
    /// # Errors
    ///
    /// See [`trigger`](Self::trigger).
    pub fn action(&mut self, line: &str) -> Result<bool, ScriptError> {
        let verb = line.split_whitespace().next().unwrap_or_default();
        self.trigger(Trigger::command(verb, line, false))
    }

    /// Swaps in new source text, as if the file had been edited.
    pub fn reload(&mut self, script: &str) {
        self.source.text = script.into();
        self.source.modified += 1;
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// State parsed as JSON; `Null` when empty.
    #[must_use]
    pub fn state_json(&self) -> Value {
        serde_json::from_str(&self.state).unwrap_or(Value::Null)
    }

    #[must_use]
    pub fn host(&self) -> &RecordingHost {
        &self.host
    }

    /// Registrations from the most recent successful run.
    #[must_use]
    pub fn callbacks(&self) -> &BTreeMap<String, BTreeSet<Tag>> {
        &self.callbacks
    }
}

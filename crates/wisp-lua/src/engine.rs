//! [`ScriptEngine`] implementation over mlua.
//!
//! # Invocation
//!
//! ```text
//! Invocation ─▶ fresh VM ─▶ host globals + state ─▶ chunk
//!                                                   │
//!                                    (path, mtime) bytecode cache
//!                                    hit: load binary, miss: compile
//!                                                   │
//!                                             top-level body
//!                                                   │
//!                                       callbacks["event"]?  ──no──▶ handled = false
//!                                                  │ yes, tags match
//!                                            fn(payload)
//!                                                  │
//!                                   state ─▶ JSON (original bytes if unchanged)
//! ```
//!
//! The VM is dropped at the end of every invocation; only the returned
//! State text and whatever the script did through the host outlive it.
//! Compiled chunks outlive it as bytecode: one entry per source path,
//! valid for one modification time. A source that failed to compile is
//! remembered too, so it is not parsed again until it changes.

use crate::error::LuaError;
use crate::host_fns::{self, CALLBACKS_KEY};
use crate::lua_env::LuaEnv;
use crate::types::{json_to_lua, lua_to_json};
use mlua::{ChunkMode, Function, Lua, Table, Value};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};
use wisp_script::{
    HostApi, Invocation, InvocationOutcome, ScriptEngine, ScriptError, ScriptSource,
};
use wisp_types::Tag;

/// Result of compiling one source version: bytecode or the syntax error.
#[derive(Debug, Clone)]
struct CompileEntry {
    modified: u64,
    compiled: Result<Arc<[u8]>, String>,
}

/// The Lua 5.4 script engine.
///
/// Safe to share between threads; every invocation runs in its own VM.
#[derive(Debug, Default)]
pub struct LuaEngine {
    env: LuaEnv,
    compiled: RwLock<HashMap<String, CompileEntry>>,
}

impl LuaEngine {
    #[must_use]
    pub fn new(env: LuaEnv) -> Self {
        Self {
            env,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn env(&self) -> &LuaEnv {
        &self.env
    }

    /// Number of source paths with a cached compile result.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.compiled.read().len()
    }

    fn lookup(&self, path: &str, modified: u64) -> Option<Result<Arc<[u8]>, String>> {
        self.compiled
            .read()
            .get(path)
            .filter(|entry| entry.modified == modified)
            .map(|entry| entry.compiled.clone())
    }

    /// Known compile error for this exact source version, if any.
    ///
    /// `None` means either "compiles" or "not seen yet".
    fn known_error(&self, path: &str, modified: u64) -> Option<String> {
        self.lookup(path, modified).and_then(Result::err)
    }

    fn record_compile(&self, path: &str, modified: u64, compiled: Result<Arc<[u8]>, String>) {
        self.compiled
            .write()
            .insert(path.to_string(), CompileEntry { modified, compiled });
    }

    /// Loads the main chunk of `source` into `lua`, from cached bytecode
    /// when this version was compiled before.
    fn load_chunk(&self, lua: &Lua, source: &ScriptSource) -> Result<Function, LuaError> {
        let name = format!("@{}", source.path);
        if let Some(Ok(bytecode)) = self.lookup(&source.path, source.modified) {
            trace!(path = %source.path, "compiled chunk cache hit");
            return Ok(lua
                .load(&bytecode[..])
                .set_name(name)
                .set_mode(ChunkMode::Binary)
                .into_function()?);
        }

        match lua
            .load(&*source.text)
            .set_name(name)
            .set_mode(ChunkMode::Text)
            .into_function()
        {
            Ok(chunk) => {
                let bytecode: Arc<[u8]> = Arc::from(chunk.dump(false));
                self.record_compile(&source.path, source.modified, Ok(bytecode));
                Ok(chunk)
            }
            Err(mlua::Error::SyntaxError { message, .. }) => {
                self.record_compile(&source.path, source.modified, Err(message.clone()));
                Err(LuaError::InvalidScript(message))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn run(
        &self,
        invocation: &Invocation,
        host: Arc<dyn HostApi>,
    ) -> Result<InvocationOutcome, LuaError> {
        let source = &invocation.source;
        let lua = self.env.create_lua()?;
        host_fns::register(&lua, host)?;

        let state_in = parse_state(&invocation.state)?;
        host_fns::inject_state(&lua, &state_in)?;
        let injected = lua_to_json(&lua, lua.globals().get("state")?)?;

        let chunk = self.load_chunk(&lua, source)?;
        chunk.call::<()>(())?;

        let callbacks = read_callbacks(&lua)?;
        let handled = match callbacks.get(&invocation.trigger.event) {
            Some((tags, f)) if invocation.trigger.accepts(tags) => {
                let payload = json_to_lua(&lua, &invocation.trigger.payload)?;
                let result: Value = f.call(payload)?;
                !matches!(result, Value::Boolean(false))
            }
            _ => false,
        };

        let state = match lua.globals().get::<Value>("state")? {
            Value::Nil => String::new(),
            value => {
                let after = lua_to_json(&lua, value)?;
                if after == injected {
                    invocation.state.clone()
                } else {
                    serde_json::to_string(&after).map_err(|e| LuaError::State(e.to_string()))?
                }
            }
        };

        Ok(InvocationOutcome {
            handled,
            state,
            callbacks: callbacks
                .into_iter()
                .map(|(event, (tags, _))| (event, tags))
                .collect(),
        })
    }
}

fn parse_state(text: &str) -> Result<serde_json::Value, LuaError> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text).map_err(|e| LuaError::State(format!("invalid state JSON: {e}")))
}

/// Reads back every registration made by the top-level body.
fn read_callbacks(lua: &Lua) -> Result<BTreeMap<String, (BTreeSet<Tag>, Function)>, LuaError> {
    let table: Table = lua.named_registry_value(CALLBACKS_KEY)?;
    let mut callbacks = BTreeMap::new();
    for pair in table.pairs::<String, Table>() {
        let (event, entry) = pair?;
        let tags = entry
            .get::<Table>("tags")?
            .sequence_values::<String>()
            .map(|name| {
                name.map_err(LuaError::from)
                    .and_then(|n| n.parse::<Tag>().map_err(LuaError::TypeError))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        let f: Function = entry.get("fn")?;
        callbacks.insert(event, (tags, f));
    }
    Ok(callbacks)
}

impl ScriptEngine for LuaEngine {
    fn invoke(
        &self,
        invocation: &Invocation,
        host: Arc<dyn HostApi>,
    ) -> Result<InvocationOutcome, ScriptError> {
        let path = invocation.source.path.as_str();
        if let Some(message) = self.known_error(path, invocation.source.modified) {
            trace!(path, "skipping known compile failure");
            return Err(ScriptError::compile(path, message));
        }

        let started = Instant::now();
        let result = self
            .run(invocation, host)
            .map_err(|e| e.into_script_error(path));
        debug!(
            object = %invocation.object,
            event = %invocation.trigger.event,
            path,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "lua invocation"
        );
        result
    }

    fn invalidate(&self, path: &str) {
        self.compiled.write().remove(path);
    }

    fn invalidate_all(&self) {
        self.compiled.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wisp_script::testing::RecordingHost;
    use wisp_script::{ScriptSource, Trigger};

    fn invocation(text: &str, state: &str, trigger: Trigger) -> Invocation {
        Invocation {
            object: "orc".into(),
            source: ScriptSource {
                path: "/orc.lua".into(),
                text: text.into(),
                modified: 1,
            },
            state: state.into(),
            trigger,
        }
    }

    fn invoke(engine: &LuaEngine, inv: &Invocation) -> Result<InvocationOutcome, ScriptError> {
        engine.invoke(inv, Arc::new(RecordingHost::new("orc")))
    }

    #[test]
    fn callback_claims_matching_trigger() {
        let engine = LuaEngine::default();
        let inv = invocation(
            r#"addCallback("poke", "emit", function(p) state.pokes = (state.pokes or 0) + p.n end)"#,
            r#"{"pokes":1}"#,
            Trigger::emit("poke", json!({"n": 2})),
        );
        let out = invoke(&engine, &inv).unwrap();
        assert!(out.handled);
        assert_eq!(out.state, r#"{"pokes":3}"#);
        assert_eq!(
            out.callbacks["poke"],
            [Tag::Emit].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn tag_mismatch_is_unhandled() {
        let engine = LuaEngine::default();
        let inv = invocation(
            r#"addCallback("wave", "command", function() state.waved = true end)"#,
            "",
            Trigger::command("wave", "wave", false),
        );
        let out = invoke(&engine, &inv).unwrap();
        assert!(!out.handled);
        assert_eq!(out.state, "");
    }

    #[test]
    fn returning_false_declines() {
        let engine = LuaEngine::default();
        let inv = invocation(
            r#"addCallback("north", "action", function() return false end)"#,
            "",
            Trigger::command("north", "north", true),
        );
        assert!(!invoke(&engine, &inv).unwrap().handled);
    }

    #[test]
    fn unchanged_state_keeps_bytes() {
        let engine = LuaEngine::default();
        let text = "{ \"b\": 1,\n  \"a\": [1, 2] }";
        let inv = invocation(
            r#"local _ = state.a[1] + state.b"#,
            text,
            Trigger::emit("noop", json!({})),
        );
        assert_eq!(invoke(&engine, &inv).unwrap().state, text);
    }

    #[test]
    fn nil_state_clears() {
        let engine = LuaEngine::default();
        let inv = invocation("state = nil", r#"{"x":1}"#, Trigger::emit("x", json!({})));
        assert_eq!(invoke(&engine, &inv).unwrap().state, "");
    }

    #[test]
    fn invalid_state_is_state_error() {
        let engine = LuaEngine::default();
        let inv = invocation("", "{not json", Trigger::emit("x", json!({})));
        assert!(matches!(invoke(&engine, &inv), Err(ScriptError::State(_))));
    }

    #[test]
    fn compile_failures_are_cached_per_version() {
        let engine = LuaEngine::default();
        let mut inv = invocation("addCallback(", "", Trigger::emit("x", json!({})));
        assert!(matches!(
            invoke(&engine, &inv),
            Err(ScriptError::Compile { .. })
        ));
        assert!(engine.known_error("/orc.lua", 1).is_some());

        inv.source.text = "".into();
        assert!(invoke(&engine, &inv).is_err(), "same version stays broken");

        inv.source.modified = 2;
        assert!(invoke(&engine, &inv).is_ok());
        assert!(engine.known_error("/orc.lua", 2).is_none());

        engine.invalidate("/orc.lua");
        assert_eq!(engine.cached(), 0);
    }

    #[test]
    fn compiled_chunks_are_reused_per_version() {
        let engine = LuaEngine::default();
        let mut inv = invocation("state.v = 1", "", Trigger::emit("x", json!({})));
        assert_eq!(invoke(&engine, &inv).unwrap().state, r#"{"v":1}"#);
        assert!(matches!(engine.lookup("/orc.lua", 1), Some(Ok(_))));

        // Same version: the cached bytecode runs, not the new text.
        inv.source.text = "state.v = 2".into();
        assert_eq!(invoke(&engine, &inv).unwrap().state, r#"{"v":1}"#);

        inv.source.modified = 2;
        assert_eq!(invoke(&engine, &inv).unwrap().state, r#"{"v":2}"#);
        assert!(engine.lookup("/orc.lua", 1).is_none());

        engine.invalidate("/orc.lua");
        assert_eq!(engine.cached(), 0);
    }

    #[test]
    fn cached_chunks_keep_their_callbacks_and_names() {
        let engine = LuaEngine::default();
        let inv = invocation(
            r#"addCallback("x", "emit", function() error("kaboom") end)"#,
            "",
            Trigger::emit("x", json!({})),
        );
        for _ in 0..2 {
            match invoke(&engine, &inv).unwrap_err() {
                ScriptError::Runtime { message, .. } => {
                    assert!(message.contains("/orc.lua:1"), "{message}");
                    assert!(message.contains("kaboom"));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn runtime_error_names_the_script() {
        let engine = LuaEngine::default();
        let inv = invocation(
            r#"addCallback("x", "emit", function() error("kaboom") end)"#,
            "",
            Trigger::emit("x", json!({})),
        );
        match invoke(&engine, &inv).unwrap_err() {
            ScriptError::Runtime { path, message } => {
                assert_eq!(path, "/orc.lua");
                assert!(message.contains("kaboom"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn instruction_budget_stops_runaway_scripts() {
        let engine = LuaEngine::new(LuaEnv::new().with_max_instructions(100_000));
        let inv = invocation("while true do end", "", Trigger::emit("x", json!({})));
        match invoke(&engine, &inv).unwrap_err() {
            ScriptError::Runtime { message, .. } => {
                assert!(message.contains("instruction limit exceeded"))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn vms_do_not_share_globals() {
        let engine = LuaEngine::default();
        let first = invocation("leaked = 1", "", Trigger::emit("x", json!({})));
        invoke(&engine, &first).unwrap();
        let second = invocation(
            r#"state.seen = leaked ~= nil"#,
            "",
            Trigger::emit("x", json!({})),
        );
        assert_eq!(invoke(&engine, &second).unwrap().state, r#"{"seen":false}"#);
    }
}

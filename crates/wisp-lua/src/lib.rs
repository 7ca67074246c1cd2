//! Lua 5.4 scripting for wisp objects.
//!
//! Every object's behavior is a Lua file. The runtime hands the engine
//! an [`Invocation`](wisp_script::Invocation); the engine builds a fresh
//! sandboxed VM, runs the script's top-level body so it re-registers
//! its callbacks, then calls the one matching the trigger.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                LuaEngine (Rust)                  │
//! │  impl ScriptEngine for LuaEngine                 │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │ compile cache: path -> (mtime, error?)     │  │
//! │  │ env: LuaEnv (instruction + memory limits)  │  │
//! │  └────────────────────────────────────────────┘  │
//! │                       │ per invocation           │
//! │                       ▼                          │
//! │  ┌────────────────────────────────────────────┐  │
//! │  │ fresh VM: host globals, `state` table      │  │
//! │  │   -- orc.lua                               │  │
//! │  │   setDescriptions({ { Short = "an orc" } })│  │
//! │  │   addCallback("poke", "emit", function(p)  │  │
//! │  │     state.pokes = (state.pokes or 0) + 1   │  │
//! │  │   end)                                     │  │
//! │  └────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Script API
//!
//! The globals available to a script are listed in
//! [`wisp_script::HostApi`]. In addition:
//!
//! - `addCallback(event, tags, fn)`: `tags` is one of `"action"`,
//!   `"command"`, `"emit"` or a list of them. `fn(payload)` claims the
//!   event unless it returns `false`.
//! - `removeCallback(event)`
//! - `state`: a table persisted as JSON between invocations. Setting it
//!   to `nil` clears it.
//! - `print(...)`: same as `log("info", ...)`.

mod engine;
mod error;
mod host_fns;
mod lua_env;
pub mod testing;
mod types;

pub use engine::LuaEngine;
pub use error::LuaError;
pub use lua_env::LuaEnv;

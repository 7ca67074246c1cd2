//! Sandboxed Lua VM construction.
//!
//! Every invocation gets a fresh VM built by [`LuaEnv::create_lua`]:
//!
//! | Concern | Treatment |
//! |---------|-----------|
//! | Standard library | `math`, `string`, `table`, `utf8` and the base library only |
//! | Code loading | `load`, `loadfile`, `dofile`, `require` removed; binary chunks only from the engine's own compile cache |
//! | Runaway loops | optional instruction budget enforced by a count hook |
//! | Memory | allocation cap via `Lua::set_memory_limit` |
//!
//! Nothing in the VM can reach the filesystem, the process or another
//! VM; everything a script does to the world goes through the host
//! functions installed by [`host_fns`](crate::host_fns).

use crate::error::LuaError;
use mlua::{HookTriggers, Lua, LuaOptions, StdLib, Value, VmState};
use std::sync::atomic::{AtomicU64, Ordering};

/// Globals removed from every VM.
const BLOCKED_GLOBALS: &[&str] = &["dofile", "loadfile", "load", "require", "collectgarbage"];

/// How often, in VM instructions, the budget hook runs.
const BUDGET_CHECK_INTERVAL: u32 = 1_000;

/// Limits applied to each VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LuaEnv {
    max_instructions: u64,
    memory_limit: usize,
}

impl Default for LuaEnv {
    fn default() -> Self {
        Self {
            max_instructions: 0,
            memory_limit: 64 * 1024 * 1024,
        }
    }
}

impl LuaEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instructions one VM may execute in total. 0 (the default) disables
    /// the budget, so scripts run to completion however long they take.
    #[must_use]
    pub fn with_max_instructions(mut self, max: u64) -> Self {
        self.max_instructions = max;
        self
    }

    /// Bytes one VM may allocate. 0 disables the cap.
    #[must_use]
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = bytes;
        self
    }

    #[must_use]
    pub fn max_instructions(&self) -> u64 {
        self.max_instructions
    }

    #[must_use]
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Creates a new sandboxed VM with limits armed.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::Runtime`] if the VM cannot be set up.
    pub fn create_lua(&self) -> Result<Lua, LuaError> {
        // SAFETY: no `debug`, `ffi` or `package` library is opened and the
        // code-loading globals are removed below, so the only binary chunks
        // this VM ever loads are ones the engine dumped from its own
        // compiler.
        let lua = unsafe {
            Lua::unsafe_new_with(
                StdLib::MATH | StdLib::STRING | StdLib::TABLE | StdLib::UTF8,
                LuaOptions::default(),
            )
        };

        let globals = lua.globals();
        for name in BLOCKED_GLOBALS {
            globals.raw_set(*name, Value::Nil)?;
        }

        if self.memory_limit > 0 {
            lua.set_memory_limit(self.memory_limit)?;
        }
        if self.max_instructions > 0 {
            install_budget(&lua, self.max_instructions);
        }
        Ok(lua)
    }
}

fn install_budget(lua: &Lua, limit: u64) {
    let executed = AtomicU64::new(0);
    lua.set_hook(
        HookTriggers::new().every_nth_instruction(BUDGET_CHECK_INTERVAL),
        move |_lua, _debug| {
            let total = executed.fetch_add(u64::from(BUDGET_CHECK_INTERVAL), Ordering::Relaxed)
                + u64::from(BUDGET_CHECK_INTERVAL);
            if total > limit {
                return Err(mlua::Error::RuntimeError(format!(
                    "instruction limit exceeded ({limit})"
                )));
            }
            Ok(VmState::Continue)
        },
    );
}

//! Error types for the Lua engine.

use thiserror::Error;
use wisp_script::ScriptError;
use wisp_types::ErrorCode;

/// Errors raised while preparing or running a Lua invocation.
///
/// # Error Codes
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | Runtime | `LUA_RUNTIME` | No |
/// | InvalidScript | `LUA_INVALID_SCRIPT` | No |
/// | TypeError | `LUA_TYPE_ERROR` | No |
/// | State | `LUA_STATE` | No |
#[derive(Debug, Error)]
pub enum LuaError {
    /// Lua runtime error.
    #[error("lua error: {0}")]
    Runtime(#[from] mlua::Error),

    /// The source failed to compile.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// A value crossing the boundary had the wrong shape.
    #[error("type error: {0}")]
    TypeError(String),

    /// State text could not be decoded or encoded.
    #[error("state error: {0}")]
    State(String),
}

impl ErrorCode for LuaError {
    fn code(&self) -> &'static str {
        match self {
            Self::Runtime(_) => "LUA_RUNTIME",
            Self::InvalidScript(_) => "LUA_INVALID_SCRIPT",
            Self::TypeError(_) => "LUA_TYPE_ERROR",
            Self::State(_) => "LUA_STATE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

impl LuaError {
    /// Converts to the engine-neutral error for the script at `path`.
    #[must_use]
    pub fn into_script_error(self, path: &str) -> ScriptError {
        match self {
            Self::Runtime(mlua::Error::SyntaxError { message, .. }) | Self::InvalidScript(message) => {
                ScriptError::compile(path, message)
            }
            Self::Runtime(err) => ScriptError::runtime(path, format_lua_error(&err)),
            Self::TypeError(message) => ScriptError::runtime(path, message),
            Self::State(message) => ScriptError::State(message),
        }
    }
}

/// The innermost message of a Lua error, without callback tracebacks.
pub(crate) fn format_lua_error(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => format_lua_error(cause),
        mlua::Error::SyntaxError { message, .. } => format!("compile error: {message}"),
        mlua::Error::MemoryError(msg) => format!("out of memory: {msg}"),
        _ => format!("{err}"),
    }
}

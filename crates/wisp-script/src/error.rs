//! Errors crossing the script boundary.

use thiserror::Error;
use wisp_types::ErrorCode;

/// Failure of one script invocation.
///
/// Always confined to the invocation that raised it: the dispatcher logs
/// it, streams it to debug listeners and keeps going.
///
/// # Error Codes
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | Compile | `SCRIPT_COMPILE` | No |
/// | Runtime | `SCRIPT_RUNTIME` | No |
/// | State | `SCRIPT_STATE` | No |
/// | Engine | `SCRIPT_ENGINE` | Yes |
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// The flattened source does not compile.
    #[error("compile error in {path}: {message}")]
    Compile { path: String, message: String },

    /// The top-level body or a callback raised.
    #[error("runtime error in {path}: {message}")]
    Runtime { path: String, message: String },

    /// State could not be decoded before the run or encoded after it.
    #[error("state error: {0}")]
    State(String),

    /// The engine itself failed to set up a context.
    #[error("engine error: {0}")]
    Engine(String),
}

impl ScriptError {
    pub fn compile(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn runtime(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Runtime {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl ErrorCode for ScriptError {
    fn code(&self) -> &'static str {
        match self {
            Self::Compile { .. } => "SCRIPT_COMPILE",
            Self::Runtime { .. } => "SCRIPT_RUNTIME",
            Self::State(_) => "SCRIPT_STATE",
            Self::Engine(_) => "SCRIPT_ENGINE",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}

/// Failure of a host API call made by a script.
///
/// The display text is what the script (and ultimately the player)
/// sees, so variants carry finished sentences.
///
/// # Error Codes
///
/// | Variant | Code | Recoverable |
/// |---------|------|-------------|
/// | Validation | `HOST_VALIDATION` | No |
/// | ContainmentCycle | `HOST_CONTAINMENT_CYCLE` | No |
/// | NotFound | `HOST_NOT_FOUND` | Yes |
/// | PermissionDenied | `HOST_PERMISSION_DENIED` | No |
/// | Internal | `HOST_INTERNAL` | Yes |
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ContainmentCycle(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Internal(String),
}

impl ErrorCode for HostError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "HOST_VALIDATION",
            Self::ContainmentCycle(_) => "HOST_CONTAINMENT_CYCLE",
            Self::NotFound(_) => "HOST_NOT_FOUND",
            Self::PermissionDenied(_) => "HOST_PERMISSION_DENIED",
            Self::Internal(_) => "HOST_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Internal(_))
    }
}

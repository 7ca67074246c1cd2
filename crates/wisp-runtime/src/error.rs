//! Runtime errors.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`RuntimeError::Validation`] | `RUNTIME_VALIDATION` | No |
//! | [`RuntimeError::ContainmentCycle`] | `RUNTIME_CONTAINMENT_CYCLE` | No |
//! | [`RuntimeError::NotFound`] | `RUNTIME_NOT_FOUND` | Yes |
//! | [`RuntimeError::AlreadyExists`] | `RUNTIME_ALREADY_EXISTS` | No |
//! | [`RuntimeError::RemoveRoot`] | `RUNTIME_REMOVE_ROOT` | No |
//! | [`RuntimeError::RemoveCurrentLocation`] | `RUNTIME_REMOVE_CURRENT_LOCATION` | No |
//! | [`RuntimeError::LeaveUniverse`] | `RUNTIME_LEAVE_UNIVERSE` | No |
//! | [`RuntimeError::NotEmpty`] | `RUNTIME_NOT_EMPTY` | No |
//! | [`RuntimeError::PermissionDenied`] | `RUNTIME_PERMISSION_DENIED` | No |
//! | [`RuntimeError::Source`] | `RUNTIME_SOURCE` | per source error |
//! | [`RuntimeError::Script`] | `RUNTIME_SCRIPT` | per script error |
//! | [`RuntimeError::Persistence`] | `RUNTIME_PERSISTENCE` | Yes |
//! | [`RuntimeError::Snapshot`] | `RUNTIME_SNAPSHOT` | No |
//!
//! Challenge failures and lost CAS races are outcomes, not errors, and
//! have no variant here.

use std::path::PathBuf;
use thiserror::Error;
use wisp_script::{HostError, ScriptError};
use wisp_source::SourceError;
use wisp_types::{ErrorCode, ObjectId};

/// Runtime layer error.
///
/// ```
/// use wisp_runtime::RuntimeError;
/// use wisp_types::ErrorCode;
///
/// let err = RuntimeError::RemoveCurrentLocation;
/// assert_eq!(err.to_string(), "Can't remove current location");
/// assert_eq!(err.code(), "RUNTIME_REMOVE_CURRENT_LOCATION");
/// ```
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Malformed arguments.
    #[error("{0}")]
    Validation(String),

    /// The destination is the object itself or inside it.
    #[error("cannot move object into itself")]
    ContainmentCycle { id: ObjectId, destination: ObjectId },

    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("object already exists: {0}")]
    AlreadyExists(ObjectId),

    #[error("Unable to remove the universe")]
    RemoveRoot,

    #[error("Can't remove current location")]
    RemoveCurrentLocation,

    #[error("Unable to leave the universe")]
    LeaveUniverse,

    #[error("object {0} is not empty")]
    NotEmpty(ObjectId),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("failed to access '{path}': {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl RuntimeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "RUNTIME_VALIDATION",
            Self::ContainmentCycle { .. } => "RUNTIME_CONTAINMENT_CYCLE",
            Self::NotFound(_) => "RUNTIME_NOT_FOUND",
            Self::AlreadyExists(_) => "RUNTIME_ALREADY_EXISTS",
            Self::RemoveRoot => "RUNTIME_REMOVE_ROOT",
            Self::RemoveCurrentLocation => "RUNTIME_REMOVE_CURRENT_LOCATION",
            Self::LeaveUniverse => "RUNTIME_LEAVE_UNIVERSE",
            Self::NotEmpty(_) => "RUNTIME_NOT_EMPTY",
            Self::PermissionDenied(_) => "RUNTIME_PERMISSION_DENIED",
            Self::Source(_) => "RUNTIME_SOURCE",
            Self::Script(_) => "RUNTIME_SCRIPT",
            Self::Persistence { .. } => "RUNTIME_PERSISTENCE",
            Self::Snapshot(_) => "RUNTIME_SNAPSHOT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::NotFound(_) | Self::Persistence { .. } => true,
            Self::Source(e) => e.is_recoverable(),
            Self::Script(e) => e.is_recoverable(),
            _ => false,
        }
    }
}

impl From<RuntimeError> for HostError {
    fn from(err: RuntimeError) -> Self {
        let message = err.to_string();
        match err {
            RuntimeError::Validation(_)
            | RuntimeError::AlreadyExists(_)
            | RuntimeError::RemoveRoot
            | RuntimeError::RemoveCurrentLocation
            | RuntimeError::LeaveUniverse
            | RuntimeError::NotEmpty(_) => HostError::Validation(message),
            RuntimeError::ContainmentCycle { .. } => HostError::ContainmentCycle(message),
            RuntimeError::NotFound(id) => HostError::NotFound(id.to_string()),
            RuntimeError::Source(SourceError::NotFound { path }) => HostError::NotFound(path),
            RuntimeError::PermissionDenied(_) => HostError::PermissionDenied(message),
            _ => HostError::Internal(message),
        }
    }
}

//! The contract between the wisp runtime and an embedded script engine.
//!
//! ```text
//!  Dispatcher ── Invocation ──▶ ScriptEngine ──▶ script top-level
//!      ▲                            │                 │
//!      │                            │          addCallback(...)
//!      │                            ▼                 │
//!      └── InvocationOutcome ◀── matched callback ◀───┘
//!                                   │
//!                                   ▼
//!                               HostApi  (emit, moveObject, timers, ...)
//! ```
//!
//! The runtime depends only on these traits, so any engine that can run
//! a script synchronously and call back into [`HostApi`] can drive it.
//! `wisp-lua` is the production implementation.

mod engine;
mod error;
mod host;
mod invocation;
pub mod testing;

pub use engine::ScriptEngine;
pub use error::{HostError, ScriptError};
pub use host::{HostApi, HostResult, LogLevel, Neighbourhood, ObjectView};
pub use invocation::{Invocation, InvocationOutcome, ScriptSource, Trigger};

//! The engine seam.

use crate::{HostApi, Invocation, InvocationOutcome, ScriptError};
use std::sync::Arc;

/// An embedded scripting engine.
///
/// The contract is synchronous: [`invoke`](Self::invoke) runs the
/// script's top-level body (which re-registers every callback), calls
/// the callback matching [`Invocation::trigger`] if there is one, and
/// returns the new State. Nothing survives between invocations except
/// that State text and whatever the script did through `host`.
///
/// Implementations may cache compiled code keyed by
/// [`ScriptSource::path`](crate::ScriptSource) and
/// [`ScriptSource::modified`](crate::ScriptSource), and must be safe to
/// call from many threads at once for different objects.
pub trait ScriptEngine: Send + Sync {
    /// Runs one invocation.
    ///
    /// # Errors
    ///
    /// [`ScriptError`] for compile failures and anything the script
    /// raises. The caller discards State and drafts on error.
    fn invoke(
        &self,
        invocation: &Invocation,
        host: Arc<dyn HostApi>,
    ) -> Result<InvocationOutcome, ScriptError>;

    /// Drops any compiled code for `path`.
    fn invalidate(&self, path: &str);

    fn invalidate_all(&self);
}

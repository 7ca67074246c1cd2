//! The task that turns deadlines into dispatches.
//!
//! ```text
//! loop {
//!     select! {
//!         shutdown            => break,
//!         firing finished     => reap,
//!         registry changed    => recompute deadline,
//!         sleep(deadline)     => take due timers,
//!                                spawn_blocking(fire_timers) per owner,
//!     }
//! }
//! ```
//!
//! Firing runs on the blocking pool because script invocations are
//! synchronous. The loop does not wait for a firing before computing the
//! next deadline; a slow owner only delays its own later invocations.

use crate::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Sleep used when nothing is scheduled; any new timer wakes the loop.
const IDLE_SLEEP: Duration = Duration::from_secs(3600);

/// Handle to the running timer task.
pub struct TimerDriver {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TimerDriver {
    /// Spawns the driver on the current tokio runtime.
    #[must_use]
    pub fn spawn(dispatcher: Dispatcher) -> Self {
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(run(dispatcher, Arc::clone(&shutdown)));
        Self { shutdown, handle }
    }

    /// Stops the loop and waits for in-flight firings to finish.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "timer driver task failed");
        }
    }
}

async fn run(dispatcher: Dispatcher, shutdown: Arc<Notify>) {
    info!("timer driver started");
    let timers = dispatcher.timers();
    let mut firing: JoinSet<()> = JoinSet::new();

    loop {
        let sleep_for = match timers.next_deadline() {
            Some(deadline) => {
                Duration::from_millis(deadline.saturating_sub(dispatcher.now_ms()))
            }
            None => IDLE_SLEEP,
        };

        tokio::select! {
            biased;

            () = shutdown.notified() => break,

            Some(joined) = firing.join_next(), if !firing.is_empty() => reap(joined),

            () = timers.changed() => {
                debug!("timer set changed");
            }

            () = tokio::time::sleep(sleep_for) => {
                let batches = dispatcher.take_due_timers();
                if !batches.is_empty() {
                    debug!(owners = batches.len(), "firing timers");
                }
                for (owner, fires) in batches {
                    let d = dispatcher.clone();
                    firing.spawn_blocking(move || d.fire_timers(&owner, fires));
                }
            }
        }
    }

    while let Some(joined) = firing.join_next().await {
        reap(joined);
    }
    info!("timer driver stopped");
}

fn reap(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "timer firing panicked");
    }
}

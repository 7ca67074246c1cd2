//! Event dispatch.
//!
//! Every stimulus (a typed command, an external emit, a timer fire)
//! enters through [`Dispatcher`] and runs to completion as one cascade:
//!
//! ```text
//!  stimulus
//!     │
//!     ▼
//!  ┌───────────────┐   emit / emitToLocation / movement / created
//!  │ invoke(target)│ ─────────────────────────────────┐
//!  └───────────────┘                                  │
//!     ▲                                               ▼
//!     │          depth ≤ max_emit_depth      ┌─────────────────┐
//!     └──────────────────────────────────────│ Cascade (FIFO)  │
//!                                            └─────────────────┘
//! ```
//!
//! Each invocation runs under the target's exclusivity lock, so State
//! read-modify-write is atomic per object while different objects run in
//! parallel on different threads. A failing invocation is reported to
//! stats, logs and debug listeners; the rest of the cascade continues.

mod cascade;
mod command;
mod host;
mod movement;

pub(crate) use cascade::{Cascade, Delivery};
pub use command::{CommandOutcome, UNKNOWN_COMMAND};

use crate::config::WispConfig;
use crate::containment::{Containment, MoveRecord};
use crate::output::{OutputSink, Outputs};
use crate::skill_config::SkillConfigStore;
use crate::stats::{DispatchStats, ErrorRecord, InvocationRecord};
use crate::store::{MemoryStore, ObjectStore};
use crate::timer::{Clock, SystemClock, TimerFire, TimerRegistry};
use crate::RuntimeError;
use host::{Drafts, InvocationHost};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use wisp_script::{HostApi, Invocation, ScriptEngine, ScriptError, ScriptSource, Trigger};
use wisp_source::{SourceResolver, SourceTree};
use wisp_types::{event, events, Object, ObjectId, Tag};

pub(crate) struct Inner {
    pub(crate) config: WispConfig,
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) containment: Containment,
    pub(crate) resolver: Arc<SourceResolver>,
    pub(crate) engine: Arc<dyn ScriptEngine>,
    pub(crate) timers: Arc<TimerRegistry>,
    pub(crate) skill_configs: SkillConfigStore,
    pub(crate) stats: DispatchStats,
    pub(crate) outputs: Outputs,
    pub(crate) wizards: RwLock<BTreeSet<ObjectId>>,
    pub(crate) clock: Arc<dyn Clock>,
    exclusivity: Mutex<HashMap<ObjectId, Arc<Mutex<()>>>>,
}

/// Routes stimuli to object scripts and applies their effects.
///
/// Cheap to clone; clones share the same world.
#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) inner: Arc<Inner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("objects", &self.inner.store.len())
            .field("timers", &self.inner.timers.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Dispatcher`].
#[must_use]
pub struct DispatcherBuilder {
    engine: Arc<dyn ScriptEngine>,
    sources: Arc<dyn SourceTree>,
    store: Option<Arc<dyn ObjectStore>>,
    clock: Option<Arc<dyn Clock>>,
    config: WispConfig,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: WispConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `store` instead of a fresh [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses `clock` instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the dispatcher, creating the universe root if needed.
    ///
    /// # Errors
    ///
    /// Fails only if the store rejects the root object.
    pub fn build(self) -> Result<Dispatcher, RuntimeError> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn ObjectStore>);
        let containment = Containment::new(Arc::clone(&store));
        containment.ensure_root()?;

        let dispatch = &self.config.dispatch;
        let inner = Inner {
            stats: DispatchStats::new(dispatch.slow_invocation_ms, dispatch.stats_capacity),
            timers: Arc::new(TimerRegistry::new(self.config.timers.min_interval_ms)),
            config: self.config,
            store,
            containment,
            resolver: Arc::new(SourceResolver::new(self.sources)),
            engine: self.engine,
            skill_configs: SkillConfigStore::new(),
            outputs: Outputs::default(),
            wizards: RwLock::new(BTreeSet::new()),
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            exclusivity: Mutex::new(HashMap::new()),
        };
        Ok(Dispatcher {
            inner: Arc::new(inner),
        })
    }
}

impl Dispatcher {
    pub fn builder(engine: Arc<dyn ScriptEngine>, sources: Arc<dyn SourceTree>) -> DispatcherBuilder {
        DispatcherBuilder {
            engine,
            sources,
            store: None,
            clock: None,
            config: WispConfig::default(),
        }
    }

    // === Accessors ===

    #[must_use]
    pub fn config(&self) -> &WispConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn containment(&self) -> &Containment {
        &self.inner.containment
    }

    #[must_use]
    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.inner.resolver
    }

    #[must_use]
    pub fn timers(&self) -> Arc<TimerRegistry> {
        Arc::clone(&self.inner.timers)
    }

    #[must_use]
    pub fn skill_configs(&self) -> &SkillConfigStore {
        &self.inner.skill_configs
    }

    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.inner.stats
    }

    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// A copy of one object.
    pub fn object(&self, id: &ObjectId) -> Result<Object, RuntimeError> {
        self.inner.store.get(id)
    }

    // === Sessions and listeners ===

    /// Routes narration for `object` to `sink`.
    pub fn attach_session(
        &self,
        object: &ObjectId,
        sink: Arc<dyn OutputSink>,
    ) -> Result<(), RuntimeError> {
        self.require(object)?;
        self.inner.outputs.attach_session(object, sink);
        Ok(())
    }

    pub fn detach_session(&self, object: &ObjectId) -> bool {
        self.inner.outputs.detach_session(object)
    }

    /// Streams `object`'s script logs and errors to `sink` on behalf of
    /// `listener`.
    pub fn attach_debug(
        &self,
        object: &ObjectId,
        listener: &ObjectId,
        sink: Arc<dyn OutputSink>,
    ) -> Result<(), RuntimeError> {
        self.require(object)?;
        self.inner.outputs.attach_debug(object, listener, sink);
        Ok(())
    }

    pub fn detach_debug(&self, object: &ObjectId, listener: &ObjectId) -> bool {
        self.inner.outputs.detach_debug(object, listener)
    }

    // === Wizards ===

    #[must_use]
    pub fn is_wizard(&self, id: &ObjectId) -> bool {
        self.inner.wizards.read().contains(id)
    }

    pub fn grant_wizard(&self, id: &ObjectId) -> Result<(), RuntimeError> {
        self.require(id)?;
        self.inner.wizards.write().insert(id.clone());
        info!(object = %id, "granted wizard");
        Ok(())
    }

    pub fn revoke_wizard(&self, id: &ObjectId) -> bool {
        let revoked = self.inner.wizards.write().remove(id);
        if revoked {
            info!(object = %id, "revoked wizard");
        }
        revoked
    }

    #[must_use]
    pub fn wizards(&self) -> BTreeSet<ObjectId> {
        self.inner.wizards.read().clone()
    }

    // === Stimuli ===

    /// Delivers `event` to `target` with the `emit` tag, ungated, and runs
    /// the resulting cascade.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NotFound`] if `target` does not exist. Script
    /// failures are reported, not returned.
    pub fn emit(&self, target: &ObjectId, event: &str, payload: Value) -> Result<(), RuntimeError> {
        self.require(target)?;
        let cascade = Cascade::new();
        cascade.push(Delivery::new(target.clone(), Trigger::emit(event, payload), 0));
        self.drain(&cascade);
        Ok(())
    }

    /// Fires every due timer and waits for them. Returns how many fired.
    ///
    /// Each owner's timers run on their own thread, so a slow callback
    /// only holds back its own object.
    pub fn fire_due_timers(&self) -> usize {
        let batches = self.take_due_timers();
        let count = batches.values().map(Vec::len).sum();
        if batches.len() == 1 {
            for (owner, fires) in batches {
                self.fire_timers(&owner, fires);
            }
            return count;
        }

        std::thread::scope(|scope| {
            for (owner, fires) in batches {
                scope.spawn(move || self.fire_timers(&owner, fires));
            }
        });
        count
    }

    /// Takes every due timer, grouped by owner in deadline order.
    ///
    /// Timers whose owner no longer exists are dropped.
    pub fn take_due_timers(&self) -> BTreeMap<ObjectId, Vec<TimerFire>> {
        let mut batches: BTreeMap<ObjectId, Vec<TimerFire>> = BTreeMap::new();
        for fire in self.inner.timers.take_due(self.now_ms()) {
            if !self.inner.store.contains(&fire.owner) {
                let dropped = self.inner.timers.clear_owner(&fire.owner);
                debug!(owner = %fire.owner, dropped, "dropped timers of missing owner");
                continue;
            }
            batches.entry(fire.owner.clone()).or_default().push(fire);
        }
        batches
    }

    /// Delivers `fires` to `owner` as one cascade.
    pub fn fire_timers(&self, owner: &ObjectId, fires: Vec<TimerFire>) {
        let cascade = Cascade::new();
        for fire in fires {
            trace!(timer = %fire.id, owner = %owner, event = %fire.event, "timer fired");
            cascade.push(Delivery::new(
                owner.clone(),
                Trigger::emit(fire.event, fire.payload),
                0,
            ));
        }
        self.drain(&cascade);
    }

    // === Structural operations ===

    /// Moves `id` into `destination` and narrates it.
    pub fn move_object(
        &self,
        id: &ObjectId,
        destination: &ObjectId,
    ) -> Result<MoveRecord, RuntimeError> {
        let cascade = Cascade::new();
        let record = self.move_within(id, destination, None, &cascade, 0)?;
        self.drain(&cascade);
        Ok(record)
    }

    /// Creates an object running `source_path` inside `location` and
    /// sends it `created`.
    pub fn create_object(
        &self,
        creator: &ObjectId,
        source_path: &str,
        location: &ObjectId,
    ) -> Result<ObjectId, RuntimeError> {
        let cascade = Cascade::new();
        let id = self.create_within(creator, source_path, location, &cascade, 0)?;
        self.drain(&cascade);
        Ok(id)
    }

    /// Removes `id` along with its timers, outputs and counters.
    ///
    /// `actor_location` is the location of whoever asked; it cannot be
    /// removed.
    pub fn remove_object(
        &self,
        id: &ObjectId,
        actor_location: Option<&ObjectId>,
    ) -> Result<Object, RuntimeError> {
        let removed = self.inner.containment.remove_object(id, actor_location)?;
        let timers = self.inner.timers.clear_owner(id);
        self.inner.outputs.forget(id);
        self.inner.stats.forget(id);
        self.inner.wizards.write().remove(id);
        self.inner.exclusivity.lock().remove(id);
        debug!(object = %id, timers, "cleaned up removed object");
        Ok(removed)
    }

    /// Drops cached sources and compiled code that include `path`.
    pub fn invalidate_source(&self, path: &str) -> usize {
        let before = self.inner.resolver.cached_paths();
        let dropped = self.inner.resolver.invalidate(path);
        let after: BTreeSet<String> = self.inner.resolver.cached_paths().into_iter().collect();
        self.inner.engine.invalidate(path);
        for entry in before.iter().filter(|p| !after.contains(*p)) {
            self.inner.engine.invalidate(entry);
        }
        debug!(path, dropped, "invalidated source");
        dropped
    }

    pub fn invalidate_all_sources(&self) {
        self.inner.resolver.invalidate_all();
        self.inner.engine.invalidate_all();
    }

    // === Internals ===

    fn require(&self, id: &ObjectId) -> Result<(), RuntimeError> {
        if self.inner.store.contains(id) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(id.clone()))
        }
    }

    pub(crate) fn move_within(
        &self,
        id: &ObjectId,
        destination: &ObjectId,
        exit: Option<&str>,
        cascade: &Arc<Cascade>,
        depth: usize,
    ) -> Result<MoveRecord, RuntimeError> {
        let record = self.inner.containment.move_object(id, destination)?;
        self.after_move(&record, exit, cascade, depth);
        Ok(record)
    }

    pub(crate) fn create_within(
        &self,
        creator: &ObjectId,
        source_path: &str,
        location: &ObjectId,
        cascade: &Arc<Cascade>,
        depth: usize,
    ) -> Result<ObjectId, RuntimeError> {
        let path = wisp_source::path::normalize(source_path)?;
        let id = self.inner.containment.create_object(&path, location)?;
        cascade.push(Delivery::new(
            id.clone(),
            Trigger::emit(events::CREATED, event::created_payload(creator)),
            depth,
        ));
        Ok(id)
    }

    /// Runs queued deliveries until the cascade is empty.
    pub(crate) fn drain(&self, cascade: &Arc<Cascade>) {
        let max_depth = self.inner.config.dispatch.max_emit_depth;
        while let Some(delivery) = cascade.pop() {
            if delivery.depth > max_depth {
                warn!(
                    object = %delivery.target,
                    event = %delivery.trigger.event,
                    depth = delivery.depth,
                    "emit depth exceeded, dropping"
                );
                self.inner.stats.record_dropped_emit();
                if let Some(fallback) = delivery.fallback {
                    self.inner.outputs.print(&fallback.observer, &fallback.text);
                }
                continue;
            }
            self.deliver(delivery, cascade);
        }
    }

    fn deliver(&self, delivery: Delivery, cascade: &Arc<Cascade>) {
        let Delivery {
            target,
            trigger,
            depth,
            fallback,
            narration,
        } = delivery;

        if narration {
            if let Some(message) = event::rendered_message(&trigger.payload) {
                self.inner.outputs.print(&target, message);
            }
        }

        let narrating_for = fallback.as_ref().map(|f| f.observer.clone());
        let handled = match self.invoke(&target, trigger, depth, cascade, narrating_for) {
            Ok(handled) => handled,
            Err(RuntimeError::NotFound(id)) => {
                debug!(object = %id, "delivery target vanished");
                false
            }
            Err(_) => false,
        };

        if !handled {
            if let Some(fallback) = fallback {
                self.inner.outputs.print(&fallback.observer, &fallback.text);
            }
        }
    }

    /// Runs one invocation of `target`'s script and commits its effects.
    ///
    /// Returns whether a callback claimed the trigger. Source and script
    /// failures are reported before being returned. `narrating_for` is
    /// the observer a movement asked this invocation to narrate to.
    pub(crate) fn invoke(
        &self,
        target: &ObjectId,
        trigger: Trigger,
        depth: usize,
        cascade: &Arc<Cascade>,
        narrating_for: Option<ObjectId>,
    ) -> Result<bool, RuntimeError> {
        let gate = self.gate(target);
        let _exclusive = gate.lock();

        let object = self.inner.store.get(target)?;
        if object.source_path.is_empty() {
            return Ok(false);
        }
        let event = trigger.event.clone();

        let resolved = match self.inner.resolver.resolve(&object.source_path) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.report_failure(target, &event, &e.to_string());
                return Err(e.into());
            }
        };

        let invocation = Invocation {
            object: target.clone(),
            source: ScriptSource {
                path: resolved.path.clone(),
                text: Arc::clone(&resolved.source),
                modified: resolved.modified,
            },
            state: object.state.clone(),
            trigger,
        };
        let host = Arc::new(
            InvocationHost::new(self.clone(), object, depth, Arc::clone(cascade))
                .narrating_for(narrating_for),
        );
        let api: Arc<dyn HostApi> = host.clone();

        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.engine.invoke(&invocation, api)
        }))
        .unwrap_or_else(|payload| Err(ScriptError::Engine(panic_message(payload.as_ref()))));
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let slow = self.inner.stats.record_invocation(InvocationRecord {
            object: target.clone(),
            event: event.clone(),
            elapsed_ms,
            at: self.now_ms(),
        });
        if slow {
            info!(object = %target, event = %event, elapsed_ms, "slow invocation");
        }

        match result {
            Ok(outcome) => {
                self.commit(target, outcome.state, outcome.callbacks, host.take_drafts());
                trace!(
                    object = %target,
                    event = %event,
                    handled = outcome.handled,
                    elapsed_ms,
                    "invocation finished"
                );
                Ok(outcome.handled)
            }
            Err(e) => {
                self.report_failure(target, &event, &e.to_string());
                Err(e.into())
            }
        }
    }

    fn commit(
        &self,
        id: &ObjectId,
        state: String,
        callbacks: BTreeMap<String, BTreeSet<Tag>>,
        drafts: Drafts,
    ) {
        let mut pending = Some((state, callbacks, drafts));
        let result = self.inner.store.update(id, &mut |object| {
            if let Some((state, callbacks, drafts)) = pending.take() {
                object.state = state;
                object.callbacks = callbacks;
                drafts.apply(object);
            }
        });
        if result.is_err() {
            debug!(object = %id, "object removed during its own invocation");
        }
    }

    fn gate(&self, id: &ObjectId) -> Arc<Mutex<()>> {
        Arc::clone(self.inner.exclusivity.lock().entry(id.clone()).or_default())
    }

    pub(crate) fn report_failure(&self, object: &ObjectId, event: &str, message: &str) {
        warn!(object = %object, event, error = %message, "invocation failed");
        self.inner.stats.record_error(ErrorRecord {
            object: object.clone(),
            event: event.to_string(),
            message: message.to_string(),
            at: self.now_ms(),
        });
        self.inner
            .outputs
            .debug(object, &format!("[error] {event}: {message}"));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("engine panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("engine panicked: {s}")
    } else {
        "engine panicked".to_string()
    }
}

//! The [`HostApi`] bound to one invocation.
//!
//! Edits to the invoked object's own fields collect in [`Drafts`] and are
//! committed with State only when the script returns normally. Structural
//! calls, emits and timers act on the world immediately; emits and the
//! events they cause are queued on the invocation's cascade one level
//! deeper than the invocation itself.

use super::{Cascade, Delivery, Dispatcher};
use crate::challenge;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use wisp_script::{HostApi, HostError, HostResult, LogLevel, Neighbourhood, ObjectView, Trigger};
use wisp_types::{
    events, Challenge, Description, Exit, MovementConfig, Object, ObjectId, Skill, SkillConfig,
    TimerId,
};

/// Pending edits to the invoked object.
#[derive(Debug, Default)]
pub(crate) struct Drafts {
    descriptions: Option<Vec<Description>>,
    exits: Option<Vec<Exit>>,
    movement: Option<MovementConfig>,
    skills: Option<BTreeMap<String, Skill>>,
    learning: Option<bool>,
    source_path: Option<String>,
}

impl Drafts {
    pub fn apply(self, object: &mut Object) {
        if let Some(descriptions) = self.descriptions {
            object.descriptions = descriptions;
        }
        if let Some(exits) = self.exits {
            object.exits = exits;
        }
        if let Some(movement) = self.movement {
            object.movement = movement;
        }
        if let Some(skills) = self.skills {
            object.skills = skills;
        }
        if let Some(learning) = self.learning {
            object.learning = learning;
        }
        if let Some(source_path) = self.source_path {
            object.source_path = source_path;
        }
    }
}

pub(crate) struct InvocationHost {
    dispatcher: Dispatcher,
    /// The object as it was when the invocation started.
    object: Object,
    depth: usize,
    cascade: Arc<Cascade>,
    drafts: Mutex<Drafts>,
    /// Observer still owed one `movementRendered` narration.
    narrating_for: Mutex<Option<ObjectId>>,
}

impl InvocationHost {
    pub fn new(dispatcher: Dispatcher, object: Object, depth: usize, cascade: Arc<Cascade>) -> Self {
        Self {
            dispatcher,
            object,
            depth,
            cascade,
            drafts: Mutex::new(Drafts::default()),
            narrating_for: Mutex::new(None),
        }
    }

    pub fn narrating_for(self, observer: Option<ObjectId>) -> Self {
        *self.narrating_for.lock() = observer;
        self
    }

    pub fn take_drafts(&self) -> Drafts {
        std::mem::take(&mut *self.drafts.lock())
    }

    fn id_ref(&self) -> &ObjectId {
        &self.object.id
    }

    /// The invoked object as it is now, for structural reads.
    fn current(&self) -> HostResult<Object> {
        Ok(self.dispatcher.inner.store.get(self.id_ref())?)
    }

    fn get(&self, id: &ObjectId) -> HostResult<Object> {
        Ok(self.dispatcher.inner.store.get(id)?)
    }

    fn queue_gated(&self, recipient: &Object, event: &str, payload: &Value, challenges: &[Challenge]) {
        if !challenge::passes_all(recipient, challenges) {
            debug!(
                sender = %self.id_ref(),
                recipient = %recipient.id,
                event,
                "emit dropped by challenge"
            );
            return;
        }
        let trigger = Trigger::emit(event, payload.clone());
        if event == events::MOVEMENT_RENDERED && self.claim_narration(&recipient.id) {
            // Narration belongs to the movement, not to a further emit.
            self.cascade
                .push(Delivery::new(recipient.id.clone(), trigger, self.depth).as_narration());
            return;
        }
        self.cascade
            .push(Delivery::new(recipient.id.clone(), trigger, self.depth + 1));
    }

    fn claim_narration(&self, recipient: &ObjectId) -> bool {
        let mut owed = self.narrating_for.lock();
        if owed.as_ref() == Some(recipient) {
            *owed = None;
            true
        } else {
            false
        }
    }

    fn require_event(event: &str) -> HostResult<()> {
        if event.trim().is_empty() {
            Err(HostError::Validation("event name must not be empty".into()))
        } else {
            Ok(())
        }
    }

    fn visible_view(&self, id: &ObjectId, viewer: &Object) -> Option<ObjectView> {
        let object = self.dispatcher.inner.store.get(id).ok()?;
        challenge::view(&object, viewer)
    }
}

impl HostApi for InvocationHost {
    fn id(&self) -> ObjectId {
        self.object.id.clone()
    }

    fn set_descriptions(&self, descriptions: Vec<Description>) -> HostResult<()> {
        self.drafts.lock().descriptions = Some(descriptions);
        Ok(())
    }

    fn set_exits(&self, exits: Vec<Exit>) -> HostResult<()> {
        if let Some(exit) = exits.iter().find(|e| e.name().is_none()) {
            return Err(HostError::Validation(format!(
                "exit to {} needs a description",
                exit.destination
            )));
        }
        self.drafts.lock().exits = Some(exits);
        Ok(())
    }

    fn set_movement(&self, movement: MovementConfig) -> HostResult<()> {
        self.drafts.lock().movement = Some(movement);
        Ok(())
    }

    fn set_skills(&self, skills: BTreeMap<String, Skill>) -> HostResult<()> {
        self.drafts.lock().skills = Some(skills);
        Ok(())
    }

    fn emit(
        &self,
        target: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()> {
        Self::require_event(event)?;
        let recipient = self.get(target)?;
        self.queue_gated(&recipient, event, &payload, &challenges);
        Ok(())
    }

    fn emit_to_location(
        &self,
        location: &ObjectId,
        event: &str,
        payload: Value,
        challenges: Vec<Challenge>,
    ) -> HostResult<()> {
        Self::require_event(event)?;
        let place = self.get(location)?;
        for id in &place.content {
            match self.dispatcher.inner.store.get(id) {
                Ok(recipient) => self.queue_gated(&recipient, event, &payload, &challenges),
                Err(_) => debug!(object = %id, "skipping vanished recipient"),
            }
        }
        Ok(())
    }

    fn location(&self) -> HostResult<Option<ObjectId>> {
        Ok(self.current()?.location)
    }

    fn move_object(&self, id: &ObjectId, destination: &ObjectId) -> HostResult<()> {
        self.dispatcher
            .move_within(id, destination, None, &self.cascade, self.depth + 1)?;
        Ok(())
    }

    fn content(&self) -> HostResult<Vec<ObjectId>> {
        Ok(self.current()?.content.into_iter().collect())
    }

    fn neighbourhood(&self) -> HostResult<Neighbourhood> {
        let viewer = self.current()?;
        let Some(location_id) = viewer.location.clone() else {
            return Ok(Neighbourhood::default());
        };
        let location = self.get(&location_id)?;

        let content = location
            .content
            .iter()
            .filter(|id| **id != viewer.id)
            .filter_map(|id| self.visible_view(id, &viewer))
            .collect();

        let neighbours = location
            .exits
            .iter()
            .filter(|exit| challenge::visible_description(&exit.descriptions, &viewer).is_some())
            .filter_map(|exit| {
                let name = exit.name()?.to_string();
                let view = self.visible_view(&exit.destination, &viewer)?;
                Some((name, view))
            })
            .collect();

        Ok(Neighbourhood {
            location: challenge::view(&location, &viewer),
            content,
            neighbours,
        })
    }

    fn create_object(&self, source_path: &str, location: &ObjectId) -> HostResult<ObjectId> {
        Ok(self.dispatcher.create_within(
            self.id_ref(),
            source_path,
            location,
            &self.cascade,
            self.depth + 1,
        )?)
    }

    fn remove_object(&self, id: &ObjectId) -> HostResult<()> {
        let actor_location = self.current()?.location;
        self.dispatcher
            .remove_object(id, actor_location.as_ref())
            .map(|_| ())
            .map_err(HostError::from)
    }

    fn source_path(&self) -> String {
        self.drafts
            .lock()
            .source_path
            .clone()
            .unwrap_or_else(|| self.object.source_path.clone())
    }

    fn set_source_path(&self, path: &str) -> HostResult<()> {
        let normalized = wisp_source::path::normalize(path)
            .map_err(|e| HostError::Validation(e.to_string()))?;
        self.drafts.lock().source_path = Some(normalized);
        Ok(())
    }

    fn learning(&self) -> bool {
        self.drafts.lock().learning.unwrap_or(self.object.learning)
    }

    fn set_learning(&self, learning: bool) {
        self.drafts.lock().learning = Some(learning);
    }

    fn skill_config(&self, name: &str) -> Option<SkillConfig> {
        self.dispatcher.inner.skill_configs.get(name)
    }

    fn cas_skill_config(&self, name: &str, expected: Option<SkillConfig>, new: SkillConfig) -> bool {
        self.dispatcher
            .inner
            .skill_configs
            .cas(name, expected.as_ref(), new)
    }

    fn set_timeout(&self, delay_ms: u64, event: &str, payload: Value) -> HostResult<TimerId> {
        Self::require_event(event)?;
        Ok(self.dispatcher.inner.timers.set_timeout(
            self.id_ref(),
            delay_ms,
            event,
            payload,
            self.dispatcher.now_ms(),
        ))
    }

    fn set_interval(&self, period_ms: u64, event: &str, payload: Value) -> HostResult<TimerId> {
        Self::require_event(event)?;
        Ok(self.dispatcher.inner.timers.set_interval(
            self.id_ref(),
            period_ms,
            event,
            payload,
            self.dispatcher.now_ms(),
        ))
    }

    fn clear_interval(&self, id: &TimerId) {
        if !self.dispatcher.inner.timers.clear_owned(self.id_ref(), id) {
            debug!(object = %self.id_ref(), timer = %id, "clearInterval on unknown timer");
        }
    }

    fn log(&self, level: LogLevel, message: &str) {
        let object = self.id_ref();
        match level {
            LogLevel::Debug => debug!(object = %object, "{message}"),
            LogLevel::Info => info!(object = %object, "{message}"),
            LogLevel::Warn => warn!(object = %object, "{message}"),
            LogLevel::Error => error!(object = %object, "{message}"),
        }
        let tag = match level {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        self.dispatcher
            .inner
            .outputs
            .debug(object, &format!("[{tag}] {message}"));
    }

    fn echo(&self, text: &str) {
        if !self.dispatcher.inner.outputs.print(self.id_ref(), text) {
            trace!(object = %self.id_ref(), "echo without a session");
        }
    }
}

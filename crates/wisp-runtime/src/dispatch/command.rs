//! Typed-command routing and the built-in verbs.
//!
//! The first claimant wins:
//!
//! 1. the actor's own callbacks (`command` or `action`)
//! 2. the actor's location (`action`)
//! 3. the other objects in that location, by id (`action`)
//! 4. built-in `look` / `l` and `scan`
//! 5. an exit of the location whose name matches the line or its verb
//!
//! Anything else is an unknown command. Scripts that fail while being
//! offered the command count as not claiming the command.

use super::movement::capitalize;
use super::{Cascade, Delivery, Dispatcher};
use crate::challenge;
use crate::RuntimeError;
use std::sync::Arc;
use tracing::debug;
use wisp_script::Trigger;
use wisp_types::{event, events, Exit, Object, ObjectId};

/// Printed when nothing claims a command.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// What became of a typed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The line was blank.
    Empty,
    /// A script claimed it.
    Handled { by: ObjectId },
    /// A built-in verb produced this text.
    Looked { text: String },
    /// The actor went through an exit.
    Moved { exit: String, destination: ObjectId },
    /// An exit challenge stopped the actor.
    Blocked { exit: String },
    Unknown,
}

impl Dispatcher {
    /// Runs one typed command for `actor`.
    ///
    /// Narration and built-in output go to the actor's session.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NotFound`] if `actor` does not exist, and
    /// structural errors from an exit move. Script failures are
    /// reported, not returned.
    pub fn command(&self, actor: &ObjectId, line: &str) -> Result<CommandOutcome, RuntimeError> {
        let line = line.trim();
        let Some(verb) = line.split_whitespace().next() else {
            return Ok(CommandOutcome::Empty);
        };
        let rest = line[verb.len()..].trim();
        self.inner.store.get(actor)?;

        let cascade = Cascade::new();
        let outcome = self.route(actor, verb, rest, line, &cascade);
        self.drain(&cascade);

        if let Ok(outcome) = &outcome {
            debug!(actor = %actor, verb, outcome = ?outcome, "command routed");
            if *outcome == CommandOutcome::Unknown {
                self.inner.outputs.print(actor, UNKNOWN_COMMAND);
            }
        }
        outcome
    }

    fn route(
        &self,
        actor: &ObjectId,
        verb: &str,
        rest: &str,
        line: &str,
        cascade: &Arc<Cascade>,
    ) -> Result<CommandOutcome, RuntimeError> {
        if self.offer(actor, Trigger::command(verb, line, true), cascade) {
            return Ok(CommandOutcome::Handled { by: actor.clone() });
        }

        let location = self.location_of(actor)?;
        if let Some(location) = &location {
            if self.offer(&location.id, Trigger::command(verb, line, false), cascade) {
                return Ok(CommandOutcome::Handled {
                    by: location.id.clone(),
                });
            }
            for sibling in location.content.iter().filter(|id| *id != actor) {
                if self.offer(sibling, Trigger::command(verb, line, false), cascade) {
                    return Ok(CommandOutcome::Handled {
                        by: sibling.clone(),
                    });
                }
            }
        }

        let builtin = match verb.to_ascii_lowercase().as_str() {
            "look" | "l" => Some(self.look(actor, Some(rest).filter(|r| !r.is_empty()))?),
            "scan" => Some(self.scan(actor)?),
            _ => None,
        };
        if let Some(text) = builtin {
            self.inner.outputs.print(actor, &text);
            return Ok(CommandOutcome::Looked { text });
        }

        // The location may have changed its exits in its own callback.
        let location = self.location_of(actor)?;
        if let Some(location) = location {
            if let Some(exit) = location
                .exit_named(line)
                .or_else(|| location.exit_named(verb))
                .cloned()
            {
                return self.traverse(actor, &location, exit, cascade);
            }
        }

        Ok(CommandOutcome::Unknown)
    }

    fn offer(&self, target: &ObjectId, trigger: Trigger, cascade: &Arc<Cascade>) -> bool {
        self.invoke(target, trigger, 0, cascade, None).unwrap_or(false)
    }

    fn location_of(&self, id: &ObjectId) -> Result<Option<Object>, RuntimeError> {
        match self.inner.store.get(id)?.location {
            Some(location) => Ok(self.inner.store.get(&location).ok()),
            None => Ok(None),
        }
    }

    fn traverse(
        &self,
        actor: &ObjectId,
        location: &Object,
        exit: Exit,
        cascade: &Arc<Cascade>,
    ) -> Result<CommandOutcome, RuntimeError> {
        let name = exit.name().unwrap_or_default().to_string();
        let subject = self.inner.store.get(actor)?;

        if let Some(failed) = challenge::first_failure(&subject, &exit.use_challenges) {
            debug!(actor = %actor, exit = %name, skill = %failed.skill, "exit blocked");
            cascade.push(Delivery::new(
                location.id.clone(),
                Trigger::emit(events::EXIT_FAILED, event::exit_failed_payload(&name, actor)),
                0,
            ));
            if let Some(message) = exit.message.as_deref().or(failed.message.as_deref()) {
                self.inner.outputs.print(actor, message);
            }
            return Ok(CommandOutcome::Blocked { exit: name });
        }

        self.move_within(actor, &exit.destination, Some(&name), cascade, 0)?;
        let text = self.look(actor, None)?;
        self.inner.outputs.print(actor, &text);
        Ok(CommandOutcome::Moved {
            exit: name,
            destination: exit.destination,
        })
    }

    /// What `viewer` sees when looking around, or at `target`.
    ///
    /// Objects whose description challenges the viewer fails are left
    /// out entirely.
    pub fn look(&self, viewer: &ObjectId, target: Option<&str>) -> Result<String, RuntimeError> {
        let viewer = self.inner.store.get(viewer)?;
        let Some(location) = self.location_of(&viewer.id)? else {
            return Ok("There is nothing around you.".to_string());
        };

        if let Some(target) = target {
            return Ok(self.look_at(&viewer, &location, target));
        }

        let mut lines = Vec::new();
        match challenge::view(&location, &viewer) {
            Some(view) => {
                lines.push(capitalize(&view.short));
                if !view.long.is_empty() {
                    lines.push(view.long);
                }
            }
            None => lines.push("You can't make out where you are.".to_string()),
        }

        let seen = self.visible_names(&location, &viewer);
        if !seen.is_empty() {
            lines.push(format!("You see {}.", seen.join(", ")));
        }

        let exits = visible_exits(&location, &viewer);
        if exits.is_empty() {
            lines.push("There are no obvious exits.".to_string());
        } else {
            let names: Vec<&str> = exits.iter().filter_map(|e| e.name()).collect();
            lines.push(format!("Exits: {}.", names.join(", ")));
        }
        Ok(lines.join("\n"))
    }

    fn look_at(&self, viewer: &Object, location: &Object, target: &str) -> String {
        let candidates = location
            .content
            .iter()
            .chain(viewer.content.iter())
            .filter(|id| **id != viewer.id)
            .filter_map(|id| self.inner.store.get(id).ok())
            .filter_map(|o| challenge::view(&o, viewer));

        for view in candidates {
            if view.id.as_str() == target || view.short.eq_ignore_ascii_case(target) {
                return if view.long.is_empty() {
                    capitalize(&view.short)
                } else {
                    view.long
                };
            }
        }

        if let Some(exit) = visible_exits(location, viewer)
            .into_iter()
            .find(|e| e.name().is_some_and(|n| n.eq_ignore_ascii_case(target)))
        {
            if let Some(view) = self
                .inner
                .store
                .get(&exit.destination)
                .ok()
                .and_then(|d| challenge::view(&d, viewer))
            {
                return format!("Through the {target} you see {}.", view.short);
            }
        }

        "You don't see that here.".to_string()
    }

    /// What `viewer` sees through each exit of its location.
    pub fn scan(&self, viewer: &ObjectId) -> Result<String, RuntimeError> {
        let viewer = self.inner.store.get(viewer)?;
        let Some(location) = self.location_of(&viewer.id)? else {
            return Ok("There is nowhere to scan.".to_string());
        };

        let mut lines = Vec::new();
        for exit in visible_exits(&location, &viewer) {
            let Some(name) = exit.name() else { continue };
            let Ok(destination) = self.inner.store.get(&exit.destination) else {
                continue;
            };
            let Some(view) = challenge::view(&destination, &viewer) else {
                continue;
            };
            let seen = self.visible_names(&destination, &viewer);
            if seen.is_empty() {
                lines.push(format!("{name}: {}", view.short));
            } else {
                lines.push(format!("{name}: {} ({})", view.short, seen.join(", ")));
            }
        }

        if lines.is_empty() {
            Ok("There is nowhere to scan.".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }

    /// Names of the objects in `place` that `viewer` can see, excluding
    /// the viewer, by id.
    fn visible_names(&self, place: &Object, viewer: &Object) -> Vec<String> {
        place
            .content
            .iter()
            .filter(|id| **id != viewer.id)
            .filter_map(|id| self.inner.store.get(id).ok())
            .filter_map(|o| challenge::view(&o, viewer))
            .map(|v| v.short)
            .collect()
    }
}

fn visible_exits<'a>(location: &'a Object, viewer: &Object) -> Vec<&'a Exit> {
    location
        .exits
        .iter()
        .filter(|e| challenge::visible_description(&e.descriptions, viewer).is_some())
        .collect()
}

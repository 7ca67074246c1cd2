//! Administrative commands.
//!
//! Wizards type these with a leading `/` at the console:
//!
//! | Command | Effect |
//! |---------|--------|
//! | `/create <path> [location]` | new object running `path`, here by default |
//! | `/move <id> <destination>` | structural move with narration |
//! | `/remove <id>` | remove an empty object |
//! | `/inspect [id]` | dump an object as JSON |
//! | `/enter <id>` | move yourself into `id` |
//! | `/exit` | move yourself out of your location |
//! | `/stats` | invocation counters, slow invocations, recent errors |
//! | `/intervals` | pending timers |
//! | `/debug [id]` / `/undebug [id]` | stream an object's logs and errors to you |
//! | `/skills [id]` | list skills |
//! | `/skills set <id> <skill> <practical> <theoretical>` | set a skill |
//! | `/grant <id>` / `/revoke <id>` | wizard rights |
//! | `/reload [path]` | drop cached sources |

use crate::output::OutputSink;
use crate::{Dispatcher, RuntimeError};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;
use wisp_types::{ObjectId, Skill};

/// A parsed administrative command.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    Create {
        source_path: String,
        location: Option<ObjectId>,
    },
    Move {
        id: ObjectId,
        destination: ObjectId,
    },
    Remove {
        id: ObjectId,
    },
    Inspect {
        id: Option<ObjectId>,
    },
    Enter {
        id: ObjectId,
    },
    Exit,
    Stats,
    Intervals,
    Debug {
        id: Option<ObjectId>,
    },
    Undebug {
        id: Option<ObjectId>,
    },
    Skills {
        id: Option<ObjectId>,
    },
    SetSkill {
        id: ObjectId,
        skill: String,
        value: Skill,
    },
    Grant {
        id: ObjectId,
    },
    Revoke {
        id: ObjectId,
    },
    Reload {
        path: Option<String>,
    },
}

impl AdminCommand {
    /// Parses a command line, with or without its leading `/`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Validation`] with a usage hint.
    pub fn parse(line: &str) -> Result<Self, RuntimeError> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let words: Vec<&str> = line.split_whitespace().collect();
        let id = |i: usize| words.get(i).map(|w| ObjectId::new(*w));
        let required = |i: usize, usage: &str| {
            id(i).ok_or_else(|| RuntimeError::validation(format!("usage: /{usage}")))
        };

        let Some(name) = words.first() else {
            return Err(RuntimeError::validation("empty admin command"));
        };
        let command = match name.to_ascii_lowercase().as_str() {
            "create" => Self::Create {
                source_path: required(1, "create <path> [location]")?.to_string(),
                location: id(2),
            },
            "move" => Self::Move {
                id: required(1, "move <id> <destination>")?,
                destination: required(2, "move <id> <destination>")?,
            },
            "remove" => Self::Remove {
                id: required(1, "remove <id>")?,
            },
            "inspect" => Self::Inspect { id: id(1) },
            "enter" => Self::Enter {
                id: required(1, "enter <id>")?,
            },
            "exit" => Self::Exit,
            "stats" => Self::Stats,
            "intervals" => Self::Intervals,
            "debug" => Self::Debug { id: id(1) },
            "undebug" => Self::Undebug { id: id(1) },
            "skills" if words.get(1) == Some(&"set") => {
                let usage = "skills set <id> <skill> <practical> <theoretical>";
                let number = |i: usize| -> Result<f64, RuntimeError> {
                    words
                        .get(i)
                        .and_then(|w| w.parse().ok())
                        .ok_or_else(|| RuntimeError::validation(format!("usage: /{usage}")))
                };
                Self::SetSkill {
                    id: required(2, usage)?,
                    skill: required(3, usage)?.to_string(),
                    value: Skill::new(number(4)?, number(5)?),
                }
            }
            "skills" => Self::Skills { id: id(1) },
            "grant" => Self::Grant {
                id: required(1, "grant <id>")?,
            },
            "revoke" => Self::Revoke {
                id: required(1, "revoke <id>")?,
            },
            "reload" => Self::Reload {
                path: words.get(1).map(|w| (*w).to_string()),
            },
            other => {
                return Err(RuntimeError::validation(format!(
                    "unknown admin command: {other}"
                )))
            }
        };
        Ok(command)
    }
}

/// Executes [`AdminCommand`]s on behalf of wizards.
#[derive(Debug, Clone)]
pub struct Admin {
    dispatcher: Dispatcher,
}

impl Admin {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Runs `command` as `actor` and returns the text to show them.
    ///
    /// `sink` receives debug output if the command attaches a listener.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::PermissionDenied`] unless `actor` is a wizard,
    /// otherwise whatever the underlying operation reports.
    pub fn execute(
        &self,
        actor: &ObjectId,
        command: &AdminCommand,
        sink: Arc<dyn OutputSink>,
    ) -> Result<String, RuntimeError> {
        if !self.dispatcher.is_wizard(actor) {
            return Err(RuntimeError::PermissionDenied(format!(
                "{actor} is not a wizard"
            )));
        }
        info!(actor = %actor, command = ?command, "admin command");
        let d = &self.dispatcher;

        match command {
            AdminCommand::Create {
                source_path,
                location,
            } => {
                let location = match location {
                    Some(location) => location.clone(),
                    None => self.here(actor)?,
                };
                let id = d.create_object(actor, source_path, &location)?;
                Ok(format!("Created {id} in {location}."))
            }
            AdminCommand::Move { id, destination } => {
                d.move_object(id, destination)?;
                Ok(format!("Moved {id} to {destination}."))
            }
            AdminCommand::Remove { id } => {
                let here = d.object(actor)?.location;
                d.remove_object(id, here.as_ref())?;
                Ok(format!("Removed {id}."))
            }
            AdminCommand::Inspect { id } => {
                let id = self.target(actor, id.as_ref())?;
                let object = d.object(&id)?;
                serde_json::to_string_pretty(&object)
                    .map_err(|e| RuntimeError::validation(e.to_string()))
            }
            AdminCommand::Enter { id } => {
                d.move_object(actor, id)?;
                d.look(actor, None)
            }
            AdminCommand::Exit => {
                let here = self.here(actor)?;
                let outside = d
                    .object(&here)?
                    .location
                    .ok_or(RuntimeError::LeaveUniverse)?;
                d.move_object(actor, &outside)?;
                d.look(actor, None)
            }
            AdminCommand::Stats => Ok(self.stats_text()),
            AdminCommand::Intervals => Ok(self.intervals_text()),
            AdminCommand::Debug { id } => {
                let id = self.target(actor, id.as_ref())?;
                d.attach_debug(&id, actor, sink)?;
                Ok(format!("Debugging {id}."))
            }
            AdminCommand::Undebug { id } => {
                let id = self.target(actor, id.as_ref())?;
                if d.detach_debug(&id, actor) {
                    Ok(format!("Stopped debugging {id}."))
                } else {
                    Ok(format!("You were not debugging {id}."))
                }
            }
            AdminCommand::Skills { id } => {
                let id = id.clone().unwrap_or_else(|| actor.clone());
                let object = d.object(&id)?;
                if object.skills.is_empty() {
                    return Ok(format!("{id} has no skills."));
                }
                let mut out = String::new();
                for (name, skill) in &object.skills {
                    let _ = writeln!(
                        out,
                        "{name}: practical {} theoretical {}",
                        skill.practical, skill.theoretical
                    );
                }
                Ok(out.trim_end().to_string())
            }
            AdminCommand::SetSkill { id, skill, value } => {
                let value = *value;
                d.store().update(id, &mut |object| {
                    object.skills.insert(skill.clone(), value);
                })?;
                Ok(format!("Set {skill} of {id}."))
            }
            AdminCommand::Grant { id } => {
                d.grant_wizard(id)?;
                Ok(format!("{id} is now a wizard."))
            }
            AdminCommand::Revoke { id } => {
                if id == actor {
                    return Err(RuntimeError::validation("cannot revoke your own wizard rights"));
                }
                d.revoke_wizard(id);
                Ok(format!("{id} is no longer a wizard."))
            }
            AdminCommand::Reload { path } => match path {
                Some(path) => {
                    let dropped = d.invalidate_source(path);
                    let users = d.store().by_source_path(path).len();
                    Ok(format!(
                        "Dropped {dropped} cached sources; {users} objects run {path}."
                    ))
                }
                None => {
                    d.invalidate_all_sources();
                    Ok("Dropped all cached sources.".to_string())
                }
            },
        }
    }

    fn here(&self, actor: &ObjectId) -> Result<ObjectId, RuntimeError> {
        self.dispatcher
            .object(actor)?
            .location
            .ok_or(RuntimeError::LeaveUniverse)
    }

    /// `id`, or the actor's location when omitted.
    fn target(&self, actor: &ObjectId, id: Option<&ObjectId>) -> Result<ObjectId, RuntimeError> {
        match id {
            Some(id) => Ok(id.clone()),
            None => self.here(actor),
        }
    }

    fn stats_text(&self) -> String {
        let stats = self.dispatcher.stats().snapshot();
        let mut out = format!(
            "invocations: {}  errors: {}  dropped emits: {}",
            stats.invocations, stats.errors, stats.dropped_emits
        );
        if !stats.slow.is_empty() {
            out.push_str("\nslow:");
            for r in stats.slow.iter().rev() {
                let _ = write!(out, "\n  {} {} {}ms", r.object, r.event, r.elapsed_ms);
            }
        }
        if !stats.recent_errors.is_empty() {
            out.push_str("\nerrors:");
            for r in stats.recent_errors.iter().rev() {
                let _ = write!(out, "\n  {} {}: {}", r.object, r.event, r.message);
            }
        }
        out
    }

    fn intervals_text(&self) -> String {
        let timers = self.dispatcher.timers();
        let rows = timers.list(self.dispatcher.now_ms());
        if rows.is_empty() {
            return "No pending timers.".to_string();
        }
        let mut out = String::new();
        for row in rows {
            let _ = write!(
                out,
                "{} {} {} in {}ms",
                row.id, row.owner, row.event, row.remaining_ms
            );
            if let Some(period) = row.period_ms {
                let _ = write!(out, " every {period}ms");
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_and_without_slash() {
        assert_eq!(
            AdminCommand::parse("/move gem tavern").unwrap(),
            AdminCommand::Move {
                id: "gem".into(),
                destination: "tavern".into()
            }
        );
        assert_eq!(AdminCommand::parse("stats").unwrap(), AdminCommand::Stats);
        assert_eq!(
            AdminCommand::parse("/inspect").unwrap(),
            AdminCommand::Inspect { id: None }
        );
    }

    #[test]
    fn parse_create_optional_location() {
        assert_eq!(
            AdminCommand::parse("/create /orc.lua").unwrap(),
            AdminCommand::Create {
                source_path: "/orc.lua".into(),
                location: None
            }
        );
        assert_eq!(
            AdminCommand::parse("/create /orc.lua cave").unwrap(),
            AdminCommand::Create {
                source_path: "/orc.lua".into(),
                location: Some("cave".into())
            }
        );
    }

    #[test]
    fn parse_skills_set() {
        assert_eq!(
            AdminCommand::parse("/skills set alice perception 200 5").unwrap(),
            AdminCommand::SetSkill {
                id: "alice".into(),
                skill: "perception".into(),
                value: Skill::new(200.0, 5.0)
            }
        );
        assert_eq!(
            AdminCommand::parse("/skills alice").unwrap(),
            AdminCommand::Skills {
                id: Some("alice".into())
            }
        );
        assert!(AdminCommand::parse("/skills set alice perception lots 5").is_err());
    }

    #[test]
    fn parse_errors_carry_usage() {
        let err = AdminCommand::parse("/move gem").unwrap_err();
        assert!(err.to_string().contains("usage: /move"));
        assert!(AdminCommand::parse("/frobnicate").is_err());
        assert!(AdminCommand::parse("/").is_err());
    }
}

//! The object model.
//!
//! ```text
//! genesis (root, location = None)
//! ├── tavern
//! │   ├── alice      (avatar)
//! │   └── mug        (item)
//! └── street
//! ```
//!
//! Every entity is an [`Object`]. Containment is a forest rooted at
//! [`ROOT_ID`](crate::ROOT_ID): `location` names the parent and `content`
//! lists the children. Both sides are kept consistent by the containment
//! manager in `wisp-runtime`; nothing else writes them.
//!
//! Serialized field names are PascalCase, matching what scripts see.

use crate::event::Tag;
use crate::id::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A skill gate: the subject passes iff its practical value for
/// `skill` is at least `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Challenge {
    pub skill: String,
    pub level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Challenge {
    #[must_use]
    pub fn new(skill: impl Into<String>, level: f64) -> Self {
        Self {
            skill: skill.into(),
            level,
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// One way of describing an object. Viewers see the first description
/// whose challenges they pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Description {
    pub short: String,
    pub long: String,
    pub unique: bool,
    pub challenges: Vec<Challenge>,
}

impl Description {
    #[must_use]
    pub fn new(short: impl Into<String>) -> Self {
        Self {
            short: short.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    #[must_use]
    pub fn with_challenge(mut self, challenge: Challenge) -> Self {
        self.challenges.push(challenge);
        self
    }
}

/// A way out of a location.
///
/// The first description's `short` is the exit's name, which is also the
/// word a player types to use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Exit {
    #[serde(default)]
    pub descriptions: Vec<Description>,
    pub destination: ObjectId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_challenges: Vec<Challenge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Exit {
    #[must_use]
    pub fn new(name: impl Into<String>, destination: impl Into<ObjectId>) -> Self {
        Self {
            descriptions: vec![Description::new(name)],
            destination: destination.into(),
            use_challenges: Vec::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_use_challenge(mut self, challenge: Challenge) -> Self {
        self.use_challenges.push(challenge);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The exit's name, if it has any description.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.descriptions.first().map(|d| d.short.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Skill {
    pub practical: f64,
    pub theoretical: f64,
}

impl Skill {
    #[must_use]
    pub fn new(practical: f64, theoretical: f64) -> Self {
        Self {
            practical,
            theoretical,
        }
    }
}

/// Shared, named configuration for a skill.
///
/// Only ever replaced through compare-and-swap, so equality is the
/// comparison the swap uses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SkillConfig {
    /// Seconds until an unused skill starts to decay.
    pub forget: f64,
    /// Seconds before the skill recovers after use.
    pub recharge: f64,
    /// Seconds an effect lasts.
    pub duration: f64,
}

/// How movement of this object is narrated to observers.
///
/// When `active` is false the runtime narrates with `verb`; when true
/// the object's own `renderMovement` callback produces the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MovementConfig {
    pub active: bool,
    pub verb: String,
}

impl MovementConfig {
    pub const DEFAULT_VERB: &'static str = "moves";

    /// The configured verb, or [`Self::DEFAULT_VERB`] when blank.
    #[must_use]
    pub fn verb(&self) -> &str {
        if self.verb.trim().is_empty() {
            Self::DEFAULT_VERB
        } else {
            &self.verb
        }
    }
}

/// A persistent game entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Object {
    pub id: ObjectId,
    /// Parent object. `None` only for the universe root.
    pub location: Option<ObjectId>,
    #[serde(default)]
    pub content: BTreeSet<ObjectId>,
    #[serde(default)]
    pub source_path: String,
    /// Script-owned JSON text. Stored verbatim.
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub descriptions: Vec<Description>,
    #[serde(default)]
    pub exits: Vec<Exit>,
    #[serde(default)]
    pub skills: BTreeMap<String, Skill>,
    #[serde(default)]
    pub movement: MovementConfig,
    #[serde(default)]
    pub learning: bool,
    /// Event names and tags registered by the last successful run.
    /// Never code; rebuilt on every invocation.
    #[serde(default)]
    pub callbacks: BTreeMap<String, BTreeSet<Tag>>,
}

impl Object {
    #[must_use]
    pub fn new(id: impl Into<ObjectId>, location: Option<ObjectId>, source_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location,
            content: BTreeSet::new(),
            source_path: source_path.into(),
            state: String::new(),
            descriptions: Vec::new(),
            exits: Vec::new(),
            skills: BTreeMap::new(),
            movement: MovementConfig::default(),
            learning: false,
            callbacks: BTreeMap::new(),
        }
    }

    /// A fresh universe root with no script.
    #[must_use]
    pub fn root() -> Self {
        Self::new(ObjectId::root(), None, "")
    }

    #[must_use]
    pub fn with_descriptions(mut self, descriptions: Vec<Description>) -> Self {
        self.descriptions = descriptions;
        self
    }

    #[must_use]
    pub fn with_skill(mut self, name: impl Into<String>, skill: Skill) -> Self {
        self.skills.insert(name.into(), skill);
        self
    }

    #[must_use]
    pub fn with_exit(mut self, exit: Exit) -> Self {
        self.exits.push(exit);
        self
    }

    /// Practical value of a skill, `0.0` when the object lacks it.
    #[must_use]
    pub fn practical(&self, skill: &str) -> f64 {
        self.skills.get(skill).map_or(0.0, |s| s.practical)
    }

    /// Looks up an exit by name, ignoring ASCII case.
    #[must_use]
    pub fn exit_named(&self, name: &str) -> Option<&Exit> {
        self.exits
            .iter()
            .find(|e| e.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// True if the last recorded registration has `event` with any of `tags`.
    #[must_use]
    pub fn has_callback(&self, event: &str, tags: &[Tag]) -> bool {
        self.callbacks
            .get(event)
            .is_some_and(|set| tags.iter().any(|t| set.contains(t)))
    }
}

//! World persistence.
//!
//! A [`WorldSnapshot`] is the whole durable world as JSON: objects,
//! pending timers with their wall-clock deadlines, skill configs and the
//! wizard list. Content sets are not trusted on load; they are rebuilt
//! from each object's `Location`.

use crate::{Dispatcher, RuntimeError, TimerEntry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};
use wisp_types::{Object, ObjectId, SkillConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub version: u32,
    /// Unix milliseconds.
    pub saved_at: u64,
    pub objects: Vec<Object>,
    #[serde(default)]
    pub timers: Vec<TimerEntry>,
    #[serde(default)]
    pub skill_configs: BTreeMap<String, SkillConfig>,
    #[serde(default)]
    pub wizards: BTreeSet<ObjectId>,
}

impl WorldSnapshot {
    pub const VERSION: u32 = 1;

    /// Writes the snapshot atomically: to a sibling temp file, then
    /// renamed over `path`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Persistence`] on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), RuntimeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RuntimeError::persistence(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RuntimeError::Snapshot(e.to_string()))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        std::fs::write(&tmp, json).map_err(|e| RuntimeError::persistence(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| RuntimeError::persistence(path, e))?;

        debug!(path = %path.display(), objects = self.objects.len(), "saved snapshot");
        Ok(())
    }

    /// Reads a snapshot, or `None` if `path` does not exist.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Persistence`] on I/O failure and
    /// [`RuntimeError::Snapshot`] for malformed content.
    pub fn load(path: &Path) -> Result<Option<Self>, RuntimeError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RuntimeError::persistence(path, e)),
        };
        let snapshot: Self =
            serde_json::from_str(&text).map_err(|e| RuntimeError::Snapshot(e.to_string()))?;
        if snapshot.version != Self::VERSION {
            return Err(RuntimeError::Snapshot(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot))
    }

    /// Checks the object graph and returns the objects with content
    /// rebuilt from locations.
    fn validated_objects(&self) -> Result<Vec<Object>, RuntimeError> {
        let mut by_id: HashMap<&ObjectId, &Object> = HashMap::new();
        for object in &self.objects {
            if by_id.insert(&object.id, object).is_some() {
                return Err(RuntimeError::Snapshot(format!("duplicate object {}", object.id)));
            }
        }

        let root = ObjectId::root();
        match by_id.get(&root) {
            Some(object) if object.location.is_none() => {}
            Some(_) => return Err(RuntimeError::Snapshot("root has a location".into())),
            None => return Err(RuntimeError::Snapshot("root object missing".into())),
        }

        for object in &self.objects {
            if object.id.is_root() {
                continue;
            }
            let mut steps = 0;
            let mut current = object.location.as_ref();
            loop {
                let Some(parent) = current else {
                    return Err(RuntimeError::Snapshot(format!(
                        "object {} is outside the universe",
                        object.id
                    )));
                };
                if parent.is_root() {
                    break;
                }
                steps += 1;
                if steps > self.objects.len() {
                    return Err(RuntimeError::Snapshot(format!(
                        "containment cycle through {}",
                        object.id
                    )));
                }
                current = by_id
                    .get(parent)
                    .ok_or_else(|| {
                        RuntimeError::Snapshot(format!(
                            "object {} is inside missing {parent}",
                            object.id
                        ))
                    })?
                    .location
                    .as_ref();
            }
        }

        let mut content: HashMap<ObjectId, BTreeSet<ObjectId>> = HashMap::new();
        for object in &self.objects {
            if let Some(parent) = &object.location {
                content
                    .entry(parent.clone())
                    .or_default()
                    .insert(object.id.clone());
            }
        }
        Ok(self
            .objects
            .iter()
            .cloned()
            .map(|mut o| {
                o.content = content.remove(&o.id).unwrap_or_default();
                o
            })
            .collect())
    }
}

impl Dispatcher {
    /// Copies the durable world.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            version: WorldSnapshot::VERSION,
            saved_at: self.now_ms(),
            objects: self.inner.containment.copy_all(),
            timers: self.inner.timers.entries(),
            skill_configs: self.inner.skill_configs.all(),
            wizards: self.wizards(),
        }
    }

    /// Loads `snapshot` into a freshly built dispatcher.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Snapshot`] if the world already holds more than
    /// the bare root, or if the snapshot's graph is not a forest rooted
    /// at the universe.
    pub fn restore(&self, snapshot: WorldSnapshot) -> Result<(), RuntimeError> {
        let store = &self.inner.store;
        let bare = store.len() == 1
            && store
                .get(&ObjectId::root())
                .is_ok_and(|root| root.content.is_empty());
        if !bare {
            return Err(RuntimeError::Snapshot(
                "can only restore into an empty world".into(),
            ));
        }

        let objects = snapshot.validated_objects()?;
        let count = objects.len();
        store.remove(&ObjectId::root());
        for object in objects {
            store.insert(object)?;
        }
        self.inner.timers.restore(snapshot.timers);
        self.inner.skill_configs.restore(snapshot.skill_configs);
        *self.inner.wizards.write() = snapshot
            .wizards
            .into_iter()
            .filter(|id| store.contains(id))
            .collect();

        info!(objects = count, timers = self.inner.timers.len(), "restored world");
        Ok(())
    }

    /// Saves the world to `path`.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), RuntimeError> {
        self.snapshot().save(path)
    }
}

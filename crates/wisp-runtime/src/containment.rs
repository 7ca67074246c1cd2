//! The containment graph.
//!
//! ```text
//! move_object(alice, street)
//!
//!   tavern { alice, mug }          tavern { mug }
//!   street { }             ──▶     street { alice }
//!   alice.location = tavern        alice.location = street
//! ```
//!
//! All structural edits (move, create, remove) run under one topology
//! mutex, so the ancestor walk that rejects cycles cannot race another
//! move. Within an edit, the touched objects are locked in ascending id
//! order. Content sets and the `location` field are only ever written
//! here, always together.

use crate::store::{ObjectHandle, ObjectStore};
use crate::RuntimeError;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;
use wisp_types::{Object, ObjectId};

/// A completed move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub object: ObjectId,
    pub source: ObjectId,
    pub destination: ObjectId,
}

impl MoveRecord {
    /// False for a move into the current location.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.source != self.destination
    }
}

/// Validates and performs structural changes.
pub struct Containment {
    store: Arc<dyn ObjectStore>,
    topology: Mutex<()>,
}

impl std::fmt::Debug for Containment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Containment")
            .field("objects", &self.store.len())
            .finish()
    }
}

impl Containment {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            topology: Mutex::new(()),
        }
    }

    /// Creates the universe root if it does not exist yet.
    pub fn ensure_root(&self) -> Result<(), RuntimeError> {
        let _topology = self.topology.lock();
        if !self.store.contains(&ObjectId::root()) {
            self.store.insert(Object::root())?;
            debug!("created universe root");
        }
        Ok(())
    }

    /// Moves `id` into `destination`.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::ContainmentCycle`] if `destination` is `id` or
    ///   lies anywhere inside it
    /// - [`RuntimeError::LeaveUniverse`] when moving the root
    /// - [`RuntimeError::NotFound`] for unknown ids
    pub fn move_object(
        &self,
        id: &ObjectId,
        destination: &ObjectId,
    ) -> Result<MoveRecord, RuntimeError> {
        let _topology = self.topology.lock();

        if destination == id {
            return Err(RuntimeError::ContainmentCycle {
                id: id.clone(),
                destination: destination.clone(),
            });
        }
        let source = self
            .store
            .get(id)?
            .location
            .ok_or(RuntimeError::LeaveUniverse)?;
        if !self.store.contains(destination) {
            return Err(RuntimeError::NotFound(destination.clone()));
        }
        if self.ancestors_locked(destination)?.contains(id) {
            return Err(RuntimeError::ContainmentCycle {
                id: id.clone(),
                destination: destination.clone(),
            });
        }

        let record = MoveRecord {
            object: id.clone(),
            source: source.clone(),
            destination: destination.clone(),
        };
        if !record.changed() {
            return Ok(record);
        }

        let handles = self.handles(&[id, &source, destination])?;
        let mut locked = Locked::new(&handles);
        locked.get_mut(&source)?.content.remove(id);
        locked.get_mut(destination)?.content.insert(id.clone());
        locked.get_mut(id)?.location = Some(destination.clone());

        debug!(object = %id, source = %source, destination = %destination, "moved object");
        Ok(record)
    }

    /// Creates a new object running `source_path` inside `location`.
    pub fn create_object(
        &self,
        source_path: &str,
        location: &ObjectId,
    ) -> Result<ObjectId, RuntimeError> {
        if source_path.trim().is_empty() {
            return Err(RuntimeError::validation("source path must not be empty"));
        }
        let object = Object::new(ObjectId::generate(), Some(location.clone()), source_path);
        let id = object.id.clone();
        self.insert_object(object)?;
        Ok(id)
    }

    /// Inserts a fully built object under its `location`.
    ///
    /// The object's own `content` must be empty; children are added by
    /// inserting them afterwards.
    pub fn insert_object(&self, mut object: Object) -> Result<(), RuntimeError> {
        let _topology = self.topology.lock();
        let location = object
            .location
            .clone()
            .ok_or_else(|| RuntimeError::validation("only the root may lack a location"))?;
        let parent = self
            .store
            .handle(&location)
            .ok_or_else(|| RuntimeError::NotFound(location.clone()))?;
        object.content.clear();
        let id = object.id.clone();
        self.store.insert(object)?;
        parent.lock().content.insert(id.clone());
        debug!(object = %id, location = %location, "created object");
        Ok(())
    }

    /// Removes `id` from the world.
    ///
    /// `actor_location` is the current location of whoever asked; that
    /// location may not be removed.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::RemoveRoot`], [`RuntimeError::RemoveCurrentLocation`]
    /// or [`RuntimeError::NotEmpty`].
    pub fn remove_object(
        &self,
        id: &ObjectId,
        actor_location: Option<&ObjectId>,
    ) -> Result<Object, RuntimeError> {
        let _topology = self.topology.lock();
        if id.is_root() {
            return Err(RuntimeError::RemoveRoot);
        }
        if actor_location == Some(id) {
            return Err(RuntimeError::RemoveCurrentLocation);
        }
        let object = self.store.get(id)?;
        if !object.content.is_empty() {
            return Err(RuntimeError::NotEmpty(id.clone()));
        }
        if let Some(parent) = object.location.as_ref().and_then(|p| self.store.handle(p)) {
            parent.lock().content.remove(id);
        }
        let removed = self
            .store
            .remove(id)
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))?;
        debug!(object = %id, "removed object");
        Ok(removed)
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    /// Copies every object while no structural edit is in flight, so the
    /// copies' locations and contents describe one forest.
    #[must_use]
    pub fn copy_all(&self) -> Vec<Object> {
        let _topology = self.topology.lock();
        self.store
            .ids()
            .iter()
            .filter_map(|id| self.store.get(id).ok())
            .collect()
    }

    pub fn ancestors(&self, id: &ObjectId) -> Result<Vec<ObjectId>, RuntimeError> {
        let _topology = self.topology.lock();
        self.ancestors_locked(id)
    }

    fn ancestors_locked(&self, id: &ObjectId) -> Result<Vec<ObjectId>, RuntimeError> {
        let limit = self.store.len();
        let mut chain = Vec::new();
        let mut current = self.store.get(id)?.location;
        while let Some(parent) = current {
            if chain.len() > limit {
                return Err(RuntimeError::Snapshot(format!(
                    "location chain of {id} does not terminate"
                )));
            }
            current = self.store.get(&parent)?.location;
            chain.push(parent);
        }
        Ok(chain)
    }

    /// Handles for `ids`, deduplicated and sorted ascending.
    fn handles(&self, ids: &[&ObjectId]) -> Result<Vec<(ObjectId, ObjectHandle)>, RuntimeError> {
        let mut ids: Vec<ObjectId> = ids.iter().map(|id| (*id).clone()).collect();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .map(|id| {
                let handle = self
                    .store
                    .handle(&id)
                    .ok_or_else(|| RuntimeError::NotFound(id.clone()))?;
                Ok((id, handle))
            })
            .collect()
    }
}

/// Guards over a sorted handle list, acquired in order.
struct Locked<'a> {
    guards: Vec<(&'a ObjectId, MutexGuard<'a, Object>)>,
}

impl<'a> Locked<'a> {
    fn new(handles: &'a [(ObjectId, ObjectHandle)]) -> Self {
        Self {
            guards: handles.iter().map(|(id, h)| (id, h.lock())).collect(),
        }
    }

    fn get_mut(&mut self, id: &ObjectId) -> Result<&mut Object, RuntimeError> {
        self.guards
            .iter_mut()
            .find(|(gid, _)| *gid == id)
            .map(|(_, guard)| &mut **guard)
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))
    }
}

//! Object storage.
//!
//! Each object lives behind its own mutex; the map of handles has a
//! separate read-write lock that is only held long enough to clone a
//! handle. Structural edits (location/content) are made exclusively by
//! [`Containment`](crate::Containment), which locks handles in ascending
//! id order.

use crate::RuntimeError;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use wisp_types::{Object, ObjectId};

/// Shared, individually locked object.
pub type ObjectHandle = Arc<Mutex<Object>>;

/// Access to persistent objects.
pub trait ObjectStore: Send + Sync {
    fn handle(&self, id: &ObjectId) -> Option<ObjectHandle>;

    /// Adds a new object.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::AlreadyExists`] if the id is taken.
    fn insert(&self, object: Object) -> Result<(), RuntimeError>;

    fn remove(&self, id: &ObjectId) -> Option<Object>;

    /// All ids, sorted.
    fn ids(&self) -> Vec<ObjectId>;

    /// Ids of objects running `path`, sorted.
    fn by_source_path(&self, path: &str) -> Vec<ObjectId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &ObjectId) -> bool {
        self.handle(id).is_some()
    }

    /// A copy of the object.
    fn get(&self, id: &ObjectId) -> Result<Object, RuntimeError> {
        self.handle(id)
            .map(|h| h.lock().clone())
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))
    }

    /// Runs `f` with the object locked.
    fn update(&self, id: &ObjectId, f: &mut dyn FnMut(&mut Object)) -> Result<(), RuntimeError> {
        let handle = self
            .handle(id)
            .ok_or_else(|| RuntimeError::NotFound(id.clone()))?;
        let mut guard = handle.lock();
        f(&mut guard);
        Ok(())
    }
}

/// In-process [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectId, ObjectHandle>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn handle(&self, id: &ObjectId) -> Option<ObjectHandle> {
        self.objects.read().get(id).cloned()
    }

    fn insert(&self, object: Object) -> Result<(), RuntimeError> {
        let mut objects = self.objects.write();
        if objects.contains_key(&object.id) {
            return Err(RuntimeError::AlreadyExists(object.id));
        }
        objects.insert(object.id.clone(), Arc::new(Mutex::new(object)));
        Ok(())
    }

    fn remove(&self, id: &ObjectId) -> Option<Object> {
        let handle = self.objects.write().remove(id)?;
        let object = handle.lock().clone();
        Some(object)
    }

    fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn by_source_path(&self, path: &str) -> Vec<ObjectId> {
        let handles: Vec<(ObjectId, ObjectHandle)> = self
            .objects
            .read()
            .iter()
            .map(|(id, h)| (id.clone(), Arc::clone(h)))
            .collect();
        let mut ids: Vec<ObjectId> = handles
            .into_iter()
            .filter(|(_, h)| h.lock().source_path == path)
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.objects.read().len()
    }
}
